//! Line splitting, indentation, and the shapes a trimmed line can take.

/// A meaningful (non-blank, non-comment) line of a document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line<'a> {
    /// 1-based line number.
    pub number: usize,
    pub indent: usize,
    pub content: &'a str,
}

/// Indentation width: a space counts 1, a tab counts 2.
pub fn measure_indent(raw: &str) -> usize {
    raw.chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| if c == '\t' { 2 } else { 1 })
        .sum()
}

/// Iterate the lines that carry content, skipping blanks and `#` comments.
pub fn lines(source: &str) -> impl Iterator<Item = Line<'_>> {
    source.lines().enumerate().filter_map(|(idx, raw)| {
        let content = raw.trim();
        if content.is_empty() || content.starts_with('#') {
            None
        } else {
            Some(Line {
                number: idx + 1,
                indent: measure_indent(raw),
                content,
            })
        }
    })
}

/// `variable <name> = <expr> [min, max]`
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDecl<'a> {
    pub name: &'a str,
    pub expr: &'a str,
    pub range: Option<(f64, f64)>,
}

/// A line split into its leading word and the rest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Words<'a> {
    pub head: &'a str,
    pub rest: &'a str,
}

impl<'a> Words<'a> {
    pub fn split(content: &'a str) -> Self {
        match content.split_once(char::is_whitespace) {
            Some((head, rest)) => Self {
                head,
                rest: rest.trim(),
            },
            None => Self {
                head: content,
                rest: "",
            },
        }
    }

    /// The rest as exactly one word, if it is one.
    pub fn single_rest(&self) -> Option<&'a str> {
        if self.rest.is_empty() || self.rest.contains(char::is_whitespace) {
            None
        } else {
            Some(self.rest)
        }
    }
}

/// Whether `word` is usable as a component or variable name.
pub fn is_identifier(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Whether the line is a variable declaration at all.
pub fn is_variable_line(content: &str) -> bool {
    Words::split(content).head == "variable"
}

/// Parse a variable declaration line.
pub fn parse_variable(content: &str) -> Result<VariableDecl<'_>, String> {
    let words = Words::split(content);
    let (name, rhs) = words
        .rest
        .split_once('=')
        .ok_or_else(|| "expected `variable <name> = <value>`".to_string())?;
    let name = name.trim();
    if !is_identifier(name) {
        return Err(format!("`{name}` is not a valid variable name"));
    }

    let rhs = rhs.trim();
    let (expr, range) = match split_range(rhs) {
        Some((expr, range)) => (expr, Some(parse_range(range)?)),
        None => (rhs, None),
    };
    if expr.is_empty() {
        return Err(format!("variable `{name}` has no value"));
    }

    Ok(VariableDecl { name, expr, range })
}

fn split_range(rhs: &str) -> Option<(&str, &str)> {
    if !rhs.ends_with(']') {
        return None;
    }
    let open = rhs.rfind('[')?;
    Some((rhs[..open].trim(), &rhs[open + 1..rhs.len() - 1]))
}

fn parse_range(inner: &str) -> Result<(f64, f64), String> {
    let bad = || format!("invalid range `[{inner}]`; expected `[min, max]`");
    let (min, max) = inner.split_once(',').ok_or_else(bad)?;
    let min: f64 = min.trim().parse().map_err(|_| bad())?;
    let max: f64 = max.trim().parse().map_err(|_| bad())?;
    Ok((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indent_counts_tabs_as_two() {
        assert_eq!(measure_indent("pitch 0"), 0);
        assert_eq!(measure_indent("  pitch 0"), 2);
        assert_eq!(measure_indent("\tpitch 0"), 2);
        assert_eq!(measure_indent("\t  modulation x"), 4);
    }

    #[test]
    fn skips_blank_and_comment_lines() {
        let src = "# header\n\noscillator lead\n  # note\n  pitch 0\n";
        let collected: Vec<_> = lines(src).collect();
        assert_eq!(collected.len(), 2);
        assert_eq!(collected[0].number, 3);
        assert_eq!(collected[1].number, 5);
        assert_eq!(collected[1].indent, 2);
        assert_eq!(collected[1].content, "pitch 0");
    }

    #[test]
    fn words_split() {
        let w = Words::split("note   c4");
        assert_eq!(w.head, "note");
        assert_eq!(w.rest, "c4");
        assert_eq!(w.single_rest(), Some("c4"));
        assert_eq!(Words::split("master").single_rest(), None);
        assert_eq!(Words::split("pitch depth * 2").single_rest(), None);
    }

    #[test]
    fn variable_with_range() {
        let decl = parse_variable("variable depth = 40 [0, 100]").unwrap();
        assert_eq!(decl.name, "depth");
        assert_eq!(decl.expr, "40");
        assert_eq!(decl.range, Some((0.0, 100.0)));
    }

    #[test]
    fn variable_with_expression() {
        let decl = parse_variable("variable half = depth / 2").unwrap();
        assert_eq!(decl.expr, "depth / 2");
        assert_eq!(decl.range, None);
    }

    #[test]
    fn malformed_variables() {
        assert!(parse_variable("variable depth 40").is_err());
        assert!(parse_variable("variable 4x = 1").is_err());
        assert!(parse_variable("variable depth = ").is_err());
        assert!(parse_variable("variable depth = 1 [a, b]").is_err());
        assert!(parse_variable("variable depth = [0, 1]").is_err());
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("vibrato"));
        assert!(is_identifier("_lfo2"));
        assert!(!is_identifier("2lfo"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier(""));
    }
}
