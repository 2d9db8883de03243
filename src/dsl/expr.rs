//! Arithmetic expressions: `+ - * / ( )`, numbers, and variable names.
//!
//! Identifiers are resolved while tokenizing through a caller-supplied
//! lookup, so the evaluator knows nothing about scopes. Division by zero
//! follows IEEE-754 and yields infinity or NaN.

use super::error::EvalError;

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(f64),
    Op(char),
}

/// Evaluate `source`, resolving identifiers through `resolve`.
pub fn evaluate<F>(source: &str, mut resolve: F) -> Result<f64, EvalError>
where
    F: FnMut(&str) -> Option<f64>,
{
    let tokens = tokenize(source, &mut resolve)?;
    if tokens.is_empty() {
        return Err(EvalError::Empty);
    }
    let mut parser = ExprParser { tokens, pos: 0 };
    let value = parser.sum()?;
    match parser.tokens.get(parser.pos) {
        None => Ok(value),
        Some(tok) => Err(EvalError::UnexpectedToken(describe(tok))),
    }
}

/// Whether `text` is a bare, optionally negative, integer or decimal literal.
pub fn is_number_literal(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    let (int, frac) = match digits.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (digits, None),
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    all_digits(int) && frac.map_or(true, all_digits)
}

/// Parse a bare numeric literal.
pub fn parse_number_literal(text: &str) -> Option<f64> {
    if is_number_literal(text) {
        text.parse().ok()
    } else {
        None
    }
}

/// Lexical check for "this text is meant as arithmetic".
pub fn is_expression(text: &str) -> bool {
    let text = text.trim();
    text.contains(['+', '-', '*', '/', '(', ')']) && !is_number_literal(text)
}

fn tokenize<F>(source: &str, resolve: &mut F) -> Result<Vec<Tok>, EvalError>
where
    F: FnMut(&str) -> Option<f64>,
{
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            c if c.is_whitespace() => i += 1,
            '+' | '-' | '*' | '/' | '(' | ')' => {
                tokens.push(Tok::Op(ch));
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<f64>()
                    .map_err(|_| EvalError::InvalidNumber(text.clone()))?;
                tokens.push(Tok::Num(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let name: String = chars[start..i].iter().collect();
                match resolve(&name) {
                    Some(n) => tokens.push(Tok::Num(n)),
                    None => return Err(EvalError::UnknownVariable(name)),
                }
            }
            other => return Err(EvalError::UnexpectedChar(other)),
        }
    }

    Ok(tokens)
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Num(n) => n.to_string(),
        Tok::Op(c) => c.to_string(),
    }
}

struct ExprParser {
    tokens: Vec<Tok>,
    pos: usize,
}

impl ExprParser {
    fn peek_op(&self) -> Option<char> {
        match self.tokens.get(self.pos) {
            Some(Tok::Op(c)) => Some(*c),
            _ => None,
        }
    }

    // sum := product (('+'|'-') product)*
    fn sum(&mut self) -> Result<f64, EvalError> {
        let mut value = self.product()?;
        while let Some(op @ ('+' | '-')) = self.peek_op() {
            self.pos += 1;
            let rhs = self.product()?;
            if op == '+' {
                value += rhs;
            } else {
                value -= rhs;
            }
        }
        Ok(value)
    }

    // product := unary (('*'|'/') unary)*
    fn product(&mut self) -> Result<f64, EvalError> {
        let mut value = self.unary()?;
        while let Some(op @ ('*' | '/')) = self.peek_op() {
            self.pos += 1;
            let rhs = self.unary()?;
            if op == '*' {
                value *= rhs;
            } else {
                value /= rhs;
            }
        }
        Ok(value)
    }

    // unary := '-' unary | primary
    fn unary(&mut self) -> Result<f64, EvalError> {
        if self.peek_op() == Some('-') {
            self.pos += 1;
            return Ok(-self.unary()?);
        }
        self.primary()
    }

    // primary := number | '(' sum ')'
    fn primary(&mut self) -> Result<f64, EvalError> {
        match self.tokens.get(self.pos).cloned() {
            Some(Tok::Num(n)) => {
                self.pos += 1;
                Ok(n)
            }
            Some(Tok::Op('(')) => {
                self.pos += 1;
                let value = self.sum()?;
                match self.tokens.get(self.pos) {
                    Some(Tok::Op(')')) => {
                        self.pos += 1;
                        Ok(value)
                    }
                    Some(tok) => Err(EvalError::UnexpectedToken(describe(tok))),
                    None => Err(EvalError::UnexpectedEnd),
                }
            }
            Some(tok) => Err(EvalError::UnexpectedToken(describe(&tok))),
            None => Err(EvalError::UnexpectedEnd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn eval(src: &str) -> Result<f64, EvalError> {
        evaluate(src, |name| match name {
            "depth" => Some(40.0),
            "base_pitch" => Some(-12.0),
            _ => None,
        })
    }

    #[test]
    fn precedence() {
        assert_approx_eq!(eval("1 + 2 * 3").unwrap(), 7.0);
        assert_approx_eq!(eval("(1 + 2) * 3").unwrap(), 9.0);
        assert_approx_eq!(eval("10 - 4 - 3").unwrap(), 3.0);
        assert_approx_eq!(eval("12 / 4 / 3").unwrap(), 1.0);
    }

    #[test]
    fn unary_minus() {
        assert_approx_eq!(eval("-3 * -2").unwrap(), 6.0);
        assert_approx_eq!(eval("--4").unwrap(), 4.0);
        assert_approx_eq!(eval("-(2 + 3)").unwrap(), -5.0);
    }

    #[test]
    fn identifiers_resolve_through_callback() {
        assert_approx_eq!(eval("depth / 2 + base_pitch").unwrap(), 8.0);
    }

    #[test]
    fn unknown_identifier_fails_whole_expression() {
        assert_eq!(
            eval("depth + missing"),
            Err(EvalError::UnknownVariable("missing".into()))
        );
    }

    #[test]
    fn division_by_zero_propagates_ieee() {
        assert!(eval("1 / 0").unwrap().is_infinite());
        assert!(eval("0 / 0").unwrap().is_nan());
    }

    #[test]
    fn malformed_input() {
        assert_eq!(eval(""), Err(EvalError::Empty));
        assert_eq!(eval("(1 + 2"), Err(EvalError::UnexpectedEnd));
        assert_eq!(eval("1 + 2)"), Err(EvalError::UnexpectedToken(")".into())));
        assert_eq!(eval("2 $ 3"), Err(EvalError::UnexpectedChar('$')));
        assert_eq!(eval("1..2"), Err(EvalError::InvalidNumber("1..2".into())));
        assert_eq!(eval("*3"), Err(EvalError::UnexpectedToken("*".into())));
    }

    #[test]
    fn expression_heuristic() {
        assert!(is_expression("depth * 2"));
        assert!(is_expression("(3)"));
        assert!(is_expression("a-b"));
        assert!(!is_expression("-12"));
        assert!(!is_expression("0.5"));
        assert!(!is_expression("vibrato"));
    }

    #[test]
    fn number_literals() {
        assert_eq!(parse_number_literal("120"), Some(120.0));
        assert_eq!(parse_number_literal("-0.25"), Some(-0.25));
        assert_eq!(parse_number_literal("1."), None);
        assert_eq!(parse_number_literal(".5"), None);
        assert_eq!(parse_number_literal("1e3"), None);
        assert_eq!(parse_number_literal("c4"), None);
    }
}
