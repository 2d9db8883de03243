//! Diagnostics and error types for the document interpreter.

use std::fmt;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// A problem found while interpreting a document, attached to a line.
///
/// Line numbers are 1-based; `0` marks values that did not come from the
/// document text (e.g. edits made through the store API).
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub line: usize,
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn error(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn warning(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}: {}", self.line, self.severity, self.message)
    }
}

/// The outcome of a full parse. The rebuilt store is returned separately.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseResult {
    pub success: bool,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl ParseResult {
    /// Split a diagnostic list into errors and warnings, each ordered by line.
    pub fn from_diagnostics(mut diagnostics: Vec<Diagnostic>) -> Self {
        diagnostics.sort_by_key(|d| d.line);
        let (errors, warnings): (Vec<_>, Vec<_>) = diagnostics
            .into_iter()
            .partition(|d| d.severity == Severity::Error);
        Self {
            success: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// All diagnostics ordered by line.
    pub fn diagnostics(&self) -> Vec<&Diagnostic> {
        let mut all: Vec<&Diagnostic> = self.errors.iter().chain(&self.warnings).collect();
        all.sort_by_key(|d| d.line);
        all
    }
}

/// Failure to evaluate an arithmetic expression.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("empty expression")]
    Empty,
    #[error("unknown variable `{0}`")]
    UnknownVariable(String),
    #[error("unexpected character `{0}`")]
    UnexpectedChar(char),
    #[error("invalid number `{0}`")]
    InvalidNumber(String),
    #[error("unexpected `{0}`")]
    UnexpectedToken(String),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("`{0}` cannot be used as a number")]
    NotANumber(String),
}

/// Failure of an instance store operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("`{name}` is already declared as {existing}")]
    NameTaken { name: String, existing: String },
}
