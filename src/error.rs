//! Centralised error hierarchy for the **Sky interpreter**.
//!
//! The scanner, parser and interpreter convert their failure modes into one of
//! the variants defined here. This gives a uniform `Result<T>` alias throughout
//! the crate while keeping the line information every diagnostic needs.
//!
//! The module **does not** print diagnostics itself; rendering is left to the
//! driver, which works either with the `Display` form or with [`Diagnostic`]
//! records.

use std::fmt;
use std::io;

use log::debug;
use serde::Serialize;
use thiserror::Error;

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SkyError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error: {message}")]
    Lex {
        /// Human‑readable description.
        message: String,

        /// 1‑based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error.
    ///
    /// `found` describes the offending token (`'x'` or `end`), `message`
    /// what the parser expected instead.
    #[error("[line {line}] Error at {found}: {message}")]
    Parse {
        message: String,
        found: String,
        line: usize,
    },

    /// Static scoping error found after parsing, before anything runs.
    #[error("[line {line}] Error at '{name}': {message}")]
    Resolve {
        message: String,
        name: String,
        line: usize,
    },

    /// Runtime evaluation error.
    #[error("{message}\n[line {line}]")]
    Runtime { message: String, line: usize },

    /// Failure writing program output. Enables `?` on the output sink.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl SkyError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating Lex error: line={}, msg={}", line, message);

        SkyError::Lex { message, line }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<F, S>(line: usize, found: F, msg: S) -> Self
    where
        F: Into<String>,
        S: Into<String>,
    {
        let message: String = msg.into();
        let found: String = found.into();

        debug!(
            "Creating Parse error: line={}, found={}, msg={}",
            line, found, message
        );

        SkyError::Parse {
            message,
            found,
            line,
        }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<N, S>(line: usize, name: N, msg: S) -> Self
    where
        N: Into<String>,
        S: Into<String>,
    {
        let message: String = msg.into();
        let name: String = name.into();

        debug!(
            "Creating Resolve error: line={}, name={}, msg={}",
            line, name, message
        );

        SkyError::Resolve {
            message,
            name,
            line,
        }
    }

    /// Helper constructor for the **interpreter**.
    pub fn runtime<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating Runtime error: line={}, msg={}", line, message);

        SkyError::Runtime { message, line }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SkyError::Lex { .. } => ErrorKind::Lex,
            SkyError::Parse { .. } => ErrorKind::Parse,
            SkyError::Resolve { .. } => ErrorKind::Resolve,
            SkyError::Runtime { .. } => ErrorKind::Runtime,
            SkyError::Io(_) => ErrorKind::Io,
        }
    }

    /// Source line of the error, `None` for I/O failures.
    pub fn line(&self) -> Option<usize> {
        match self {
            SkyError::Lex { line, .. }
            | SkyError::Parse { line, .. }
            | SkyError::Resolve { line, .. }
            | SkyError::Runtime { line, .. } => Some(*line),
            SkyError::Io(_) => None,
        }
    }

    /// The bare message, without the line decoration of `Display`.
    pub fn message(&self) -> String {
        match self {
            SkyError::Lex { message, .. } | SkyError::Runtime { message, .. } => message.clone(),
            SkyError::Parse { message, found, .. } => format!("at {}: {}", found, message),
            SkyError::Resolve { message, name, .. } => format!("at '{}': {}", name, message),
            SkyError::Io(e) => e.to_string(),
        }
    }

    /// Flatten the error into a structured `{kind, message, line}` record.
    pub fn diagnostic(&self) -> Diagnostic {
        Diagnostic {
            kind: self.kind(),
            message: self.message(),
            line: self.line().unwrap_or(0),
        }
    }
}

/// Coarse error category, one per pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Lex,
    Parse,
    Resolve,
    Runtime,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Lex => "lex",
            ErrorKind::Parse => "parse",
            ErrorKind::Resolve => "resolve",
            ErrorKind::Runtime => "runtime",
            ErrorKind::Io => "io",
        };

        f.write_str(name)
    }
}

/// A structured diagnostic record as handed to the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub message: String,

    /// 1‑based source line; `0` when the error has no position.
    pub line: usize,
}

/// Outcome of a failed run of source text.
#[derive(Debug, Error)]
pub enum RunError {
    /// Every lex, parse or resolve error found in the source (from the
    /// first stage that failed). Nothing was evaluated.
    #[error("{} syntax error(s)", .0.len())]
    Syntax(Vec<SkyError>),

    /// The first runtime error; evaluation stopped there.
    #[error(transparent)]
    Runtime(SkyError),
}

impl RunError {
    /// The underlying errors in report order.
    pub fn errors(&self) -> &[SkyError] {
        match self {
            RunError::Syntax(errors) => errors,
            RunError::Runtime(error) => std::slice::from_ref(error),
        }
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.errors().iter().map(SkyError::diagnostic).collect()
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, SkyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        assert_eq!(
            SkyError::lex(3, "Unexpected character: $").to_string(),
            "[line 3] Error: Unexpected character: $"
        );
        assert_eq!(
            SkyError::parse(1, "end", "Expected ';' after value.").to_string(),
            "[line 1] Error at end: Expected ';' after value."
        );
        assert_eq!(
            SkyError::runtime(7, "Undefined variable 'y'.").to_string(),
            "Undefined variable 'y'.\n[line 7]"
        );
        assert_eq!(
            SkyError::resolve(2, "a", "Cannot read local variable in its own initializer.")
                .to_string(),
            "[line 2] Error at 'a': Cannot read local variable in its own initializer."
        );
    }

    #[test]
    fn diagnostic_serializes_as_record() {
        let diag = SkyError::runtime(2, "Division by zero.").diagnostic();

        assert_eq!(diag.kind, ErrorKind::Runtime);
        assert_eq!(diag.line, 2);

        let json = serde_json::to_string(&diag).unwrap();
        assert_eq!(
            json,
            r#"{"kind":"runtime","message":"Division by zero.","line":2}"#
        );
    }

    #[test]
    fn run_error_lists_errors_in_order() {
        let err = RunError::Syntax(vec![SkyError::lex(1, "a"), SkyError::lex(4, "b")]);
        let lines: Vec<usize> = err.diagnostics().iter().map(|d| d.line).collect();

        assert_eq!(lines, vec![1, 4]);
        assert_eq!(err.to_string(), "2 syntax error(s)");
    }
}
