//! Error types for the gradx harness and its script engine

use crate::runtime::Value;
use std::fmt;
use thiserror::Error;

/// Source location in script code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// Line number (1-indexed)
    pub line: u32,
    /// Column number (1-indexed)
    pub column: u32,
    /// Byte offset in source
    pub offset: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Format a source context with caret pointer for errors
pub fn format_error_context(source: &str, location: &SourceLocation) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let line_idx = (location.line.saturating_sub(1)) as usize;

    if line_idx >= lines.len() {
        return String::new();
    }

    let mut result = String::new();
    let line_num_width = format!("{}", location.line + 1).len().max(3);

    if line_idx > 0 {
        result.push_str(&format!(
            "{:>width$} | {}\n",
            location.line - 1,
            lines[line_idx - 1],
            width = line_num_width
        ));
    }

    result.push_str(&format!(
        "{:>width$} | {}\n",
        location.line,
        lines[line_idx],
        width = line_num_width
    ));

    let pointer_offset = (location.column.saturating_sub(1)) as usize;
    result.push_str(&format!(
        "{:>width$} | {}^\n",
        "",
        " ".repeat(pointer_offset),
        width = line_num_width
    ));

    if line_idx + 1 < lines.len() {
        result.push_str(&format!(
            "{:>width$} | {}\n",
            location.line + 1,
            lines[line_idx + 1],
            width = line_num_width
        ));
    }

    result
}

/// Main error type for gradx
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// Lexer error - invalid token or character
    #[error("SyntaxError: {message} at {location}{}", if source_context.is_empty() { String::new() } else { format!("\n{}", source_context) })]
    LexerError {
        message: String,
        location: SourceLocation,
        source_context: String,
    },

    /// Parser error - invalid syntax
    #[error("SyntaxError: {message} at {location}{}", if source_context.is_empty() { String::new() } else { format!("\n{}", source_context) })]
    ParseError {
        message: String,
        location: SourceLocation,
        source_context: String,
    },

    /// Runtime error raised by the engine itself - TypeError, ReferenceError, etc.
    #[error("{kind}: {message}")]
    RuntimeError { kind: ErrorKind, message: String },

    /// A value thrown by script code (`throw x`) that nobody caught
    #[error("Uncaught {}", .0.to_js_string())]
    Thrown(Value),

    /// IO error
    #[error("IOError: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    /// Invalid or unreadable marker configuration
    #[error("ConfigError: {0}")]
    ConfigError(String),

    /// Internal harness error
    #[error("InternalError: {0}")]
    InternalError(String),
}

/// Script error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::enum_variant_names)]
pub enum ErrorKind {
    /// TypeError - wrong type for operation
    TypeError,
    /// ReferenceError - undefined variable
    ReferenceError,
    /// RangeError - value out of range
    RangeError,
    /// SyntaxError - invalid syntax at runtime
    SyntaxError,
    /// Generic Error - user-constructed Error objects
    GenericError,
    /// InternalError - internal engine error
    InternalError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl ErrorKind {
    /// The constructor name scripts see for this kind
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::TypeError => "TypeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::GenericError => "Error",
            ErrorKind::InternalError => "InternalError",
        }
    }

    /// Look up a kind from its constructor name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "TypeError" => Some(ErrorKind::TypeError),
            "ReferenceError" => Some(ErrorKind::ReferenceError),
            "RangeError" => Some(ErrorKind::RangeError),
            "SyntaxError" => Some(ErrorKind::SyntaxError),
            "Error" => Some(ErrorKind::GenericError),
            _ => None,
        }
    }
}

impl Error {
    /// Create a new lexer error with source context
    pub fn lexer_error_with_context(
        message: impl Into<String>,
        location: SourceLocation,
        source: &str,
    ) -> Self {
        Error::LexerError {
            message: message.into(),
            source_context: format_error_context(source, &location),
            location,
        }
    }

    /// Create a new parse error with source context
    pub fn parse_error_with_context(
        message: impl Into<String>,
        location: SourceLocation,
        source: &str,
    ) -> Self {
        Error::ParseError {
            message: message.into(),
            source_context: format_error_context(source, &location),
            location,
        }
    }

    /// Create a TypeError
    pub fn type_error(message: impl Into<String>) -> Self {
        Error::RuntimeError {
            kind: ErrorKind::TypeError,
            message: message.into(),
        }
    }

    /// Create a ReferenceError
    pub fn reference_error(message: impl Into<String>) -> Self {
        Error::RuntimeError {
            kind: ErrorKind::ReferenceError,
            message: message.into(),
        }
    }

    /// Create a RangeError
    pub fn range_error(message: impl Into<String>) -> Self {
        Error::RuntimeError {
            kind: ErrorKind::RangeError,
            message: message.into(),
        }
    }

    /// Create a generic `Error`
    pub fn generic(message: impl Into<String>) -> Self {
        Error::RuntimeError {
            kind: ErrorKind::GenericError,
            message: message.into(),
        }
    }

    /// Whether this error is a syntax error in the evaluated source
    pub fn is_syntax_error(&self) -> bool {
        matches!(
            self,
            Error::LexerError { .. }
                | Error::ParseError { .. }
                | Error::RuntimeError {
                    kind: ErrorKind::SyntaxError,
                    ..
                }
        )
    }

    /// Text shown to a learner for this error, as a script's `toString()` would print it.
    ///
    /// Source excerpts are left out: the learner report is a single line per event.
    pub fn exception_text(&self) -> String {
        match self {
            Error::LexerError {
                message, location, ..
            }
            | Error::ParseError {
                message, location, ..
            } => format!("SyntaxError: {} at {}", message, location),
            Error::RuntimeError { kind, message } => format!("{}: {}", kind, message),
            Error::Thrown(value) => value.to_js_string(),
            other => other.to_string(),
        }
    }

    /// Convert into the value a script `catch` clause binds
    pub fn into_value(self) -> Value {
        match self {
            Error::Thrown(value) => value,
            Error::RuntimeError { kind, message } => Value::error(kind, message),
            other => {
                let kind = if other.is_syntax_error() {
                    ErrorKind::SyntaxError
                } else {
                    ErrorKind::InternalError
                };
                let text = other.exception_text();
                let message = text
                    .strip_prefix("SyntaxError: ")
                    .map(str::to_string)
                    .unwrap_or(text);
                Value::error(kind, message)
            }
        }
    }
}

/// Result type alias for gradx
pub type Result<T> = std::result::Result<T, Error>;

/// Standardized error message templates
///
/// These constants keep engine error messages consistent with what learners
/// see from mainstream JavaScript engines.
pub mod messages {
    pub const NOT_A_FUNCTION: &str = "is not a function";
    pub const IS_NOT_DEFINED: &str = "is not defined";
    pub const CANNOT_READ_PROPERTY: &str = "Cannot read properties of";
    pub const CANNOT_SET_PROPERTY: &str = "Cannot set properties of";
    pub const ASSIGNMENT_TO_CONSTANT: &str = "Assignment to constant variable.";
    pub const MAXIMUM_CALL_STACK: &str = "Maximum call stack size exceeded";

    /// Format a "X is not a function" error message
    pub fn not_a_function(name: &str) -> String {
        format!("{} {}", name, NOT_A_FUNCTION)
    }

    /// Format a "X is not defined" error message
    pub fn not_defined(name: &str) -> String {
        format!("{} {}", name, IS_NOT_DEFINED)
    }

    /// Format a "Cannot read properties of X (reading 'Y')" error message
    pub fn cannot_read_property(prop: &str, of: &str) -> String {
        format!("{} {} (reading '{}')", CANNOT_READ_PROPERTY, of, prop)
    }

    /// Format a "Cannot set properties of X (setting 'Y')" error message
    pub fn cannot_set_property(prop: &str, of: &str) -> String {
        format!("{} {} (setting '{}')", CANNOT_SET_PROPERTY, of, prop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_context_points_at_column() {
        let source = "let a = 1;\nlet b = ;\nlet c = 3;";
        let loc = SourceLocation {
            line: 2,
            column: 9,
            offset: 19,
        };
        let ctx = format_error_context(source, &loc);
        assert!(ctx.contains("  2 | let b = ;"));
        assert!(ctx.contains("        ^"));
        assert!(ctx.contains("  3 | let c = 3;"));
    }

    #[test]
    fn test_exception_text_omits_source_context() {
        let err = Error::parse_error_with_context(
            "Unexpected token",
            SourceLocation {
                line: 1,
                column: 5,
                offset: 4,
            },
            "let = 3",
        );
        assert_eq!(err.exception_text(), "SyntaxError: Unexpected token at 1:5");
        assert!(err.is_syntax_error());
    }

    #[test]
    fn test_runtime_error_text() {
        let err = Error::type_error(messages::not_a_function("foo"));
        assert_eq!(err.exception_text(), "TypeError: foo is not a function");
    }
}
