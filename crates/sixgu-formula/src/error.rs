//! Formula error types

use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur during formula lexing, parsing, resolution or
/// compilation.
///
/// None of these escape to the workbook as failures: lex and parse errors
/// are stored as `BadFormula` terms, everything else becomes an error value.
#[derive(Debug, Error)]
pub enum FormulaError {
    /// Character that cannot start any token
    #[error("Don't know what to do with '{character}' at position {position}")]
    Lex { character: char, position: usize },

    /// String literal without a closing quote
    #[error("Unterminated string starting at position {position}")]
    UnterminatedString { position: usize },

    /// String literal with an invalid escape sequence
    #[error("Bad string literal at position {position}: {message}")]
    BadString { position: usize, message: String },

    /// Formula parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Name or field that does not exist
    #[error("{0}")]
    Resolution(String),

    /// What-if call that cannot be compiled
    #[error("Call error: {0}")]
    Call(String),

    /// Circular reference
    #[error("Circular reference (or depends on one)")]
    CircularReference,

    /// Formula evaluation error
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Reference model error
    #[error(transparent)]
    Core(#[from] sixgu_core::Error),
}
