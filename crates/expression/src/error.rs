//! Error taxonomy for lexing, parsing, and evaluating expressions. Converts
//! into [`icecore_execution::IceError`] the way every other crate-local
//! error does (`icecore_execution::error`'s doc comment).

use thiserror::Error;

/// Everything that can go wrong turning source text into a value.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExpressionError {
    /// The lexer hit a character it doesn't know how to start a token with.
    #[error("unexpected character `{0}` at position {1}")]
    UnexpectedChar(char, usize),
    /// A string literal was never closed with its matching quote.
    #[error("unterminated string literal starting at position {0}")]
    UnterminatedString(usize),
    /// The parser expected one thing and found another.
    #[error("parse error: expected {expected}, found {found}")]
    UnexpectedToken {
        /// What the grammar allowed at this point.
        expected: String,
        /// What token was actually there.
        found: String,
    },
    /// The token stream ended before the grammar was satisfied.
    #[error("parse error: unexpected end of expression, expected {0}")]
    UnexpectedEof(String),
    /// A field-access path referenced a name that isn't present in `variables`.
    #[error("undefined variable `{0}`")]
    UndefinedVariable(String),
    /// A binary or unary operator received a value of the wrong shape.
    #[error("type error: expected {expected}, found {found}")]
    TypeMismatch {
        /// The shape the operator required.
        expected: &'static str,
        /// The shape actually seen.
        found: &'static str,
    },
    /// Division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// Evaluation recursed past the depth guard — almost certainly a
    /// pathological expression rather than legitimate nesting.
    #[error("expression nesting exceeded the maximum depth of {0}")]
    RecursionLimit(usize),
}

impl From<ExpressionError> for icecore_execution::IceError {
    fn from(err: ExpressionError) -> Self {
        icecore_execution::IceError::validation(err.to_string())
    }
}

/// Shorthand used throughout this crate.
pub type ExpressionResult<T> = Result<T, ExpressionError>;
