use thiserror::Error;

use crate::Type;

/// The expression could not be compiled. Offsets are byte offsets into the source text.
#[allow(missing_docs)]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("Expression is empty")]
    Empty,
    #[error("Unexpected character '{found}' at offset {offset}")]
    UnexpectedCharacter { found: char, offset: usize },
    #[error("Unterminated string literal starting at offset {offset}")]
    UnterminatedString { offset: usize },
    #[error("Invalid escape sequence at offset {offset}")]
    InvalidEscape { offset: usize },
    #[error("Integer literal out of range at offset {offset}")]
    IntegerOutOfRange { offset: usize },
    #[error("Expression nests deeper than {limit} levels at offset {offset}")]
    NestingTooDeep { limit: usize, offset: usize },
    #[error("Unexpected {found} at offset {offset}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: &'static str,
        offset: usize,
    },
    #[error("Undeclared reference to '{name}' at offset {offset}")]
    UndeclaredReference { name: String, offset: usize },
    #[error("Unknown function '{name}' at offset {offset}")]
    UnknownFunction { name: String, offset: usize },
    #[error("No matching overload for '{function}' applied to ({arguments}) at offset {offset}")]
    NoMatchingOverload {
        function: String,
        arguments: String,
        offset: usize,
    },
    #[error("Empty list literal at offset {offset} has no element type")]
    EmptyList { offset: usize },
    #[error("Invalid regular expression at offset {offset}: {message}")]
    InvalidRegex { offset: usize, message: String },
    #[error("Invalid timestamp at offset {offset}: {message}")]
    InvalidTimestamp { offset: usize, message: String },
    #[error("Expression must evaluate to bool, found {found}")]
    NotBoolean { found: Type },
}

/// A compiled program failed while evaluating a specific set of bindings.
#[allow(missing_docs)]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("No value bound for '{0}'")]
    UnboundVariable(String),
    #[error("Variable '{name}' is declared as {expected} but bound to a {found}")]
    BindingType {
        name: String,
        expected: Type,
        found: &'static str,
    },
    #[error("Invalid regular expression: {0}")]
    InvalidRegex(String),
    #[error("Invalid timestamp '{value}': {message}")]
    InvalidTimestamp { value: String, message: String },
    #[error("Integer overflow")]
    Overflow,
    #[error("Expected a {expected} operand, found {found}")]
    OperandType {
        expected: &'static str,
        found: &'static str,
    },
}
