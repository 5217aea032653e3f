use thiserror::Error;
use tinyquery_types::PrimitiveType;

/// Raised by `check_types`: the compiler turns this into a `CompileError`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypeError {
    #[error("unknown function: {0}")]
    UnknownFunction(String),
    #[error("{message}, got: {types:?}")]
    Mismatch {
        message: String,
        types: Vec<PrimitiveType>,
    },
}

impl TypeError {
    pub fn mismatch(message: impl Into<String>, types: impl Into<Vec<PrimitiveType>>) -> Self {
        TypeError::Mismatch {
            message: message.into(),
            types: types.into(),
        }
    }
}

/// Raised by `evaluate`: failures only detectable with actual row data in
/// hand (a non-literal argument where one is required, a malformed regex, an
/// invalid JSON path, a value that can't be parsed as its declared type).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("{0}")]
    Message(String),
    #[error("must provide a literal argument to {function}")]
    NonLiteralArgument { function: String },
    #[error("cannot query the cross product of repeated fields")]
    RepeatedCrossProduct,
}

impl RuntimeError {
    pub fn msg(message: impl Into<String>) -> Self {
        RuntimeError::Message(message.into())
    }
}
