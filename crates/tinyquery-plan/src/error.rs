use thiserror::Error;
use tinyquery_types::PrimitiveType;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypeContextError {
    #[error("Field not found: {0}")]
    FieldNotFound(String),
    #[error("Ambiguous field: {0}")]
    AmbiguousField(String),
    #[error(
        "Incompatible types when performing union on field {field}: {left} vs. {right}"
    )]
    IncompatibleUnion {
        field: String,
        left: PrimitiveType,
        right: PrimitiveType,
    },
}
