//! Primitive types, modes, and the scalar value sum type that every Column
//! in the engine is built out of.

mod cast;
mod mode;
pub mod repeated;
mod value;

pub use cast::{cast_scalar, CastError};
pub use mode::Mode;
pub use value::{ScalarValue, Value};

use tinyquery_helpers::IndexSet;

/// One of the five primitive BigQuery-ish types, plus the untyped `NULL`
/// sentinel type assigned to bare `NULL` literals before any context fixes
/// its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Int,
    Float,
    Bool,
    String,
    Timestamp,
    NoneType,
}

impl PrimitiveType {
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveType::Int => "INTEGER",
            PrimitiveType::Float => "FLOAT",
            PrimitiveType::Bool => "BOOLEAN",
            PrimitiveType::String => "STRING",
            PrimitiveType::Timestamp => "TIMESTAMP",
            PrimitiveType::NoneType => "NONETYPE",
        }
    }

    /// `{INT, BOOL, TIMESTAMP}` — types that behave like integers arithmetically.
    pub fn is_int_set(self) -> bool {
        matches!(
            self,
            PrimitiveType::Int | PrimitiveType::Bool | PrimitiveType::Timestamp
        )
    }

    /// `INT_SET ∪ {FLOAT}`.
    pub fn is_numeric_set(self) -> bool {
        self.is_int_set() || self == PrimitiveType::Float
    }

    /// `{INT, STRING, TIMESTAMP}` — types accepted by date/time functions.
    pub fn is_datetime_set(self) -> bool {
        matches!(
            self,
            PrimitiveType::Int | PrimitiveType::String | PrimitiveType::Timestamp
        )
    }
}

impl std::fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

pub fn int_type_set() -> IndexSet<PrimitiveType> {
    [
        PrimitiveType::Int,
        PrimitiveType::Bool,
        PrimitiveType::Timestamp,
    ]
    .into_iter()
    .collect()
}
