use chrono::{DateTime, Utc};

/// A single non-repeated, non-null value.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
    Timestamp(DateTime<Utc>),
}

impl ScalarValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ScalarValue::Int(_) => "INTEGER",
            ScalarValue::Float(_) => "FLOAT",
            ScalarValue::Bool(_) => "BOOLEAN",
            ScalarValue::String(_) => "STRING",
            ScalarValue::Timestamp(_) => "TIMESTAMP",
        }
    }

    /// Truthiness used by `WHERE`/`HAVING` masks and short-circuit boolean ops.
    pub fn is_truthy(&self) -> bool {
        match self {
            ScalarValue::Bool(b) => *b,
            ScalarValue::Int(i) => *i != 0,
            ScalarValue::Float(f) => *f != 0.0,
            ScalarValue::String(s) => !s.is_empty(),
            ScalarValue::Timestamp(_) => true,
        }
    }
}

/// One cell of a [`Column`](../tinyquery_plan/struct.Column.html): either a
/// single (possibly null) scalar, or — for REPEATED columns — an ordered
/// sequence of scalars. Elements of a repeated value are `Option` because
/// intermediate flatten/rebuild steps (see `repeated` module) can carry a
/// null through a single position before it gets normalized away.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Option<ScalarValue>),
    Repeated(Vec<Option<ScalarValue>>),
}

impl Value {
    pub fn null() -> Value {
        Value::Scalar(None)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Scalar(None))
    }

    pub fn as_scalar(&self) -> Option<&ScalarValue> {
        match self {
            Value::Scalar(Some(v)) => Some(v),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Scalar(Some(v)) => v.is_truthy(),
            Value::Scalar(None) => false,
            Value::Repeated(items) => items
                .iter()
                .any(|v| v.as_ref().is_some_and(ScalarValue::is_truthy)),
        }
    }
}

impl From<ScalarValue> for Value {
    fn from(v: ScalarValue) -> Self {
        Value::Scalar(Some(v))
    }
}
