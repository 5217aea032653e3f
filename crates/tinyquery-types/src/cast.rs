use chrono::DateTime;
use thiserror::Error;

use crate::{PrimitiveType, ScalarValue};

#[derive(Debug, Error)]
pub enum CastError {
    #[error("cannot cast {raw:?} to {target}")]
    Invalid { raw: String, target: PrimitiveType },
}

/// Casts a raw textual value (as read from a CSV field) to the column's
/// declared type. The literal string `null` is handled by the caller before
/// reaching here — this only ever casts non-null text.
pub fn cast_scalar(target: PrimitiveType, raw: &str) -> Result<ScalarValue, CastError> {
    let err = || CastError::Invalid {
        raw: raw.to_string(),
        target,
    };
    match target {
        PrimitiveType::Int => raw.parse::<i64>().map(ScalarValue::Int).map_err(|_| err()),
        PrimitiveType::Float => raw
            .parse::<f64>()
            .map(ScalarValue::Float)
            .map_err(|_| err()),
        PrimitiveType::Bool => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(ScalarValue::Bool(true)),
            "false" | "0" => Ok(ScalarValue::Bool(false)),
            _ => Err(err()),
        },
        PrimitiveType::String => Ok(ScalarValue::String(raw.to_string())),
        PrimitiveType::Timestamp => DateTime::parse_from_rfc3339(raw)
            .map(|dt| ScalarValue::Timestamp(dt.with_timezone(&chrono::Utc)))
            .map_err(|_| err()),
        PrimitiveType::NoneType => Err(err()),
    }
}
