use crate::value::Value;

/// `NULLABLE`, `REQUIRED`, or `REPEATED`. Governs which shapes of [`Value`]
/// are legal in a column tagged with this mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Nullable,
    Required,
    Repeated,
}

impl Mode {
    pub fn name(self) -> &'static str {
        match self {
            Mode::Nullable => "NULLABLE",
            Mode::Required => "REQUIRED",
            Mode::Repeated => "REPEATED",
        }
    }

    /// `null` matches only NULLABLE; a repeated sequence matches only
    /// REPEATED; any other scalar matches any mode.
    pub fn matches(self, value: &Value) -> bool {
        match value {
            Value::Scalar(None) => self == Mode::Nullable,
            Value::Repeated(_) => self == Mode::Repeated,
            Value::Scalar(Some(_)) => true,
        }
    }
}
