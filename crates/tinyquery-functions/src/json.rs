//! `json_extract`/`json_extract_scalar`: a small JSONPath subset supporting
//! `$`, `.field`, and `[index]` steps, grounded on the original's
//! hand-rolled path parser rather than a full JSONPath implementation.

use serde_json::Value as Json;
use tinyquery_plan::Column;
use tinyquery_types::{Mode, PrimitiveType, ScalarValue, Value};

use crate::core::{ensure_literal, ScalarImpl};
use crate::error::{RuntimeError, TypeError};

enum PathStep {
    Field(String),
    Index(usize),
}

fn parse_json_path(path: &str) -> Result<Vec<PathStep>, RuntimeError> {
    let path = path
        .strip_prefix('$')
        .ok_or_else(|| RuntimeError::msg(format!("invalid json path: {path}")))?;
    let mut steps = Vec::new();
    let mut chars = path.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            '.' => {
                chars.next();
                let mut field = String::new();
                while let Some(&c) = chars.peek() {
                    if c == '.' || c == '[' {
                        break;
                    }
                    field.push(c);
                    chars.next();
                }
                if field.is_empty() {
                    return Err(RuntimeError::msg("empty property name in json path"));
                }
                steps.push(PathStep::Field(field));
            }
            '[' => {
                chars.next();
                let mut digits = String::new();
                while let Some(&c) = chars.peek() {
                    if c == ']' {
                        break;
                    }
                    digits.push(c);
                    chars.next();
                }
                if chars.next() != Some(']') {
                    return Err(RuntimeError::msg("unterminated array index in json path"));
                }
                let index = digits
                    .parse::<usize>()
                    .map_err(|_| RuntimeError::msg(format!("invalid array index: {digits}")))?;
                steps.push(PathStep::Index(index));
            }
            _ => return Err(RuntimeError::msg(format!("unexpected character in json path: {c}"))),
        }
    }
    Ok(steps)
}

/// `None` means the path did not resolve at all (distinct from resolving to
/// a JSON `null`, which is `Some(Json::Null)`).
fn extract_by_json_path(value: &Json, steps: &[PathStep]) -> Option<Json> {
    let mut current = value.clone();
    for step in steps {
        current = match (step, &current) {
            (PathStep::Field(name), Json::Object(map)) => map.get(name)?.clone(),
            (PathStep::Index(idx), Json::Array(items)) => items.get(*idx)?.clone(),
            _ => return None,
        };
    }
    Some(current)
}

fn json_to_extract_string(value: &Json) -> String {
    match value {
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_to_scalar_string(value: &Json) -> Option<String> {
    match value {
        Json::Null => None,
        Json::String(s) => Some(s.clone()),
        Json::Bool(b) => Some(b.to_string()),
        Json::Number(n) => Some(n.to_string()),
        Json::Array(_) | Json::Object(_) => None,
    }
}

enum ExtractMode {
    /// `json_extract`: returns the raw (possibly-compound) JSON text.
    Json,
    /// `json_extract_scalar`: returns only leaf scalar values, `NULL` for
    /// anything else (missing path, JSON null, array, or object).
    Scalar,
}

pub struct JsonExtractFunction(pub ExtractModeWrapper);

pub struct ExtractModeWrapper(ExtractMode);

impl JsonExtractFunction {
    pub fn json() -> Self {
        JsonExtractFunction(ExtractModeWrapper(ExtractMode::Json))
    }

    pub fn scalar() -> Self {
        JsonExtractFunction(ExtractModeWrapper(ExtractMode::Scalar))
    }
}

impl ScalarImpl for JsonExtractFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        let [t1, t2] = arg_types else {
            return Err(TypeError::mismatch("expected two arguments", arg_types.to_vec()));
        };
        if *t1 != PrimitiveType::String || *t2 != PrimitiveType::String {
            return Err(TypeError::mismatch("json_extract requires string arguments", arg_types.to_vec()));
        }
        Ok(PrimitiveType::String)
    }

    fn evaluate_flat(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let [json_col, path_col] = args else {
            return Err(RuntimeError::msg("json_extract expects two arguments"));
        };
        let path_literal = ensure_literal(&path_col.values, "json_extract")?;
        let Some(ScalarValue::String(path)) = path_literal else {
            return Ok(Column {
                r#type: PrimitiveType::String,
                mode: Mode::Nullable,
                values: vec![Value::null(); json_col.values.len()],
            });
        };
        let steps = parse_json_path(&path)?;

        let mut values = Vec::with_capacity(json_col.values.len());
        for v in &json_col.values {
            let result = match v.as_scalar() {
                Some(ScalarValue::String(text)) => {
                    let parsed: Json = serde_json::from_str(text)
                        .map_err(|e| RuntimeError::msg(format!("invalid json: {e}")))?;
                    extract_by_json_path(&parsed, &steps).and_then(|found| match self.0 .0 {
                        ExtractMode::Json => Some(json_to_extract_string(&found)),
                        ExtractMode::Scalar => json_to_scalar_string(&found),
                    })
                }
                _ => None,
            };
            values.push(Value::Scalar(result.map(ScalarValue::String)));
        }
        Ok(Column {
            r#type: PrimitiveType::String,
            mode: Mode::Nullable,
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json_col(values: &[&str]) -> Column {
        Column {
            r#type: PrimitiveType::String,
            mode: Mode::Nullable,
            values: values
                .iter()
                .map(|v| Value::Scalar(Some(ScalarValue::String((*v).to_string()))))
                .collect(),
        }
    }

    fn literal_path(path: &str) -> Column {
        Column {
            r#type: PrimitiveType::String,
            mode: Mode::Nullable,
            values: vec![Value::Scalar(Some(ScalarValue::String(path.to_string())))],
        }
    }

    #[test]
    fn extracts_nested_field() {
        let json = json_col(&[r#"{"a": {"b": 3}}"#]);
        let path = literal_path("$.a.b");
        let result = JsonExtractFunction::scalar().evaluate_flat(1, &[json, path]).unwrap();
        assert_eq!(result.values[0], Value::Scalar(Some(ScalarValue::String("3".to_string()))));
    }

    #[test]
    fn scalar_mode_nulls_out_on_compound_result() {
        let json = json_col(&[r#"{"a": [1, 2]}"#]);
        let path = literal_path("$.a");
        let result = JsonExtractFunction::scalar().evaluate_flat(1, &[json, path]).unwrap();
        assert_eq!(result.values[0], Value::null());
    }

    #[test]
    fn json_mode_returns_compound_result_as_text() {
        let json = json_col(&[r#"{"a": [1, 2]}"#]);
        let path = literal_path("$.a");
        let result = JsonExtractFunction::json().evaluate_flat(1, &[json, path]).unwrap();
        assert_eq!(result.values[0], Value::Scalar(Some(ScalarValue::String("[1,2]".to_string()))));
    }
}
