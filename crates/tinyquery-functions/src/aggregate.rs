//! Aggregate functions: each takes every row of its arguments and collapses
//! them into a single-row result column. Despite reading like scalar or
//! collection operations, `concat`, `nth`, and `first` are aggregates in the
//! original runtime too — they see the whole column at once rather than
//! going through the scalar flatten/rebuild machinery.

use std::collections::HashSet;

use tinyquery_plan::Column;
use tinyquery_types::{Mode, PrimitiveType, ScalarValue, Value};

use crate::core::{ensure_literal, AggregateImpl};
use crate::error::{RuntimeError, TypeError};

fn one_row(r#type: PrimitiveType, value: Option<ScalarValue>) -> Column {
    Column {
        r#type,
        mode: Mode::Nullable,
        values: vec![Value::Scalar(value)],
    }
}

fn scalars(col: &Column) -> impl Iterator<Item = &ScalarValue> {
    col.values.iter().filter_map(Value::as_scalar)
}

pub struct SumFunction;

impl AggregateImpl for SumFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        let [t] = arg_types else {
            return Err(TypeError::mismatch("expected one argument", arg_types.to_vec()));
        };
        if !t.is_numeric_set() {
            return Err(TypeError::mismatch("sum requires a numeric argument", arg_types.to_vec()));
        }
        Ok(*t)
    }

    fn evaluate(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let [col] = args else {
            return Err(RuntimeError::msg("sum expects one argument"));
        };
        if col.r#type == PrimitiveType::Float {
            let total: f64 = scalars(col)
                .map(|v| match v {
                    ScalarValue::Float(f) => *f,
                    ScalarValue::Int(i) => *i as f64,
                    _ => 0.0,
                })
                .sum();
            Ok(one_row(PrimitiveType::Float, Some(ScalarValue::Float(total))))
        } else {
            let total: i64 = scalars(col)
                .map(|v| match v {
                    ScalarValue::Int(i) => *i,
                    ScalarValue::Bool(b) => i64::from(*b),
                    _ => 0,
                })
                .sum();
            Ok(one_row(col.r#type, Some(ScalarValue::Int(total))))
        }
    }
}

pub enum MinMax {
    Min,
    Max,
}

pub struct MinMaxFunction(pub MinMax);

impl AggregateImpl for MinMaxFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        let [t] = arg_types else {
            return Err(TypeError::mismatch("expected one argument", arg_types.to_vec()));
        };
        Ok(*t)
    }

    fn evaluate(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let [col] = args else {
            return Err(RuntimeError::msg("min/max expects one argument"));
        };
        let picked = scalars(col).fold(None::<ScalarValue>, |acc, v| match acc {
            None => Some(v.clone()),
            Some(best) => {
                let v_wins = match self.0 {
                    MinMax::Min => compare_numeric(v, &best) < 0,
                    MinMax::Max => compare_numeric(v, &best) > 0,
                };
                Some(if v_wins { v.clone() } else { best })
            }
        });
        Ok(one_row(col.r#type, picked))
    }
}

fn compare_numeric(a: &ScalarValue, b: &ScalarValue) -> i32 {
    use std::cmp::Ordering;
    let ordering = match (a, b) {
        (ScalarValue::Int(x), ScalarValue::Int(y)) => x.cmp(y),
        (ScalarValue::Float(x), ScalarValue::Float(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (ScalarValue::String(x), ScalarValue::String(y)) => x.cmp(y),
        (ScalarValue::Bool(x), ScalarValue::Bool(y)) => x.cmp(y),
        (ScalarValue::Timestamp(x), ScalarValue::Timestamp(y)) => x.cmp(y),
        _ => Ordering::Equal,
    };
    match ordering {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

pub struct CountFunction;

impl AggregateImpl for CountFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        let [_] = arg_types else {
            return Err(TypeError::mismatch("expected one argument", arg_types.to_vec()));
        };
        Ok(PrimitiveType::Int)
    }

    fn evaluate(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let [col] = args else {
            return Err(RuntimeError::msg("count expects one argument"));
        };
        let n = col
            .values
            .iter()
            .filter(|v| match v {
                Value::Scalar(None) => false,
                Value::Repeated(items) => !items.is_empty(),
                Value::Scalar(Some(_)) => true,
            })
            .count();
        Ok(one_row(PrimitiveType::Int, Some(ScalarValue::Int(n as i64))))
    }
}

pub struct CountDistinctFunction;

impl AggregateImpl for CountDistinctFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        let [_] = arg_types else {
            return Err(TypeError::mismatch("expected one argument", arg_types.to_vec()));
        };
        Ok(PrimitiveType::Int)
    }

    fn evaluate(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let [col] = args else {
            return Err(RuntimeError::msg("count_distinct expects one argument"));
        };
        let mut seen: HashSet<ScalarKey> = HashSet::new();
        for v in scalars(col) {
            seen.insert(ScalarKey::from(v.clone()));
        }
        Ok(one_row(PrimitiveType::Int, Some(ScalarValue::Int(seen.len() as i64))))
    }
}

/// `ScalarValue` doesn't implement `Eq`/`Hash` (it carries an `f64`), so
/// distinct-counting bridges through a byte-ish key representation instead.
#[derive(PartialEq, Eq, Hash)]
struct ScalarKey(ScalarValueKey);

impl From<ScalarValue> for ScalarKey {
    fn from(v: ScalarValue) -> Self {
        ScalarKey(ScalarValueKey::from(v))
    }
}

#[derive(PartialEq, Eq, Hash)]
enum ScalarValueKey {
    Int(i64),
    Float(u64),
    Bool(bool),
    String(String),
    Timestamp(i64),
}

impl From<ScalarValue> for ScalarValueKey {
    fn from(v: ScalarValue) -> Self {
        match v {
            ScalarValue::Int(i) => ScalarValueKey::Int(i),
            ScalarValue::Float(f) => ScalarValueKey::Float(f.to_bits()),
            ScalarValue::Bool(b) => ScalarValueKey::Bool(b),
            ScalarValue::String(s) => ScalarValueKey::String(s),
            ScalarValue::Timestamp(ts) => ScalarValueKey::Timestamp(ts.timestamp_micros()),
        }
    }
}

pub struct AvgFunction;

impl AggregateImpl for AvgFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        let [t] = arg_types else {
            return Err(TypeError::mismatch("expected one argument", arg_types.to_vec()));
        };
        if !t.is_numeric_set() {
            return Err(TypeError::mismatch("avg requires a numeric argument", arg_types.to_vec()));
        }
        Ok(PrimitiveType::Float)
    }

    fn evaluate(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let [col] = args else {
            return Err(RuntimeError::msg("avg expects one argument"));
        };
        let values: Vec<f64> = scalars(col)
            .map(|v| match v {
                ScalarValue::Float(f) => *f,
                ScalarValue::Int(i) => *i as f64,
                ScalarValue::Bool(b) => i64::from(*b) as f64,
                _ => 0.0,
            })
            .collect();
        let result = if values.is_empty() {
            None
        } else {
            Some(ScalarValue::Float(values.iter().sum::<f64>() / values.len() as f64))
        };
        Ok(one_row(PrimitiveType::Float, result))
    }
}

/// Stubbed at 0.0 pending a real streaming-variance implementation; callers
/// needing an exact sample standard deviation should not rely on this yet.
pub struct StddevSampFunction;

impl AggregateImpl for StddevSampFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        let [t] = arg_types else {
            return Err(TypeError::mismatch("expected one argument", arg_types.to_vec()));
        };
        if !t.is_numeric_set() {
            return Err(TypeError::mismatch("stddev_samp requires a numeric argument", arg_types.to_vec()));
        }
        Ok(PrimitiveType::Float)
    }

    fn evaluate(&self, _num_rows: usize, _args: &[Column]) -> Result<Column, RuntimeError> {
        Ok(one_row(PrimitiveType::Float, Some(ScalarValue::Float(0.0))))
    }
}

pub struct QuantilesFunction;

impl AggregateImpl for QuantilesFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        let [t, count] = arg_types else {
            return Err(TypeError::mismatch("expected two arguments", arg_types.to_vec()));
        };
        if !t.is_numeric_set() {
            return Err(TypeError::mismatch("quantiles requires a numeric argument", arg_types.to_vec()));
        }
        if *count != PrimitiveType::Int {
            return Err(TypeError::mismatch("expected an int quantile count", arg_types.to_vec()));
        }
        Ok(PrimitiveType::Float)
    }

    fn evaluate(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let [values_col, count_col] = args else {
            return Err(RuntimeError::msg("quantiles expects two arguments"));
        };
        let count_literal = ensure_literal(&count_col.values, "quantiles")?;
        let Some(ScalarValue::Int(quantile_count)) = count_literal else {
            return Ok(Column {
                r#type: PrimitiveType::Float,
                mode: Mode::Repeated,
                values: vec![],
            });
        };
        let mut sorted: Vec<f64> = scalars(values_col)
            .map(|v| match v {
                ScalarValue::Float(f) => *f,
                ScalarValue::Int(i) => *i as f64,
                _ => 0.0,
            })
            .collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

        if sorted.is_empty() || quantile_count < 1 {
            return Ok(Column {
                r#type: PrimitiveType::Float,
                mode: Mode::Repeated,
                values: vec![Value::Repeated(vec![])],
            });
        }
        let n = sorted.len();
        let boundaries: Vec<Option<ScalarValue>> = (0..=quantile_count)
            .map(|i| {
                let position = (i as f64 / quantile_count as f64) * (n - 1) as f64;
                let index = position.round() as usize;
                Some(ScalarValue::Float(sorted[index.min(n - 1)]))
            })
            .collect();
        Ok(Column {
            r#type: PrimitiveType::Float,
            mode: Mode::Repeated,
            values: vec![Value::Repeated(boundaries)],
        })
    }
}

pub struct GroupConcatUnquotedFunction;

impl AggregateImpl for GroupConcatUnquotedFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        match arg_types {
            [PrimitiveType::String] => Ok(PrimitiveType::String),
            [PrimitiveType::String, PrimitiveType::String] => Ok(PrimitiveType::String),
            _ => Err(TypeError::mismatch(
                "group_concat_unquoted requires a string column and an optional string separator",
                arg_types.to_vec(),
            )),
        }
    }

    fn evaluate(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let (values_col, separator) = match args {
            [values_col] => (values_col, ",".to_string()),
            [values_col, sep_col] => {
                let literal = ensure_literal(&sep_col.values, "group_concat_unquoted")?;
                match literal {
                    Some(ScalarValue::String(s)) => (values_col, s),
                    _ => (values_col, ",".to_string()),
                }
            }
            _ => return Err(RuntimeError::msg("group_concat_unquoted expects one or two arguments")),
        };
        let pieces: Vec<&str> = scalars(values_col)
            .filter_map(|v| match v {
                ScalarValue::String(s) => Some(s.as_str()),
                _ => None,
            })
            .collect();
        Ok(one_row(PrimitiveType::String, Some(ScalarValue::String(pieces.join(&separator)))))
    }
}

pub struct FirstFunction;

impl AggregateImpl for FirstFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        let [t] = arg_types else {
            return Err(TypeError::mismatch("expected one argument", arg_types.to_vec()));
        };
        Ok(*t)
    }

    fn evaluate(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let [col] = args else {
            return Err(RuntimeError::msg("first expects one argument"));
        };
        let first = col.values.first().and_then(Value::as_scalar).cloned();
        Ok(one_row(col.r#type, first))
    }
}

/// The aggregate (not scalar) string-concatenation `concat`: joins every row
/// of a single string column into one value, unlike the variadic per-row
/// `concat(a, b, c)` scalar function of the same name.
pub struct ConcatAggregateFunction;

impl AggregateImpl for ConcatAggregateFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        let [t] = arg_types else {
            return Err(TypeError::mismatch("expected one argument", arg_types.to_vec()));
        };
        if *t != PrimitiveType::String {
            return Err(TypeError::mismatch("concat requires a string argument", arg_types.to_vec()));
        }
        Ok(PrimitiveType::String)
    }

    fn evaluate(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let [col] = args else {
            return Err(RuntimeError::msg("concat expects one argument"));
        };
        let joined: String = scalars(col)
            .filter_map(|v| match v {
                ScalarValue::String(s) => Some(s.as_str()),
                _ => None,
            })
            .collect();
        Ok(one_row(PrimitiveType::String, Some(ScalarValue::String(joined))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_col(values: &[i64]) -> Column {
        Column {
            r#type: PrimitiveType::Int,
            mode: Mode::Nullable,
            values: values.iter().map(|&v| Value::Scalar(Some(ScalarValue::Int(v)))).collect(),
        }
    }

    #[test]
    fn sum_adds_ints() {
        let col = int_col(&[1, 2, 3]);
        let result = SumFunction.evaluate(3, &[col]).unwrap();
        assert_eq!(result.values[0], Value::Scalar(Some(ScalarValue::Int(6))));
    }

    #[test]
    fn count_distinct_deduplicates() {
        let col = int_col(&[1, 1, 2, 3, 3]);
        let result = CountDistinctFunction.evaluate(5, &[col]).unwrap();
        assert_eq!(result.values[0], Value::Scalar(Some(ScalarValue::Int(3))));
    }

    #[test]
    fn avg_over_empty_column_is_null() {
        let col = Column {
            r#type: PrimitiveType::Int,
            mode: Mode::Nullable,
            values: vec![],
        };
        let result = AvgFunction.evaluate(0, &[col]).unwrap();
        assert_eq!(result.values[0], Value::null());
    }
}
