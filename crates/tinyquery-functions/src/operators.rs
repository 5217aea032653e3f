//! `+ - * / %` arithmetic, comparisons, boolean `AND`/`OR`, unary `-`/`NOT`,
//! `IS [NOT] NULL`, and `CONTAINS`.

use chrono::{DateTime, Utc};
use tinyquery_plan::Column;
use tinyquery_types::{int_type_set, Mode, PrimitiveType, ScalarValue, Value};

use crate::core::ScalarImpl;
use crate::error::{RuntimeError, TypeError};

/// Projects a NUMERIC-set scalar down to an `i64` so integral arithmetic can
/// be defined uniformly over `{INT, BOOL, TIMESTAMP}` (the INT type set).
fn as_int(v: &ScalarValue) -> i64 {
    match v {
        ScalarValue::Int(i) => *i,
        ScalarValue::Bool(b) => i64::from(*b),
        ScalarValue::Timestamp(ts) => ts.timestamp_micros(),
        ScalarValue::Float(f) => *f as i64,
        ScalarValue::String(_) => 0,
    }
}

fn as_float(v: &ScalarValue) -> f64 {
    match v {
        ScalarValue::Float(f) => *f,
        other => as_int(other) as f64,
    }
}

pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

pub struct ArithmeticOperator(pub ArithOp);

impl ScalarImpl for ArithmeticOperator {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        let [t1, t2] = arg_types else {
            return Err(TypeError::mismatch("expected two arguments", arg_types.to_vec()));
        };
        if !t1.is_numeric_set() || !t2.is_numeric_set() {
            return Err(TypeError::mismatch("expected numeric type", arg_types.to_vec()));
        }
        if *t1 == PrimitiveType::Float || *t2 == PrimitiveType::Float {
            Ok(PrimitiveType::Float)
        } else {
            Ok(PrimitiveType::Int)
        }
    }

    fn evaluate_flat(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let [col1, col2] = args else {
            return Err(RuntimeError::msg("expected two arguments"));
        };
        let result_type = self
            .check_types(&[col1.r#type, col2.r#type])
            .map_err(|e| RuntimeError::msg(e.to_string()))?;
        let values = col1
            .values
            .iter()
            .zip(&col2.values)
            .map(|(a, b)| match (a.as_scalar(), b.as_scalar()) {
                (Some(x), Some(y)) => Some(apply_arith(&self.0, result_type, x, y)),
                _ => None,
            })
            .map(Value::Scalar)
            .collect();
        Ok(Column {
            r#type: result_type,
            mode: Mode::Nullable,
            values,
        })
    }
}

fn apply_arith(op: &ArithOp, result_type: PrimitiveType, a: &ScalarValue, b: &ScalarValue) -> ScalarValue {
    if result_type == PrimitiveType::Float {
        let (x, y) = (as_float(a), as_float(b));
        ScalarValue::Float(match op {
            ArithOp::Add => x + y,
            ArithOp::Sub => x - y,
            ArithOp::Mul => x * y,
            ArithOp::Div => x / y,
            ArithOp::Mod => x % y,
            ArithOp::Pow => x.powf(y),
        })
    } else {
        let (x, y) = (as_int(a), as_int(b));
        ScalarValue::Int(match op {
            ArithOp::Add => x + y,
            ArithOp::Sub => x - y,
            ArithOp::Mul => x * y,
            ArithOp::Div => x / y,
            ArithOp::Mod => x % y,
            ArithOp::Pow => x.pow(y as u32),
        })
    }
}

pub enum Cmp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

pub struct ComparisonOperator(pub Cmp);

impl ScalarImpl for ComparisonOperator {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        let [t1, t2] = arg_types else {
            return Err(TypeError::mismatch("expected two arguments", arg_types.to_vec()));
        };
        if t1 == t2 {
            return Ok(PrimitiveType::Bool);
        }
        if t1.is_numeric_set() && t2.is_numeric_set() {
            return Ok(PrimitiveType::Bool);
        }
        if (*t1 == PrimitiveType::String && *t2 == PrimitiveType::Timestamp)
            || (*t1 == PrimitiveType::Timestamp && *t2 == PrimitiveType::String)
        {
            return Ok(PrimitiveType::Bool);
        }
        Err(TypeError::mismatch("unexpected types for comparison", arg_types.to_vec()))
    }

    fn evaluate_flat(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let [col1, col2] = args else {
            return Err(RuntimeError::msg("expected two arguments"));
        };

        // A STRING compared against a TIMESTAMP is parsed as ISO-8601 first.
        let (left_ts, right_ts);
        let (left_values, right_values): (&[Value], &[Value]) =
            if col1.r#type != col2.r#type
                && (col1.r#type == PrimitiveType::Timestamp || col2.r#type == PrimitiveType::Timestamp)
            {
                let (ts_col, str_col, ts_is_left) = if col1.r#type == PrimitiveType::Timestamp {
                    (col1, col2, true)
                } else {
                    (col2, col1, false)
                };
                let converted: Vec<Value> = str_col
                    .values
                    .iter()
                    .map(|v| match v.as_scalar() {
                        Some(ScalarValue::String(s)) => parse_iso8601(s)
                            .map(ScalarValue::Timestamp)
                            .map(|ts| Value::Scalar(Some(ts)))
                            .unwrap_or(Value::Scalar(None)),
                        Some(other) => Value::Scalar(Some(other.clone())),
                        None => Value::Scalar(None),
                    })
                    .collect();
                if ts_is_left {
                    right_ts = converted;
                    left_ts = Vec::new();
                    (&ts_col.values, right_ts.as_slice())
                } else {
                    left_ts = converted;
                    right_ts = Vec::new();
                    (left_ts.as_slice(), &ts_col.values)
                }
            } else {
                (col1.values.as_slice(), col2.values.as_slice())
            };

        let values = left_values
            .iter()
            .zip(right_values)
            .map(|(a, b)| match (a.as_scalar(), b.as_scalar()) {
                (Some(x), Some(y)) => Some(ScalarValue::Bool(compare(&self.0, x, y))),
                _ => None,
            })
            .map(Value::Scalar)
            .collect();
        Ok(Column {
            r#type: PrimitiveType::Bool,
            mode: Mode::Nullable,
            values,
        })
    }
}

fn parse_iso8601(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}

fn compare(cmp: &Cmp, a: &ScalarValue, b: &ScalarValue) -> bool {
    use std::cmp::Ordering;
    let ordering = match (a, b) {
        (ScalarValue::Int(x), ScalarValue::Int(y)) => x.cmp(y),
        (ScalarValue::String(x), ScalarValue::String(y)) => x.cmp(y),
        (ScalarValue::Bool(x), ScalarValue::Bool(y)) => x.cmp(y),
        (ScalarValue::Timestamp(x), ScalarValue::Timestamp(y)) => x.cmp(y),
        _ => as_float(a).partial_cmp(&as_float(b)).unwrap_or(Ordering::Equal),
    };
    match cmp {
        Cmp::Eq => ordering == Ordering::Equal,
        Cmp::Ne => ordering != Ordering::Equal,
        Cmp::Gt => ordering == Ordering::Greater,
        Cmp::Lt => ordering == Ordering::Less,
        Cmp::Ge => ordering != Ordering::Less,
        Cmp::Le => ordering != Ordering::Greater,
    }
}

pub enum BoolOp {
    And,
    Or,
}

pub struct BooleanOperator(pub BoolOp);

impl ScalarImpl for BooleanOperator {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        let [t1, t2] = arg_types else {
            return Err(TypeError::mismatch("expected two arguments", arg_types.to_vec()));
        };
        if *t1 != PrimitiveType::Bool || *t2 != PrimitiveType::Bool {
            return Err(TypeError::mismatch("expected bool type", arg_types.to_vec()));
        }
        Ok(PrimitiveType::Bool)
    }

    fn evaluate_flat(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let [col1, col2] = args else {
            return Err(RuntimeError::msg("expected two arguments"));
        };
        let values = col1
            .values
            .iter()
            .zip(&col2.values)
            .map(|(a, b)| match (a.as_scalar(), b.as_scalar()) {
                (Some(ScalarValue::Bool(x)), Some(ScalarValue::Bool(y))) => Some(ScalarValue::Bool(match self.0 {
                    BoolOp::And => *x && *y,
                    BoolOp::Or => *x || *y,
                })),
                _ => None,
            })
            .map(Value::Scalar)
            .collect();
        Ok(Column {
            r#type: PrimitiveType::Bool,
            mode: Mode::Nullable,
            values,
        })
    }
}

/// Unary `-`.
pub struct NegateOperator;

impl ScalarImpl for NegateOperator {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        let [t] = arg_types else {
            return Err(TypeError::mismatch("expected one argument", arg_types.to_vec()));
        };
        if !int_type_set().contains(t) {
            return Err(TypeError::mismatch("expected int type", arg_types.to_vec()));
        }
        Ok(PrimitiveType::Int)
    }

    fn evaluate_flat(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let [col] = args else {
            return Err(RuntimeError::msg("expected one argument"));
        };
        let values = col
            .values
            .iter()
            .map(|v| v.as_scalar().map(|x| ScalarValue::Int(-as_int(x))))
            .map(Value::Scalar)
            .collect();
        Ok(Column {
            r#type: PrimitiveType::Int,
            mode: Mode::Nullable,
            values,
        })
    }
}

/// Unary `NOT`. Takes `NULL` straight through as `NULL`, matching BigQuery.
pub struct NotOperator;

impl ScalarImpl for NotOperator {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        let [_] = arg_types else {
            return Err(TypeError::mismatch("expected one argument", arg_types.to_vec()));
        };
        Ok(PrimitiveType::Bool)
    }

    fn evaluate_flat(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let [col] = args else {
            return Err(RuntimeError::msg("expected one argument"));
        };
        let values = col
            .values
            .iter()
            .map(|v| match v.as_scalar() {
                Some(ScalarValue::Bool(b)) => Some(ScalarValue::Bool(!b)),
                _ => None,
            })
            .map(Value::Scalar)
            .collect();
        Ok(Column {
            r#type: PrimitiveType::Bool,
            mode: Mode::Nullable,
            values,
        })
    }
}

pub enum NullCheck {
    IsNull,
    IsNotNull,
}

/// Unlike most unary ops, this one explicitly reports on nullness rather
/// than propagating it.
pub struct NullCheckOperator(pub NullCheck);

impl ScalarImpl for NullCheckOperator {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        let [_] = arg_types else {
            return Err(TypeError::mismatch("expected one argument", arg_types.to_vec()));
        };
        Ok(PrimitiveType::Bool)
    }

    fn evaluate_flat(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let [col] = args else {
            return Err(RuntimeError::msg("expected one argument"));
        };
        let values = col
            .values
            .iter()
            .map(|v| {
                let is_null = v.as_scalar().is_none();
                Some(ScalarValue::Bool(match self.0 {
                    NullCheck::IsNull => is_null,
                    NullCheck::IsNotNull => !is_null,
                }))
            })
            .map(Value::Scalar)
            .collect();
        Ok(Column {
            r#type: PrimitiveType::Bool,
            mode: Mode::Nullable,
            values,
        })
    }
}

pub struct ContainsFunction;

impl ScalarImpl for ContainsFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        let [t1, t2] = arg_types else {
            return Err(TypeError::mismatch("expected two arguments", arg_types.to_vec()));
        };
        if *t1 != PrimitiveType::String || *t2 != PrimitiveType::String {
            return Err(TypeError::mismatch("contains must operate on strings", arg_types.to_vec()));
        }
        Ok(PrimitiveType::Bool)
    }

    fn evaluate_flat(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let [haystacks, needles] = args else {
            return Err(RuntimeError::msg("expected two arguments"));
        };
        let values = haystacks
            .values
            .iter()
            .zip(&needles.values)
            .map(|(h, n)| match (h.as_scalar(), n.as_scalar()) {
                (Some(ScalarValue::String(h)), Some(ScalarValue::String(n))) => {
                    Some(ScalarValue::Bool(h.contains(n.as_str())))
                }
                _ => None,
            })
            .map(Value::Scalar)
            .collect();
        Ok(Column {
            r#type: PrimitiveType::Bool,
            mode: Mode::Nullable,
            values,
        })
    }
}
