//! Math, string, JSON, logic/null, and collection scalar functions.

use tinyquery_plan::Column;
use tinyquery_types::{int_type_set, Mode, PrimitiveType, ScalarValue, Value};

use crate::core::{ensure_literal, ScalarImpl};
use crate::error::{RuntimeError, TypeError};

fn unary_scalar(
    args: &[Column],
    name: &str,
    result_type: PrimitiveType,
    f: impl Fn(&ScalarValue) -> Option<ScalarValue>,
) -> Result<Column, RuntimeError> {
    let [col] = args else {
        return Err(RuntimeError::msg(format!("{name} expects one argument")));
    };
    let values = col.values.iter().map(|v| v.as_scalar().and_then(&f)).map(Value::Scalar).collect();
    Ok(Column {
        r#type: result_type,
        mode: Mode::Nullable,
        values,
    })
}

pub struct AbsFunction;

impl ScalarImpl for AbsFunction {
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
        unary_scalar(args, "abs", PrimitiveType::Int, |v| match v {
            ScalarValue::Int(i) => Some(ScalarValue::Int(i.abs())),
            ScalarValue::Bool(b) => Some(ScalarValue::Int(i64::from(*b))),
            ScalarValue::Timestamp(ts) => Some(ScalarValue::Int(ts.timestamp_micros().abs())),
            _ => None,
        })
    }
}

pub struct FloorFunction;

impl ScalarImpl for FloorFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        let [t] = arg_types else {
            return Err(TypeError::mismatch("expected one argument", arg_types.to_vec()));
        };
        if !t.is_numeric_set() {
            return Err(TypeError::mismatch("expected type int or float", arg_types.to_vec()));
        }
        Ok(PrimitiveType::Float)
    }

    fn evaluate_flat(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        unary_scalar(args, "floor", PrimitiveType::Float, |v| match v {
            ScalarValue::Float(f) => Some(ScalarValue::Float(f.floor())),
            ScalarValue::Int(i) => Some(ScalarValue::Float(*i as f64)),
            _ => None,
        })
    }
}

pub struct IntegerCastFunction;

impl ScalarImpl for IntegerCastFunction {
    fn check_types(&self, _arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        Ok(PrimitiveType::Int)
    }

    fn evaluate_flat(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let [col] = args else {
            return Err(RuntimeError::msg("integer expects one argument"));
        };
        let values = col
            .values
            .iter()
            .map(|v| match v.as_scalar() {
                Some(ScalarValue::Int(i)) => Some(ScalarValue::Int(*i)),
                Some(ScalarValue::Float(f)) => Some(ScalarValue::Int(*f as i64)),
                Some(ScalarValue::Bool(b)) => Some(ScalarValue::Int(i64::from(*b))),
                Some(ScalarValue::Timestamp(ts)) => Some(ScalarValue::Int(ts.timestamp_micros())),
                Some(ScalarValue::String(s)) => s.trim().parse::<i64>().ok().map(ScalarValue::Int),
                None => None,
            })
            .map(Value::Scalar)
            .collect();
        Ok(Column {
            r#type: PrimitiveType::Int,
            mode: Mode::Nullable,
            values,
        })
    }
}

pub enum LogBase {
    Natural,
    Base(f64),
}

pub struct LogFunction(pub LogBase);

impl ScalarImpl for LogFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        let [t] = arg_types else {
            return Err(TypeError::mismatch("expected one argument", arg_types.to_vec()));
        };
        if !t.is_numeric_set() {
            return Err(TypeError::mismatch("expected numeric argument", arg_types.to_vec()));
        }
        Ok(PrimitiveType::Float)
    }

    fn evaluate_flat(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let base = match self.0 {
            LogBase::Natural => std::f64::consts::E,
            LogBase::Base(b) => b,
        };
        unary_scalar(args, "log", PrimitiveType::Float, |v| match v {
            ScalarValue::Float(f) => Some(ScalarValue::Float(f.log(base))),
            ScalarValue::Int(i) => Some(ScalarValue::Float((*i as f64).log(base))),
            _ => None,
        })
    }
}

pub struct PowFunction;

impl ScalarImpl for PowFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        crate::operators::ArithmeticOperator(crate::operators::ArithOp::Pow).check_types(arg_types)
    }

    fn evaluate_flat(&self, num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        crate::operators::ArithmeticOperator(crate::operators::ArithOp::Pow).evaluate_flat(num_rows, args)
    }
}

pub struct RandFunction;

impl ScalarImpl for RandFunction {
    fn check_types(&self, _arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        Ok(PrimitiveType::Float)
    }

    fn evaluate_flat(&self, num_rows: usize, _args: &[Column]) -> Result<Column, RuntimeError> {
        // A deterministic test double has no business returning nondeterministic
        // randomness; each call advances a simple counter-seeded LCG instead.
        let mut state: u64 = 0x9E3779B97F4A7C15;
        let values = (0..num_rows)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let unit = (state >> 11) as f64 / (1u64 << 53) as f64;
                Value::Scalar(Some(ScalarValue::Float(unit)))
            })
            .collect();
        Ok(Column {
            r#type: PrimitiveType::Float,
            mode: Mode::Nullable,
            values,
        })
    }
}

pub struct HashFunction;

impl ScalarImpl for HashFunction {
    fn check_types(&self, _arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        Ok(PrimitiveType::Int)
    }

    fn evaluate_flat(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        use std::hash::{Hash, Hasher};
        unary_scalar(args, "hash", PrimitiveType::Int, |v| {
            let mut hasher = ahash::AHasher::default();
            match v {
                ScalarValue::Int(i) => i.hash(&mut hasher),
                ScalarValue::Float(f) => f.to_bits().hash(&mut hasher),
                ScalarValue::Bool(b) => b.hash(&mut hasher),
                ScalarValue::String(s) => s.hash(&mut hasher),
                ScalarValue::Timestamp(ts) => ts.timestamp_micros().hash(&mut hasher),
            }
            Some(ScalarValue::Int(hasher.finish() as i64))
        })
    }
}

pub enum Reduce {
    Least,
    Greatest,
}

/// `least`/`greatest` reduce over any number of NUMERIC-set arguments; these
/// are modeled as aggregate-shaped (they take the whole arg list at once)
/// even though they run per-row, matching the original's own classification.
pub struct NumericArgReduceFunction(pub Reduce);

impl ScalarImpl for NumericArgReduceFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        if arg_types.len() < 2 {
            return Err(TypeError::mismatch("requires at least two arguments", arg_types.to_vec()));
        }
        if !arg_types.iter().all(PrimitiveType::is_numeric_set) {
            return Err(TypeError::mismatch("only operates on numeric types", arg_types.to_vec()));
        }
        if arg_types.iter().any(|t| *t == PrimitiveType::Float) {
            Ok(PrimitiveType::Float)
        } else {
            Ok(PrimitiveType::Int)
        }
    }

    fn evaluate_flat(&self, num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let types: Vec<PrimitiveType> = args.iter().map(|c| c.r#type).collect();
        let result_type = self.check_types(&types).map_err(|e| RuntimeError::msg(e.to_string()))?;
        let mut values = Vec::with_capacity(num_rows);
        for row in 0..num_rows {
            let mut row_vals = Vec::with_capacity(args.len());
            let mut any_null = false;
            for col in args {
                match col.values[row].as_scalar() {
                    Some(v) => row_vals.push(if result_type == PrimitiveType::Float {
                        match v {
                            ScalarValue::Float(f) => *f,
                            ScalarValue::Int(i) => *i as f64,
                            _ => 0.0,
                        }
                    } else {
                        match v {
                            ScalarValue::Int(i) => *i as f64,
                            _ => 0.0,
                        }
                    }),
                    None => any_null = true,
                }
            }
            let result = if any_null {
                None
            } else {
                let picked = match self.0 {
                    Reduce::Least => row_vals.into_iter().fold(f64::INFINITY, f64::min),
                    Reduce::Greatest => row_vals.into_iter().fold(f64::NEG_INFINITY, f64::max),
                };
                Some(if result_type == PrimitiveType::Float {
                    ScalarValue::Float(picked)
                } else {
                    ScalarValue::Int(picked as i64)
                })
            };
            values.push(Value::Scalar(result));
        }
        Ok(Column {
            r#type: result_type,
            mode: Mode::Nullable,
            values,
        })
    }
}

pub struct ConcatFunction;

impl ScalarImpl for ConcatFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        if arg_types.iter().any(|t| *t != PrimitiveType::String) {
            return Err(TypeError::mismatch("concat only takes string arguments", arg_types.to_vec()));
        }
        Ok(PrimitiveType::String)
    }

    fn evaluate_flat(&self, num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let mut values = Vec::with_capacity(num_rows);
        for row in 0..num_rows {
            let mut pieces = Vec::with_capacity(args.len());
            let mut any_null = false;
            for col in args {
                match col.values[row].as_scalar() {
                    Some(ScalarValue::String(s)) => pieces.push(s.clone()),
                    _ => {
                        any_null = true;
                        break;
                    }
                }
            }
            values.push(Value::Scalar(if any_null { None } else { Some(ScalarValue::String(pieces.concat())) }));
        }
        Ok(Column {
            r#type: PrimitiveType::String,
            mode: Mode::Nullable,
            values,
        })
    }
}

pub struct StringFunction;

impl ScalarImpl for StringFunction {
    fn check_types(&self, _arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        Ok(PrimitiveType::String)
    }

    fn evaluate_flat(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        unary_scalar(args, "string", PrimitiveType::String, |v| {
            Some(ScalarValue::String(match v {
                ScalarValue::Int(i) => i.to_string(),
                ScalarValue::Float(f) => f.to_string(),
                ScalarValue::Bool(b) => if *b { "True" } else { "False" }.to_string(),
                ScalarValue::String(s) => s.clone(),
                ScalarValue::Timestamp(ts) => ts.to_rfc3339(),
            }))
        })
    }
}

pub struct LeftFunction;

impl ScalarImpl for LeftFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        let [t1, t2] = arg_types else {
            return Err(TypeError::mismatch("expected two arguments", arg_types.to_vec()));
        };
        if *t1 != PrimitiveType::String {
            return Err(TypeError::mismatch("first argument to left must be a string", arg_types.to_vec()));
        }
        if *t2 != PrimitiveType::Int {
            return Err(TypeError::mismatch("second argument to left must be an int", arg_types.to_vec()));
        }
        Ok(PrimitiveType::String)
    }

    fn evaluate_flat(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let [strings, counts] = args else {
            return Err(RuntimeError::msg("left expects two arguments"));
        };
        let values = strings
            .values
            .iter()
            .zip(&counts.values)
            .map(|(s, n)| match (s.as_scalar(), n.as_scalar()) {
                (Some(ScalarValue::String(s)), Some(ScalarValue::Int(n))) => {
                    let take = (*n).max(0) as usize;
                    Some(ScalarValue::String(s.chars().take(take).collect()))
                }
                _ => None,
            })
            .map(Value::Scalar)
            .collect();
        Ok(Column {
            r#type: PrimitiveType::String,
            mode: Mode::Nullable,
            values,
        })
    }
}

fn check_string_args(arg_types: &[PrimitiveType]) -> Result<(), TypeError> {
    if arg_types.iter().any(|t| *t != PrimitiveType::String) {
        return Err(TypeError::mismatch("expected string arguments", arg_types.to_vec()));
    }
    Ok(())
}

pub struct RegexpMatchFunction;

impl ScalarImpl for RegexpMatchFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        check_string_args(arg_types)?;
        Ok(PrimitiveType::Bool)
    }

    fn evaluate_flat(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let [strings, regexps] = args else {
            return Err(RuntimeError::msg("regexp_match expects two arguments"));
        };
        let literal = ensure_literal(&regexps.values, "regexp_match")?;
        let Some(ScalarValue::String(pattern)) = literal else {
            return Ok(Column {
                r#type: PrimitiveType::Bool,
                mode: Mode::Nullable,
                values: vec![Value::null(); strings.values.len()],
            });
        };
        let re = fancy_regex::Regex::new(&pattern).map_err(|e| RuntimeError::msg(e.to_string()))?;
        let values = strings
            .values
            .iter()
            .map(|s| match s.as_scalar() {
                Some(ScalarValue::String(s)) => Some(ScalarValue::Bool(re.is_match(s).unwrap_or(false))),
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

pub struct RegexpExtractFunction;

impl ScalarImpl for RegexpExtractFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        check_string_args(arg_types)?;
        Ok(PrimitiveType::String)
    }

    fn evaluate_flat(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let [strings, regexps] = args else {
            return Err(RuntimeError::msg("regexp_extract expects two arguments"));
        };
        let literal = ensure_literal(&regexps.values, "regexp_extract")?;
        let Some(ScalarValue::String(pattern)) = literal else {
            return Ok(Column {
                r#type: PrimitiveType::String,
                mode: Mode::Nullable,
                values: vec![Value::null(); strings.values.len()],
            });
        };
        let re = fancy_regex::Regex::new(&pattern).map_err(|e| RuntimeError::msg(e.to_string()))?;
        let mut values = Vec::with_capacity(strings.values.len());
        for s in &strings.values {
            let Some(ScalarValue::String(s)) = s.as_scalar() else {
                values.push(Value::null());
                continue;
            };
            match re.captures(s).map_err(|e| RuntimeError::msg(e.to_string()))? {
                None => values.push(Value::null()),
                Some(caps) => {
                    let group = caps.get(1).ok_or_else(|| {
                        RuntimeError::msg("exactly one capturing group required")
                    })?;
                    values.push(Value::Scalar(Some(ScalarValue::String(group.as_str().to_string()))));
                }
            }
        }
        Ok(Column {
            r#type: PrimitiveType::String,
            mode: Mode::Nullable,
            values,
        })
    }
}

pub struct RegexpReplaceFunction;

impl ScalarImpl for RegexpReplaceFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        check_string_args(arg_types)?;
        Ok(PrimitiveType::String)
    }

    fn evaluate_flat(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let [strings, regexps, replacements] = args else {
            return Err(RuntimeError::msg("regexp_replace expects three arguments"));
        };
        let pattern = ensure_literal(&regexps.values, "regexp_replace")?;
        let replacement = ensure_literal(&replacements.values, "regexp_replace")?;
        let (Some(ScalarValue::String(pattern)), Some(ScalarValue::String(replacement))) = (pattern, replacement)
        else {
            return Ok(Column {
                r#type: PrimitiveType::String,
                mode: Mode::Nullable,
                values: vec![Value::null(); strings.values.len()],
            });
        };
        let re = fancy_regex::Regex::new(&pattern).map_err(|e| RuntimeError::msg(e.to_string()))?;
        let values = strings
            .values
            .iter()
            .map(|s| match s.as_scalar() {
                Some(ScalarValue::String(s)) => {
                    Some(ScalarValue::String(re.replace_all(s, replacement.as_str()).into_owned()))
                }
                _ => None,
            })
            .map(Value::Scalar)
            .collect();
        Ok(Column {
            r#type: PrimitiveType::String,
            mode: Mode::Nullable,
            values,
        })
    }
}

pub struct IfFunction;

impl ScalarImpl for IfFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        let [cond, t1, t2] = arg_types else {
            return Err(TypeError::mismatch("expected three arguments", arg_types.to_vec()));
        };
        if *cond != PrimitiveType::Bool {
            return Err(TypeError::mismatch("expected bool type", arg_types.to_vec()));
        }
        if *t1 == PrimitiveType::NoneType {
            return Ok(*t2);
        }
        if *t2 == PrimitiveType::NoneType {
            return Ok(*t1);
        }
        if t1 != t2 {
            return Err(TypeError::mismatch("expected types to be the same", arg_types.to_vec()));
        }
        Ok(*t1)
    }

    fn evaluate_flat(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let [cond, then_col, else_col] = args else {
            return Err(RuntimeError::msg("if expects three arguments"));
        };
        let result_type = self
            .check_types(&[cond.r#type, then_col.r#type, else_col.r#type])
            .map_err(|e| RuntimeError::msg(e.to_string()))?;
        let values = cond
            .values
            .iter()
            .zip(&then_col.values)
            .zip(&else_col.values)
            .map(|((c, t), e)| match c.as_scalar() {
                Some(ScalarValue::Bool(true)) => t.clone(),
                Some(ScalarValue::Bool(false)) => e.clone(),
                _ => Value::null(),
            })
            .collect();
        Ok(Column {
            r#type: result_type,
            mode: Mode::Nullable,
            values,
        })
    }
}

pub struct IfNullFunction;

impl ScalarImpl for IfNullFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        let [t1, t2] = arg_types else {
            return Err(TypeError::mismatch("expected two arguments", arg_types.to_vec()));
        };
        if *t1 == PrimitiveType::NoneType {
            return Ok(*t2);
        }
        if *t2 == PrimitiveType::NoneType {
            return Ok(*t1);
        }
        if t1 != t2 {
            return Err(TypeError::mismatch("expected types to be the same", arg_types.to_vec()));
        }
        Ok(*t1)
    }

    fn evaluate_flat(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let [col1, col2] = args else {
            return Err(RuntimeError::msg("ifnull expects two arguments"));
        };
        let result_type = self
            .check_types(&[col1.r#type, col2.r#type])
            .map_err(|e| RuntimeError::msg(e.to_string()))?;
        let values = col1
            .values
            .iter()
            .zip(&col2.values)
            .map(|(a, b)| if a.is_null() { b.clone() } else { a.clone() })
            .collect();
        Ok(Column {
            r#type: result_type,
            mode: Mode::Nullable,
            values,
        })
    }
}

pub struct CoalesceFunction;

impl ScalarImpl for CoalesceFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        let non_null_types: Vec<PrimitiveType> = arg_types
            .iter()
            .copied()
            .filter(|t| *t != PrimitiveType::NoneType)
            .collect();
        let mut distinct = non_null_types.clone();
        distinct.dedup();
        if distinct.len() > 1 {
            return Err(TypeError::mismatch(
                "all arguments to coalesce must have the same type",
                arg_types.to_vec(),
            ));
        }
        Ok(distinct.first().copied().unwrap_or(PrimitiveType::NoneType))
    }

    fn evaluate_flat(&self, num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let types: Vec<PrimitiveType> = args.iter().map(|c| c.r#type).collect();
        let result_type = self.check_types(&types).map_err(|e| RuntimeError::msg(e.to_string()))?;
        let mut values = Vec::with_capacity(num_rows);
        for row in 0..num_rows {
            let mut found = Value::null();
            for col in args {
                if let Some(v) = col.values[row].as_scalar() {
                    found = Value::Scalar(Some(v.clone()));
                    break;
                }
            }
            values.push(found);
        }
        Ok(Column {
            r#type: result_type,
            mode: Mode::Nullable,
            values,
        })
    }
}

pub struct InFunction;

impl ScalarImpl for InFunction {
    fn check_types(&self, _arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        Ok(PrimitiveType::Bool)
    }

    fn evaluate_flat(&self, num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let (target, rest) = args.split_first().ok_or_else(|| RuntimeError::msg("in expects at least one argument"))?;
        let mut values = Vec::with_capacity(num_rows);
        for row in 0..num_rows {
            let needle = target.values[row].as_scalar();
            let found = rest.iter().any(|col| col.values[row].as_scalar() == needle);
            values.push(Value::Scalar(Some(ScalarValue::Bool(found))));
        }
        Ok(Column {
            r#type: PrimitiveType::Bool,
            mode: Mode::Nullable,
            values,
        })
    }
}

pub struct NthFunction;

impl crate::core::AggregateImpl for NthFunction {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        let [index_type, list_type] = arg_types else {
            return Err(TypeError::mismatch("expected two arguments", arg_types.to_vec()));
        };
        if *index_type != PrimitiveType::Int {
            return Err(TypeError::mismatch("expected an int index", arg_types.to_vec()));
        }
        Ok(*list_type)
    }

    fn evaluate(&self, _num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let [index_col, list_col] = args else {
            return Err(RuntimeError::msg("nth expects two arguments"));
        };
        let index = ensure_literal(&index_col.values, "nth")?;
        let Some(ScalarValue::Int(index)) = index else {
            return Ok(Column {
                r#type: list_col.r#type,
                mode: Mode::Nullable,
                values: vec![Value::null()],
            });
        };
        let values = list_col
            .values
            .iter()
            .map(|v| match v {
                Value::Repeated(items) if index >= 1 && (index as usize) <= items.len() => {
                    Value::Scalar(items[index as usize - 1].clone())
                }
                _ => Value::null(),
            })
            .collect();
        Ok(Column {
            r#type: list_col.r#type,
            mode: Mode::Nullable,
            values,
        })
    }
}
