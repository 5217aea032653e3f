//! The `Function` trait family: every built-in is either a [`Scalar`] (gets
//! automatic REPEATED-argument flattening/rebuilding) or an [`Aggregate`]
//! (receives its columns as-is and returns a single row).

use tinyquery_plan::Column;
use tinyquery_types::{Mode, PrimitiveType, Value};

use crate::error::{RuntimeError, TypeError};
use crate::flatten::{flatten_column_values, rebuild_column_values};

pub trait Function: Send + Sync {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError>;
    fn evaluate(&self, num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError>;
    fn is_aggregate(&self) -> bool;
}

/// The part of a scalar built-in that only needs to handle non-repeated
/// (already-flattened) arguments; [`Scalar`] does the rest.
pub trait ScalarImpl: Send + Sync {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError>;
    fn evaluate_flat(&self, num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError>;
}

pub struct Scalar<T>(pub T);

impl<T: ScalarImpl> Function for Scalar<T> {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        self.0.check_types(arg_types)
    }

    /// Mirrors the original Python implementation's `ScalarFunction.evaluate`: if no
    /// argument is REPEATED, dispatch straight through; otherwise flatten
    /// every argument to the per-row repetition count, evaluate on the
    /// flattened columns, then rebuild a REPEATED result.
    fn evaluate(&self, num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        let repeated_indices: Vec<usize> = args
            .iter()
            .enumerate()
            .filter(|(_, col)| col.mode == Mode::Repeated)
            .map(|(idx, _)| idx)
            .collect();

        if repeated_indices.len() > 1 {
            check_compatible_repetition_counts(args, &repeated_indices)?;
        }
        if repeated_indices.is_empty() {
            return self.0.evaluate_flat(num_rows, args);
        }

        let column_values: Vec<Vec<Value>> = args.iter().map(|c| c.values.clone()).collect();
        let (repetition_counts, flattened_columns) =
            flatten_column_values(&repeated_indices, &column_values);
        let new_row_count = flattened_columns.first().map_or(0, Vec::len);

        let flattened_cols: Vec<Column> = args
            .iter()
            .zip(flattened_columns)
            .map(|(col, values)| Column {
                r#type: col.r#type,
                mode: Mode::Nullable,
                values: values.into_iter().map(Value::Scalar).collect(),
            })
            .collect();

        let result = self.0.evaluate_flat(new_row_count, &flattened_cols)?;
        let result_values: Vec<Option<_>> = result
            .values
            .iter()
            .map(|v| v.as_scalar().cloned())
            .collect();
        let rebuilt = rebuild_column_values(&repetition_counts, &result_values);
        Ok(Column {
            r#type: result.r#type,
            mode: Mode::Repeated,
            values: rebuilt.into_iter().map(Value::Repeated).collect(),
        })
    }

    fn is_aggregate(&self) -> bool {
        false
    }
}

/// A REPEATED field mixed with a scalar (or another REPEATED field whose
/// rows are all 0/1 elements) is fine to flatten together; two REPEATED
/// fields with genuinely different per-row lengths would require computing
/// their cross product, which we refuse to do implicitly.
fn check_compatible_repetition_counts(
    args: &[Column],
    repeated_indices: &[usize],
) -> Result<(), RuntimeError> {
    let num_rows = args[repeated_indices[0]].values.len();
    for row in 0..num_rows {
        let mut counts: Vec<usize> = repeated_indices
            .iter()
            .map(|&idx| match &args[idx].values[row] {
                Value::Repeated(v) => v.len(),
                Value::Scalar(_) => 1,
            })
            .collect();
        counts.sort_unstable();
        counts.dedup();
        let distinct_non_trivial = counts.iter().filter(|&&c| c != 0 && c != 1).count();
        if distinct_non_trivial > 1 {
            return Err(RuntimeError::RepeatedCrossProduct);
        }
    }
    Ok(())
}

pub trait AggregateImpl: Send + Sync {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError>;
    fn evaluate(&self, num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError>;
}

pub struct Aggregate<T>(pub T);

impl<T: AggregateImpl> Function for Aggregate<T> {
    fn check_types(&self, arg_types: &[PrimitiveType]) -> Result<PrimitiveType, TypeError> {
        self.0.check_types(arg_types)
    }

    fn evaluate(&self, num_rows: usize, args: &[Column]) -> Result<Column, RuntimeError> {
        self.0.evaluate(num_rows, args)
    }

    fn is_aggregate(&self) -> bool {
        true
    }
}

/// A sentinel distinguishing "every row agreed on this literal value" (the
/// inner `Option<ScalarValue>`, which may itself be a null literal) from "no
/// rows were present to check at all" (`None`, the outer one). Several
/// functions require a literal argument (regex pattern, JSON path, quantile
/// count, date-add unit); this lets evaluation against an empty input
/// succeed without crashing on an out-of-bounds access.
pub fn ensure_literal(
    values: &[Value],
    function: &str,
) -> Result<Option<tinyquery_types::ScalarValue>, RuntimeError> {
    let Some(first) = values.first() else {
        return Ok(None);
    };
    let first_scalar = first.as_scalar().cloned();
    for v in &values[1..] {
        if v.as_scalar().cloned() != first_scalar {
            return Err(RuntimeError::NonLiteralArgument {
                function: function.to_string(),
            });
        }
    }
    Ok(first_scalar)
}
