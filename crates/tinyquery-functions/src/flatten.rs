//! Table-shaped (multi-column) counterparts to the row-shaped helpers in
//! `tinyquery_types::repeated`, used to flatten a scalar function's REPEATED
//! arguments down to scalars for evaluation, then rebuild a REPEATED result.

use tinyquery_types::repeated::{normalize_column_to_length, normalize_repeated_null, RowValue};
use tinyquery_types::{ScalarValue, Value};

fn row_value_of(value: &Value) -> RowValue {
    match value {
        Value::Scalar(v) => RowValue::Scalar(v.clone()),
        Value::Repeated(values) => RowValue::Repeated(values.clone()),
    }
}

fn row_len(value: &Value) -> usize {
    match value {
        Value::Scalar(_) => 1,
        Value::Repeated(values) => values.len(),
    }
}

/// Flattens `columns` (one `Vec<Value>` per argument column, all the same
/// row count) into plain scalar columns, recording how many repeated
/// elements were packed into each row so the result can be rebuilt later.
///
/// `repeated_column_indices` names which columns are REPEATED; their row
/// lengths decide each row's repetition count (the max across them, at
/// least 1). Every column, repeated or not, is then normalized to that
/// count and concatenated.
pub fn flatten_column_values(
    repeated_column_indices: &[usize],
    columns: &[Vec<Value>],
) -> (Vec<usize>, Vec<Vec<Option<ScalarValue>>>) {
    let num_rows = columns.first().map_or(0, Vec::len);
    let mut repetition_counts = Vec::with_capacity(num_rows);
    for row in 0..num_rows {
        let max_len = repeated_column_indices
            .iter()
            .map(|&idx| row_len(&columns[idx][row]))
            .max()
            .unwrap_or(1);
        repetition_counts.push(max_len.max(1));
    }

    let mut flattened: Vec<Vec<Option<ScalarValue>>> = vec![Vec::new(); columns.len()];
    for row in 0..num_rows {
        let count = repetition_counts[row];
        for (col_idx, column) in columns.iter().enumerate() {
            let normalized = normalize_column_to_length(row_value_of(&column[row]), count);
            flattened[col_idx].extend(normalized);
        }
    }
    (repetition_counts, flattened)
}

/// Inverse of [`flatten_column_values`] for a single result column: packs
/// `values` back into one list per row, according to `repetitions`.
pub fn rebuild_column_values(
    repetitions: &[usize],
    values: &[Option<ScalarValue>],
) -> Vec<Vec<Option<ScalarValue>>> {
    let mut result = Vec::with_capacity(repetitions.len());
    let mut offset = 0;
    for &repetition in repetitions {
        let take = repetition.max(1);
        let chunk = values[offset..offset + take].to_vec();
        offset += take;
        result.push(normalize_repeated_null(chunk));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_and_rebuilds_round_trip() {
        let repeated = vec![
            Value::Repeated(vec![Some(ScalarValue::Int(1)), Some(ScalarValue::Int(2))]),
            Value::Repeated(vec![Some(ScalarValue::Int(3))]),
        ];
        let scalar = vec![Value::Scalar(Some(ScalarValue::Int(10))), Value::Scalar(Some(ScalarValue::Int(20)))];

        let (repetitions, flattened) = flatten_column_values(&[0], &[repeated, scalar]);
        assert_eq!(repetitions, vec![2, 1]);
        assert_eq!(
            flattened[0],
            vec![
                Some(ScalarValue::Int(1)),
                Some(ScalarValue::Int(2)),
                Some(ScalarValue::Int(3))
            ]
        );
        assert_eq!(
            flattened[1],
            vec![
                Some(ScalarValue::Int(10)),
                Some(ScalarValue::Int(10)),
                Some(ScalarValue::Int(20))
            ]
        );

        let rebuilt = rebuild_column_values(&repetitions, &flattened[0]);
        assert_eq!(
            rebuilt,
            vec![
                vec![Some(ScalarValue::Int(1)), Some(ScalarValue::Int(2))],
                vec![Some(ScalarValue::Int(3))],
            ]
        );
    }
}
