//! Flatten/rebuild helpers shared by scalar-function evaluation and masking,
//! both of which need to treat a REPEATED column's rows as a variable number
//! of scalar positions and later reassemble them.

use crate::ScalarValue;

/// There are 3 equivalent ways to represent "no values" for a repeated row:
/// an absent row, `[None]`, and `[]`. We standardize on `[]`.
pub fn normalize_repeated_null(value: Vec<Option<ScalarValue>>) -> Vec<Option<ScalarValue>> {
    if value.len() == 1 && value[0].is_none() {
        return Vec::new();
    }
    value
}

/// A column's value for one row, already decided to be either the scalar
/// itself (nullable) or a repeated list.
pub enum RowValue {
    Scalar(Option<ScalarValue>),
    Repeated(Vec<Option<ScalarValue>>),
}

/// Normalizes `col` (a single row's value) to exactly `desired_count`
/// elements: a scalar is duplicated; a 0/1-length repeated row is
/// broadcast/padded with null; a repeated row already at `desired_count` is
/// returned as-is. Panics (an internal invariant, not user-facing) if none
/// of those apply — the caller must have already checked
/// `columns_have_allowed_repetition_counts`.
pub fn normalize_column_to_length(
    col: RowValue,
    desired_count: usize,
) -> Vec<Option<ScalarValue>> {
    let desired_count = desired_count.max(1);
    match col {
        RowValue::Repeated(list) if list.len() == desired_count => list,
        RowValue::Repeated(list) => {
            assert!(
                list.len() <= 1,
                "unexpectedly got a row with the incorrect number of repeated values"
            );
            let fill = list.into_iter().next().unwrap_or(None);
            std::iter::repeat(fill).take(desired_count).collect()
        }
        RowValue::Scalar(v) => std::iter::repeat(v).take(desired_count).collect(),
    }
}

/// Whether `col` could be selected alongside a REPEATED `ref_col`: not
/// repeated at all, repeated with every row at 0/1 elements, or repeated with
/// matching per-row lengths.
pub fn columns_have_allowed_repetition_counts(
    ref_counts: &[usize],
    col_is_repeated: bool,
    col_counts: &[usize],
) -> bool {
    if !col_is_repeated {
        return true;
    }
    ref_counts
        .iter()
        .zip(col_counts.iter())
        .all(|(&rc, &c)| rc == c || c <= 1 || rc <= 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_repeated_null_collapses_single_none() {
        assert_eq!(normalize_repeated_null(vec![None]), Vec::new());
        assert_eq!(normalize_repeated_null(Vec::new()), Vec::new());
        assert_eq!(
            normalize_repeated_null(vec![Some(ScalarValue::Int(1))]),
            vec![Some(ScalarValue::Int(1))]
        );
    }

    #[test]
    fn normalize_column_to_length_broadcasts_scalar() {
        let got = normalize_column_to_length(RowValue::Scalar(Some(ScalarValue::Int(3))), 2);
        assert_eq!(got, vec![Some(ScalarValue::Int(3)), Some(ScalarValue::Int(3))]);
    }

    #[test]
    fn normalize_column_to_length_broadcasts_single_element_repeated() {
        let got = normalize_column_to_length(RowValue::Repeated(vec![Some(ScalarValue::Int(7))]), 3);
        assert_eq!(got, vec![Some(ScalarValue::Int(7)); 3]);
    }
}
