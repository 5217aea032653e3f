//! The runtime counterpart to [`crate::TypeContext`]: the columns accessible
//! when evaluating an expression, plus the row count they all share.

use tinyquery_helpers::IndexMap;
use tinyquery_types::{Mode, Value};

use crate::column::{Column, Table};
use crate::plan::ColumnRef;
use crate::type_context::{FullColumnName, TypeContext};

/// Represents the columns accessible when evaluating an expression.
///
/// Similar to a [`Table`], but doesn't have a specific name and additionally
/// carries an `aggregate_context` for scoped aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    pub num_rows: usize,
    pub columns: IndexMap<FullColumnName, Column>,
    /// `None` means aggregate functions aren't allowed here; otherwise
    /// another context to switch to whenever we enter an aggregate call.
    pub aggregate_context: Option<Box<Context>>,
}

impl Context {
    pub fn new(
        num_rows: usize,
        columns: IndexMap<FullColumnName, Column>,
        aggregate_context: Option<Box<Context>>,
    ) -> Context {
        for (name, column) in &columns {
            assert_eq!(
                column.values.len(),
                num_rows,
                "column {name:?} had {} rows, expected {num_rows}",
                column.values.len()
            );
        }
        Context {
            num_rows,
            columns,
            aggregate_context,
        }
    }

    pub fn column_from_ref(&self, column_ref: &ColumnRef) -> &Column {
        &self.columns[&(column_ref.table.clone(), column_ref.column.clone())]
    }
}

/// Given a table and a type context, builds a context with those values. The
/// order of the columns in the type context must match the order of the
/// columns in the table.
pub fn context_from_table(table: &Table, type_context: &TypeContext) -> Context {
    let num_rows = table.num_rows;
    let columns = type_context
        .columns
        .keys()
        .cloned()
        .zip(table.columns.values().cloned())
        .collect();
    Context::new(num_rows, columns, None)
}

/// Given a context, uses the given type context's names for all columns.
pub fn context_with_overlayed_type_context(context: &Context, type_context: &TypeContext) -> Context {
    let num_rows = context.num_rows;
    let columns = type_context
        .columns
        .keys()
        .cloned()
        .zip(context.columns.values().cloned())
        .collect();
    Context::new(num_rows, columns, None)
}

pub fn empty_context_from_type_context(type_context: &TypeContext) -> Context {
    assert!(type_context.aggregate_context.is_none());
    let columns = type_context
        .columns
        .iter()
        .map(|(name, col_type)| (name.clone(), Column::empty(*col_type, Mode::Nullable)))
        .collect();
    Context::new(0, columns, None)
}

/// Applies a row filter to a context. `mask` must be a bool column the same
/// length as `context`; each row is kept iff its mask value is truthy.
///
/// If `mask` is REPEATED, each of its rows is itself a list of bools, and
/// every REPEATED column in `context` must be compressed element-wise
/// against the matching mask row rather than row-wise against the whole
/// context. See the inline cases below — they mirror BigQuery's own
/// idiosyncrasies around repeated-field masking.
pub fn mask_context(context: &Context, mask: &Column) -> Context {
    assert!(
        context.aggregate_context.is_none(),
        "cannot mask a context with an aggregate context"
    );

    if mask.mode == Mode::Repeated {
        let mask_rows: Vec<Vec<bool>> = mask
            .values
            .iter()
            .map(|v| repeated_bools(v))
            .collect();
        let num_rows = mask_rows.iter().filter(|row| row.iter().any(|&b| b)).count();

        let mut new_columns = IndexMap::default();
        for (col_name, col) in &context.columns {
            let new_values = if col.mode == Mode::Repeated {
                let mut allowable = true;
                let mut values = Vec::new();
                for (mask_row, col_row) in mask_rows.iter().zip(col.values.iter()) {
                    if !mask_row.iter().any(|&b| b) {
                        continue;
                    }
                    let col_row = repeated_options(col_row);
                    if mask_row.len() == 1 {
                        values.push(tinyquery_types::repeated::normalize_repeated_null(col_row));
                    } else if mask_row.len() == col_row.len() {
                        let compressed = compress(col_row, mask_row);
                        values.push(tinyquery_types::repeated::normalize_repeated_null(compressed));
                    } else if col_row.len() <= 1 {
                        let norm_row = tinyquery_types::repeated::normalize_column_to_length(
                            tinyquery_types::repeated::RowValue::Repeated(col_row),
                            mask_row.len(),
                        );
                        let compressed = compress(norm_row, mask_row);
                        values.push(tinyquery_types::repeated::normalize_repeated_null(compressed));
                    } else {
                        allowable = false;
                        break;
                    }
                }
                if !allowable {
                    log::warn!("ignoring unselectable repeated column {col_name:?}");
                    continue;
                }
                values.into_iter().map(Value::Repeated).collect()
            } else {
                let keep: Vec<bool> = mask_rows.iter().map(|row| row.iter().any(|&b| b)).collect();
                compress(col.values.clone(), &keep)
            };
            new_columns.insert(
                col_name.clone(),
                Column {
                    r#type: col.r#type,
                    mode: col.mode,
                    values: new_values,
                },
            );
        }
        Context::new(num_rows, new_columns, None)
    } else {
        let keep: Vec<bool> = mask
            .values
            .iter()
            .map(|v| v.is_truthy())
            .collect();
        let num_rows = keep.iter().filter(|&&b| b).count();
        let new_columns = context
            .columns
            .iter()
            .map(|(name, col)| {
                (
                    name.clone(),
                    Column {
                        r#type: col.r#type,
                        mode: col.mode,
                        values: compress(col.values.clone(), &keep),
                    },
                )
            })
            .collect();
        Context::new(num_rows, new_columns, None)
    }
}

fn repeated_bools(value: &Value) -> Vec<bool> {
    match value {
        Value::Repeated(values) => values.iter().map(|v| v.as_ref().is_some_and(tinyquery_types::ScalarValue::is_truthy)).collect(),
        Value::Scalar(v) => vec![v.as_ref().is_some_and(tinyquery_types::ScalarValue::is_truthy)],
    }
}

fn repeated_options(value: &Value) -> Vec<Option<tinyquery_types::ScalarValue>> {
    match value {
        Value::Repeated(values) => values.clone(),
        Value::Scalar(v) => vec![v.clone()],
    }
}

fn compress<T: Clone>(values: Vec<T>, keep: &[bool]) -> Vec<T> {
    values
        .into_iter()
        .zip(keep.iter())
        .filter_map(|(v, &k)| k.then_some(v))
        .collect()
}

pub fn empty_context_from_template(context: &Context) -> Context {
    let columns = context
        .columns
        .iter()
        .map(|(name, column)| (name.clone(), empty_column_from_template(column)))
        .collect();
    Context::new(0, columns, None)
}

pub fn empty_column_from_template(column: &Column) -> Column {
    Column::empty_like(column)
}

/// Takes row `index` from `src_context` and appends it to `dest_context`.
/// The schemas of the two contexts must match.
pub fn append_row_to_context(src_context: &Context, index: usize, dest_context: &mut Context) {
    dest_context.num_rows += 1;
    for (name, column) in dest_context.columns.iter_mut() {
        column.values.push(src_context.columns[name].values[index].clone());
    }
}

/// Modifies `dest_context` to include all rows in `src_context`. The schemas
/// don't need to match exactly: `src_context` just needs to have a subset,
/// with any other columns filled with null. `dest_context` is assumed to use
/// only short (unqualified) column names.
pub fn append_partial_context_to_context(src_context: &Context, dest_context: &mut Context) {
    dest_context.num_rows += src_context.num_rows;
    let short_named_src: IndexMap<&str, &Vec<Value>> = src_context
        .columns
        .iter()
        .map(|((_, col_name), column)| (col_name.as_str(), &column.values))
        .collect();

    for ((_, col_name), dest_column) in dest_context.columns.iter_mut() {
        match short_named_src.get(col_name.as_str()) {
            Some(values) => dest_column.values.extend(values.iter().cloned()),
            None => {
                dest_column
                    .values
                    .extend(std::iter::repeat(Value::null()).take(src_context.num_rows))
            }
        }
    }
}

/// Adds all rows in `src_context` to `dest_context`. The columns must be a
/// subset, and fully-qualified names are taken into account.
pub fn append_context_to_context(src_context: &Context, dest_context: &mut Context) {
    dest_context.num_rows += src_context.num_rows;
    for (dest_column_key, dest_column) in dest_context.columns.iter_mut() {
        match src_context.columns.get(dest_column_key) {
            Some(src_column) => dest_column.values.extend(src_column.values.iter().cloned()),
            None => {
                dest_column
                    .values
                    .extend(std::iter::repeat(Value::null()).take(src_context.num_rows))
            }
        }
    }
}

/// Pulls a specific row out of a context as its own one-row context.
pub fn row_context_from_context(src_context: &Context, index: usize) -> Context {
    assert!(src_context.aggregate_context.is_none());
    let columns = src_context
        .columns
        .iter()
        .map(|(col_name, col)| {
            (
                col_name.clone(),
                Column {
                    r#type: col.r#type,
                    mode: col.mode,
                    values: vec![col.values[index].clone()],
                },
            )
        })
        .collect();
    Context::new(1, columns, None)
}

pub fn cross_join_contexts(context1: &Context, context2: &Context) -> Context {
    assert!(context1.aggregate_context.is_none());
    assert!(context2.aggregate_context.is_none());
    let mut result_columns: IndexMap<FullColumnName, Column> = context1
        .columns
        .iter()
        .map(|(name, col)| (name.clone(), Column::empty_like(col)))
        .chain(
            context2
                .columns
                .iter()
                .map(|(name, col)| (name.clone(), Column::empty_like(col))),
        )
        .collect();

    for index1 in 0..context1.num_rows {
        for index2 in 0..context2.num_rows {
            for (name, column) in &context1.columns {
                result_columns[name].values.push(column.values[index1].clone());
            }
            for (name, column) in &context2.columns {
                result_columns[name].values.push(column.values[index2].clone());
            }
        }
    }
    Context::new(context1.num_rows * context2.num_rows, result_columns, None)
}

/// Modifies `context` to have at most `limit` rows.
pub fn truncate_context(context: &mut Context, limit: i64) {
    assert!(context.aggregate_context.is_none());
    let limit = limit.max(0) as usize;
    if context.num_rows <= limit {
        return;
    }
    context.num_rows = limit;
    for column in context.columns.values_mut() {
        column.values.truncate(limit);
    }
}
