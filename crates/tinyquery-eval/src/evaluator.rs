//! Turns a compiled [`SelectPlan`] into a [`Context`] of result rows.

use std::cmp::Ordering as CmpOrdering;

use chrono::{DateTime, Utc};
use tinyquery_helpers::IndexMap;
use tinyquery_plan::{
    Column, ColumnRef, Context, Expr, GroupSet, JoinFields, JoinType, Literal, SelectField,
    SelectPlan, Table, TableExpr, TypeContext, WithinClause,
};
use tinyquery_types::{Mode, ScalarValue, Value};

use crate::error::EvalError;

/// The base tables a query can read from. Views never reach the evaluator:
/// the compiler inlines them into nested `TableExpr::Select` plans, so this
/// only needs to resolve leaf table references.
pub trait TableProvider {
    fn table(&self, name: &str) -> Option<&Table>;
}

pub struct Evaluator<'a> {
    tables: &'a dyn TableProvider,
}

impl<'a> Evaluator<'a> {
    pub fn new(tables: &'a dyn TableProvider) -> Self {
        Evaluator { tables }
    }

    pub fn evaluate_select(&self, select: &SelectPlan) -> Result<Context, EvalError> {
        let table_context = self.evaluate_table_expr(&select.table)?;
        let mask_column = self.evaluate_expr(&select.where_expr, &table_context)?;
        let select_context = tinyquery_plan::mask_context(&table_context, &mask_column);

        let scoped_fields: Vec<&SelectField> = select
            .select_fields
            .iter()
            .filter(|f| f.within_clause.is_some())
            .collect();

        let mut result = if !scoped_fields.is_empty() {
            if scoped_fields.len() > 1 {
                return Err(EvalError::MultipleWithinClauses);
            }
            let within_clause = scoped_fields[0].within_clause.clone().unwrap();
            self.evaluate_within(&select.select_fields, &select_context, &within_clause)?
        } else if let Some(group_set) = &select.group_set {
            self.evaluate_groups(&select.select_fields, group_set, &select_context)?
        } else {
            self.evaluate_select_fields(&select.select_fields, &select_context)?
        };

        let having_mask = self.evaluate_expr(&select.having_expr, &result)?;
        result = tinyquery_plan::mask_context(&result, &having_mask);

        if let Some(orderings) = &select.orderings {
            result = self.evaluate_orderings(&result, orderings)?;
        }

        if let Some(limit) = select.limit {
            tinyquery_plan::truncate_context(&mut result, limit);
        }

        Ok(result)
    }

    fn evaluate_table_expr(&self, table_expr: &TableExpr) -> Result<Context, EvalError> {
        match table_expr {
            TableExpr::NoTable { .. } => Ok(Context::new(1, IndexMap::default(), None)),
            TableExpr::Table { name, type_ctx } => self.eval_table_table(name, type_ctx),
            TableExpr::TableUnion { tables, type_ctx } => {
                self.eval_table_table_union(tables, type_ctx)
            }
            TableExpr::Join {
                base,
                tables,
                conditions,
                ..
            } => self.eval_table_join(base, tables, conditions),
            TableExpr::Select(select) => self.eval_table_select(select),
        }
    }

    fn eval_table_table(&self, name: &str, type_ctx: &TypeContext) -> Result<Context, EvalError> {
        let table = self
            .tables
            .table(name)
            .ok_or_else(|| EvalError::MissingTable(name.to_string()))?;
        Ok(tinyquery_plan::context_from_table(table, type_ctx))
    }

    fn eval_table_table_union(
        &self,
        tables: &[TableExpr],
        type_ctx: &TypeContext,
    ) -> Result<Context, EvalError> {
        let mut result = tinyquery_plan::empty_context_from_type_context(type_ctx);
        for table_expr in tables {
            let sub_context = self.evaluate_table_expr(table_expr)?;
            tinyquery_plan::append_partial_context_to_context(&sub_context, &mut result);
        }
        Ok(result)
    }

    fn eval_table_join(
        &self,
        base: &TableExpr,
        tables: &[(TableExpr, JoinType)],
        conditions: &[Vec<JoinFields>],
    ) -> Result<Context, EvalError> {
        let mut result = self.evaluate_table_expr(base)?;
        for ((table_expr, join_type), join_conditions) in tables.iter().zip(conditions.iter()) {
            let rhs = self.evaluate_table_expr(table_expr)?;
            result = self.join_step(&result, &rhs, *join_type, join_conditions)?;
        }
        Ok(result)
    }

    /// A single join step, folded left-to-right over the join chain. `CROSS`
    /// is a plain cartesian product; `INNER`/`LEFT OUTER` bucket the right
    /// side by join key and probe it per left row, the same shape as a
    /// textbook hash join.
    fn join_step(
        &self,
        lhs: &Context,
        rhs: &Context,
        join_type: JoinType,
        conditions: &[JoinFields],
    ) -> Result<Context, EvalError> {
        if join_type == JoinType::Cross {
            return Ok(tinyquery_plan::cross_join_contexts(lhs, rhs));
        }

        let lhs_key_refs: Vec<&ColumnRef> = conditions.iter().map(|c| &c.column1).collect();
        let rhs_key_refs: Vec<&ColumnRef> = conditions.iter().map(|c| &c.column2).collect();

        let mut buckets: IndexMap<GroupKey, Vec<usize>> = IndexMap::default();
        for row in 0..rhs.num_rows {
            let key = join_key(rhs, &rhs_key_refs, row);
            buckets.entry(key).or_default().push(row);
        }

        let empty_lhs = tinyquery_plan::empty_context_from_template(lhs);
        let empty_rhs = tinyquery_plan::empty_context_from_template(rhs);
        let mut result = tinyquery_plan::cross_join_contexts(&empty_lhs, &empty_rhs);

        for row in 0..lhs.num_rows {
            let key = join_key(lhs, &lhs_key_refs, row);
            let one_lhs = tinyquery_plan::row_context_from_context(lhs, row);
            match buckets.get(&key) {
                Some(matches) => {
                    for &rhs_row in matches {
                        let one_rhs = tinyquery_plan::row_context_from_context(rhs, rhs_row);
                        let joined_row = tinyquery_plan::cross_join_contexts(&one_lhs, &one_rhs);
                        tinyquery_plan::append_context_to_context(&joined_row, &mut result);
                    }
                }
                None if join_type == JoinType::LeftOuter => {
                    tinyquery_plan::append_context_to_context(&one_lhs, &mut result);
                }
                None => {}
            }
        }
        Ok(result)
    }

    fn eval_table_select(&self, select: &SelectPlan) -> Result<Context, EvalError> {
        let inner = self.evaluate_select(select)?;
        Ok(tinyquery_plan::context_with_overlayed_type_context(
            &inner,
            &select.type_ctx,
        ))
    }

    /// Buckets rows by the query's `GROUP BY` key (explicit field/alias
    /// groups, or the trivial group set for a bare aggregate with no `GROUP
    /// BY` at all) and evaluates the select list once per bucket.
    fn evaluate_groups(
        &self,
        select_fields: &[SelectField],
        group_set: &GroupSet,
        context: &Context,
    ) -> Result<Context, EvalError> {
        let mut key_columns: Vec<Column> = Vec::new();
        for col_ref in &group_set.field_groups {
            key_columns.push(context.column_from_ref(col_ref).clone());
        }
        for alias in &group_set.alias_groups {
            let field = select_fields
                .iter()
                .find(|f| &f.alias == alias)
                .expect("GROUP BY alias must reference a selected field");
            key_columns.push(self.evaluate_expr(&field.expr, context)?);
        }

        let groups: Vec<Vec<usize>> = if group_set.is_trivial() {
            if context.num_rows == 0 {
                vec![Vec::new()]
            } else {
                vec![(0..context.num_rows).collect()]
            }
        } else {
            let mut buckets: IndexMap<GroupKey, Vec<usize>> = IndexMap::default();
            for row in 0..context.num_rows {
                let key = GroupKey(
                    key_columns
                        .iter()
                        .map(|col| key_scalar(&col.values[row]))
                        .collect(),
                );
                buckets.entry(key).or_default().push(row);
            }
            buckets.into_values().collect()
        };

        let mut result = empty_context_from_select_fields(select_fields);
        for group_rows in &groups {
            let group_context = build_group_context(context, group_rows);
            let row_result = self.evaluate_select_fields(select_fields, &group_context)?;
            tinyquery_plan::append_context_to_context(&row_result, &mut result);
        }
        Ok(result)
    }

    /// `WITHIN RECORD`: every input row becomes its own group, and its
    /// `REPEATED` columns are unpacked into that group's aggregate context so
    /// aggregate calls in the select list run over one row's array elements
    /// rather than over rows of the table. `WITHIN <field>` scoped
    /// aggregation has no implementation to ground this on (see
    /// `EvalError::WithinIdNotSupported`). A sibling field left outside the
    /// WITHIN RECORD clause can't itself be REPEATED, since nothing unpacks
    /// it into a group of its own (see `EvalError::RepeatedFieldInWithinRecord`).
    fn evaluate_within(
        &self,
        select_fields: &[SelectField],
        context: &Context,
        within_clause: &WithinClause,
    ) -> Result<Context, EvalError> {
        let WithinClause::Record = within_clause else {
            let WithinClause::Id(name) = within_clause else {
                unreachable!()
            };
            return Err(EvalError::WithinIdNotSupported(name.clone()));
        };

        // A REPEATED field sitting alongside the WITHIN RECORD clause would
        // need to be unpacked into its own group, which isn't implemented.
        if select_fields.len() > 1 {
            for field in select_fields {
                if field.within_clause.is_none() && field.expr.mode() == Mode::Repeated {
                    return Err(EvalError::RepeatedFieldInWithinRecord(field.alias.clone()));
                }
            }
        }

        let mut result = empty_context_from_select_fields(select_fields);
        for row in 0..context.num_rows {
            let aggregate_context = record_aggregate_context(context, row)?;
            let mut outer = tinyquery_plan::row_context_from_context(context, row);
            outer.aggregate_context = Some(Box::new(aggregate_context));
            let row_result = self.evaluate_select_fields(select_fields, &outer)?;
            tinyquery_plan::append_context_to_context(&row_result, &mut result);
        }
        Ok(result)
    }

    fn evaluate_select_fields(
        &self,
        select_fields: &[SelectField],
        context: &Context,
    ) -> Result<Context, EvalError> {
        let mut columns = IndexMap::default();
        for field in select_fields {
            let col = self.evaluate_expr(&field.expr, context)?;
            columns.insert((None, field.alias.clone()), col);
        }
        Ok(Context::new(context.num_rows, columns, None))
    }

    /// Evaluates each ordering's already-typed expression directly against
    /// the post-`HAVING` result and permutes the result's own rows. Unlike
    /// the plan this is grounded on (which sorts a separate pre-group context
    /// and overlays it onto the post-group result by column-name matching,
    /// which only lines up when the two contexts have the same row count),
    /// this never needs two contexts to agree on shape.
    fn evaluate_orderings(
        &self,
        result: &Context,
        orderings: &[tinyquery_plan::Ordering],
    ) -> Result<Context, EvalError> {
        let mut sort_columns = Vec::with_capacity(orderings.len());
        for ordering in orderings {
            let column = self.evaluate_expr(&ordering.expr, result)?;
            sort_columns.push((column, ordering.is_ascending));
        }

        let mut indices: Vec<usize> = (0..result.num_rows).collect();
        indices.sort_by(|&a, &b| {
            for (column, ascending) in &sort_columns {
                let ord = compare_values(&column.values[a], &column.values[b]);
                let ord = if *ascending { ord } else { ord.reverse() };
                if ord != CmpOrdering::Equal {
                    return ord;
                }
            }
            CmpOrdering::Equal
        });

        Ok(reorder_context(result, &indices))
    }

    fn evaluate_expr(&self, expr: &Expr, context: &Context) -> Result<Column, EvalError> {
        match expr {
            Expr::Literal(literal) => Ok(evaluate_literal(literal, context.num_rows)),
            Expr::ColumnRef(column_ref) => Ok(context.column_from_ref(column_ref).clone()),
            Expr::FunctionCall { func, args, .. } => self.evaluate_function_call(func, args, context),
            Expr::AggregateFunctionCall { func, args, .. } => {
                self.evaluate_aggregate_function_call(func, args, context)
            }
        }
    }

    fn evaluate_function_call(
        &self,
        func: &str,
        args: &[Expr],
        context: &Context,
    ) -> Result<Column, EvalError> {
        let arg_columns = args
            .iter()
            .map(|arg| self.evaluate_expr(arg, context))
            .collect::<Result<Vec<_>, _>>()?;
        let function = tinyquery_functions::resolve(func)?;
        Ok(function.evaluate(context.num_rows, &arg_columns)?)
    }

    fn evaluate_aggregate_function_call(
        &self,
        func: &str,
        args: &[Expr],
        context: &Context,
    ) -> Result<Column, EvalError> {
        let aggregate_context = context
            .aggregate_context
            .as_deref()
            .ok_or(EvalError::MissingAggregateContext)?;
        let arg_columns = args
            .iter()
            .map(|arg| self.evaluate_expr(arg, aggregate_context))
            .collect::<Result<Vec<_>, _>>()?;
        let function = tinyquery_functions::resolve(func)?;
        Ok(function.evaluate(aggregate_context.num_rows, &arg_columns)?)
    }
}

fn evaluate_literal(literal: &Literal, num_rows: usize) -> Column {
    Column {
        r#type: literal.r#type,
        mode: Mode::Nullable,
        values: std::iter::repeat_with(|| Value::Scalar(literal.value.clone()))
            .take(num_rows)
            .collect(),
    }
}

fn empty_context_from_select_fields(select_fields: &[SelectField]) -> Context {
    let columns = select_fields
        .iter()
        .map(|field| {
            let mode = match &field.expr {
                Expr::ColumnRef(column_ref) => column_ref.mode,
                _ => Mode::Nullable,
            };
            ((None, field.alias.clone()), Column::empty(field.expr.r#type(), mode))
        })
        .collect();
    Context::new(0, columns, None)
}

fn build_group_context(context: &Context, group_rows: &[usize]) -> Context {
    let aggregate_context = subset_context(context, group_rows);
    let mut outer = match group_rows.first() {
        Some(&row) => tinyquery_plan::row_context_from_context(context, row),
        None => null_row_like(context),
    };
    outer.aggregate_context = Some(Box::new(aggregate_context));
    outer
}

fn subset_context(context: &Context, rows: &[usize]) -> Context {
    let columns = context
        .columns
        .iter()
        .map(|(name, column)| {
            (
                name.clone(),
                Column {
                    r#type: column.r#type,
                    mode: column.mode,
                    values: rows.iter().map(|&row| column.values[row].clone()).collect(),
                },
            )
        })
        .collect();
    Context::new(rows.len(), columns, None)
}

fn null_row_like(context: &Context) -> Context {
    let columns = context
        .columns
        .iter()
        .map(|(name, column)| {
            (
                name.clone(),
                Column {
                    r#type: column.r#type,
                    mode: column.mode,
                    values: vec![Value::null()],
                },
            )
        })
        .collect();
    Context::new(1, columns, None)
}

/// Builds the aggregate context for one row under `WITHIN RECORD`: `REPEATED`
/// columns are unpacked into one sub-row per element, non-repeated columns
/// are broadcast to match. Two `REPEATED` columns disagreeing on how many
/// elements this row has would require a cross product, same as flattening
/// mismatched repeated arguments in a scalar function call, so it's rejected
/// the same way.
fn record_aggregate_context(context: &Context, row: usize) -> Result<Context, EvalError> {
    let mut length = 1usize;
    for column in context.columns.values() {
        if column.mode == Mode::Repeated {
            if let Value::Repeated(items) = &column.values[row] {
                let item_len = items.len();
                if item_len > 1 {
                    if length > 1 && length != item_len {
                        return Err(EvalError::Runtime(
                            tinyquery_functions::RuntimeError::RepeatedCrossProduct,
                        ));
                    }
                    length = item_len;
                }
            }
        }
    }

    let columns = context
        .columns
        .iter()
        .map(|(name, column)| {
            let values: Vec<Value> = match (&column.mode, &column.values[row]) {
                (Mode::Repeated, Value::Repeated(items)) if items.len() == length => {
                    items.iter().cloned().map(Value::Scalar).collect()
                }
                (Mode::Repeated, Value::Repeated(items)) => {
                    let broadcast = items.first().cloned().flatten();
                    std::iter::repeat(Value::Scalar(broadcast)).take(length).collect()
                }
                (_, value) => std::iter::repeat(value.clone()).take(length).collect(),
            };
            (
                name.clone(),
                Column {
                    r#type: column.r#type,
                    mode: Mode::Nullable,
                    values,
                },
            )
        })
        .collect();
    Ok(Context::new(length, columns, None))
}

fn reorder_context(context: &Context, indices: &[usize]) -> Context {
    let columns = context
        .columns
        .iter()
        .map(|(name, column)| {
            (
                name.clone(),
                Column {
                    r#type: column.r#type,
                    mode: column.mode,
                    values: indices.iter().map(|&i| column.values[i].clone()).collect(),
                },
            )
        })
        .collect();
    Context::new(context.num_rows, columns, None)
}

fn compare_values(a: &Value, b: &Value) -> CmpOrdering {
    match (a.as_scalar(), b.as_scalar()) {
        (None, None) => CmpOrdering::Equal,
        (None, Some(_)) => CmpOrdering::Less,
        (Some(_), None) => CmpOrdering::Greater,
        (Some(a), Some(b)) => compare_scalars(a, b),
    }
}

fn compare_scalars(a: &ScalarValue, b: &ScalarValue) -> CmpOrdering {
    match (a, b) {
        (ScalarValue::Int(a), ScalarValue::Int(b)) => a.cmp(b),
        (ScalarValue::Float(a), ScalarValue::Float(b)) => a.partial_cmp(b).unwrap_or(CmpOrdering::Equal),
        (ScalarValue::Int(a), ScalarValue::Float(b)) => {
            (*a as f64).partial_cmp(b).unwrap_or(CmpOrdering::Equal)
        }
        (ScalarValue::Float(a), ScalarValue::Int(b)) => {
            a.partial_cmp(&(*b as f64)).unwrap_or(CmpOrdering::Equal)
        }
        (ScalarValue::Bool(a), ScalarValue::Bool(b)) => a.cmp(b),
        (ScalarValue::String(a), ScalarValue::String(b)) => a.cmp(b),
        (ScalarValue::Timestamp(a), ScalarValue::Timestamp(b)) => a.cmp(b),
        _ => CmpOrdering::Equal,
    }
}

fn join_key(context: &Context, refs: &[&ColumnRef], row: usize) -> GroupKey {
    GroupKey(
        refs.iter()
            .map(|col_ref| key_scalar(&context.column_from_ref(col_ref).values[row]))
            .collect(),
    )
}

/// A hashable, totally-ordered stand-in for `Value`, used as a `GROUP BY`/
/// join bucket key. `f64` isn't `Hash`/`Eq`, so floats key off their bit
/// pattern; this makes `NaN` compare unequal to itself as a key the same way
/// it does as a value, which is the only behavior that doesn't silently merge
/// distinct rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyScalar {
    Null,
    Int(i64),
    Float(u64),
    Bool(bool),
    String(String),
    Timestamp(DateTime<Utc>),
}

fn key_scalar(value: &Value) -> KeyScalar {
    match value.as_scalar() {
        Some(ScalarValue::Int(i)) => KeyScalar::Int(*i),
        Some(ScalarValue::Float(f)) => KeyScalar::Float(f.to_bits()),
        Some(ScalarValue::Bool(b)) => KeyScalar::Bool(*b),
        Some(ScalarValue::String(s)) => KeyScalar::String(s.clone()),
        Some(ScalarValue::Timestamp(t)) => KeyScalar::Timestamp(*t),
        None => KeyScalar::Null,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GroupKey(Vec<KeyScalar>);

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tinyquery_plan::Ordering as PlanOrdering;
    use tinyquery_types::PrimitiveType;

    use super::*;

    struct FixedTables(IndexMap<String, Table>);

    impl TableProvider for FixedTables {
        fn table(&self, name: &str) -> Option<&Table> {
            self.0.get(name)
        }
    }

    fn int_column(values: &[Option<i64>]) -> Column {
        Column {
            r#type: PrimitiveType::Int,
            mode: Mode::Nullable,
            values: values
                .iter()
                .map(|v| Value::Scalar(v.map(ScalarValue::Int)))
                .collect(),
        }
    }

    fn bool_literal(value: bool) -> Expr {
        Expr::Literal(Literal {
            value: Some(ScalarValue::Bool(value)),
            r#type: PrimitiveType::Bool,
        })
    }

    fn int_literal(value: i64) -> Expr {
        Expr::Literal(Literal {
            value: Some(ScalarValue::Int(value)),
            r#type: PrimitiveType::Int,
        })
    }

    fn col_ref(table: &str, column: &str) -> Expr {
        Expr::ColumnRef(ColumnRef::new(Some(table.to_string()), column, PrimitiveType::Int))
    }

    fn table_type_ctx(table: &str, columns: &[&str]) -> TypeContext {
        let cols = columns
            .iter()
            .map(|c| (c.to_string(), PrimitiveType::Int))
            .collect();
        TypeContext::from_table_and_columns(Some(table.to_string()), cols, None, None)
    }

    fn result_type_ctx(aliases: &[&str]) -> TypeContext {
        let cols = aliases.iter().map(|a| (a.to_string(), PrimitiveType::Int)).collect();
        TypeContext::from_table_and_columns(None, cols, None, None)
    }

    fn select_field(expr: Expr, alias: &str) -> SelectField {
        SelectField {
            expr,
            alias: alias.to_string(),
            within_clause: None,
        }
    }

    fn int_values(ctx: &Context, alias: &str) -> Vec<Option<i64>> {
        ctx.columns[&(None, alias.to_string())]
            .values
            .iter()
            .map(|v| match v {
                Value::Scalar(Some(ScalarValue::Int(i))) => Some(*i),
                Value::Scalar(None) => None,
                other => panic!("expected an int column, got {other:?}"),
            })
            .collect()
    }

    fn base_plan(select_fields: Vec<SelectField>, table: TableExpr, result_aliases: &[&str]) -> SelectPlan {
        SelectPlan {
            select_fields,
            table: Box::new(table),
            where_expr: Box::new(bool_literal(true)),
            group_set: None,
            having_expr: Box::new(bool_literal(true)),
            orderings: None,
            limit: None,
            type_ctx: result_type_ctx(result_aliases),
        }
    }

    #[test]
    fn plain_select_passes_rows_through() {
        let mut tables = IndexMap::default();
        let mut cols = IndexMap::default();
        cols.insert("n".to_string(), int_column(&[Some(1), Some(2), Some(3)]));
        tables.insert("t".to_string(), Table::new("t", cols));
        let provider = FixedTables(tables);

        let table = TableExpr::Table {
            name: "t".to_string(),
            type_ctx: table_type_ctx("t", &["n"]),
        };
        let plan = base_plan(vec![select_field(col_ref("t", "n"), "n")], table, &["n"]);

        let result = Evaluator::new(&provider).evaluate_select(&plan).unwrap();
        assert_eq!(int_values(&result, "n"), vec![Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn where_masks_rows() {
        let mut tables = IndexMap::default();
        let mut cols = IndexMap::default();
        cols.insert("n".to_string(), int_column(&[Some(1), Some(2), Some(3)]));
        tables.insert("t".to_string(), Table::new("t", cols));
        let provider = FixedTables(tables);

        let table = TableExpr::Table {
            name: "t".to_string(),
            type_ctx: table_type_ctx("t", &["n"]),
        };
        let mut plan = base_plan(vec![select_field(col_ref("t", "n"), "n")], table, &["n"]);
        plan.where_expr = Box::new(Expr::FunctionCall {
            func: ">".to_string(),
            args: vec![col_ref("t", "n"), int_literal(1)],
            r#type: PrimitiveType::Bool,
        });

        let result = Evaluator::new(&provider).evaluate_select(&plan).unwrap();
        assert_eq!(int_values(&result, "n"), vec![Some(2), Some(3)]);
    }

    #[test]
    fn group_by_aggregates_per_key() {
        let mut tables = IndexMap::default();
        let mut cols = IndexMap::default();
        cols.insert("k".to_string(), int_column(&[Some(1), Some(1), Some(2)]));
        cols.insert("v".to_string(), int_column(&[Some(10), Some(20), Some(30)]));
        tables.insert("t".to_string(), Table::new("t", cols));
        let provider = FixedTables(tables);

        let table = TableExpr::Table {
            name: "t".to_string(),
            type_ctx: table_type_ctx("t", &["k", "v"]),
        };
        let select_fields = vec![
            select_field(col_ref("t", "k"), "k"),
            select_field(
                Expr::AggregateFunctionCall {
                    func: "sum".to_string(),
                    args: vec![col_ref("t", "v")],
                    r#type: PrimitiveType::Int,
                },
                "total",
            ),
        ];
        let mut plan = base_plan(select_fields, table, &["k", "total"]);
        plan.group_set = Some(GroupSet {
            alias_groups: Default::default(),
            field_groups: vec![ColumnRef::new(Some("t".to_string()), "k", PrimitiveType::Int)],
        });
        plan.orderings = Some(vec![PlanOrdering {
            expr: Expr::ColumnRef(ColumnRef::new(None, "k", PrimitiveType::Int)),
            is_ascending: true,
        }]);

        let result = Evaluator::new(&provider).evaluate_select(&plan).unwrap();
        assert_eq!(int_values(&result, "k"), vec![Some(1), Some(2)]);
        assert_eq!(int_values(&result, "total"), vec![Some(30), Some(30)]);
    }

    #[test]
    fn order_by_desc_and_limit() {
        let mut tables = IndexMap::default();
        let mut cols = IndexMap::default();
        cols.insert("n".to_string(), int_column(&[Some(3), Some(1), Some(2)]));
        tables.insert("t".to_string(), Table::new("t", cols));
        let provider = FixedTables(tables);

        let table = TableExpr::Table {
            name: "t".to_string(),
            type_ctx: table_type_ctx("t", &["n"]),
        };
        let mut plan = base_plan(vec![select_field(col_ref("t", "n"), "n")], table, &["n"]);
        plan.orderings = Some(vec![PlanOrdering {
            expr: Expr::ColumnRef(ColumnRef::new(None, "n", PrimitiveType::Int)),
            is_ascending: false,
        }]);
        plan.limit = Some(2);

        let result = Evaluator::new(&provider).evaluate_select(&plan).unwrap();
        assert_eq!(int_values(&result, "n"), vec![Some(3), Some(2)]);
    }

    fn join_plan(join_type: JoinType) -> (SelectPlan, FixedTables) {
        let mut left_cols = IndexMap::default();
        left_cols.insert("id".to_string(), int_column(&[Some(1), Some(2)]));
        let mut right_cols = IndexMap::default();
        right_cols.insert("id".to_string(), int_column(&[Some(2), Some(3)]));
        right_cols.insert("v".to_string(), int_column(&[Some(20), Some(30)]));

        let mut tables = IndexMap::default();
        tables.insert("l".to_string(), Table::new("l", left_cols));
        tables.insert("r".to_string(), Table::new("r", right_cols));
        let provider = FixedTables(tables);

        let base = TableExpr::Table {
            name: "l".to_string(),
            type_ctx: table_type_ctx("l", &["id"]),
        };
        let joined = TableExpr::Table {
            name: "r".to_string(),
            type_ctx: table_type_ctx("r", &["id", "v"]),
        };
        let join_type_ctx = TypeContext::join_contexts(&[table_type_ctx("l", &["id"]), table_type_ctx("r", &["id", "v"])]);
        let table = TableExpr::Join {
            base: Box::new(base),
            tables: vec![(joined, join_type)],
            conditions: vec![vec![JoinFields {
                column1: ColumnRef::new(Some("l".to_string()), "id", PrimitiveType::Int),
                column2: ColumnRef::new(Some("r".to_string()), "id", PrimitiveType::Int),
            }]],
            type_ctx: join_type_ctx,
        };

        let select_fields = vec![
            select_field(col_ref("l", "id"), "id"),
            select_field(Expr::ColumnRef(ColumnRef::new(Some("r".to_string()), "v", PrimitiveType::Int)), "v"),
        ];
        let mut plan = base_plan(select_fields, table, &["id", "v"]);
        plan.orderings = Some(vec![PlanOrdering {
            expr: Expr::ColumnRef(ColumnRef::new(None, "id", PrimitiveType::Int)),
            is_ascending: true,
        }]);
        (plan, provider)
    }

    #[test]
    fn inner_join_keeps_only_matching_rows() {
        let (plan, provider) = join_plan(JoinType::Inner);
        let result = Evaluator::new(&provider).evaluate_select(&plan).unwrap();
        assert_eq!(int_values(&result, "id"), vec![Some(2)]);
        assert_eq!(int_values(&result, "v"), vec![Some(20)]);
    }

    #[test]
    fn left_outer_join_keeps_unmatched_left_rows() {
        let (plan, provider) = join_plan(JoinType::LeftOuter);
        let result = Evaluator::new(&provider).evaluate_select(&plan).unwrap();
        assert_eq!(int_values(&result, "id"), vec![Some(1), Some(2)]);
        assert_eq!(int_values(&result, "v"), vec![None, Some(20)]);
    }

    #[test]
    fn within_record_aggregates_inside_each_row() {
        let mut tables = IndexMap::default();
        let mut cols = IndexMap::default();
        let repeated = Column {
            r#type: PrimitiveType::Int,
            mode: Mode::Repeated,
            values: vec![
                Value::Repeated(vec![Some(ScalarValue::Int(1)), Some(ScalarValue::Int(2))]),
                Value::Repeated(vec![Some(ScalarValue::Int(10))]),
            ],
        };
        cols.insert("xs".to_string(), repeated);
        tables.insert("t".to_string(), Table::new("t", cols));
        let provider = FixedTables(tables);

        let mut type_cols = IndexMap::default();
        type_cols.insert("xs".to_string(), PrimitiveType::Int);
        let type_ctx = TypeContext::from_table_and_columns(Some("t".to_string()), type_cols, None, None);
        let table = TableExpr::Table {
            name: "t".to_string(),
            type_ctx,
        };

        let select_fields = vec![SelectField {
            expr: Expr::AggregateFunctionCall {
                func: "sum".to_string(),
                args: vec![Expr::ColumnRef(ColumnRef::new(Some("t".to_string()), "xs", PrimitiveType::Int))],
                r#type: PrimitiveType::Int,
            },
            alias: "total".to_string(),
            within_clause: Some(WithinClause::Record),
        }];
        let plan = base_plan(select_fields, table, &["total"]);

        let result = Evaluator::new(&provider).evaluate_select(&plan).unwrap();
        assert_eq!(int_values(&result, "total"), vec![Some(3), Some(10)]);
    }

    #[test]
    fn within_record_rejects_sibling_repeated_field() {
        let mut tables = IndexMap::default();
        let mut cols = IndexMap::default();
        let repeated = Column {
            r#type: PrimitiveType::Int,
            mode: Mode::Repeated,
            values: vec![Value::Repeated(vec![Some(ScalarValue::Int(1)), Some(ScalarValue::Int(2))])],
        };
        cols.insert("xs".to_string(), repeated);
        tables.insert("t".to_string(), Table::new("t", cols));
        let provider = FixedTables(tables);

        let mut type_cols = IndexMap::default();
        type_cols.insert("xs".to_string(), PrimitiveType::Int);
        let type_ctx = TypeContext::from_table_and_columns(Some("t".to_string()), type_cols, None, None);
        let table = TableExpr::Table {
            name: "t".to_string(),
            type_ctx,
        };

        let mut xs_ref = ColumnRef::new(Some("t".to_string()), "xs", PrimitiveType::Int);
        xs_ref.mode = Mode::Repeated;
        let select_fields = vec![
            SelectField {
                expr: Expr::AggregateFunctionCall {
                    func: "sum".to_string(),
                    args: vec![Expr::ColumnRef(xs_ref.clone())],
                    r#type: PrimitiveType::Int,
                },
                alias: "total".to_string(),
                within_clause: Some(WithinClause::Record),
            },
            select_field(Expr::ColumnRef(xs_ref), "xs"),
        ];
        let plan = base_plan(select_fields, table, &["total", "xs"]);

        let err = Evaluator::new(&provider).evaluate_select(&plan).unwrap_err();
        assert!(matches!(err, EvalError::RepeatedFieldInWithinRecord(alias) if alias == "xs"));
    }
}
