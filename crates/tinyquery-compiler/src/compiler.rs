//! Turns the untyped AST into a [`SelectPlan`], resolving every column
//! reference to a concrete type and deciding, field by field, whether it
//! belongs to the grouped columns or the aggregate scope.

use std::cell::RefCell;

use tinyquery_ast::ast;
use tinyquery_helpers::{IndexMap, IndexSet};
use tinyquery_plan::{
    Expr, GroupSet, JoinFields, JoinType, Literal, Ordering, SelectField, SelectPlan, Table,
    TableExpr, TypeContext, View,
};
use tinyquery_types::{PrimitiveType, ScalarValue};

use crate::catalog::{Catalog, CatalogEntry};
use crate::error::CompileError;

/// Compiles a single query (or, recursively, the views and subqueries it
/// references) against a fixed catalog of tables and views.
pub struct Compiler<'a> {
    catalog: &'a dyn Catalog,
    /// Fully-qualified names of views currently being expanded, to detect
    /// cycles that would otherwise recurse forever.
    visiting_views: RefCell<IndexSet<String>>,
}

impl<'a> Compiler<'a> {
    pub fn new(catalog: &'a dyn Catalog) -> Self {
        Compiler {
            catalog,
            visiting_views: RefCell::new(IndexSet::default()),
        }
    }

    /// Lexes, parses, and compiles `text` in one step.
    pub fn compile_text(&self, text: &str) -> Result<SelectPlan, CompileError> {
        let select = tinyquery_ast::parse_query(text)?;
        self.compile_select(&select)
    }

    pub fn compile_select(&self, select: &ast::Select) -> Result<SelectPlan, CompileError> {
        let table_expr = self.compile_table_expr(select.table_expr.as_deref())?;
        let table_ctx = table_expr.type_ctx().clone();
        let where_expr = self.compile_filter_expr(select.where_expr.as_deref(), &table_ctx)?;
        let select_fields = self.expand_select_fields(&select.select_fields, &table_expr);
        let aliases = Self::get_aliases(&select_fields)?;
        let within_clauses = Self::get_within_clauses(&select_fields);
        let group_set =
            self.compile_groups(select.groups.as_deref(), &select_fields, &aliases, &table_ctx)?;

        let (mut compiled_field_dict, aggregate_context) = self.compile_group_fields(
            &select_fields,
            &aliases,
            &within_clauses,
            group_set.as_ref(),
            &table_ctx,
        )?;

        let is_scoped_aggregation = within_clauses.iter().any(Option::is_some);

        // Implicit columns can only show up in non-aggregate select fields.
        let implicit_column_context = find_used_column_context(compiled_field_dict.values());

        for ((alias, within_clause), select_field) in
            aliases.iter().zip(within_clauses.iter()).zip(select_fields.iter())
        {
            let Some(group_set) = &group_set else {
                continue;
            };
            if group_set.alias_groups.contains(alias) {
                continue;
            }
            let ctx_to_use: &TypeContext = if !is_scoped_aggregation {
                &aggregate_context
            } else if select_field.within_record.is_some() {
                &aggregate_context
            } else {
                aggregate_context
                    .aggregate_context
                    .as_deref()
                    .ok_or(CompileError::UnexpectedAggregate)?
            };
            let compiled =
                self.compile_select_field(&select_field.expr, alias, within_clause.as_ref(), ctx_to_use)?;
            compiled_field_dict.insert(alias.clone(), compiled);
        }

        // Put the compiled select fields in the proper order.
        let ordered_select_fields: Vec<SelectField> = aliases
            .iter()
            .map(|alias| {
                compiled_field_dict
                    .get(alias)
                    .cloned()
                    .unwrap_or_else(|| panic!("alias {alias} was never compiled"))
            })
            .collect();

        let result_columns: IndexMap<String, PrimitiveType> = ordered_select_fields
            .iter()
            .map(|field| (field.alias.clone(), field.expr.r#type()))
            .collect();
        let result_context = TypeContext::from_table_and_columns(
            None,
            result_columns,
            Some(Box::new(implicit_column_context)),
            None,
        );
        let having_expr = self.compile_filter_expr(select.having_expr.as_deref(), &result_context)?;

        let orderings = select
            .orderings
            .as_ref()
            .map(|orderings| {
                orderings
                    .iter()
                    .map(|ordering| {
                        Ok(Ordering {
                            expr: self.compile_expr(&ordering.column_id, &result_context)?,
                            is_ascending: ordering.is_ascending,
                        })
                    })
                    .collect::<Result<Vec<_>, CompileError>>()
            })
            .transpose()?;

        Ok(SelectPlan {
            select_fields: ordered_select_fields,
            table: Box::new(table_expr),
            where_expr: Box::new(where_expr),
            group_set,
            having_expr: Box::new(having_expr),
            orderings,
            limit: select.limit,
            type_ctx: result_context,
        })
    }

    /// Expand any stars into a list of all context columns.
    fn expand_select_fields(
        &self,
        select_fields: &[ast::SelectField],
        table_expr: &TableExpr,
    ) -> Vec<ast::SelectField> {
        let type_ctx = table_expr.type_ctx();
        let is_join = matches!(table_expr, TableExpr::Join { .. });
        let star_fields: Vec<ast::SelectField> = type_ctx
            .columns
            .keys()
            .map(|(table_name, col_name)| {
                let col_ref = match table_name {
                    Some(t) => format!("{t}.{col_name}"),
                    None => col_name.clone(),
                };
                // Joins are special: the aliases default to a fully-qualified name.
                let alias = if is_join {
                    format!("{}.{col_name}", table_name.as_deref().unwrap_or(""))
                } else {
                    col_name.clone()
                };
                ast::SelectField {
                    expr: ast::Expr::ColumnId(col_ref),
                    alias: Some(alias),
                    within_record: None,
                }
            })
            .collect();

        let mut result = Vec::with_capacity(select_fields.len());
        for field in select_fields {
            match &field.expr {
                ast::Expr::Star => result.extend(star_fields.iter().cloned()),
                ast::Expr::ColumnId(name) if name.ends_with(".*") => {
                    let prefix = &name[..name.len() - ".*".len()];
                    result.extend(
                        star_fields
                            .iter()
                            .filter(|f| f.alias.as_deref().is_some_and(|a| a.starts_with(prefix)))
                            .cloned(),
                    );
                }
                _ => result.push(field.clone()),
            }
        }
        result
    }

    /// Compile grouped select fields and compute a type context to use for
    /// the rest (the aggregate-scoped fields, compiled separately by the
    /// caller once `is_scoped_aggregation` is known).
    fn compile_group_fields(
        &self,
        select_fields: &[ast::SelectField],
        aliases: &[String],
        within_clauses: &[Option<ast::WithinClause>],
        group_set: Option<&GroupSet>,
        table_ctx: &TypeContext,
    ) -> Result<(IndexMap<String, SelectField>, TypeContext), CompileError> {
        let mut compiled_field_dict: IndexMap<String, SelectField> = IndexMap::default();
        let mut group_columns: IndexMap<(Option<String>, String), PrimitiveType> = IndexMap::default();

        if let Some(group_set) = group_set {
            for field_group in &group_set.field_groups {
                group_columns
                    .insert((field_group.table.clone(), field_group.column.clone()), field_group.r#type);
            }
        }

        for ((alias, within_clause), select_field) in
            aliases.iter().zip(within_clauses.iter()).zip(select_fields.iter())
        {
            let in_group = match group_set {
                None => true,
                Some(group_set) => group_set.alias_groups.contains(alias),
            };
            if !in_group {
                continue;
            }
            let compiled =
                self.compile_select_field(&select_field.expr, alias, within_clause.as_ref(), table_ctx)?;
            group_columns.insert((None, alias.clone()), compiled.expr.r#type());
            compiled_field_dict.insert(alias.clone(), compiled);
        }

        let aggregate_context =
            TypeContext::from_full_columns(group_columns, None, Some(Box::new(table_ctx.clone())));
        Ok((compiled_field_dict, aggregate_context))
    }

    fn compile_table_expr(&self, table_expr: Option<&ast::TableExpr>) -> Result<TableExpr, CompileError> {
        match table_expr {
            None => Ok(TableExpr::NoTable {
                type_ctx: TypeContext::from_full_columns(IndexMap::default(), None, None),
            }),
            Some(ast::TableExpr::TableId(table_id)) => self.compile_table_expr_table_id(table_id),
            Some(ast::TableExpr::TableUnion(union)) => self.compile_table_union(union),
            Some(ast::TableExpr::Join(join)) => self.compile_join(join),
            Some(ast::TableExpr::Select(select)) => self.compile_table_expr_select(select),
        }
    }

    fn compile_table_expr_table_id(&self, table_id: &ast::TableId) -> Result<TableExpr, CompileError> {
        match self.catalog.lookup(&table_id.name)? {
            CatalogEntry::Table(table) => Ok(self.compile_table_ref(table_id, table)),
            CatalogEntry::View(view) => self.compile_view_ref(table_id, view),
        }
    }

    fn compile_table_ref(&self, table_id: &ast::TableId, table: &Table) -> TableExpr {
        let alias = table_id.alias.clone().unwrap_or_else(|| table_id.name.clone());
        let columns: IndexMap<String, PrimitiveType> =
            table.columns.iter().map(|(name, col)| (name.clone(), col.r#type)).collect();
        let type_ctx = TypeContext::from_table_and_columns(Some(alias), columns, None, None);
        TableExpr::Table {
            name: table_id.name.clone(),
            type_ctx,
        }
    }

    /// Re-parses and re-compiles the view's query text as if it were a
    /// subquery, then overlays the view's alias on the whole result.
    ///
    /// Unlike the system this was ported from, re-entering a view that's
    /// still being expanded is a compile error rather than an infinite loop.
    fn compile_view_ref(&self, table_id: &ast::TableId, view: &View) -> Result<TableExpr, CompileError> {
        let alias = table_id.alias.clone().unwrap_or_else(|| table_id.name.clone());
        if !self.visiting_views.borrow_mut().insert(table_id.name.clone()) {
            return Err(CompileError::CyclicViewReference(table_id.name.clone()));
        }
        let result = (|| -> Result<TableExpr, CompileError> {
            let uncompiled_view_select = tinyquery_ast::parse_query(&view.query_text)?;
            let compiled_view_select = self.compile_select(&uncompiled_view_select)?;
            let new_type_ctx = compiled_view_select.type_ctx.context_with_full_alias(&alias);
            Ok(TableExpr::Select(Box::new(compiled_view_select)).with_type_ctx(new_type_ctx))
        })();
        self.visiting_views.borrow_mut().shift_remove(&table_id.name);
        result
    }

    fn compile_table_union(&self, union: &ast::TableUnion) -> Result<TableExpr, CompileError> {
        let compiled_tables = union
            .tables
            .iter()
            .map(|table| self.compile_table_expr(Some(table)))
            .collect::<Result<Vec<_>, _>>()?;
        let contexts: Vec<TypeContext> = compiled_tables.iter().map(|t| t.type_ctx().clone()).collect();
        let type_ctx = TypeContext::union_contexts(&contexts)?;
        Ok(TableExpr::TableUnion {
            tables: compiled_tables,
            type_ctx,
        })
    }

    fn compile_join(&self, join: &ast::Join) -> Result<TableExpr, CompileError> {
        let mut compiled_with_aliases = Vec::with_capacity(1 + join.join_parts.len());
        compiled_with_aliases.push(self.compile_joined_table(&join.base)?);
        for part in &join.join_parts {
            compiled_with_aliases.push(self.compile_joined_table(&part.table_expr)?);
        }
        let (compiled_table_exprs, aliases): (Vec<TableExpr>, Vec<String>) =
            compiled_with_aliases.into_iter().unzip();
        let type_contexts: Vec<TypeContext> =
            compiled_table_exprs.iter().map(|t| t.type_ctx().clone()).collect();
        let conditions: Vec<Option<&ast::Expr>> =
            join.join_parts.iter().map(|part| part.condition.as_ref()).collect();
        let join_types: Vec<ast::JoinType> = join.join_parts.iter().map(|part| part.join_type).collect();
        let result_conditions =
            self.compile_join_fields(&type_contexts, &aliases, &conditions, &join_types)?;
        let result_type_ctx = TypeContext::join_contexts(&type_contexts);

        let mut table_exprs = compiled_table_exprs.into_iter();
        let base = Box::new(table_exprs.next().expect("a join always has a base table"));
        let tables: Vec<(TableExpr, JoinType)> = table_exprs
            .zip(join.join_parts.iter().map(|part| to_plan_join_type(part.join_type)))
            .collect();

        Ok(TableExpr::Join {
            base,
            tables,
            conditions: result_conditions,
            type_ctx: result_type_ctx,
        })
    }

    /// Given one side of a JOIN, get its compiled table expression and alias.
    fn compile_joined_table(&self, table_expr: &ast::TableExpr) -> Result<(TableExpr, String), CompileError> {
        let compiled_table = self.compile_table_expr(Some(table_expr))?;
        let alias = alias_for_joined_table(table_expr)?;
        let result_ctx = compiled_table.type_ctx().context_with_full_alias(&alias);
        Ok((compiled_table.with_type_ctx(result_ctx), alias))
    }

    /// Traverse each join condition to find the joined fields.
    fn compile_join_fields(
        &self,
        type_contexts: &[TypeContext],
        aliases: &[String],
        conditions: &[Option<&ast::Expr>],
        join_types: &[ast::JoinType],
    ) -> Result<Vec<Vec<JoinFields>>, CompileError> {
        conditions
            .iter()
            .zip(join_types.iter())
            .map(|(&condition, &join_type)| {
                self.compile_join_field(condition, join_type, type_contexts, aliases)
            })
            .collect()
    }

    fn compile_join_field(
        &self,
        expr: Option<&ast::Expr>,
        join_type: ast::JoinType,
        type_contexts: &[TypeContext],
        aliases: &[String],
    ) -> Result<Vec<JoinFields>, CompileError> {
        if join_type == ast::JoinType::Cross {
            return Ok(Vec::new());
        }
        match expr {
            Some(expr) => self.compile_join_field_expr(expr, type_contexts, aliases),
            None => Err(CompileError::InvalidJoinCondition("<missing join condition>".to_string())),
        }
    }

    fn compile_join_field_expr(
        &self,
        expr: &ast::Expr,
        type_contexts: &[TypeContext],
        aliases: &[String],
    ) -> Result<Vec<JoinFields>, CompileError> {
        if let ast::Expr::BinaryOperator(op, left, right) = expr {
            if *op == ast::BinaryOp::And {
                let mut fields = self.compile_join_field_expr(left, type_contexts, aliases)?;
                fields.extend(self.compile_join_field_expr(right, type_contexts, aliases)?);
                return Ok(fields);
            }
            if *op == ast::BinaryOp::Equals {
                if let (ast::Expr::ColumnId(left_name), ast::Expr::ColumnId(right_name)) =
                    (left.as_ref(), right.as_ref())
                {
                    let lhs_idx =
                        aliases.iter().position(|alias| left_name.starts_with(&format!("{alias}.")));
                    let rhs_idx =
                        aliases.iter().position(|alias| right_name.starts_with(&format!("{alias}.")));
                    if let (Some(lhs_idx), Some(rhs_idx)) = (lhs_idx, rhs_idx) {
                        let left_ref = type_contexts[lhs_idx].column_ref_for_name(left_name)?;
                        let right_ref = type_contexts[rhs_idx].column_ref_for_name(right_name)?;
                        return match lhs_idx.cmp(&rhs_idx) {
                            std::cmp::Ordering::Less => {
                                Ok(vec![JoinFields { column1: left_ref, column2: right_ref }])
                            }
                            std::cmp::Ordering::Greater => {
                                Ok(vec![JoinFields { column1: right_ref, column2: left_ref }])
                            }
                            std::cmp::Ordering::Equal => Err(CompileError::InvalidJoinCondition(format!(
                                "{left_name} = {right_name}"
                            ))),
                        };
                    }
                }
            }
        }
        Err(CompileError::InvalidJoinCondition(format!("{expr:?}")))
    }

    fn compile_table_expr_select(&self, select: &ast::Select) -> Result<TableExpr, CompileError> {
        let select_result = self.compile_select(select)?;
        match &select.alias {
            Some(alias) => {
                let new_ctx = select_result.type_ctx.context_with_subquery_alias(alias);
                Ok(TableExpr::Select(Box::new(select_result)).with_type_ctx(new_ctx))
            }
            None => Ok(TableExpr::Select(Box::new(select_result))),
        }
    }

    /// Gets the group set to use for the query, handling the special cases
    /// when no `GROUP BY` was specified and determining whether each group
    /// refers to a select-field alias or a field on the source table.
    fn compile_groups(
        &self,
        groups: Option<&[String]>,
        select_fields: &[ast::SelectField],
        aliases: &[String],
        table_ctx: &TypeContext,
    ) -> Result<Option<GroupSet>, CompileError> {
        match groups {
            None => {
                // If no GROUP BY was specified, we're an aggregate query iff
                // at least one select field has an aggregate function.
                let is_aggregate_select =
                    select_fields.iter().any(|field| expression_contains_aggregate(&field.expr));
                Ok(if is_aggregate_select { Some(GroupSet::trivial()) } else { None })
            }
            Some(groups) => {
                let alias_set: IndexSet<String> = aliases.iter().cloned().collect();
                let mut alias_groups = IndexSet::default();
                let mut field_groups = Vec::new();
                for group in groups {
                    if alias_set.contains(group) {
                        alias_groups.insert(group.clone());
                    } else {
                        field_groups.push(table_ctx.column_ref_for_name(group)?);
                    }
                }
                Ok(Some(GroupSet { alias_groups, field_groups }))
            }
        }
    }

    fn compile_select_field(
        &self,
        expr: &ast::Expr,
        alias: &str,
        within_clause: Option<&ast::WithinClause>,
        type_ctx: &TypeContext,
    ) -> Result<SelectField, CompileError> {
        if let Some(ast::WithinClause::Id(id)) = within_clause {
            let ast::Expr::FunctionCall { args, .. } = expr else {
                return Err(CompileError::WithinClauseSyntax);
            };
            let Some(ast::Expr::ColumnId(name)) = args.first() else {
                return Err(CompileError::WithinClauseSyntax);
            };
            let first_segment = name.split('.').next().unwrap_or(name.as_str());
            if first_segment != id {
                return Err(CompileError::WithinClauseSyntax);
            }
        }
        let compiled_expr = self.compile_expr(expr, type_ctx)?;
        Ok(SelectField {
            expr: compiled_expr,
            alias: alias.to_string(),
            within_clause: within_clause.map(compile_within_clause),
        })
    }

    /// If there is a WHERE or HAVING expression, compile it. Otherwise use a
    /// literal true, which passes every row.
    fn compile_filter_expr(
        &self,
        filter_expr: Option<&ast::Expr>,
        type_ctx: &TypeContext,
    ) -> Result<Expr, CompileError> {
        match filter_expr {
            Some(expr) => self.compile_expr(expr, type_ctx),
            None => Ok(Expr::Literal(Literal {
                value: Some(ScalarValue::Bool(true)),
                r#type: PrimitiveType::Bool,
            })),
        }
    }

    fn compile_expr(&self, expr: &ast::Expr, type_ctx: &TypeContext) -> Result<Expr, CompileError> {
        match expr {
            ast::Expr::ColumnId(name) => Ok(Expr::ColumnRef(type_ctx.column_ref_for_name(name)?)),
            ast::Expr::Literal(lit) => Ok(compile_literal(lit)),
            ast::Expr::UnaryOperator(op, inner) => self.compile_unary_operator(*op, inner, type_ctx),
            ast::Expr::BinaryOperator(op, left, right) => {
                self.compile_binary_operator(*op, left, right, type_ctx)
            }
            ast::Expr::FunctionCall { name, args } => self.compile_function_call(name, args, type_ctx),
            ast::Expr::Case(case) => self.compile_case_expression(case, type_ctx),
            ast::Expr::Star => unreachable!("stars are expanded before compile_expr runs"),
        }
    }

    fn compile_unary_operator(
        &self,
        op: ast::UnaryOp,
        expr: &ast::Expr,
        type_ctx: &TypeContext,
    ) -> Result<Expr, CompileError> {
        let func_name = op.function_name();
        let func = tinyquery_functions::get_unary_op(func_name)?;
        let compiled_val = self.compile_expr(expr, type_ctx)?;
        let result_type = func.check_types(&[compiled_val.r#type()])?;
        Ok(Expr::FunctionCall {
            func: func_name.to_string(),
            args: vec![compiled_val],
            r#type: result_type,
        })
    }

    fn compile_binary_operator(
        &self,
        op: ast::BinaryOp,
        left: &ast::Expr,
        right: &ast::Expr,
        type_ctx: &TypeContext,
    ) -> Result<Expr, CompileError> {
        let func_name = op.function_name();
        let func = tinyquery_functions::get_binary_op(func_name)?;
        let compiled_left = self.compile_expr(left, type_ctx)?;
        let compiled_right = self.compile_expr(right, type_ctx)?;
        let result_type = func.check_types(&[compiled_left.r#type(), compiled_right.r#type()])?;
        Ok(Expr::FunctionCall {
            func: func_name.to_string(),
            args: vec![compiled_left, compiled_right],
            r#type: result_type,
        })
    }

    /// Innermost aggregates are special, since the context to use for their
    /// arguments switches to the aggregate context, and the evaluator needs
    /// to see an `AggregateFunctionCall` node to know to treat them as such.
    fn compile_function_call(
        &self,
        name: &str,
        args: &[ast::Expr],
        type_ctx: &TypeContext,
    ) -> Result<Expr, CompileError> {
        let innermost_aggregate = is_innermost_aggregate(name, args);
        let sub_expr_ctx: &TypeContext = if innermost_aggregate {
            type_ctx.aggregate_context.as_deref().ok_or(CompileError::UnexpectedAggregate)?
        } else {
            type_ctx
        };

        let func = tinyquery_functions::get_func(name)?;
        let compiled_args = args
            .iter()
            .map(|arg| self.compile_expr(arg, sub_expr_ctx))
            .collect::<Result<Vec<_>, _>>()?;
        let arg_types: Vec<PrimitiveType> = compiled_args.iter().map(Expr::r#type).collect();
        let result_type = func.check_types(&arg_types)?;

        Ok(if innermost_aggregate {
            Expr::AggregateFunctionCall { func: name.to_string(), args: compiled_args, r#type: result_type }
        } else {
            Expr::FunctionCall { func: name.to_string(), args: compiled_args, r#type: result_type }
        })
    }

    /// Compiles a CASE expression by converting it to nested `if` calls.
    fn compile_case_expression(
        &self,
        case: &ast::CaseExpression,
        type_ctx: &TypeContext,
    ) -> Result<Expr, CompileError> {
        let ast::Expr::FunctionCall { name, args } = desugar_case(&case.clauses) else {
            unreachable!("desugar_case always produces a FunctionCall")
        };
        self.compile_function_call(&name, &args, type_ctx)
    }

    /// Given a list of uncompiled select fields, return the aliases to use:
    /// the explicit alias, or the column name for a bare column reference,
    /// or a generated `f{n}_` name otherwise.
    fn get_aliases(select_fields: &[ast::SelectField]) -> Result<Vec<String>, CompileError> {
        let proposed: Vec<Option<String>> = select_fields.iter().map(field_alias).collect();

        let mut used_aliases: IndexSet<String> = IndexSet::default();
        for alias in proposed.iter().flatten() {
            if !used_aliases.insert(alias.clone()) {
                return Err(CompileError::AmbiguousColumn(alias.clone()));
            }
        }

        let mut generic_field_num = 0usize;
        let mut result = Vec::with_capacity(proposed.len());
        for alias in proposed {
            match alias {
                Some(alias) => result.push(alias),
                None => {
                    while used_aliases.contains(&format!("f{generic_field_num}_")) {
                        generic_field_num += 1;
                    }
                    result.push(format!("f{generic_field_num}_"));
                    generic_field_num += 1;
                }
            }
        }
        Ok(result)
    }

    fn get_within_clauses(select_fields: &[ast::SelectField]) -> Vec<Option<ast::WithinClause>> {
        select_fields.iter().map(|field| field.within_record.clone()).collect()
    }
}

fn alias_for_joined_table(table_expr: &ast::TableExpr) -> Result<String, CompileError> {
    match table_expr {
        ast::TableExpr::TableId(table_id) => {
            Ok(table_id.alias.clone().unwrap_or_else(|| table_id.name.clone()))
        }
        ast::TableExpr::Select(select) => select.alias.clone().ok_or(CompileError::MissingJoinAlias),
        _ => Err(CompileError::MissingJoinAlias),
    }
}

fn to_plan_join_type(join_type: ast::JoinType) -> JoinType {
    match join_type {
        ast::JoinType::LeftOuter => JoinType::LeftOuter,
        ast::JoinType::Inner => JoinType::Inner,
        ast::JoinType::Cross => JoinType::Cross,
    }
}

/// Gets the alias to use for a select field, or `None` if it's not specified
/// and can't be inferred from a bare column reference.
fn field_alias(select_field: &ast::SelectField) -> Option<String> {
    if let Some(alias) = &select_field.alias {
        return Some(alias.clone());
    }
    if let ast::Expr::ColumnId(name) = &select_field.expr {
        return Some(name.clone());
    }
    None
}

fn compile_within_clause(clause: &ast::WithinClause) -> tinyquery_plan::WithinClause {
    match clause {
        ast::WithinClause::Record => tinyquery_plan::WithinClause::Record,
        ast::WithinClause::Id(id) => tinyquery_plan::WithinClause::Id(id.clone()),
    }
}

fn compile_literal(lit: &ast::Literal) -> Expr {
    match lit {
        ast::Literal::Bool(b) => {
            Expr::Literal(Literal { value: Some(ScalarValue::Bool(*b)), r#type: PrimitiveType::Bool })
        }
        ast::Literal::Int(i) => {
            Expr::Literal(Literal { value: Some(ScalarValue::Int(*i)), r#type: PrimitiveType::Int })
        }
        ast::Literal::Float(f) => {
            Expr::Literal(Literal { value: Some(ScalarValue::Float(*f)), r#type: PrimitiveType::Float })
        }
        ast::Literal::Str(s) => Expr::Literal(Literal {
            value: Some(ScalarValue::String(s.clone())),
            r#type: PrimitiveType::String,
        }),
        ast::Literal::Null => Expr::Literal(Literal { value: None, r#type: PrimitiveType::NoneType }),
    }
}

/// Desugars a CASE expression into nested `if` calls, with a trailing `NULL`
/// default when there's no final `ELSE` clause (the parser represents an
/// `ELSE` as a trailing clause whose condition is the literal `true`).
fn desugar_case(clauses: &[ast::CaseClause]) -> ast::Expr {
    match clauses.split_first() {
        None => ast::Expr::Literal(ast::Literal::Null),
        Some((clause, rest)) => ast::Expr::FunctionCall {
            name: "if".to_string(),
            args: vec![clause.condition.clone(), clause.result_expr.clone(), desugar_case(rest)],
        },
    }
}

/// Given an uncompiled expression, check if it does any aggregation. This
/// operates on the uncompiled AST since the result determines how to compile
/// the expression in the first place. Notably, a CASE expression is never
/// treated as containing an aggregate here: it's desugared into nested `if`
/// calls first, and aggregate detection happens on those once compiled.
fn expression_contains_aggregate(expr: &ast::Expr) -> bool {
    match expr {
        ast::Expr::UnaryOperator(_, inner) => expression_contains_aggregate(inner),
        ast::Expr::BinaryOperator(_, left, right) => {
            expression_contains_aggregate(left) || expression_contains_aggregate(right)
        }
        ast::Expr::FunctionCall { name, args } => {
            tinyquery_functions::is_aggregate_func(name) || args.iter().any(expression_contains_aggregate)
        }
        ast::Expr::Case(_) => false,
        ast::Expr::Literal(_) | ast::Expr::ColumnId(_) | ast::Expr::Star => false,
    }
}

/// Only arguments to innermost aggregates get access to fields from the
/// original table expression, so this needs to be detected specifically
/// rather than just checking `is_aggregate_func` on every function call.
fn is_innermost_aggregate(name: &str, args: &[ast::Expr]) -> bool {
    tinyquery_functions::is_aggregate_func(name) && !args.iter().any(expression_contains_aggregate)
}

/// Given a list of compiled select fields, find the columns they reference,
/// so those columns can be used in outer selects (at lower precedence than
/// the select fields' own aliases).
fn find_used_column_context<'a>(fields: impl Iterator<Item = &'a SelectField>) -> TypeContext {
    let mut column_references: IndexMap<(Option<String>, String), PrimitiveType> = IndexMap::default();
    for field in fields {
        find_column_references(&field.expr, &mut column_references);
    }
    TypeContext::from_full_columns(column_references, None, None)
}

fn find_column_references(expr: &Expr, out: &mut IndexMap<(Option<String>, String), PrimitiveType>) {
    match expr {
        Expr::FunctionCall { args, .. } | Expr::AggregateFunctionCall { args, .. } => {
            for arg in args {
                find_column_references(arg, out);
            }
        }
        Expr::ColumnRef(column_ref) => {
            out.insert((column_ref.table.clone(), column_ref.column.clone()), column_ref.r#type);
        }
        Expr::Literal(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tinyquery_plan::Column;
    use tinyquery_types::Mode;

    use super::*;

    struct FixedCatalog {
        tables: IndexMap<String, Table>,
        views: IndexMap<String, View>,
    }

    impl Catalog for FixedCatalog {
        fn lookup(&self, name: &str) -> Result<CatalogEntry<'_>, CompileError> {
            if let Some(table) = self.tables.get(name) {
                return Ok(CatalogEntry::Table(table));
            }
            if let Some(view) = self.views.get(name) {
                return Ok(CatalogEntry::View(view));
            }
            Err(CompileError::TableNotFound(name.to_string()))
        }
    }

    fn int_column(values: Vec<Option<i64>>) -> Column {
        Column {
            r#type: PrimitiveType::Int,
            mode: Mode::Nullable,
            values: values.into_iter().map(|v| tinyquery_types::Value::Scalar(v.map(ScalarValue::Int))).collect(),
        }
    }

    fn one_table_catalog() -> FixedCatalog {
        let mut columns = IndexMap::default();
        columns.insert("value".to_string(), int_column(vec![Some(1), Some(2), Some(3)]));
        columns.insert("tag".to_string(), int_column(vec![Some(0), Some(0), Some(1)]));
        let table = Table::new("t", columns);
        let mut tables = IndexMap::default();
        tables.insert("t".to_string(), table);
        FixedCatalog { tables, views: IndexMap::default() }
    }

    #[test]
    fn compiles_plain_select() {
        let catalog = one_table_catalog();
        let compiler = Compiler::new(&catalog);
        let plan = compiler.compile_text("SELECT value FROM t").unwrap();
        assert_eq!(plan.select_fields.len(), 1);
        assert_eq!(plan.select_fields[0].alias, "value");
        assert!(plan.group_set.is_none());
    }

    #[test]
    fn infers_trivial_group_set_for_bare_aggregate() {
        let catalog = one_table_catalog();
        let compiler = Compiler::new(&catalog);
        let plan = compiler.compile_text("SELECT SUM(value) FROM t").unwrap();
        assert!(plan.group_set.as_ref().is_some_and(GroupSet::is_trivial));
    }

    #[test]
    fn group_by_splits_alias_and_field_groups() {
        let catalog = one_table_catalog();
        let compiler = Compiler::new(&catalog);
        let plan = compiler.compile_text("SELECT tag, SUM(value) FROM t GROUP BY tag").unwrap();
        let group_set = plan.group_set.unwrap();
        assert!(group_set.alias_groups.contains("tag"));
        assert!(group_set.field_groups.is_empty());
    }

    #[test]
    fn unknown_table_errors() {
        let catalog = one_table_catalog();
        let compiler = Compiler::new(&catalog);
        let err = compiler.compile_text("SELECT value FROM missing").unwrap_err();
        assert!(matches!(err, CompileError::TableNotFound(_)));
    }

    #[test]
    fn detects_cyclic_views() {
        let mut catalog = one_table_catalog();
        catalog
            .views
            .insert("v".to_string(), View { name: "v".to_string(), query_text: "SELECT * FROM v".to_string() });
        let compiler = Compiler::new(&catalog);
        let err = compiler.compile_text("SELECT * FROM v").unwrap_err();
        assert!(matches!(err, CompileError::CyclicViewReference(name) if name == "v"));
    }

    #[test]
    fn star_expands_to_every_column() {
        let catalog = one_table_catalog();
        let compiler = Compiler::new(&catalog);
        let plan = compiler.compile_text("SELECT * FROM t").unwrap();
        let aliases: Vec<&str> = plan.select_fields.iter().map(|f| f.alias.as_str()).collect();
        assert_eq!(aliases, vec!["value", "tag"]);
    }
}
