//! Compile-time twin of [`crate::Context`]: tracks which fields are valid to
//! reference at a point in the query and what type each one has.

use tinyquery_helpers::{IndexMap, IndexSet};
use tinyquery_types::PrimitiveType;

use crate::error::TypeContextError;
use crate::plan::ColumnRef;

pub type FullColumnName = (Option<String>, String);

/// Defines the set of valid fields at a point in code, and their types.
///
/// Type contexts maintain the order of their fields, which isn't needed for
/// typical evaluation, but is useful in a few cases, such as `SELECT *` and
/// when determining the final names to use for a query result.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeContext {
    /// Maps from (table name, column name) to type.
    pub columns: IndexMap<FullColumnName, PrimitiveType>,
    /// Maps any allowed aliases to their (table, column) pair. For example,
    /// the "value" column on table "table" has full name "table.value" but
    /// the alias "value" also refers to it, as long as there's no other
    /// table with a column also named "value".
    pub aliases: IndexMap<String, FullColumnName>,
    /// Aliases that cannot be used because they are ambiguous.
    pub ambig_aliases: IndexSet<String>,
    /// If present, a set of columns that are allowed to be accessed but
    /// aren't part of the "regular" context. For example, if the expression
    /// `value + 1` is used in a subquery, the outer query can use `value`.
    pub implicit_column_context: Option<Box<TypeContext>>,
    /// `None` means aggregates are not allowed here; otherwise the context
    /// to switch to when entering an aggregate function call's arguments.
    pub aggregate_context: Option<Box<TypeContext>>,
}

impl TypeContext {
    pub fn from_table_and_columns(
        table_name: Option<String>,
        columns_without_table: IndexMap<String, PrimitiveType>,
        implicit_column_context: Option<Box<TypeContext>>,
        aggregate_context: Option<Box<TypeContext>>,
    ) -> TypeContext {
        let full_columns = columns_without_table
            .into_iter()
            .map(|(col_name, col_type)| ((table_name.clone(), col_name), col_type))
            .collect();
        TypeContext::from_full_columns(full_columns, implicit_column_context, aggregate_context)
    }

    /// Given just the columns, fills in alias information.
    pub fn from_full_columns(
        full_columns: IndexMap<FullColumnName, PrimitiveType>,
        implicit_column_context: Option<Box<TypeContext>>,
        aggregate_context: Option<Box<TypeContext>>,
    ) -> TypeContext {
        let mut aliases: IndexMap<String, FullColumnName> = IndexMap::default();
        let mut ambig_aliases: IndexSet<String> = IndexSet::default();
        for (table_name, column_name) in full_columns.keys() {
            if ambig_aliases.contains(column_name) {
                continue;
            } else if aliases.contains_key(column_name) {
                aliases.shift_remove(column_name);
                ambig_aliases.insert(column_name.clone());
            } else {
                aliases.insert(column_name.clone(), (table_name.clone(), column_name.clone()));
            }
        }
        TypeContext {
            columns: full_columns,
            aliases,
            ambig_aliases,
            implicit_column_context,
            aggregate_context,
        }
    }

    /// Creates a type context from the union of others, following the
    /// semantics of the comma operator: columns are added in order, and
    /// columns already added from a previous table keep their original
    /// place. All fully-qualified names are removed; columns can only be
    /// referenced by their direct names afterward.
    pub fn union_contexts(contexts: &[TypeContext]) -> Result<TypeContext, TypeContextError> {
        let mut result_columns: IndexMap<FullColumnName, PrimitiveType> = IndexMap::default();
        for context in contexts {
            assert!(context.aggregate_context.is_none());
            for ((_, column_name), col_type) in &context.columns {
                let full_column = (None, column_name.clone());
                match result_columns.get(&full_column) {
                    Some(existing) if existing == col_type => continue,
                    Some(existing) => {
                        return Err(TypeContextError::IncompatibleUnion {
                            field: column_name.clone(),
                            left: *existing,
                            right: *col_type,
                        });
                    }
                    None => {
                        result_columns.insert(full_column, *col_type);
                    }
                }
            }
        }
        Ok(TypeContext::from_full_columns(result_columns, None, None))
    }

    pub fn join_contexts(contexts: &[TypeContext]) -> TypeContext {
        let mut result_columns: IndexMap<FullColumnName, PrimitiveType> = IndexMap::default();
        for context in contexts {
            for (name, col_type) in &context.columns {
                result_columns.insert(name.clone(), *col_type);
            }
        }
        TypeContext::from_full_columns(result_columns, None, None)
    }

    /// Gets the full identifier for a column from any possible alias.
    pub fn column_ref_for_name(&self, name: &str) -> Result<ColumnRef, TypeContextError> {
        let mut possible_results = Vec::new();

        // Try all possible ways of splitting a dot-separated string.
        for (i, _) in name.match_indices('.') {
            let left_side = &name[..i];
            let right_side = &name[i + 1..];
            let key = (Some(left_side.to_string()), right_side.to_string());
            if let Some(result_type) = self.columns.get(&key) {
                possible_results.push(ColumnRef::new(
                    Some(left_side.to_string()),
                    right_side,
                    *result_type,
                ));
            }
        }

        if let Some((table, column)) = self.aliases.get(name) {
            let result_type = self.columns[&(table.clone(), column.clone())];
            possible_results.push(ColumnRef::new(table.clone(), column.clone(), result_type));
        }

        match possible_results.len() {
            1 => Ok(possible_results.into_iter().next().unwrap()),
            0 => {
                if let Some(implicit) = &self.implicit_column_context {
                    implicit.column_ref_for_name(name)
                } else {
                    Err(TypeContextError::FieldNotFound(name.to_string()))
                }
            }
            _ => Err(TypeContextError::AmbiguousField(name.to_string())),
        }
    }

    /// Handles the case where a subquery has an alias: the alias is only
    /// assigned to the implicit column context, not the full context.
    pub fn context_with_subquery_alias(&self, subquery_alias: &str) -> TypeContext {
        let Some(implicit) = &self.implicit_column_context else {
            return self.clone();
        };
        let new_columns = implicit
            .columns
            .iter()
            .map(|((_, col_name), col_type)| {
                ((Some(subquery_alias.to_string()), col_name.clone()), *col_type)
            })
            .collect();
        let new_implicit_column_context =
            TypeContext::from_full_columns(new_columns, None, None);
        TypeContext {
            columns: self.columns.clone(),
            aliases: self.aliases.clone(),
            ambig_aliases: self.ambig_aliases.clone(),
            implicit_column_context: Some(Box::new(new_implicit_column_context)),
            aggregate_context: self.aggregate_context.clone(),
        }
    }

    pub fn context_with_full_alias(&self, alias: &str) -> TypeContext {
        assert!(self.aggregate_context.is_none());
        let new_columns = self
            .columns
            .iter()
            .map(|((_, col_name), col_type)| {
                ((Some(alias.to_string()), col_name.clone()), *col_type)
            })
            .collect();
        let new_implicit_column_context = self
            .implicit_column_context
            .as_ref()
            .map(|ctx| Box::new(ctx.context_with_full_alias(alias)));
        TypeContext::from_full_columns(new_columns, new_implicit_column_context, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(table: &str, cols: &[(&str, PrimitiveType)]) -> TypeContext {
        let columns = cols
            .iter()
            .map(|(name, ty)| ((Some(table.to_string()), name.to_string()), *ty))
            .collect::<IndexMap<_, _>>();
        TypeContext::from_full_columns(columns, None, None)
    }

    #[test]
    fn resolves_unambiguous_alias() {
        let context = ctx("t", &[("a", PrimitiveType::Int)]);
        let column_ref = context.column_ref_for_name("a").unwrap();
        assert_eq!(column_ref.table.as_deref(), Some("t"));
        assert_eq!(column_ref.column, "a");
    }

    #[test]
    fn resolves_dotted_name() {
        let context = ctx("t", &[("a", PrimitiveType::Int)]);
        let column_ref = context.column_ref_for_name("t.a").unwrap();
        assert_eq!(column_ref.table.as_deref(), Some("t"));
    }

    #[test]
    fn ambiguous_alias_across_tables_errors() {
        let joined = TypeContext::join_contexts(&[
            ctx("left", &[("a", PrimitiveType::Int)]),
            ctx("right", &[("a", PrimitiveType::String)]),
        ]);
        assert_eq!(
            joined.column_ref_for_name("a"),
            Err(TypeContextError::AmbiguousField("a".to_string()))
        );
        // Still reachable through its fully-qualified name.
        assert!(joined.column_ref_for_name("left.a").is_ok());
    }

    #[test]
    fn missing_field_errors() {
        let context = ctx("t", &[("a", PrimitiveType::Int)]);
        assert_eq!(
            context.column_ref_for_name("missing"),
            Err(TypeContextError::FieldNotFound("missing".to_string()))
        );
    }

    #[test]
    fn union_requires_matching_types() {
        let err = TypeContext::union_contexts(&[
            ctx("left", &[("a", PrimitiveType::Int)]),
            ctx("right", &[("a", PrimitiveType::String)]),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            TypeContextError::IncompatibleUnion {
                field: "a".to_string(),
                left: PrimitiveType::Int,
                right: PrimitiveType::String,
            }
        );
    }
}
