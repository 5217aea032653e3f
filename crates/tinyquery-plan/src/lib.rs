//! Columnar data model, compile-time/run-time row-set contexts, and the
//! typed query plan shared between the compiler and the evaluator.

mod column;
mod context;
mod error;
mod plan;
mod type_context;

pub use column::{Column, Table, View};
pub use context::{
    append_context_to_context, append_partial_context_to_context, append_row_to_context,
    context_from_table, context_with_overlayed_type_context, cross_join_contexts,
    empty_column_from_template, empty_context_from_template, empty_context_from_type_context,
    mask_context, row_context_from_context, truncate_context, Context,
};
pub use error::TypeContextError;
pub use plan::{
    ColumnRef, Expr, GroupSet, JoinFields, JoinType, Literal, Ordering, SelectField, SelectPlan,
    TableExpr, WithinClause,
};
pub use type_context::{FullColumnName, TypeContext};
