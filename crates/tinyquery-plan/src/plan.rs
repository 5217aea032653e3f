//! The typed plan: the compiler's output and the evaluator's input.

use tinyquery_helpers::IndexSet;
use tinyquery_types::{Mode, PrimitiveType, ScalarValue};

use crate::type_context::TypeContext;

#[derive(Debug, Clone, PartialEq)]
pub struct SelectPlan {
    pub select_fields: Vec<SelectField>,
    pub table: Box<TableExpr>,
    pub where_expr: Box<Expr>,
    pub group_set: Option<GroupSet>,
    pub having_expr: Box<Expr>,
    pub orderings: Option<Vec<Ordering>>,
    pub limit: Option<i64>,
    pub type_ctx: TypeContext,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WithinClause {
    Record,
    Id(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectField {
    pub expr: Expr,
    pub alias: String,
    pub within_clause: Option<WithinClause>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ordering {
    pub expr: Expr,
    pub is_ascending: bool,
}

/// Which rows get bucketed together for aggregation. The trivial group set
/// (empty alias groups, empty field groups) is used when a query aggregates
/// without an explicit `GROUP BY`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GroupSet {
    pub alias_groups: IndexSet<String>,
    pub field_groups: Vec<ColumnRef>,
}

impl GroupSet {
    pub fn trivial() -> GroupSet {
        GroupSet::default()
    }

    pub fn is_trivial(&self) -> bool {
        self.alias_groups.is_empty() && self.field_groups.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    LeftOuter,
    Cross,
}

/// One pair of fields to join on: `column1` always refers to a table that
/// appears earlier in the join chain than the table `column2` refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinFields {
    pub column1: ColumnRef,
    pub column2: ColumnRef,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableExpr {
    /// The implicit one-row table a `SELECT` with no `FROM` clause runs over.
    NoTable { type_ctx: TypeContext },
    Table {
        name: String,
        type_ctx: TypeContext,
    },
    TableUnion {
        tables: Vec<TableExpr>,
        type_ctx: TypeContext,
    },
    Join {
        base: Box<TableExpr>,
        tables: Vec<(TableExpr, JoinType)>,
        conditions: Vec<Vec<JoinFields>>,
        type_ctx: TypeContext,
    },
    Select(Box<SelectPlan>),
}

impl TableExpr {
    pub fn type_ctx(&self) -> &TypeContext {
        match self {
            TableExpr::NoTable { type_ctx }
            | TableExpr::Table { type_ctx, .. }
            | TableExpr::TableUnion { type_ctx, .. }
            | TableExpr::Join { type_ctx, .. } => type_ctx,
            TableExpr::Select(select) => &select.type_ctx,
        }
    }

    /// Rebuilds this table expression with a new type context, keeping every
    /// other field. Used when an alias (join side, subquery, view) overlays a
    /// new set of names onto an already-compiled table expression.
    pub fn with_type_ctx(self, type_ctx: TypeContext) -> TableExpr {
        match self {
            TableExpr::NoTable { .. } => TableExpr::NoTable { type_ctx },
            TableExpr::Table { name, .. } => TableExpr::Table { name, type_ctx },
            TableExpr::TableUnion { tables, .. } => TableExpr::TableUnion { tables, type_ctx },
            TableExpr::Join {
                base,
                tables,
                conditions,
                ..
            } => TableExpr::Join {
                base,
                tables,
                conditions,
                type_ctx,
            },
            TableExpr::Select(mut select) => {
                select.type_ctx = type_ctx;
                TableExpr::Select(select)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    ColumnRef(ColumnRef),
    FunctionCall {
        func: String,
        args: Vec<Expr>,
        r#type: PrimitiveType,
    },
    AggregateFunctionCall {
        func: String,
        args: Vec<Expr>,
        r#type: PrimitiveType,
    },
}

impl Expr {
    pub fn r#type(&self) -> PrimitiveType {
        match self {
            Expr::Literal(lit) => lit.r#type,
            Expr::ColumnRef(col) => col.r#type,
            Expr::FunctionCall { r#type, .. } | Expr::AggregateFunctionCall { r#type, .. } => {
                *r#type
            }
        }
    }

    /// Only a bare column reference can carry a mode other than `NULLABLE`:
    /// function calls and literals always produce a scalar value, even when
    /// one of their arguments is REPEATED.
    pub fn mode(&self) -> Mode {
        match self {
            Expr::ColumnRef(col) => col.mode,
            Expr::Literal(_) | Expr::FunctionCall { .. } | Expr::AggregateFunctionCall { .. } => {
                Mode::Nullable
            }
        }
    }

    /// True if this expression or any of its non-aggregate sub-expressions
    /// contains a call to an aggregate function. Used for group-set inference
    /// (§4.3.5): does not descend into nested aggregate calls' own args,
    /// since those are already known to be aggregate.
    pub fn contains_aggregate(&self) -> bool {
        match self {
            Expr::Literal(_) | Expr::ColumnRef(_) => false,
            Expr::AggregateFunctionCall { .. } => true,
            Expr::FunctionCall { args, .. } => args.iter().any(Expr::contains_aggregate),
        }
    }
}

/// `value` is `None` for a bare `NULL` literal (typed `NONETYPE` until some
/// surrounding context fixes its real type).
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub value: Option<ScalarValue>,
    pub r#type: PrimitiveType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub column: String,
    pub r#type: PrimitiveType,
    pub mode: Mode,
}

impl ColumnRef {
    pub fn new(table: Option<String>, column: impl Into<String>, r#type: PrimitiveType) -> Self {
        ColumnRef {
            table,
            column: column.into(),
            r#type,
            mode: Mode::Nullable,
        }
    }
}
