//! Untyped AST produced by the parser. Mirrors the shape of the original
//! `tq_ast` module one-for-one, translated from tagged tuples to enums/structs.

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub select_fields: Vec<SelectField>,
    pub table_expr: Option<Box<TableExpr>>,
    pub where_expr: Option<Box<Expr>>,
    pub groups: Option<Vec<String>>,
    pub having_expr: Option<Box<Expr>>,
    pub orderings: Option<Vec<Ordering>>,
    pub limit: Option<i64>,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WithinClause {
    Record,
    Id(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectField {
    pub expr: Expr,
    pub alias: Option<String>,
    pub within_record: Option<WithinClause>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Plus,
    Minus,
    Times,
    Divide,
    Mod,
    Equals,
    NotEqual,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    And,
    Or,
    Contains,
}

impl BinaryOp {
    pub fn function_name(self) -> &'static str {
        match self {
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Times => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Equals => "=",
            BinaryOp::NotEqual => "!=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::LessThan => "<",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Contains => "contains",
        }
    }
}

impl UnaryOp {
    pub fn function_name(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "not",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Star,
    UnaryOperator(UnaryOp, Box<Expr>),
    BinaryOperator(BinaryOp, Box<Expr>, Box<Expr>),
    FunctionCall {
        name: String,
        args: Vec<Expr>,
    },
    Literal(Literal),
    ColumnId(String),
    Case(CaseExpression),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseClause {
    pub condition: Expr,
    pub result_expr: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseExpression {
    pub clauses: Vec<CaseClause>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ordering {
    pub column_id: Expr,
    pub is_ascending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableId {
    pub name: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableUnion {
    pub tables: Vec<TableExpr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    LeftOuter,
    Inner,
    Cross,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartialJoin {
    pub table_expr: TableExpr,
    pub join_type: JoinType,
    pub condition: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub base: Box<TableExpr>,
    pub join_parts: Vec<PartialJoin>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableExpr {
    TableId(TableId),
    TableUnion(TableUnion),
    Join(Join),
    Select(Box<Select>),
}
