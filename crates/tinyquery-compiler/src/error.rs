use thiserror::Error;
use tinyquery_plan::TypeContextError;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Syntax(#[from] tinyquery_ast::SyntaxError),
    #[error(transparent)]
    TypeContext(#[from] TypeContextError),
    #[error(transparent)]
    Type(#[from] tinyquery_functions::TypeError),
    #[error("unknown table or view: {0}")]
    TableNotFound(String),
    #[error("ambiguous column name {0}")]
    AmbiguousColumn(String),
    #[error("WITHIN clause syntax error")]
    WithinClauseSyntax,
    #[error("table expression must have an alias name")]
    MissingJoinAlias,
    #[error(
        "JOIN conditions must consist of an AND of = comparisons between two fields on distinct tables, got: {0}"
    )]
    InvalidJoinCondition(String),
    #[error("unexpected aggregate function")]
    UnexpectedAggregate,
    #[error("cyclic view reference involving {0}")]
    CyclicViewReference(String),
}
