use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error(transparent)]
    Runtime(#[from] tinyquery_functions::RuntimeError),
    #[error(transparent)]
    Type(#[from] tinyquery_functions::TypeError),
    #[error("unknown table: {0}")]
    MissingTable(String),
    #[error("aggregate function called without a valid aggregate context")]
    MissingAggregateContext,
    #[error("multiple fields with a WITHIN clause are not supported")]
    MultipleWithinClauses,
    #[error("WITHIN {0} is not supported; only WITHIN RECORD is implemented")]
    WithinIdNotSupported(String),
    #[error(
        "cannot select field {0:?} having mode=REPEATED for queries involving WITHIN RECORD"
    )]
    RepeatedFieldInWithinRecord(String),
}
