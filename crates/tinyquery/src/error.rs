use thiserror::Error;
use tinyquery_types::Mode;

/// Every error the facade crate can raise, whether it originates in a lower
/// layer (`#[from]`-wrapped) or at this boundary (catalog/job/loader misuse).
#[derive(Debug, Error)]
pub enum TinyQueryError {
    #[error(transparent)]
    Compile(#[from] tinyquery_compiler::CompileError),
    #[error(transparent)]
    Eval(#[from] tinyquery_eval::EvalError),
    #[error(transparent)]
    Cast(#[from] tinyquery_types::CastError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("unknown table or view: {0}")]
    TableNotFound(String),
    #[error("job not found: {0}")]
    JobNotFound(String),
    #[error("job {0} is not a query job")]
    NotAQueryJob(String),
    #[error("unknown field type in schema: {0:?}")]
    UnknownFieldType(String),
    #[error("unknown field mode in schema: {0:?}")]
    UnknownFieldMode(String),
    #[error("malformed input: {0}")]
    Malformed(String),
    #[error("value {value:?} does not match column mode {mode:?}")]
    BadToken { mode: Mode, value: String },
    #[error(
        "CREATE_NEVER specified, but table did not exist: {0}"
    )]
    CreateNever(String),
    #[error("WRITE_EMPTY was specified, but the table {0} was not empty")]
    WriteEmptyViolation(String),
}
