//! The `tinyquery` facade: an in-process emulator of a BigQuery-like
//! analytical SQL service, usable as a deterministic test double. Wraps the
//! lexer/parser/compiler/evaluator pipeline behind a catalog of tables and
//! views, a job map, CSV/NDJSON loaders, and a mock REST-shaped client.

mod catalog;
mod client;
mod csv_loader;
mod error;
mod jobs;
mod ndjson_loader;
mod schema;
mod service;

pub use catalog::Entry;
pub use client::{
    ApiClient, ApiError, JobInsertRequest, QueryResultsResponse, Request, Response,
    TableInsertRequest,
};
pub use csv_loader::load_table_from_csv;
pub use error::TinyQueryError;
pub use jobs::{CreateDisposition, JobInfo, JobReference, JobState, WriteDisposition};
pub use ndjson_loader::load_table_from_ndjson;
pub use schema::{make_empty_table, FieldSchema, TableSchema};
pub use service::{SchemaField, ShortTableInfo, TableInfo, TableReference, TableSchemaInfo, TinyQuery};

// Re-export the layers a client embedding TinyQuery will want without an
// extra direct dependency edge.
pub use tinyquery_compiler::CompileError;
pub use tinyquery_eval::EvalError;
pub use tinyquery_plan::{Context, Table, View};
