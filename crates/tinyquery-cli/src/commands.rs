use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "tinyquery")]
#[command(
    about = "Run a query against an in-process, BigQuery-like SQL emulator",
    long_about = None,
    version = env!("CARGO_PKG_VERSION")
)]
pub struct Cli {
    /// Load a CSV table: `dataset.table=schema.json:data.csv`. Repeatable.
    #[arg(long = "csv", value_name = "TABLE=SCHEMA:DATA")]
    pub csv_tables: Vec<String>,

    /// Load a newline-delimited JSON table: `dataset.table=schema.json:data.ndjson`. Repeatable.
    #[arg(long = "ndjson", value_name = "TABLE=SCHEMA:DATA")]
    pub ndjson_tables: Vec<String>,

    /// The query text to run.
    #[arg(long, conflicts_with = "file")]
    pub query: Option<String>,

    /// Read the query text from a file instead of `--query`.
    #[arg(long, conflicts_with = "query")]
    pub file: Option<PathBuf>,

    /// Raise the log level. Repeat for more detail (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// One `dataset.table=schema.json:data` argument, split into its three parts.
pub struct TableSpec {
    pub table_name: String,
    pub schema_path: PathBuf,
    pub data_path: PathBuf,
}

impl std::str::FromStr for TableSpec {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (table_name, rest) = raw
            .split_once('=')
            .ok_or_else(|| format!("expected TABLE=SCHEMA:DATA, got {raw:?}"))?;
        let (schema, data) = rest
            .split_once(':')
            .ok_or_else(|| format!("expected TABLE=SCHEMA:DATA, got {raw:?}"))?;
        Ok(TableSpec {
            table_name: table_name.to_string(),
            schema_path: PathBuf::from(schema),
            data_path: PathBuf::from(data),
        })
    }
}
