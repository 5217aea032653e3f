//! Library half of the `tinyquery` command-line driver: argument dispatch,
//! table loading and query execution live here so `main.rs` stays a thin
//! process entry point, matching the original's own `cli`/`cli-lib` split.

use std::fs::File;
use std::io::BufReader;

use clap::Parser as _;

use tinyquery::TinyQuery;

mod commands;
mod logger;
mod render;

use commands::{Cli, TableSpec};

pub fn run_with_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let _ = logger::init(cli.verbose);

    let service = TinyQuery::new();

    if let Err(e) = load_tables(&service, &cli.csv_tables, &cli.ndjson_tables) {
        eprintln!("{e}");
        return 1;
    }

    let query = match query_text(&cli) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("{e}");
            return 1;
        }
    };

    match service.evaluate_query(&query) {
        Ok(ctx) => {
            println!("{}", render::render_context(&ctx));
            0
        }
        Err(e) => {
            eprintln!("{e}");
            1
        }
    }
}

fn query_text(cli: &Cli) -> Result<String, String> {
    if let Some(query) = &cli.query {
        return Ok(query.clone());
    }
    if let Some(path) = &cli.file {
        return std::fs::read_to_string(path).map_err(|e| format!("reading {}: {e}", path.display()));
    }
    Err("one of --query or --file is required".to_string())
}

fn load_tables(service: &TinyQuery, csv_specs: &[String], ndjson_specs: &[String]) -> Result<(), String> {
    for raw in csv_specs {
        let spec: TableSpec = raw.parse()?;
        let schema = tinyquery::TableSchema::from_fields_json_file(&spec.schema_path)
            .map_err(|e| format!("loading schema for {}: {e}", spec.table_name))?;
        let file = File::open(&spec.data_path)
            .map_err(|e| format!("opening {}: {e}", spec.data_path.display()))?;
        service
            .load_table_from_csv(&spec.table_name, &schema, file)
            .map_err(|e| format!("loading {}: {e}", spec.table_name))?;
    }

    for raw in ndjson_specs {
        let spec: TableSpec = raw.parse()?;
        let schema = tinyquery::TableSchema::from_fields_json_file(&spec.schema_path)
            .map_err(|e| format!("loading schema for {}: {e}", spec.table_name))?;
        let file = File::open(&spec.data_path)
            .map_err(|e| format!("opening {}: {e}", spec.data_path.display()))?;
        service
            .load_table_from_ndjson(&spec.table_name, &schema, BufReader::new(file))
            .map_err(|e| format!("loading {}: {e}", spec.table_name))?;
    }

    Ok(())
}
