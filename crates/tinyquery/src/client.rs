//! A mock REST-shaped client standing in for the value returned by
//! `apiclient.discovery.build()` against the real BigQuery API: three
//! service factories (`tables()`, `jobs()`, `tabledata()`) whose method
//! calls build a deferred [`Request`] rather than acting immediately.
//! Calling `.execute()` on the request actually performs the operation —
//! the same shape real `googleapiclient` requests have, without an HTTP
//! round trip.

use serde::Serialize;
use thiserror::Error;
use tinyquery_plan::Table;
use tinyquery_types::{ScalarValue, Value};

use crate::error::TinyQueryError;
use crate::jobs::{CreateDisposition, JobInfo, WriteDisposition};
use crate::schema::TableSchema;
use crate::service::{SchemaField, ShortTableInfo, TableInfo, TableSchemaInfo, TinyQuery};

/// The 404-shaped error the real client raises for a missing table; every
/// other failure simply propagates the underlying [`TinyQueryError`].
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    NotFound { code: u16, message: String },
    #[error(transparent)]
    Other(#[from] TinyQueryError),
}

fn not_found(dataset_id: &str, table_id: &str) -> ApiError {
    ApiError::NotFound {
        code: 404,
        message: format!("Table not found: {dataset_id}.{table_id}"),
    }
}

/// What a table `insert` call creates: either a new empty table from a
/// schema, or a view from a query.
pub enum TableInsertRequest {
    Table(TableSchema),
    View(String),
}

pub enum JobInsertRequest {
    Query {
        query: String,
        destination_table: Option<(String, String)>,
        create_disposition: CreateDisposition,
        write_disposition: WriteDisposition,
    },
    Copy {
        source_table: (String, String),
        destination_table: (String, String),
        create_disposition: CreateDisposition,
        write_disposition: WriteDisposition,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldValue {
    pub v: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Row {
    pub f: Vec<FieldValue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RowsResponse {
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResultsResponse {
    pub rows: Vec<Row>,
    pub schema: TableSchemaInfo,
}

/// The result of `execute()`-ing a [`Request`]: a tagged union rather than
/// a generic payload, since each request kind's result shape is known at
/// compile time.
pub enum Response {
    Empty,
    TableInfo(TableInfo),
    TableList(Vec<ShortTableInfo>),
    JobInfo(JobInfo),
    Rows(RowsResponse),
    QueryResults(QueryResultsResponse),
}

/// A deferred API call: constructing one via `tables()`/`jobs()`/
/// `tabledata()` performs no work until `.execute()` is called.
pub enum Request<'a> {
    TablesInsert {
        service: &'a TinyQuery,
        dataset_id: String,
        table_id: String,
        body: TableInsertRequest,
    },
    TablesGet {
        service: &'a TinyQuery,
        project_id: String,
        dataset_id: String,
        table_id: String,
    },
    TablesList {
        service: &'a TinyQuery,
        project_id: String,
        dataset_id: String,
        max_results: Option<usize>,
    },
    TablesDelete {
        service: &'a TinyQuery,
        dataset_id: String,
        table_id: String,
    },
    TablesPatch,
    JobsInsert {
        service: &'a TinyQuery,
        project_id: String,
        body: JobInsertRequest,
    },
    JobsGet {
        service: &'a TinyQuery,
        job_id: String,
    },
    JobsGetQueryResults {
        service: &'a TinyQuery,
        job_id: String,
    },
    TabledataList {
        service: &'a TinyQuery,
        dataset_id: String,
        table_id: String,
    },
}

impl<'a> Request<'a> {
    pub fn execute(self) -> Result<Response, ApiError> {
        match self {
            Request::TablesInsert { service, dataset_id, table_id, body } => {
                match body {
                    TableInsertRequest::View(query) => {
                        service.make_view(&format!("{dataset_id}.{table_id}"), &query)?;
                    }
                    TableInsertRequest::Table(schema) => {
                        let table = crate::schema::make_empty_table(&format!("{dataset_id}.{table_id}"), &schema)?;
                        service.load_table_or_view(crate::catalog::Entry::Table(table));
                    }
                }
                Ok(Response::Empty)
            }
            Request::TablesGet { service, project_id, dataset_id, table_id } => {
                match service.get_table_info(&project_id, &dataset_id, &table_id) {
                    Ok(info) => Ok(Response::TableInfo(info)),
                    Err(TinyQueryError::TableNotFound(_)) => Err(not_found(&dataset_id, &table_id)),
                    Err(e) => Err(e.into()),
                }
            }
            Request::TablesList { service, project_id, dataset_id, max_results } => {
                let mut tables = service.get_all_table_info_in_dataset(&project_id, &dataset_id);
                if let Some(max_results) = max_results {
                    tables.truncate(max_results);
                }
                Ok(Response::TableList(tables))
            }
            Request::TablesDelete { service, dataset_id, table_id } => {
                match service.delete_table(&dataset_id, &table_id) {
                    Ok(()) => Ok(Response::Empty),
                    Err(TinyQueryError::TableNotFound(_)) => Err(not_found(&dataset_id, &table_id)),
                    Err(e) => Err(e.into()),
                }
            }
            Request::TablesPatch => Ok(Response::Empty),
            Request::JobsInsert { service, project_id, body } => {
                let info = match body {
                    JobInsertRequest::Query { query, destination_table, create_disposition, write_disposition } => {
                        let dest = destination_table
                            .as_ref()
                            .map(|(dataset, table)| (dataset.as_str(), table.as_str()));
                        service.run_query_job(&project_id, &query, dest, create_disposition, write_disposition)?
                    }
                    JobInsertRequest::Copy { source_table, destination_table, create_disposition, write_disposition } => {
                        service.run_copy_job(
                            &project_id,
                            (source_table.0.as_str(), source_table.1.as_str()),
                            (destination_table.0.as_str(), destination_table.1.as_str()),
                            create_disposition,
                            write_disposition,
                        )?
                    }
                };
                Ok(Response::JobInfo(info))
            }
            Request::JobsGet { service, job_id } => Ok(Response::JobInfo(service.get_job_info(&job_id)?)),
            Request::JobsGetQueryResults { service, job_id } => {
                let table = service.get_query_result_table(&job_id)?;
                Ok(Response::QueryResults(QueryResultsResponse {
                    rows: rows_from_table(&table),
                    schema: schema_from_table(&table),
                }))
            }
            Request::TabledataList { service, dataset_id, table_id } => {
                match service.get_table(&dataset_id, &table_id) {
                    Ok(table) => Ok(Response::Rows(RowsResponse { rows: rows_from_table(&table) })),
                    Err(TinyQueryError::TableNotFound(_)) => Err(not_found(&dataset_id, &table_id)),
                    Err(e) => Err(e.into()),
                }
            }
        }
    }
}

pub struct ApiClient<'a> {
    service: &'a TinyQuery,
}

impl<'a> ApiClient<'a> {
    pub fn new(service: &'a TinyQuery) -> ApiClient<'a> {
        ApiClient { service }
    }

    pub fn tables(&self) -> TableService<'a> {
        TableService { service: self.service }
    }

    pub fn jobs(&self) -> JobService<'a> {
        JobService { service: self.service }
    }

    pub fn tabledata(&self) -> TabledataService<'a> {
        TabledataService { service: self.service }
    }
}

pub struct TableService<'a> {
    service: &'a TinyQuery,
}

impl<'a> TableService<'a> {
    pub fn insert(&self, dataset_id: &str, table_id: &str, body: TableInsertRequest) -> Request<'a> {
        Request::TablesInsert {
            service: self.service,
            dataset_id: dataset_id.to_string(),
            table_id: table_id.to_string(),
            body,
        }
    }

    pub fn get(&self, project_id: &str, dataset_id: &str, table_id: &str) -> Request<'a> {
        Request::TablesGet {
            service: self.service,
            project_id: project_id.to_string(),
            dataset_id: dataset_id.to_string(),
            table_id: table_id.to_string(),
        }
    }

    pub fn list(&self, project_id: &str, dataset_id: &str, max_results: Option<usize>) -> Request<'a> {
        Request::TablesList {
            service: self.service,
            project_id: project_id.to_string(),
            dataset_id: dataset_id.to_string(),
            max_results,
        }
    }

    pub fn delete(&self, dataset_id: &str, table_id: &str) -> Request<'a> {
        Request::TablesDelete {
            service: self.service,
            dataset_id: dataset_id.to_string(),
            table_id: table_id.to_string(),
        }
    }

    pub fn patch(&self) -> Request<'a> {
        Request::TablesPatch
    }
}

pub struct JobService<'a> {
    service: &'a TinyQuery,
}

impl<'a> JobService<'a> {
    pub fn insert(&self, project_id: &str, body: JobInsertRequest) -> Request<'a> {
        Request::JobsInsert {
            service: self.service,
            project_id: project_id.to_string(),
            body,
        }
    }

    pub fn get(&self, job_id: &str) -> Request<'a> {
        Request::JobsGet {
            service: self.service,
            job_id: job_id.to_string(),
        }
    }

    pub fn get_query_results(&self, job_id: &str) -> Request<'a> {
        Request::JobsGetQueryResults {
            service: self.service,
            job_id: job_id.to_string(),
        }
    }

    /// Convenience matching the real client's `jobs().query(...)`: inserts
    /// a query job and immediately fetches its results.
    pub fn query(&self, project_id: &str, query: &str) -> Result<QueryResultsResponse, ApiError> {
        let info = match self
            .insert(
                project_id,
                JobInsertRequest::Query {
                    query: query.to_string(),
                    destination_table: None,
                    create_disposition: CreateDisposition::default(),
                    write_disposition: WriteDisposition::default(),
                },
            )
            .execute()?
        {
            Response::JobInfo(info) => info,
            _ => unreachable!("JobsInsert always returns Response::JobInfo"),
        };
        match self.get_query_results(&info.job_reference.job_id).execute()? {
            Response::QueryResults(results) => Ok(results),
            _ => unreachable!("JobsGetQueryResults always returns Response::QueryResults"),
        }
    }
}

pub struct TabledataService<'a> {
    service: &'a TinyQuery,
}

impl<'a> TabledataService<'a> {
    pub fn list(&self, dataset_id: &str, table_id: &str) -> Request<'a> {
        Request::TabledataList {
            service: self.service,
            dataset_id: dataset_id.to_string(),
            table_id: table_id.to_string(),
        }
    }
}

fn rows_from_table(table: &Table) -> Vec<Row> {
    (0..table.num_rows)
        .map(|i| Row {
            f: table
                .columns
                .values()
                .map(|column| FieldValue { v: stringify_value(&column.values[i]) })
                .collect(),
        })
        .collect()
}

fn schema_from_table(table: &Table) -> TableSchemaInfo {
    TableSchemaInfo {
        fields: table
            .columns
            .iter()
            .map(|(name, column)| SchemaField {
                name: name.clone(),
                r#type: column.r#type.name().to_string(),
                mode: column.mode.name().to_string(),
            })
            .collect(),
    }
}

fn stringify_value(value: &Value) -> String {
    match value {
        Value::Scalar(None) => "None".to_string(),
        Value::Scalar(Some(v)) => stringify_scalar(v),
        Value::Repeated(items) => {
            let rendered: Vec<String> = items
                .iter()
                .map(|v| match v {
                    Some(v) => stringify_scalar(v),
                    None => "None".to_string(),
                })
                .collect();
            format!("[{}]", rendered.join(", "))
        }
    }
}

fn stringify_scalar(value: &ScalarValue) -> String {
    match value {
        ScalarValue::Int(i) => i.to_string(),
        ScalarValue::Float(f) => f.to_string(),
        ScalarValue::Bool(b) => (if *b { "True" } else { "False" }).to_string(),
        ScalarValue::String(s) => s.clone(),
        ScalarValue::Timestamp(t) => t.to_rfc3339(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn get_on_missing_table_is_404_shaped() {
        let service = TinyQuery::new();
        let client = ApiClient::new(&service);

        let err = client.tables().get("proj", "dataset", "missing").execute().unwrap_err();
        assert!(matches!(err, ApiError::NotFound { code: 404, .. }));
    }

    #[test]
    fn insert_and_get_table_round_trips_schema() {
        let service = TinyQuery::new();
        let client = ApiClient::new(&service);
        let schema = TableSchema::from_fields_json(
            r#"[{"name": "n", "type": "INTEGER", "mode": "REQUIRED"}]"#,
        )
        .unwrap();

        client
            .tables()
            .insert("dataset", "nums", TableInsertRequest::Table(schema))
            .execute()
            .unwrap();

        match client.tables().get("proj", "dataset", "nums").execute().unwrap() {
            Response::TableInfo(info) => {
                assert_eq!(info.schema.fields.len(), 1);
                assert_eq!(info.schema.fields[0].name, "n");
            }
            _ => panic!("expected TableInfo"),
        }
    }

    #[test]
    fn query_convenience_renders_stringified_rows() {
        let service = TinyQuery::new();
        let schema = TableSchema::from_fields_json(
            r#"[{"name": "n", "type": "INTEGER", "mode": "REQUIRED"}]"#,
        )
        .unwrap();
        service.load_table_from_csv("dataset.nums", &schema, "1\n2\n".as_bytes()).unwrap();

        let client = ApiClient::new(&service);
        let results = client.jobs().query("proj", "SELECT n FROM dataset.nums").unwrap();

        assert_eq!(results.rows.len(), 2);
        assert_eq!(results.rows[0].f[0].v, "1");
    }
}
