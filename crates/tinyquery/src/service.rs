//! The `TinyQuery` facade: a single-threaded, synchronous service object
//! wrapping a catalog of tables/views and a job map. All state lives behind
//! one mutex — there is nothing to suspend on and no concurrent writers, so
//! a single lock per call is the whole concurrency story (§5).

use std::io::{BufRead, Read};
use std::sync::Mutex;

use serde::Serialize;
use tinyquery_compiler::Compiler;
use tinyquery_eval::Evaluator;
use tinyquery_helpers::IndexMap;
use tinyquery_plan::{Column, Context, Table, View};
use tinyquery_types::{Mode, Value};

use crate::catalog::{Dataset, Entry};
use crate::csv_loader;
use crate::error::TinyQueryError;
use crate::jobs::{CreateDisposition, JobInfo, JobReference, JobRecord, JobState, WriteDisposition};
use crate::ndjson_loader;
use crate::schema::TableSchema;

pub struct TinyQuery {
    inner: Mutex<Inner>,
}

struct Inner {
    dataset: Dataset,
    jobs: IndexMap<String, JobRecord>,
    next_job_num: u64,
    default_project: String,
}

impl Default for TinyQuery {
    fn default() -> Self {
        TinyQuery::new()
    }
}

impl TinyQuery {
    pub fn new() -> TinyQuery {
        TinyQuery {
            inner: Mutex::new(Inner {
                dataset: Dataset::default(),
                jobs: IndexMap::default(),
                next_job_num: 0,
                default_project: "default".to_string(),
            }),
        }
    }

    /// Sets the project id used by callers that don't name one explicitly.
    /// Intended to be chained through [`tinyquery_helpers::Config::config`]:
    /// `TinyQuery::new().config(|s| s.set_default_project("my-proj"))`.
    pub fn set_default_project(&mut self, project_id: impl Into<String>) {
        self.inner.get_mut().unwrap().default_project = project_id.into();
    }

    pub fn default_project(&self) -> String {
        self.inner.lock().unwrap().default_project.clone()
    }

    pub fn load_table_or_view(&self, entry: Entry) {
        self.inner.lock().unwrap().dataset.load_table_or_view(entry);
    }

    pub fn load_table_from_csv(
        &self,
        table_name: &str,
        schema: &TableSchema,
        reader: impl Read,
    ) -> Result<(), TinyQueryError> {
        let table = csv_loader::load_table_from_csv(table_name, schema, reader)?;
        self.load_table_or_view(Entry::Table(table));
        Ok(())
    }

    pub fn load_table_from_ndjson(
        &self,
        table_name: &str,
        schema: &TableSchema,
        reader: impl BufRead,
    ) -> Result<(), TinyQueryError> {
        let table = ndjson_loader::load_table_from_ndjson(table_name, schema, reader)?;
        self.load_table_or_view(Entry::Table(table));
        Ok(())
    }

    /// Validates that `query` compiles against the current catalog, then
    /// registers it as a view. The view's schema is recomputed from its
    /// query text on every future reference, so it always reflects any
    /// later change to the tables it selects from.
    pub fn make_view(&self, view_name: &str, query: &str) -> Result<(), TinyQueryError> {
        let mut guard = self.inner.lock().unwrap();
        Compiler::new(&guard.dataset).compile_text(query)?;
        guard.dataset.load_table_or_view(Entry::View(View {
            name: view_name.to_string(),
            query_text: query.to_string(),
        }));
        Ok(())
    }

    pub fn evaluate_query(&self, query: &str) -> Result<Context, TinyQueryError> {
        let guard = self.inner.lock().unwrap();
        let select = Compiler::new(&guard.dataset).compile_text(query)?;
        let result = Evaluator::new(&guard.dataset).evaluate_select(&select)?;
        Ok(result)
    }

    pub fn get_table_names_for_dataset(&self, dataset: &str) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .dataset
            .table_names_for_dataset(dataset)
    }

    /// Table info dicts for every table in `dataset`, sorted by table name.
    pub fn get_all_table_info_in_dataset(
        &self,
        project_id: &str,
        dataset: &str,
    ) -> Vec<ShortTableInfo> {
        let mut names = self.get_table_names_for_dataset(dataset);
        names.sort();
        names
            .into_iter()
            .map(|name| self.get_short_table_info(project_id, dataset, &name))
            .collect()
    }

    /// The shape `tables().list()` returns per table.
    pub fn get_short_table_info(
        &self,
        project_id: &str,
        dataset: &str,
        table_name: &str,
    ) -> ShortTableInfo {
        ShortTableInfo {
            table_reference: TableReference {
                project_id: project_id.to_string(),
                dataset_id: dataset.to_string(),
                table_id: table_name.to_string(),
            },
        }
    }

    /// The shape `tables().get()` returns: schema plus table reference.
    pub fn get_table_info(
        &self,
        project_id: &str,
        dataset: &str,
        table_name: &str,
    ) -> Result<TableInfo, TinyQueryError> {
        let guard = self.inner.lock().unwrap();
        let table = guard.dataset.get_table(dataset, table_name)?;
        let fields = table
            .columns
            .iter()
            .map(|(name, col)| SchemaField {
                name: name.clone(),
                r#type: col.r#type.name().to_string(),
                mode: "NULLABLE".to_string(),
            })
            .collect();
        Ok(TableInfo {
            schema: TableSchemaInfo { fields },
            table_reference: TableReference {
                project_id: project_id.to_string(),
                dataset_id: dataset.to_string(),
                table_id: table_name.to_string(),
            },
        })
    }

    pub fn get_table(&self, dataset: &str, table_name: &str) -> Result<Table, TinyQueryError> {
        let guard = self.inner.lock().unwrap();
        Ok(guard.dataset.get_table(dataset, table_name)?.clone())
    }

    pub fn delete_table(&self, dataset: &str, table_name: &str) -> Result<(), TinyQueryError> {
        self.inner.lock().unwrap().dataset.delete_table(dataset, table_name)
    }

    pub fn run_query_job(
        &self,
        project_id: &str,
        query: &str,
        dest: Option<(&str, &str)>,
        create_disposition: CreateDisposition,
        write_disposition: WriteDisposition,
    ) -> Result<JobInfo, TinyQueryError> {
        let mut guard = self.inner.lock().unwrap();
        let select = Compiler::new(&guard.dataset).compile_text(query)?;
        let result_ctx = Evaluator::new(&guard.dataset).evaluate_select(&select)?;
        let result_table = table_from_context("query_results", &result_ctx);

        if let Some((dest_dataset, dest_table_name)) = dest {
            let dest_full_name = format!("{dest_dataset}.{dest_table_name}");
            copy_table(
                &mut guard.dataset,
                &result_table,
                &dest_full_name,
                create_disposition,
                write_disposition,
            )?;
        }

        let job_id = next_job_id(&mut guard.next_job_num);
        let job_reference = JobReference {
            project_id: project_id.to_string(),
            job_id: job_id.clone(),
        };
        let info = JobInfo {
            state: JobState::Done,
            job_reference,
            total_bytes_processed: Some(0),
        };
        guard.jobs.insert(
            job_id,
            JobRecord::Query {
                info: info.clone(),
                results: result_ctx,
            },
        );
        Ok(info)
    }

    pub fn run_copy_job(
        &self,
        project_id: &str,
        src: (&str, &str),
        dest: (&str, &str),
        create_disposition: CreateDisposition,
        write_disposition: WriteDisposition,
    ) -> Result<JobInfo, TinyQueryError> {
        let mut guard = self.inner.lock().unwrap();
        let src_table = guard.dataset.get_table(src.0, src.1)?.clone();
        let dest_full_name = format!("{}.{}", dest.0, dest.1);
        copy_table(
            &mut guard.dataset,
            &src_table,
            &dest_full_name,
            create_disposition,
            write_disposition,
        )?;

        let job_id = next_job_id(&mut guard.next_job_num);
        let job_reference = JobReference {
            project_id: project_id.to_string(),
            job_id: job_id.clone(),
        };
        let info = JobInfo {
            state: JobState::Done,
            job_reference,
            total_bytes_processed: None,
        };
        guard.jobs.insert(job_id, JobRecord::Copy { info: info.clone() });
        Ok(info)
    }

    pub fn get_job_info(&self, job_id: &str) -> Result<JobInfo, TinyQueryError> {
        let guard = self.inner.lock().unwrap();
        guard
            .jobs
            .get(job_id)
            .map(|record| record.info().clone())
            .ok_or_else(|| TinyQueryError::JobNotFound(job_id.to_string()))
    }

    pub fn get_query_result_table(&self, job_id: &str) -> Result<Table, TinyQueryError> {
        let guard = self.inner.lock().unwrap();
        match guard.jobs.get(job_id) {
            Some(JobRecord::Query { results, .. }) => Ok(table_from_context("query_results", results)),
            Some(JobRecord::Copy { .. }) => Err(TinyQueryError::NotAQueryJob(job_id.to_string())),
            None => Err(TinyQueryError::JobNotFound(job_id.to_string())),
        }
    }
}

fn next_job_id(next_job_num: &mut u64) -> String {
    let job_id = format!("job:{next_job_num}");
    *next_job_num += 1;
    job_id
}

fn table_from_context(table_name: &str, ctx: &Context) -> Table {
    let columns = ctx
        .columns
        .iter()
        .map(|((_, col_name), column)| (col_name.clone(), column.clone()))
        .collect();
    Table {
        name: table_name.to_string(),
        num_rows: ctx.num_rows,
        columns,
    }
}

fn copy_table(
    dataset: &mut Dataset,
    src: &Table,
    dest_full_name: &str,
    create_disposition: CreateDisposition,
    write_disposition: WriteDisposition,
) -> Result<(), TinyQueryError> {
    if !dataset.has_table(dest_full_name) {
        if create_disposition == CreateDisposition::CreateNever {
            return Err(TinyQueryError::CreateNever(dest_full_name.to_string()));
        }
        load_empty_table_from_template(dataset, dest_full_name, src);
    }

    let dest = dataset.get_table_mut(dest_full_name)?;
    if dest.num_rows > 0 {
        if write_disposition == WriteDisposition::WriteEmpty {
            return Err(TinyQueryError::WriteEmptyViolation(dest_full_name.to_string()));
        }
        if write_disposition == WriteDisposition::WriteTruncate {
            clear_table(dest);
        }
    }
    append_to_table(src, dest);
    Ok(())
}

/// Creates a zero-row destination shaped after `template`, with every
/// column forced to NULLABLE (the source's own mode constraints — e.g. a
/// REQUIRED column never having been written to — can't be inferred here).
fn load_empty_table_from_template(dataset: &mut Dataset, table_name: &str, template: &Table) {
    let columns = template
        .columns
        .iter()
        .map(|(name, col)| (name.clone(), Column::empty(col.r#type, Mode::Nullable)))
        .collect();
    dataset.load_table_or_view(Entry::Table(Table {
        name: table_name.to_string(),
        num_rows: 0,
        columns,
    }));
}

fn clear_table(table: &mut Table) {
    table.num_rows = 0;
    for column in table.columns.values_mut() {
        column.values.clear();
    }
}

fn append_to_table(src: &Table, dest: &mut Table) {
    dest.num_rows += src.num_rows;
    for (name, column) in dest.columns.iter_mut() {
        if let Some(src_column) = src.columns.get(name) {
            column.values.extend(src_column.values.iter().cloned());
        } else {
            column
                .values
                .extend(std::iter::repeat_n(Value::null(), src.num_rows));
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TableReference {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShortTableInfo {
    pub table_reference: TableReference,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchemaField {
    pub name: String,
    pub r#type: String,
    pub mode: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableSchemaInfo {
    pub fields: Vec<SchemaField>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableInfo {
    pub schema: TableSchemaInfo,
    pub table_reference: TableReference,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::jobs::{CreateDisposition, WriteDisposition};

    fn load_csv_table(service: &TinyQuery, name: &str, fields_json: &str, csv_text: &str) {
        let schema = TableSchema::from_fields_json(fields_json).unwrap();
        service.load_table_from_csv(name, &schema, csv_text.as_bytes()).unwrap();
    }

    #[test]
    fn query_runs_against_loaded_table() {
        let service = TinyQuery::new();
        load_csv_table(
            &service,
            "dataset.nums",
            r#"[{"name": "n", "type": "INTEGER", "mode": "REQUIRED"}]"#,
            "1\n2\n3\n",
        );

        let result = service.evaluate_query("SELECT SUM(n) FROM dataset.nums").unwrap();
        assert_eq!(result.num_rows, 1);
    }

    #[test]
    fn query_job_copies_into_destination_and_tracks_result() {
        let service = TinyQuery::new();
        load_csv_table(
            &service,
            "dataset.nums",
            r#"[{"name": "n", "type": "INTEGER", "mode": "REQUIRED"}]"#,
            "1\n2\n3\n",
        );

        let info = service
            .run_query_job(
                "proj",
                "SELECT n FROM dataset.nums WHERE n > 1",
                Some(("dataset", "filtered")),
                CreateDisposition::CreateIfNeeded,
                WriteDisposition::WriteEmpty,
            )
            .unwrap();

        let dest = service.get_table("dataset", "filtered").unwrap();
        assert_eq!(dest.num_rows, 2);

        let result_table = service.get_query_result_table(&info.job_reference.job_id).unwrap();
        assert_eq!(result_table.num_rows, 2);
    }

    #[test]
    fn create_never_rejects_missing_destination() {
        let service = TinyQuery::new();
        load_csv_table(
            &service,
            "dataset.nums",
            r#"[{"name": "n", "type": "INTEGER", "mode": "REQUIRED"}]"#,
            "1\n",
        );

        let err = service
            .run_copy_job(
                "proj",
                ("dataset", "nums"),
                ("dataset", "missing"),
                CreateDisposition::CreateNever,
                WriteDisposition::WriteEmpty,
            )
            .unwrap_err();
        assert!(matches!(err, TinyQueryError::CreateNever(_)));
    }

    #[test]
    fn write_empty_rejects_non_empty_destination() {
        let service = TinyQuery::new();
        load_csv_table(
            &service,
            "dataset.nums",
            r#"[{"name": "n", "type": "INTEGER", "mode": "REQUIRED"}]"#,
            "1\n",
        );
        load_csv_table(
            &service,
            "dataset.other",
            r#"[{"name": "n", "type": "INTEGER", "mode": "REQUIRED"}]"#,
            "2\n",
        );

        let err = service
            .run_copy_job(
                "proj",
                ("dataset", "nums"),
                ("dataset", "other"),
                CreateDisposition::CreateIfNeeded,
                WriteDisposition::WriteEmpty,
            )
            .unwrap_err();
        assert!(matches!(err, TinyQueryError::WriteEmptyViolation(_)));
    }

    #[test]
    fn write_truncate_clears_before_append() {
        let service = TinyQuery::new();
        load_csv_table(
            &service,
            "dataset.nums",
            r#"[{"name": "n", "type": "INTEGER", "mode": "REQUIRED"}]"#,
            "1\n2\n",
        );
        load_csv_table(
            &service,
            "dataset.other",
            r#"[{"name": "n", "type": "INTEGER", "mode": "REQUIRED"}]"#,
            "99\n",
        );

        service
            .run_copy_job(
                "proj",
                ("dataset", "nums"),
                ("dataset", "other"),
                CreateDisposition::CreateIfNeeded,
                WriteDisposition::WriteTruncate,
            )
            .unwrap();

        let dest = service.get_table("dataset", "other").unwrap();
        assert_eq!(dest.num_rows, 2);
    }

    #[test]
    fn view_compiles_against_current_tables_and_is_queryable() {
        let service = TinyQuery::new();
        load_csv_table(
            &service,
            "dataset.nums",
            r#"[{"name": "n", "type": "INTEGER", "mode": "REQUIRED"}]"#,
            "1\n2\n3\n",
        );
        service
            .make_view("dataset.big_nums", "SELECT n FROM dataset.nums WHERE n > 1")
            .unwrap();

        let result = service.evaluate_query("SELECT COUNT(*) FROM dataset.big_nums").unwrap();
        assert_eq!(result.num_rows, 1);
    }

    #[test]
    fn make_view_rejects_query_against_unknown_table() {
        let service = TinyQuery::new();
        let err = service.make_view("d.a", "SELECT * FROM d.missing").unwrap_err();
        assert!(matches!(err, TinyQueryError::Compile(_)));
    }

    #[test]
    fn dataset_introspection_lists_tables_sorted() {
        let service = TinyQuery::new();
        load_csv_table(
            &service,
            "dataset.zeta",
            r#"[{"name": "n", "type": "INTEGER", "mode": "REQUIRED"}]"#,
            "1\n",
        );
        load_csv_table(
            &service,
            "dataset.alpha",
            r#"[{"name": "n", "type": "INTEGER", "mode": "REQUIRED"}]"#,
            "1\n",
        );

        let infos = service.get_all_table_info_in_dataset("proj", "dataset");
        let names: Vec<&str> = infos.iter().map(|i| i.table_reference.table_id.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}
