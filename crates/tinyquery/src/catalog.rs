//! The in-memory store of tables and views, keyed by fully-qualified
//! `dataset.table` name. Implements both the compiler's name-resolution
//! trait and the evaluator's table-lookup trait, so the two pipeline stages
//! share a single source of truth without either depending on the other.

use tinyquery_compiler::{Catalog, CatalogEntry};
use tinyquery_eval::TableProvider;
use tinyquery_helpers::IndexMap;
use tinyquery_plan::{Table, View};

use crate::error::TinyQueryError;

pub enum Entry {
    Table(Table),
    View(View),
}

impl Entry {
    pub fn name(&self) -> &str {
        match self {
            Entry::Table(t) => &t.name,
            Entry::View(v) => &v.name,
        }
    }
}

#[derive(Default)]
pub(crate) struct Dataset {
    tables_by_name: IndexMap<String, Entry>,
}

impl Dataset {
    pub(crate) fn load_table_or_view(&mut self, entry: Entry) {
        self.tables_by_name.insert(entry.name().to_string(), entry);
    }

    pub(crate) fn get_table(&self, dataset: &str, table_name: &str) -> Result<&Table, TinyQueryError> {
        let full_name = format!("{dataset}.{table_name}");
        match self.tables_by_name.get(&full_name) {
            Some(Entry::Table(t)) => Ok(t),
            _ => Err(TinyQueryError::TableNotFound(full_name)),
        }
    }

    pub(crate) fn get_table_mut(
        &mut self,
        full_name: &str,
    ) -> Result<&mut Table, TinyQueryError> {
        match self.tables_by_name.get_mut(full_name) {
            Some(Entry::Table(t)) => Ok(t),
            _ => Err(TinyQueryError::TableNotFound(full_name.to_string())),
        }
    }

    pub(crate) fn has_table(&self, full_name: &str) -> bool {
        matches!(self.tables_by_name.get(full_name), Some(Entry::Table(_)))
    }

    pub(crate) fn delete_table(&mut self, dataset: &str, table_name: &str) -> Result<(), TinyQueryError> {
        let full_name = format!("{dataset}.{table_name}");
        self.tables_by_name
            .shift_remove(&full_name)
            .map(|_| ())
            .ok_or(TinyQueryError::TableNotFound(full_name))
    }

    /// Names of every table/view whose fully-qualified name starts with
    /// `"{dataset}."`, with that prefix stripped.
    pub(crate) fn table_names_for_dataset(&self, dataset: &str) -> Vec<String> {
        let prefix = format!("{dataset}.");
        self.tables_by_name
            .keys()
            .filter_map(|full| full.strip_prefix(prefix.as_str()).map(str::to_string))
            .collect()
    }
}

impl Catalog for Dataset {
    fn lookup(&self, name: &str) -> Result<CatalogEntry<'_>, tinyquery_compiler::CompileError> {
        match self.tables_by_name.get(name) {
            Some(Entry::Table(t)) => Ok(CatalogEntry::Table(t)),
            Some(Entry::View(v)) => Ok(CatalogEntry::View(v)),
            None => Err(tinyquery_compiler::CompileError::TableNotFound(
                name.to_string(),
            )),
        }
    }
}

impl TableProvider for Dataset {
    fn table(&self, name: &str) -> Option<&Table> {
        match self.tables_by_name.get(name) {
            Some(Entry::Table(t)) => Some(t),
            _ => None,
        }
    }
}
