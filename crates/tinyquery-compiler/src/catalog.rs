//! The name-resolution surface the compiler needs from the facade crate's
//! dataset: look up a table or view by its fully-qualified name.

use tinyquery_plan::{Table, View};

use crate::error::CompileError;

pub enum CatalogEntry<'a> {
    Table(&'a Table),
    View(&'a View),
}

pub trait Catalog {
    fn lookup(&self, name: &str) -> Result<CatalogEntry<'_>, CompileError>;
}
