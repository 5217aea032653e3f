use tinyquery_helpers::IndexMap;
use tinyquery_types::{Mode, PrimitiveType, Value};

/// A single named, typed, mode-tagged sequence of values, all the same
/// length as the row-set (Table or Context) it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub r#type: PrimitiveType,
    pub mode: Mode,
    pub values: Vec<Value>,
}

impl Column {
    pub fn empty(r#type: PrimitiveType, mode: Mode) -> Column {
        Column {
            r#type,
            mode,
            values: Vec::new(),
        }
    }

    pub fn empty_like(other: &Column) -> Column {
        Column::empty(other.r#type, other.mode)
    }
}

/// A named, in-memory table: an ordered set of columns sharing a row count.
#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub num_rows: usize,
    pub columns: IndexMap<String, Column>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: IndexMap<String, Column>) -> Table {
        let num_rows = columns
            .values()
            .next()
            .map(|c| c.values.len())
            .unwrap_or(0);
        for (name, col) in &columns {
            assert_eq!(
                col.values.len(),
                num_rows,
                "column {name} had {} rows, expected {num_rows}",
                col.values.len()
            );
        }
        Table {
            name: name.into(),
            num_rows,
            columns,
        }
    }
}

/// A named view: its query text is re-parsed and re-compiled whenever it's
/// referenced, so it always reflects any schema changes to the tables it
/// selects from.
#[derive(Debug, Clone)]
pub struct View {
    pub name: String,
    pub query_text: String,
}
