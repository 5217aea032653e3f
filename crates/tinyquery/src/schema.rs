//! BigQuery-shaped table schemas (`{fields: [{name, type, mode, fields?}]}`)
//! and the schema-to-empty-`Table` builder shared by both loaders.

use serde::Deserialize;
use tinyquery_helpers::IndexMap;
use tinyquery_plan::{Column, Table};
use tinyquery_types::{Mode, PrimitiveType};

use crate::error::TinyQueryError;

#[derive(Debug, Clone, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub r#type: String,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

fn default_mode() -> String {
    "NULLABLE".to_string()
}

/// A table schema as BigQuery's `tables().insert` body carries it: a bare
/// list of field descriptors, not yet validated against `TYPE_SET`/`MODE_SET`.
#[derive(Debug, Clone, Deserialize)]
pub struct TableSchema {
    pub fields: Vec<FieldSchema>,
}

impl TableSchema {
    /// Parses a schema given as the raw JSON fields array, e.g.
    /// `[{"name":"x","type":"INTEGER","mode":"NULLABLE"}]`.
    pub fn from_fields_json(raw: &str) -> Result<TableSchema, TinyQueryError> {
        let fields: Vec<FieldSchema> = serde_json::from_str(raw)?;
        Ok(TableSchema { fields })
    }

    pub fn from_fields_json_file(path: impl AsRef<std::path::Path>) -> Result<TableSchema, TinyQueryError> {
        let raw = std::fs::read_to_string(path)?;
        TableSchema::from_fields_json(&raw)
    }
}

/// Builds a zero-row `Table` from `schema`, flattening nested `RECORD`
/// fields into dotted leaf column names and promoting any field nested under
/// a `REPEATED` ancestor to `REPEATED` regardless of its own declared mode.
pub fn make_empty_table(table_name: &str, schema: &TableSchema) -> Result<Table, TinyQueryError> {
    let mut columns = IndexMap::default();
    for field in &schema.fields {
        collect_columns(field, "", false, &mut columns)?;
    }
    Ok(Table::new(table_name, columns))
}

fn collect_columns(
    field: &FieldSchema,
    prefix: &str,
    ancestor_repeated: bool,
    out: &mut IndexMap<String, Column>,
) -> Result<(), TinyQueryError> {
    let prefixed_name = format!("{prefix}{}", field.name);
    let type_upper = field.r#type.to_ascii_uppercase();
    let mode = parse_mode(&field.mode)?;

    if type_upper == "RECORD" {
        let next_prefix = format!("{prefixed_name}.");
        let next_ancestor_repeated = ancestor_repeated || mode == Mode::Repeated;
        for child in &field.fields {
            collect_columns(child, &next_prefix, next_ancestor_repeated, out)?;
        }
        return Ok(());
    }

    let r#type = parse_type(&type_upper)?;
    let final_mode = if ancestor_repeated { Mode::Repeated } else { mode };
    out.insert(prefixed_name, Column::empty(r#type, final_mode));
    Ok(())
}

pub(crate) fn parse_type(upper: &str) -> Result<PrimitiveType, TinyQueryError> {
    match upper {
        "INTEGER" => Ok(PrimitiveType::Int),
        "FLOAT" => Ok(PrimitiveType::Float),
        "BOOLEAN" => Ok(PrimitiveType::Bool),
        "STRING" => Ok(PrimitiveType::String),
        "TIMESTAMP" => Ok(PrimitiveType::Timestamp),
        other => Err(TinyQueryError::UnknownFieldType(other.to_string())),
    }
}

pub(crate) fn parse_mode(raw: &str) -> Result<Mode, TinyQueryError> {
    match raw.to_ascii_uppercase().as_str() {
        "NULLABLE" => Ok(Mode::Nullable),
        "REQUIRED" => Ok(Mode::Required),
        "REPEATED" => Ok(Mode::Repeated),
        other => Err(TinyQueryError::UnknownFieldMode(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn flattens_nested_record_promoting_repeated_leaves() {
        let schema = TableSchema::from_fields_json(
            r#"[
                {"name": "id", "type": "INTEGER", "mode": "REQUIRED"},
                {"name": "tags", "type": "RECORD", "mode": "REPEATED", "fields": [
                    {"name": "key", "type": "STRING"},
                    {"name": "value", "type": "STRING"}
                ]}
            ]"#,
        )
        .unwrap();

        let table = make_empty_table("t", &schema).unwrap();
        assert_eq!(table.num_rows, 0);
        assert_eq!(table.columns["id"].mode, Mode::Required);
        assert_eq!(table.columns["tags.key"].mode, Mode::Repeated);
        assert_eq!(table.columns["tags.value"].mode, Mode::Repeated);
    }

    #[test]
    fn rejects_unknown_type() {
        let schema =
            TableSchema::from_fields_json(r#"[{"name": "x", "type": "WEIRD"}]"#).unwrap();
        assert!(matches!(
            make_empty_table("t", &schema),
            Err(TinyQueryError::UnknownFieldType(_))
        ));
    }
}
