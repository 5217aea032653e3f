//! Loads a table from header-less, unquoted CSV text: one row per line,
//! fields comma-delimited in schema column order. CSV has no native null
//! value, so the literal token `null` in a NULLABLE column means null;
//! every other token is cast via the column's declared type.

use std::io::Read;

use tinyquery_plan::Table;
use tinyquery_types::{cast_scalar, Mode, Value};

use crate::error::TinyQueryError;
use crate::schema::{make_empty_table, TableSchema};

pub fn load_table_from_csv(
    table_name: &str,
    schema: &TableSchema,
    reader: impl Read,
) -> Result<Table, TinyQueryError> {
    let mut table = make_empty_table(table_name, schema)?;
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b',')
        .quoting(false)
        .flexible(true)
        .from_reader(reader);

    for record in csv_reader.records() {
        let record = record?;
        if record.len() != table.columns.len() {
            return Err(TinyQueryError::Malformed(format!(
                "expected {} tokens per row, got {}: {record:?}",
                table.columns.len(),
                record.len(),
            )));
        }
        for (token, column) in record.iter().zip(table.columns.values_mut()) {
            let value = if token == "null" && column.mode == Mode::Nullable {
                Value::Scalar(None)
            } else {
                Value::Scalar(Some(cast_scalar(column.r#type, token)?))
            };
            if !column.mode.matches(&value) {
                return Err(TinyQueryError::BadToken {
                    mode: column.mode,
                    value: token.to_string(),
                });
            }
            column.values.push(value);
        }
        table.num_rows += 1;
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tinyquery_types::ScalarValue;

    use super::*;

    #[test]
    fn loads_rows_and_honors_null_sentinel() {
        let schema = TableSchema::from_fields_json(
            r#"[
                {"name": "id", "type": "INTEGER", "mode": "REQUIRED"},
                {"name": "name", "type": "STRING", "mode": "NULLABLE"}
            ]"#,
        )
        .unwrap();
        let csv_text = "1,alice\n2,null\n";

        let table = load_table_from_csv("t", &schema, csv_text.as_bytes()).unwrap();

        assert_eq!(table.num_rows, 2);
        assert_eq!(
            table.columns["id"].values,
            vec![
                Value::Scalar(Some(ScalarValue::Int(1))),
                Value::Scalar(Some(ScalarValue::Int(2))),
            ]
        );
        assert_eq!(
            table.columns["name"].values,
            vec![
                Value::Scalar(Some(ScalarValue::String("alice".to_string()))),
                Value::Scalar(None),
            ]
        );
    }

    #[test]
    fn rejects_wrong_field_count() {
        let schema = TableSchema::from_fields_json(
            r#"[{"name": "id", "type": "INTEGER", "mode": "REQUIRED"}]"#,
        )
        .unwrap();
        let csv_text = "1,2\n";
        assert!(matches!(
            load_table_from_csv("t", &schema, csv_text.as_bytes()),
            Err(TinyQueryError::Malformed(_))
        ));
    }
}
