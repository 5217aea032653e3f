//! Loads a table stored as newline-delimited JSON, one object per line,
//! against a BigQuery-shaped nested schema. Record fields are flattened into
//! dotted-prefix leaf columns before being appended; a field nested under a
//! `REPEATED` ancestor becomes `REPEATED` at the leaf even if its own
//! declared mode is not, and its values concatenate in source array order.

use std::io::BufRead;

use serde_json::Value as Json;
use tinyquery_helpers::IndexMap;
use tinyquery_plan::Table;
use tinyquery_types::{cast_scalar, Mode, PrimitiveType, ScalarValue, Value};

use crate::error::TinyQueryError;
use crate::schema::{make_empty_table, FieldSchema, TableSchema};

pub fn load_table_from_ndjson(
    table_name: &str,
    schema: &TableSchema,
    reader: impl BufRead,
) -> Result<Table, TinyQueryError> {
    let mut table = make_empty_table(table_name, schema)?;

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row: Json = serde_json::from_str(&line)?;
        let mut flattened = IndexMap::default();
        flatten_row(&mut flattened, &row, &schema.fields, "", false);
        process_row(&mut table, &flattened)?;
        table.num_rows += 1;
    }
    Ok(table)
}

/// Flattens one JSON record into `output`, a map of dotted leaf column name
/// to the raw JSON value that belongs in that column (a bare scalar, `null`,
/// or — for REPEATED columns — a JSON array of scalars).
fn flatten_row(output: &mut IndexMap<String, Json>, row: &Json, fields: &[FieldSchema], prefix: &str, ever_repeated: bool) {
    let row_obj = row.as_object();
    for field in fields {
        let type_upper = field.r#type.to_ascii_uppercase();
        let field_is_repeated = field.mode.eq_ignore_ascii_case("REPEATED");

        if type_upper == "RECORD" {
            let raw_value = row_obj.and_then(|o| o.get(&field.name));
            let next_values: Vec<Json> = if field_is_repeated {
                match raw_value {
                    Some(Json::Array(items)) if !items.is_empty() => items.clone(),
                    _ => vec![Json::Object(Default::default())],
                }
            } else {
                match raw_value {
                    Some(v) if !v.is_null() => vec![v.clone()],
                    _ => vec![Json::Object(Default::default())],
                }
            };
            let next_prefix = format!("{prefix}{}.", field.name);
            let next_ever_repeated = ever_repeated || field_is_repeated;
            for value in &next_values {
                flatten_row(output, value, &field.fields, &next_prefix, next_ever_repeated);
            }
        } else {
            let full_name = format!("{prefix}{}", field.name);
            if ever_repeated || field_is_repeated {
                let entry = output
                    .entry(full_name)
                    .or_insert_with(|| Json::Array(Vec::new()));
                let Json::Array(items) = entry else {
                    unreachable!("flatten_row only ever stores arrays for repeated columns")
                };
                if field_is_repeated {
                    if let Some(Json::Array(values)) = row_obj.and_then(|o| o.get(&field.name)) {
                        items.extend(values.iter().cloned());
                    }
                } else if let Some(v) = row_obj.and_then(|o| o.get(&field.name)) {
                    if !v.is_null() {
                        items.push(v.clone());
                    }
                }
            } else {
                let v = row_obj
                    .and_then(|o| o.get(&field.name))
                    .cloned()
                    .unwrap_or(Json::Null);
                output.insert(full_name, v);
            }
        }
    }
}

fn process_row(table: &mut Table, flattened: &IndexMap<String, Json>) -> Result<(), TinyQueryError> {
    for (key, value) in flattened {
        let column = table
            .columns
            .get_mut(key)
            .ok_or_else(|| TinyQueryError::Malformed(format!("unexpected field in row: {key}")))?;
        let cast = run_cast_function(column.r#type, column.mode, value)?;
        if !column.mode.matches(&cast) {
            return Err(TinyQueryError::BadToken {
                mode: column.mode,
                value: value.to_string(),
            });
        }
        column.values.push(cast);
    }
    Ok(())
}

fn run_cast_function(r#type: PrimitiveType, mode: Mode, value: &Json) -> Result<Value, TinyQueryError> {
    if mode == Mode::Repeated {
        let items = match value {
            Json::Array(items) => items.as_slice(),
            _ => &[],
        };
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            if item.is_null() {
                out.push(None);
            } else {
                out.push(Some(cast_json_scalar(r#type, item)?));
            }
        }
        return Ok(Value::Repeated(out));
    }
    if value.is_null() {
        return Ok(Value::Scalar(None));
    }
    Ok(Value::Scalar(Some(cast_json_scalar(r#type, value)?)))
}

fn cast_json_scalar(r#type: PrimitiveType, value: &Json) -> Result<ScalarValue, TinyQueryError> {
    let raw = match value {
        Json::String(s) => s.clone(),
        Json::Number(n) => n.to_string(),
        Json::Bool(b) => b.to_string(),
        other => other.to_string(),
    };
    Ok(cast_scalar(r#type, &raw)?)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn flattens_repeated_record_and_fills_missing_keys_with_null() {
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
        let lines = "\
            {\"id\": 1, \"tags\": [{\"key\": \"a\", \"value\": \"1\"}, {\"key\": \"b\", \"value\": \"2\"}]}\n\
            {\"id\": 2}\n";

        let table = load_table_from_ndjson("t", &schema, lines.as_bytes()).unwrap();

        assert_eq!(table.num_rows, 2);
        assert_eq!(
            table.columns["id"].values,
            vec![
                Value::Scalar(Some(ScalarValue::Int(1))),
                Value::Scalar(Some(ScalarValue::Int(2))),
            ]
        );
        let Value::Repeated(row0_keys) = &table.columns["tags.key"].values[0] else {
            panic!("expected a repeated value");
        };
        assert_eq!(
            row0_keys,
            &vec![
                Some(ScalarValue::String("a".to_string())),
                Some(ScalarValue::String("b".to_string())),
            ]
        );
        let Value::Repeated(row1_keys) = &table.columns["tags.key"].values[1] else {
            panic!("expected a repeated value");
        };
        assert!(row1_keys.is_empty());
    }

    #[test]
    fn scalar_leaf_defaults_missing_to_null() {
        let schema = TableSchema::from_fields_json(
            r#"[{"name": "name", "type": "STRING", "mode": "NULLABLE"}]"#,
        )
        .unwrap();
        let table = load_table_from_ndjson("t", &schema, "{}\n".as_bytes()).unwrap();
        assert_eq!(table.columns["name"].values, vec![Value::Scalar(None)]);
    }
}
