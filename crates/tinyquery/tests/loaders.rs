//! Loader tests against golden fixture files under `tests/fixtures/`, plus
//! one scratch-file round trip exercising the facade end to end through a
//! real file on disk (per the ambient test-tooling conventions, `tempfile`
//! stands in for a file a caller would otherwise hand the loader).

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

use pretty_assertions::assert_eq;
use tinyquery::TableSchema;
use tinyquery_types::{ScalarValue, Value};

fn fixture(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

#[test]
fn csv_fixture_honors_null_sentinel_for_nullable_floats() {
    let schema = TableSchema::from_fields_json_file(fixture("widgets.schema.json")).unwrap();
    let file = File::open(fixture("widgets.csv")).unwrap();
    let table = tinyquery::load_table_from_csv("widgets", &schema, file).unwrap();

    assert_eq!(table.num_rows, 3);
    assert_eq!(
        table.columns["name"].values[1],
        Value::Scalar(Some(ScalarValue::String("gasket".to_string())))
    );
    assert_eq!(table.columns["weight_kg"].values[1], Value::Scalar(None));
    assert_eq!(
        table.columns["weight_kg"].values[2],
        Value::Scalar(Some(ScalarValue::Float(1.5)))
    );
}

#[test]
fn ndjson_fixture_flattens_nested_customer_and_repeated_line_items() {
    let schema = TableSchema::from_fields_json_file(fixture("orders.schema.json")).unwrap();
    let file = File::open(fixture("orders.ndjson")).unwrap();
    let table = tinyquery::load_table_from_ndjson("orders", &schema, BufReader::new(file)).unwrap();

    assert_eq!(table.num_rows, 2);
    assert_eq!(
        table.columns["customer.name"].values,
        vec![
            Value::Scalar(Some(ScalarValue::String("Ada".to_string()))),
            Value::Scalar(Some(ScalarValue::String("Grace".to_string()))),
        ]
    );
    // Grace's order has no "tier" key at all; the leaf defaults to null
    // rather than rejecting the row.
    assert_eq!(table.columns["customer.tier"].values[1], Value::Scalar(None));

    let Value::Repeated(skus) = &table.columns["line_items.sku"].values[0] else {
        panic!("expected line_items.sku to be REPEATED");
    };
    assert_eq!(
        skus,
        &vec![
            Some(ScalarValue::String("A1".to_string())),
            Some(ScalarValue::String("B2".to_string())),
        ]
    );
}

#[test]
fn scratch_csv_file_round_trips_through_the_service() {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("nums.csv");
    let mut f = File::create(&csv_path).unwrap();
    writeln!(f, "1\n2\n3").unwrap();
    drop(f);

    let schema =
        TableSchema::from_fields_json(r#"[{"name": "n", "type": "INTEGER", "mode": "REQUIRED"}]"#).unwrap();
    let service = tinyquery::TinyQuery::new();
    service
        .load_table_from_csv("d.nums", &schema, File::open(&csv_path).unwrap())
        .unwrap();

    let ctx = service.evaluate_query("SELECT COUNT(*) FROM d.nums").unwrap();
    assert_eq!(ctx.num_rows, 1);
}
