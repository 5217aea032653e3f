use std::io::Write;

use assert_cmd::Command;

fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

#[test]
fn runs_a_query_against_a_loaded_csv_table() {
    let dir = tempfile::tempdir().unwrap();
    let schema = write_file(
        &dir,
        "schema.json",
        r#"[{"name": "n", "type": "INTEGER", "mode": "REQUIRED"}]"#,
    );
    let data = write_file(&dir, "data.csv", "1\n2\n3\n");

    let mut cmd = Command::cargo_bin("tinyquery").unwrap();
    cmd.arg("--csv")
        .arg(format!("dataset.nums={}:{}", schema.display(), data.display()))
        .arg("--query")
        .arg("SELECT SUM(n) FROM dataset.nums");

    let output = cmd.output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains('6'), "expected a 6 in the rendered table, got:\n{stdout}");
}

#[test]
fn missing_query_flag_is_an_error() {
    let mut cmd = Command::cargo_bin("tinyquery").unwrap();
    let output = cmd.output().unwrap();
    assert!(!output.status.success());
}

#[test]
fn unknown_table_in_query_is_an_error() {
    let mut cmd = Command::cargo_bin("tinyquery").unwrap();
    cmd.arg("--query").arg("SELECT * FROM dataset.missing");

    let output = cmd.output().unwrap();
    assert!(!output.status.success());
}
