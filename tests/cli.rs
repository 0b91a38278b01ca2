mod common;

use std::fs;

use assert_cmd::Command;
use common::TestWorkspace;
use predicates::prelude::*;
use predicates::str::contains;

const SCHEMA: &str = r##"
columns:
  - name: id
    datatype: integer
    required: true
  - name: name
    datatype: string
    not_blank: true
  - name: amount
    datatype: decimal
    format: "#,##0.00"
  - name: active
    datatype: boolean
    format: "yes|no"
    flags: [strict]
  - name: ordered_on
    datatype: date
"##;

const ORDERS: &str = "\
id,name,amount,active,ordered_on
1,Alice,\"1,200.50\",yes,2024-01-01
2,\"Bob \"\"B\"\" Smith\",13.37,no,2024-01-03

3,Carol,7,YES,
";

fn csv_mapper() -> Command {
    let mut cmd = Command::cargo_bin("csv-mapper").expect("binary exists");
    cmd.env("RUST_LOG", "error");
    cmd
}

#[test]
fn header_prints_quoted_names_in_schema_order() {
    let workspace = TestWorkspace::new();
    let schema = workspace.write("orders.yml", SCHEMA);
    csv_mapper()
        .args(["header", "-s", schema.to_str().unwrap()])
        .assert()
        .success()
        .stdout("\"id\",\"name\",\"amount\",\"active\",\"ordered_on\"\n");

    csv_mapper()
        .args(["header", "-s", schema.to_str().unwrap(), "--delimiter", "tab"])
        .assert()
        .success()
        .stdout("\"id\"\t\"name\"\t\"amount\"\t\"active\"\t\"ordered_on\"\n");
}

#[test]
fn verify_accepts_a_conforming_file() {
    let workspace = TestWorkspace::new();
    let schema = workspace.write("orders.yml", SCHEMA);
    let input = workspace.write("orders.csv", ORDERS);
    csv_mapper()
        .args([
            "verify",
            "-s",
            schema.to_str().unwrap(),
            "-i",
            input.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn verify_reports_every_rejected_line() {
    let workspace = TestWorkspace::new();
    let schema = workspace.write("orders.yml", SCHEMA);
    let input = workspace.write(
        "bad.csv",
        "id,name,amount,active,ordered_on\nx,Alice,1,yes,2024-01-01\n2,,1,no,2024-01-02\n3,Carol,1,maybe,2024-01-03\n4,Dan,1,no,2024-01-04\n",
    );
    csv_mapper()
        .args([
            "verify",
            "-s",
            schema.to_str().unwrap(),
            "-i",
            input.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stdout(contains(":2:0: INVALID_FORMAT [id]"))
        .stdout(contains(":3:2: MUST_NOT_BE_BLANK [name]"))
        .stdout(contains(":4:10: INVALID_FORMAT [active]"))
        .stderr(contains("3 invalid line(s) in 1 file(s)"));
}

#[test]
fn verify_json_output_and_fail_fast() {
    let workspace = TestWorkspace::new();
    let schema = workspace.write("orders.yml", SCHEMA);
    let input = workspace.write(
        "bad.csv",
        "id,name,amount,active,ordered_on\n1,Alice,1,yes,2024-13-01\n2,Bob,1,no\n",
    );

    let output = csv_mapper()
        .args([
            "verify",
            "--json",
            "-s",
            schema.to_str().unwrap(),
            "-i",
            input.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();
    let reports = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap())
        .collect::<Vec<_>>();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["kind"], "INVALID_FORMAT");
    assert_eq!(reports[0]["column"], "ordered_on");
    assert_eq!(reports[0]["line_number"], 2);
    assert_eq!(reports[1]["kind"], "TOO_FEW_COLUMNS");

    csv_mapper()
        .args([
            "verify",
            "--fail-fast",
            "-s",
            schema.to_str().unwrap(),
            "-i",
            input.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(contains("INVALID_FORMAT at line 2"));
}

#[test]
fn verify_rejects_a_header_out_of_order() {
    let workspace = TestWorkspace::new();
    let schema = workspace.write("orders.yml", SCHEMA);
    let input = workspace.write(
        "swapped.csv",
        "name,id,amount,active,ordered_on\nAlice,1,1,yes,2024-01-01\n",
    );
    csv_mapper()
        .args([
            "verify",
            "-s",
            schema.to_str().unwrap(),
            "-i",
            input.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stdout(contains("INVALID_HEADER [id]"));
}

#[test]
fn normalize_rewrites_values_and_quoting() {
    let workspace = TestWorkspace::new();
    let schema = workspace.write("orders.yml", SCHEMA);
    let input = workspace.write("orders.csv", ORDERS);
    let output = workspace.path().join("normalized.csv");
    csv_mapper()
        .args([
            "normalize",
            "-s",
            schema.to_str().unwrap(),
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--output-delimiter",
            ";",
        ])
        .assert()
        .success();

    let written = fs::read_to_string(&output).expect("read normalized output");
    assert_eq!(
        written,
        "\"id\";\"name\";\"amount\";\"active\";\"ordered_on\"\n\
         1;\"Alice\";\"1,200.50\";yes;2024-01-01\n\
         2;\"Bob \"\"B\"\" Smith\";\"13.37\";no;2024-01-03\n\
         3;\"Carol\";\"7.00\";yes;\n"
    );
}

#[test]
fn normalize_drops_invalid_lines_unless_fail_fast() {
    let workspace = TestWorkspace::new();
    let schema = workspace.write("orders.yml", SCHEMA);
    let input = workspace.write(
        "mixed.csv",
        "id,name,amount,active,ordered_on\n1,A,1,yes,\nbad,B,1,no,\n",
    );
    csv_mapper()
        .args([
            "normalize",
            "--no-header",
            "--line-ending",
            "crlf",
            "-s",
            schema.to_str().unwrap(),
            "-i",
            input.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout("1,\"A\",\"1.00\",yes,\r\n");

    csv_mapper()
        .args([
            "normalize",
            "--fail-fast",
            "-s",
            schema.to_str().unwrap(),
            "-i",
            input.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(contains("line 3"));
}

#[test]
fn normalize_reads_stdin_and_transcodes() {
    let workspace = TestWorkspace::new();
    let schema = workspace.write("orders.yml", SCHEMA);
    let output = workspace.path().join("latin1.csv");
    csv_mapper()
        .args([
            "normalize",
            "-s",
            schema.to_str().unwrap(),
            "-i",
            "-",
            "-o",
            output.to_str().unwrap(),
            "--no-header",
            "--output-encoding",
            "windows-1252",
        ])
        .write_stdin("id,name,amount,active,ordered_on\n1,Zoë,2,no,2024-02-29\n")
        .assert()
        .success();
    let bytes = fs::read(&output).expect("read transcoded output");
    assert_eq!(bytes, b"1,\"Zo\xeb\",\"2.00\",no,2024-02-29\n");
}

#[test]
fn normalized_multi_line_cells_verify_cleanly() {
    let workspace = TestWorkspace::new();
    let schema = workspace.write("orders.yml", SCHEMA);
    let input = workspace.write(
        "notes.csv",
        "id,name,amount,active,ordered_on\n1,\"two\nlines\",1,yes,\n2,Dan,2,no,\n",
    );
    let output = workspace.path().join("notes-normalized.csv");
    csv_mapper()
        .args([
            "normalize",
            "-s",
            schema.to_str().unwrap(),
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ])
        .assert()
        .success();
    let written = fs::read_to_string(&output).expect("read normalized output");
    assert!(written.contains("1,\"two\nlines\",\"1.00\",yes,\n2,"));

    csv_mapper()
        .args([
            "verify",
            "-s",
            schema.to_str().unwrap(),
            "-i",
            output.to_str().unwrap(),
        ])
        .assert()
        .success();
}

#[test]
fn preview_renders_a_table() {
    let workspace = TestWorkspace::new();
    let schema = workspace.write("orders.yml", SCHEMA);
    let input = workspace.write("orders.csv", ORDERS);
    csv_mapper()
        .args([
            "preview",
            "-s",
            schema.to_str().unwrap(),
            "-i",
            input.to_str().unwrap(),
            "--rows",
            "2",
        ])
        .assert()
        .success()
        .stdout(contains("id   name"))
        .stdout(contains("Alice"))
        .stdout(contains("1200.5"))
        .stdout(contains("Bob \"B\" Smith"))
        .stdout(contains("Carol").not());
}

#[test]
fn unknown_schema_fields_fail_cleanly() {
    let workspace = TestWorkspace::new();
    let schema = workspace.write(
        "broken.yml",
        "columns:\n  - name: id\n    datatype: integer\n    flavour: salty\n",
    );
    csv_mapper()
        .args(["header", "-s", schema.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("Parsing schema YAML"));
}
