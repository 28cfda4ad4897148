//! CLI integration tests for sqlite-pg-copy.
//!
//! These tests cover argument parsing, help output, exit codes and
//! end-to-end copies into SQLite destinations.

use assert_cmd::Command;
use predicates::prelude::*;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Get a command for the sqlite-pg-copy binary.
fn cmd() -> Command {
    Command::cargo_bin("sqlite-pg-copy").unwrap()
}

async fn circuits_db(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("wholebif.db");
    let mut conn = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true)
        .connect()
        .await
        .unwrap();
    sqlx::raw_sql(
        r#"CREATE TABLE Circuits (circuit_id INTEGER PRIMARY KEY, names TEXT NOT NULL);
           CREATE TABLE "References" (reference_id INTEGER PRIMARY KEY, doi TEXT, bibtex TEXT);
           CREATE TABLE Connections (
               id INTEGER PRIMARY KEY,
               circuit_id INTEGER REFERENCES Circuits(circuit_id),
               receiver_id INTEGER REFERENCES Circuits(circuit_id),
               connection_flag BOOLEAN
           );
           INSERT INTO Circuits VALUES (1, 'A'), (2, 'B'), (3, 'C');
           INSERT INTO "References" VALUES (1, '10.1000/x', '@article{x,}');
           INSERT INTO Connections VALUES (1, 1, 2, 1), (2, 2, 3, 0);"#,
    )
    .execute(&mut conn)
    .await
    .unwrap();
    conn.close().await.unwrap();
    path
}

fn sqlite_uri(path: &Path) -> String {
    format!("sqlite://{}", path.display())
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_flags() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--sqlite"))
        .stdout(predicate::str::contains("--pg"))
        .stdout(predicate::str::contains("--chunk"))
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--verify"))
        .stdout(predicate::str::contains("--no-foreign-keys"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sqlite-pg-copy"));
}

#[test]
fn test_log_flags_have_defaults() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-json"))
        .stdout(predicate::str::contains("--progress"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("[default: info]"));
}

// =============================================================================
// Exit Code Tests
// =============================================================================

#[test]
fn test_missing_destination_exits_with_code_1() {
    cmd()
        .args(["--sqlite", "wholebif.db"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--pg"));
}

#[test]
fn test_zero_chunk_exits_with_code_1() {
    cmd()
        .args(["--sqlite", "a.db", "--pg", "sqlite://b.db", "--chunk", "0"])
        .assert()
        .code(1);
}

#[test]
fn test_unsupported_scheme_exits_with_code_1() {
    cmd()
        .args(["--sqlite", "a.db", "--pg", "mysql://localhost/db"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unsupported target scheme"));
}

#[test]
fn test_missing_source_exits_with_code_1() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("copy.db");

    cmd()
        .args([
            "--sqlite",
            dir.path().join("missing.db").to_str().unwrap(),
            "--pg",
            &sqlite_uri(&dest),
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Connection to source failed"));

    assert!(!dest.exists());
}

#[test]
fn test_invalid_yaml_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap()])
        .assert()
        .code(1);
}

#[test]
fn test_missing_config_file_exits_with_code_1() {
    cmd()
        .args(["--config", "nonexistent_config_file.yaml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("IO error"));
}

// =============================================================================
// Copy Tests
// =============================================================================

#[tokio::test]
async fn test_copy_outputs_json_result() {
    let dir = TempDir::new().unwrap();
    let source = circuits_db(&dir).await;
    let dest = dir.path().join("copy.db");

    let output = cmd()
        .args([
            "--sqlite",
            source.to_str().unwrap(),
            "--pg",
            &sqlite_uri(&dest),
            "--chunk",
            "2",
            "--verify",
            "--output-json",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let result: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(result["status"], "completed");
    assert_eq!(result["tables_total"], 3);
    assert_eq!(result["rows_transferred"], 6);
    assert_eq!(result["verified"], true);

    let order: Vec<&str> = result["tables"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(order, vec!["Circuits", "Connections", "References"]);
}

#[tokio::test]
async fn test_copy_prints_summary() {
    let dir = TempDir::new().unwrap();
    let source = circuits_db(&dir).await;
    let dest = dir.path().join("copy.db");

    cmd()
        .args(["--sqlite", source.to_str().unwrap(), "--pg", &sqlite_uri(&dest)])
        .assert()
        .success()
        .stdout(predicate::str::contains("Copy completed!"))
        .stdout(predicate::str::contains("Rows: 6"));

    assert!(dest.exists());
}

#[tokio::test]
async fn test_progress_lines_on_stderr() {
    let dir = TempDir::new().unwrap();
    let source = circuits_db(&dir).await;
    let dest = dir.path().join("copy.db");

    cmd()
        .args([
            "--sqlite",
            source.to_str().unwrap(),
            "--pg",
            &sqlite_uri(&dest),
            "--chunk",
            "2",
            "--progress",
            "--verbosity",
            "error",
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains(
            r#"{"event":"batch","table":"Circuits","copied":2,"total":3,"batches":1}"#,
        ))
        .stderr(predicate::str::contains(r#"{"event":"phase","phase":"finished"}"#));
}

#[tokio::test]
async fn test_dry_run_leaves_destination_alone() {
    let dir = TempDir::new().unwrap();
    let source = circuits_db(&dir).await;
    let dest = dir.path().join("copy.db");

    cmd()
        .args([
            "--sqlite",
            source.to_str().unwrap(),
            "--pg",
            &sqlite_uri(&dest),
            "--dry-run",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("1. Circuits (3 rows, 1 batches)"))
        .stdout(predicate::str::contains("depends on: Circuits"))
        .stdout(predicate::str::contains("CREATE TABLE IF NOT EXISTS \"References\""));

    assert!(!dest.exists());
}

#[tokio::test]
async fn test_config_file_with_flag_override() {
    let dir = TempDir::new().unwrap();
    let source = circuits_db(&dir).await;
    let dest = dir.path().join("copy.db");

    let config_path = dir.path().join("copy.yaml");
    std::fs::write(
        &config_path,
        format!(
            "source:\n  path: {}\ntarget:\n  uri: {}\ncopy:\n  chunk_size: 1\n",
            source.display(),
            sqlite_uri(&dest)
        ),
    )
    .unwrap();

    let output = cmd()
        .args([
            "--config",
            config_path.to_str().unwrap(),
            "--chunk",
            "2",
            "--output-json",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let result: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(result["tables"][0]["name"], "Circuits");
    assert_eq!(result["tables"][0]["batches"], 2);
}
