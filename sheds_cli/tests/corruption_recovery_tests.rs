//! Corruption recovery tests for the sheds binary.
//!
//! These tests verify the system can handle:
//! - Unparseable CSV rows in the record logs
//! - Partial writes (truncated last rows)
//! - Corrupted JSON blobs
//! - Missing files

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::Write as IoWrite;
use std::path::Path;
use tempfile::TempDir;

fn cli(data_dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("sheds"));
    cmd.env("XDG_CONFIG_HOME", data_dir.join("settings"))
        .arg("--data-dir")
        .arg(data_dir);
    cmd
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

#[test]
fn test_bad_loan_rows_are_skipped() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    fs::write(
        data_dir.join("loans.csv"),
        "date,item,count,borrower,lender,donation,returned\n\
         2024-06-01T10:00:00Z,Fins 1: Mares Avanti,2,Fred,Ann,0,\n\
         not a date,Fins 1: Mares Avanti,5,Fred,Ann,0,\n\
         2024-06-02T10:00:00Z,Fins 1: Mares Avanti,many,Fred,Ann,0,\n",
    )
    .unwrap();

    cli(data_dir)
        .args(["loan", "on-loan", "Fins 1: Mares Avanti"])
        .assert()
        .success()
        .stdout("2\n");
}

#[test]
fn test_partial_compressor_row() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    cli(data_dir)
        .args(["--operator", "Ann", "compressor", "log", "fixed", "--runtime", "2"])
        .assert()
        .success();

    // Simulate a write cut off half way through a row
    let path = data_dir.join("fixed_compressor.csv");
    let mut file = fs::OpenOptions::new().append(true).open(&path).unwrap();
    write!(file, "2024-06-01T10:00:00Z,Bob").unwrap();
    drop(file);

    cli(data_dir)
        .args(["compressor", "status", "fixed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Runtime: 02:00:00.00"));

    // The next append rewrites the log without the broken row
    cli(data_dir)
        .args(["--operator", "Ann", "compressor", "log", "fixed", "--runtime", "3"])
        .assert()
        .success();
    let log = fs::read_to_string(&path).unwrap();
    assert_eq!(log.lines().count(), 3);
    assert!(!log.contains(",Bob"));
}

#[test]
fn test_corrupted_config_is_an_error() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    fs::write(data_dir.join("config.json"), "{ invalid json }}}}").unwrap();
    cli(data_dir)
        .arg("banks")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Json"));

    fs::write(data_dir.join("config.json"), "[1, 2, 3]").unwrap();
    cli(data_dir)
        .arg("banks")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a JSON object"));
}

#[test]
fn test_partial_config_keeps_defaults() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    fs::write(
        data_dir.join("config.json"),
        r#"{"o2": {"bank": {"1": {"bar": 120}}}}"#,
    )
    .unwrap();

    cli(data_dir)
        .arg("banks")
        .assert()
        .success()
        .stdout(predicate::str::contains("Bank 1: 120 bar, 50.2 L"))
        .stdout(predicate::str::contains("Bank 4: 230 bar"));
}

#[test]
fn test_corrupted_inventory_is_an_error() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    fs::write(data_dir.join("inventory.json"), "[{\"Class\": \"Fins\"").unwrap();
    cli(data_dir).args(["inventory", "show"]).assert().failure();
}

#[test]
fn test_missing_files_mean_empty_records() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().join("never_created");

    cli(&data_dir)
        .args(["loan", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No loans."));
    cli(&data_dir)
        .args(["compressor", "status", "portable"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Filter life remaining: 15:00:00.00"));
    cli(&data_dir).args(["inventory", "show"]).assert().success();

    // Loan validation needs the role lists
    cli(&data_dir)
        .args(["--operator", "Ann", "loan", "add", "--item", "Fins 1: x y", "--borrower", "Fred"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("borrower"));
}
