//! Integration tests for the sheds binary.
//!
//! These tests verify end-to-end behavior including:
//! - Blend planning, committing fills and bank levels
//! - Compressor logging and filter life
//! - Loans, roles and inventory availability
//! - Club config persistence

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create a test data directory
fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// CLI bound to a scratch data directory, with local settings isolated
fn cli(dir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("sheds"));
    cmd.env("XDG_CONFIG_HOME", dir.path().join("settings"))
        .arg("--data-dir")
        .arg(dir.path().join("data"));
    cmd
}

fn setup_roles(dir: &TempDir) {
    cli(dir)
        .args(["roles", "set", "member", "Fred", "Gina"])
        .assert()
        .success();
    cli(dir)
        .args(["roles", "set", "operator", "Ann"])
        .assert()
        .success();
}

#[test]
fn test_cli_help() {
    Command::new(assert_cmd::cargo::cargo_bin!("sheds"))
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Dive club shed manager"));
}

#[test]
fn test_blend_preview_leaves_banks_alone() {
    let dir = setup_test_dir();

    cli(&dir)
        .args(["blend", "--target-mix", "32"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Add 891 litres of O2 from bank 1"))
        .stdout(predicate::str::contains("Top off with 158 bar of air"))
        .stdout(predicate::str::contains("Pay 13.36"))
        .stdout(predicate::str::contains("MOD at ppO2 1.4: 33 m"));

    assert!(!dir.path().join("data/nitrox.csv").exists());
    cli(&dir)
        .arg("banks")
        .assert()
        .success()
        .stdout(predicate::str::contains("Bank 1: 96 bar"));
}

#[test]
fn test_blend_commit_records_fill() {
    let dir = setup_test_dir();

    cli(&dir)
        .args(["blend", "--target-mix", "32", "--commit", "--blender", "Ann"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Fill recorded"));

    let log = fs::read_to_string(dir.path().join("data/nitrox.csv")).unwrap();
    assert_eq!(log.lines().count(), 2);
    assert!(log.lines().nth(1).unwrap().contains(",Ann,1,"));

    cli(&dir)
        .arg("banks")
        .assert()
        .success()
        .stdout(predicate::str::contains("Bank 1: 78 bar"));
}

#[test]
fn test_blend_json_output() {
    let dir = setup_test_dir();

    let output = cli(&dir)
        .args(["blend", "--target-mix", "32", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(plan["feasible"], true);
    assert_eq!(plan["actions"][0]["action"], "AddFromBank");
    assert_eq!(plan["actions"].as_array().unwrap().len(), 3);
}

#[test]
fn test_blend_infeasible() {
    let dir = setup_test_dir();

    cli(&dir)
        .args(["--operator", "Ann", "fix-bank", "1", "1"])
        .assert()
        .success();

    cli(&dir)
        .args(["blend", "--target-mix", "32", "--bank", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Blend not feasible"));

    cli(&dir)
        .args(["blend", "--target-mix", "32", "--bank", "1", "--commit", "--blender", "Ann"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("InfeasibleBlend"));

    // Only the fix-bank row was logged
    let log = fs::read_to_string(dir.path().join("data/nitrox.csv")).unwrap();
    assert_eq!(log.lines().count(), 2);
}

#[test]
fn test_blend_rejects_unknown_bank() {
    let dir = setup_test_dir();

    cli(&dir)
        .args(["blend", "--target-mix", "32", "--bank", "9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No O2 bank 9"));
}

#[test]
fn test_commands_need_an_operator() {
    let dir = setup_test_dir();

    cli(&dir)
        .args(["fix-bank", "1", "100"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No operator given"));
}

#[test]
fn test_operator_from_settings() {
    let dir = setup_test_dir();
    let settings = dir.path().join("settings/sheds");
    fs::create_dir_all(&settings).unwrap();
    fs::write(settings.join("config.toml"), "[operator]\nname = \"Ann\"\n").unwrap();

    cli(&dir).args(["fix-bank", "2", "150"]).assert().success();
    cli(&dir)
        .arg("banks")
        .assert()
        .success()
        .stdout(predicate::str::contains("Bank 2: 150 bar"));
}

#[test]
fn test_compressor_log_and_status() {
    let dir = setup_test_dir();

    cli(&dir)
        .args([
            "--operator",
            "Ann",
            "compressor",
            "log",
            "portable",
            "--runtime",
            "1.5",
            "--temperature",
            "20",
        ])
        .assert()
        .success();

    cli(&dir)
        .args(["compressor", "status", "portable"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Runtime: 01:30:00.00"))
        .stdout(predicate::str::contains("Filters last changed: never"));

    cli(&dir)
        .args(["--operator", "Ann", "compressor", "filters-changed", "portable"])
        .assert()
        .success();

    cli(&dir)
        .args(["compressor", "status", "portable"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Filter life remaining: 15:00:00.00"));

    assert!(dir.path().join("data/portable_compressor.csv").exists());
}

#[test]
fn test_compressor_condensate_check() {
    let dir = setup_test_dir();

    cli(&dir)
        .args(["compressor", "status", "fixed", "--temperature", "20", "--humidity", "50"])
        .assert()
        .success()
        .stdout(predicate::str::contains("OK to run"));

    cli(&dir)
        .args(["compressor", "status", "fixed", "--temperature", "30", "--humidity", "90"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Do not run"));
}

#[test]
fn test_loan_lifecycle() {
    let dir = setup_test_dir();
    setup_roles(&dir);
    let item = "Fins 1: Mares Avanti";

    cli(&dir)
        .args(["--operator", "Ann", "loan", "add", "--item", item, "--borrower", "Fred"])
        .args(["--count", "2", "--donation", "5"])
        .assert()
        .success();

    cli(&dir)
        .args(["loan", "on-loan", item])
        .assert()
        .success()
        .stdout("2\n");

    cli(&dir)
        .args(["loan", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 x Fins 1: Mares Avanti  Fred"));

    cli(&dir)
        .args(["--operator", "Ann", "loan", "return", "0"])
        .assert()
        .success();

    cli(&dir)
        .args(["loan", "on-loan", item])
        .assert()
        .success()
        .stdout("0\n");

    cli(&dir)
        .args(["loan", "list", "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("returned to Ann"));
}

#[test]
fn test_loan_validation_reports_fields() {
    let dir = setup_test_dir();
    setup_roles(&dir);

    cli(&dir)
        .args(["--operator", "Fred", "loan", "add", "--item", "select", "--borrower", "Mallory"])
        .args(["--count", "lots", "--date", "2999-01-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("date"))
        .stderr(predicate::str::contains("item"))
        .stderr(predicate::str::contains("count"))
        .stderr(predicate::str::contains("borrower"))
        .stderr(predicate::str::contains("lender"));

    assert!(!dir.path().join("data/loans.csv").exists());
}

#[test]
fn test_overdue_loans() {
    let dir = setup_test_dir();
    setup_roles(&dir);

    cli(&dir)
        .args(["--operator", "Ann", "loan", "add", "--item", "Torch 1: Old Faithful"])
        .args(["--borrower", "Gina", "--date", "2020-01-01"])
        .assert()
        .success();
    cli(&dir)
        .args(["--operator", "Ann", "loan", "add", "--item", "Torch 2: New One"])
        .args(["--borrower", "Gina"])
        .assert()
        .success();

    cli(&dir)
        .args(["loan", "list", "--overdue"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Torch 1: Old Faithful"))
        .stdout(predicate::str::contains("OVERDUE"))
        .stdout(predicate::str::contains("Torch 2").not());
}

#[test]
fn test_inventory_availability() {
    let dir = setup_test_dir();
    setup_roles(&dir);
    let csv = dir.path().join("regulators.csv");
    fs::write(&csv, "Number,Make,Model,Count\n1,Apeks,XTX50,1\n2,Mares,Abyss,2\n").unwrap();

    cli(&dir)
        .args(["inventory", "import", "Regulators"])
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 2 Regulators items"));

    cli(&dir)
        .args(["--operator", "Ann", "loan", "add", "--item", "Regulators 1: Apeks XTX50"])
        .args(["--borrower", "Fred"])
        .assert()
        .success();

    cli(&dir)
        .args(["inventory", "show", "Regulators"])
        .assert()
        .success()
        .stdout(predicate::str::contains("* Regulators 1: Apeks XTX50 (1 of 1 on loan)"))
        .stdout(predicate::str::contains("  Regulators 2: Mares Abyss (0 of 2 on loan)"));

    cli(&dir)
        .args(["--operator", "Ann", "loan", "add", "--item", "Regulators 1: Apeks XTX50"])
        .args(["--borrower", "Gina"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot lend 1 x Regulators 1: Apeks XTX50"));
}

#[test]
fn test_loan_cannot_overcommit_count() {
    let dir = setup_test_dir();
    setup_roles(&dir);
    let csv = dir.path().join("fins.csv");
    fs::write(&csv, "Number,Make,Model,Count\n1,Mares,Avanti,3\n").unwrap();
    cli(&dir).args(["inventory", "import", "Fins"]).arg(&csv).assert().success();
    let item = "Fins 1: Mares Avanti";

    cli(&dir)
        .args(["--operator", "Ann", "loan", "add", "--item", item, "--borrower", "Fred"])
        .assert()
        .success();

    cli(&dir)
        .args(["--operator", "Ann", "loan", "add", "--item", item, "--borrower", "Gina"])
        .args(["--count", "5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 of 3 already on loan"));

    cli(&dir)
        .args(["--operator", "Ann", "loan", "add", "--item", item, "--borrower", "Gina"])
        .args(["--count", "2"])
        .assert()
        .success();

    cli(&dir)
        .args(["loan", "on-loan", item])
        .assert()
        .success()
        .stdout("3\n");
}

#[test]
fn test_roles_show() {
    let dir = setup_test_dir();
    setup_roles(&dir);

    cli(&dir)
        .args(["roles", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("member: Fred, Gina"))
        .stdout(predicate::str::contains("operator: Ann"));
}

#[test]
fn test_config_get_and_set() {
    let dir = setup_test_dir();

    cli(&dir)
        .args(["config", "get", "loan_return"])
        .assert()
        .success()
        .stdout("10\n");

    cli(&dir)
        .args(["config", "set", "loan_return", "14"])
        .assert()
        .success();
    cli(&dir)
        .args(["config", "set", "o2:bank:5", r#"{"size": 50, "price": 0.01, "bar": 200}"#])
        .assert()
        .success();

    cli(&dir)
        .args(["config", "get", "loan_return"])
        .assert()
        .success()
        .stdout("14\n");
    cli(&dir)
        .arg("banks")
        .assert()
        .success()
        .stdout(predicate::str::contains("Bank 5: 200 bar"));

    cli(&dir)
        .args(["config", "get", "no:such:key"])
        .assert()
        .failure();
}
