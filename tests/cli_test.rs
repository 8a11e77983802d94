mod common;

use assert_cmd::Command;
use predicates::prelude::*;

fn payrail() -> Command {
    Command::cargo_bin("payrail").unwrap()
}

#[test]
fn test_run_csv_executes_to_completion() {
    payrail()
        .arg("tests/fixtures/run.csv")
        .assert()
        .success()
        .stdout(predicate::str::contains("payee_id,amount_cents,status,detail"))
        .stdout(predicate::str::contains("emp-1,250000,CONFIRMED,tx-"))
        .stdout(predicate::str::contains("con-1,40000,CONFIRMED,tx-"))
        .stdout(predicate::str::contains("status=COMPLETED"))
        .stdout(predicate::str::contains("halted=false"));
}

#[test]
fn test_underfunded_treasury_fails_preflight() {
    payrail()
        .arg("tests/fixtures/run.csv")
        .args(["--fund", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("PREFLIGHT_FAILED"))
        .stderr(predicate::str::contains("INSUFFICIENT_TOKEN_BALANCE"));
}

#[test]
fn test_forced_failures_halt_the_run() {
    payrail()
        .arg("tests/fixtures/run.csv")
        .args(["--force-failure-rate", "1.0", "--max-retries", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("FORCED_FAILURE"))
        .stdout(predicate::str::contains("status=HALTED"))
        .stdout(predicate::str::contains("halted=true"));
}

#[test]
fn test_generated_volume_run_completes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.csv");
    common::generate_run_csv(&path, 25, 12_345).unwrap();

    payrail()
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("status=COMPLETED"));
}

#[test]
fn test_missing_input_fails() {
    payrail().arg("does-not-exist.csv").assert().failure();
}
