use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("atm-controller"));
    cmd.arg("tests/fixtures/accounts.csv")
        .arg("--keys")
        .arg("4821# 3 1111# 2222# 9137# 1 2000#  1001# 4 2580# 2 9999#");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "key,accountNumber,balance,verifiedFlag,failedAttempts,transactionCompleted,insufficientBalance",
        ))
        .stdout(predicate::str::contains("-Nx4821,4821,3000,1,,1,0"))
        .stdout(predicate::str::contains("-Nx1001,1001,250,1,,0,1"))
        .stdout(predicate::str::contains("-Nx3003,3003,75,,,,"));

    Ok(())
}

#[test]
fn test_cli_reads_keys_from_stdin() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = assert_cmd::Command::new(cargo_bin!("atm-controller"));
    cmd.arg("tests/fixtures/accounts.csv")
        .write_stdin("3003# 3 0000# 0000# 0000#\n");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("-Nx3003,3003,75,0,3,,"));

    Ok(())
}

#[test]
fn test_cli_fingerprint_presses() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("atm-controller"));
    cmd.arg("tests/fixtures/accounts.csv")
        .arg("--keys")
        .arg("3003# 2 1 75#")
        .arg("--touch")
        .arg("5")
        .arg("--touch")
        .arg("300");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("-Nx3003,3003,0,1,,1,0"));

    Ok(())
}

#[test]
fn test_cli_rejects_bad_key_script() {
    let mut cmd = Command::new(cargo_bin!("atm-controller"));
    cmd.arg("tests/fixtures/accounts.csv").arg("--keys").arg("48x1#");

    cmd.assert().failure();
}

#[test]
fn test_cli_missing_accounts_file() {
    let mut cmd = Command::new(cargo_bin!("atm-controller"));
    cmd.arg("tests/fixtures/nope.csv").arg("--keys").arg("");

    cmd.assert().failure();
}

#[test]
fn test_cli_config_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("atm.json");
    std::fs::write(&path, r#"{ "max_attempts": 1, "journal_withdrawals": true }"#)?;

    let mut cmd = Command::new(cargo_bin!("atm-controller"));
    cmd.arg("tests/fixtures/accounts.csv")
        .arg("--config")
        .arg(&path)
        .arg("--keys")
        .arg("4821# 3 0000#");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("-Nx4821,4821,5000,0,1,,"));

    Ok(())
}
