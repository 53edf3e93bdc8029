use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn cli_shows_help() {
    let mut cmd = Command::cargo_bin("cnes").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("cnes"));
}

#[test]
fn comparar_rejects_single_year() {
    let mut cmd = Command::cargo_bin("cnes").unwrap();
    cmd.args(["comparar", "--anos", "2023"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("2 ou mais anos"));
}

#[test]
fn comparar_rejects_duplicate_years() {
    // Duplicates collapse to one distinct year.
    let mut cmd = Command::cargo_bin("cnes").unwrap();
    cmd.args(["comparar", "--anos", "2023,2023;2023"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("2 ou mais anos"));
}

// Live test (opt-in): cargo test --features online
#[cfg(feature = "online")]
#[test]
fn leitos_online() {
    let mut cmd = Command::cargo_bin("cnes").unwrap();
    cmd.args(["leitos", "--ano", "2023"]);
    cmd.assert().success();
}
