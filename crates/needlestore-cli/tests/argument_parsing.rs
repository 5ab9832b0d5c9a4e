//! Focused CLI argument parsing tests: exercise the clap surface without
//! needing pre-built volume fixtures.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn version_command_succeeds() {
    Command::cargo_bin("needlestore")
        .unwrap()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("needlestore-cli"));
}

#[test]
fn version_flag_shows_version() {
    Command::cargo_bin("needlestore")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("needlestore"));
}

#[test]
fn help_flag_shows_usage() {
    Command::cargo_bin("needlestore")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("replication"));
}

#[test]
fn missing_subcommand_fails() {
    Command::cargo_bin("needlestore").unwrap().assert().failure();
}

#[test]
fn inspect_rejects_nonexistent_path() {
    Command::cargo_bin("needlestore")
        .unwrap()
        .args(["inspect", "/nonexistent/path/1.dat"])
        .assert()
        .failure();
}

#[test]
fn init_rejects_bad_version() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("1.dat");
    Command::cargo_bin("needlestore")
        .unwrap()
        .args(["init", path.to_str().unwrap(), "--version", "9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported needle version"));
}
