//! Command-line smoke tests for the `xd` binary

#![allow(deprecated)] // Command::cargo_bin

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("xd")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("grade"))
        .stdout(predicate::str::contains("leaderboard"));
}

#[test]
fn test_version_flag() {
    Command::cargo_bin("xd")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("xd "));
}

#[test]
fn test_start_rejects_non_numeric_target() {
    Command::cargo_bin("xd")
        .unwrap()
        .args(["start", "--target", "abc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_grade_requires_name() {
    Command::cargo_bin("xd").unwrap().arg("grade").assert().failure();
}

#[test]
fn test_operator_command_without_server_fails() {
    let temp = TempDir::new().unwrap();
    let socket = temp.path().join("missing.sock");

    Command::cargo_bin("xd")
        .unwrap()
        .env("HOME", temp.path())
        .arg("--socket")
        .arg(&socket)
        .arg("pending")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to connect"));
}
