//! Integration tests for the CLI surface: help, version, global flags and
//! error reporting.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;

fn silo() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("silo"));
    cmd.env("NO_COLOR", "1").env_remove("SILO_PROFILE");
    cmd
}

// --- Help and version tests ---

#[test]
fn test_cli_no_args_shows_help() {
    // clap with arg_required_else_help shows help on stderr and exits 2
    silo().assert().code(2).stderr(predicate::str::contains(
        "Per-worktree local development environments",
    ));
}

#[test]
fn test_cli_help_flag_lists_commands() {
    let assert = silo().arg("--help").assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    for command in ["up", "ci", "down", "status", "env", "profiles", "version"] {
        assert!(stdout.contains(command), "missing {command} in help:\n{stdout}");
    }
}

#[test]
fn test_cli_version_flag_shows_version() {
    silo()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("silo"));
}

#[test]
fn test_version_command_shows_version() {
    silo()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("silo v0.1.0"));
}

#[test]
fn test_no_color_env_accepts_conventional_values() {
    for value in ["1", "true", "yes", "0", ""] {
        silo()
            .env("NO_COLOR", value)
            .arg("version")
            .assert()
            .success()
            .stdout(predicate::str::contains("silo v0.1.0"));
    }
}

#[test]
fn test_version_command_json_outputs_valid_json() {
    let assert = silo().args(["version", "--json"]).assert().success();
    let value: serde_json::Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("valid JSON");
    assert_eq!(value["version"], "0.1.0");
}

#[test]
fn test_up_help_shows_instance_flags() {
    silo()
        .args(["up", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--force"))
        .stdout(predicate::str::contains("--profile"));
}

#[test]
fn test_ci_help_shows_ci_flags() {
    silo()
        .args(["ci", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--timeout"))
        .stdout(predicate::str::contains("--export-ci"));
}

#[test]
fn test_down_help_shows_cleanup_flags() {
    silo()
        .args(["down", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--delete-cluster"))
        .stdout(predicate::str::contains("--clean"));
}

// --- Flag handling ---

#[test]
fn test_quiet_and_verbose_conflict() {
    silo()
        .args(["--quiet", "--verbose", "version"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_unknown_command_fails() {
    silo().arg("deploy").assert().code(2);
}

// --- Error reporting ---

#[test]
fn test_missing_config_reports_code() {
    let dir = tempfile::tempdir().expect("tempdir");
    silo()
        .current_dir(dir.path())
        .arg("env")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error [CONFIG_NOT_FOUND]"));
}

#[test]
fn test_missing_config_json_error_on_stdout() {
    let dir = tempfile::tempdir().expect("tempdir");
    let assert = silo()
        .current_dir(dir.path())
        .args(["env", "--json"])
        .assert()
        .code(1);
    let value: serde_json::Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("valid JSON");
    assert_eq!(value["error"], true);
    assert_eq!(value["code"], "CONFIG_NOT_FOUND");
}

#[test]
fn test_unsupported_config_version_is_invalid_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("silo.toml"), "version = 2\n\n[ports]\nWEB_PORT = 3000\n")
        .expect("write config");
    silo()
        .current_dir(dir.path())
        .arg("env")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error [INVALID_CONFIG]"));
}

#[test]
fn test_explicit_config_path_is_used() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("custom.toml");
    std::fs::write(
        &config,
        "version = 1\n\n[ports]\nWEB_PORT = 3000\n\n[profiles.ci.ports]\nWEB_PORT = 4000\n",
    )
    .expect("write config");
    silo()
        .arg("--config")
        .arg(&config)
        .arg("profiles")
        .assert()
        .success()
        .stdout(predicate::str::contains("ci"));
}
