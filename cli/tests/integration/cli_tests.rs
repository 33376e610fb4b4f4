//! Integration tests for the CLI skeleton: help, version and argument parsing.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;

fn rediacc() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("rediacc"));
    cmd.env("NO_COLOR", "1");
    cmd
}

// --- Help and version tests ---

#[test]
fn test_cli_no_args_shows_help_and_exits_two() {
    rediacc().assert().code(2).stderr(predicate::str::contains(
        "Queue work and open SSH sessions on Rediacc machines",
    ));
}

#[test]
fn test_cli_help_lists_every_command() {
    let mut assert = rediacc().arg("--help").assert().success();
    for command in ["login", "logout", "status", "queue", "ssh", "tunnel", "config"] {
        assert = assert.stdout(predicate::str::contains(command));
    }
}

#[test]
fn test_cli_version_flag_shows_version() {
    rediacc()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(concat!(
            "rediacc ",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn test_unknown_command_fails() {
    rediacc()
        .arg("deploy")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

// --- Queue argument validation ---

#[test]
fn test_queue_help_shows_submit_and_trace() {
    rediacc()
        .args(["queue", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("submit"))
        .stdout(predicate::str::contains("trace"));
}

#[test]
fn test_queue_submit_requires_payload() {
    rediacc()
        .args(["queue", "submit", "--team", "ops", "--machine", "web-1"])
        .assert()
        .code(2);
}

#[test]
fn test_queue_submit_rejects_function_and_vault_together() {
    rediacc()
        .args([
            "queue", "submit", "--team", "ops", "--machine", "web-1", "--function", "ping",
            "--vault", "{}",
        ])
        .assert()
        .code(2);
}

#[test]
fn test_queue_submit_priority_out_of_range() {
    rediacc()
        .args([
            "queue", "submit", "--team", "ops", "--machine", "web-1", "--function", "ping",
            "--priority", "0",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("priority"));
}

#[test]
fn test_queue_submit_param_needs_key_value() {
    rediacc()
        .args([
            "queue", "submit", "--team", "ops", "--machine", "web-1", "--function", "ping",
            "--param", "novalue",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("KEY=VALUE"));
}

// --- SSH / tunnel argument validation ---

#[test]
fn test_ssh_requires_team_and_machine() {
    rediacc().args(["ssh", "ops"]).assert().code(2);
}

#[test]
fn test_tunnel_requires_ports() {
    rediacc()
        .args(["tunnel", "ops", "web-1", "--local", "8080"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--remote"));
}

#[test]
fn test_master_password_env_value_is_hidden_in_help() {
    rediacc()
        .arg("--help")
        .env("REDIACC_MASTER_PASSWORD", "s3cret-value")
        .assert()
        .success()
        .stdout(predicate::str::contains("REDIACC_MASTER_PASSWORD"))
        .stdout(predicate::str::contains("s3cret-value").not());
}
