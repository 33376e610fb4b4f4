//! Integration tests for `status`, `logout`, and commands that need the API.
//!
//! The API URL points at a closed local port, so anything that reaches the
//! network fails fast with a connection error.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

const TOKEN: &str = "aaaaaaaa-aaaa-4aaa-8aaa-aaaaaaaaaaaa";
const UNREACHABLE_API: &str = "http://127.0.0.1:9";

fn rediacc(home: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("rediacc"));
    cmd.env("NO_COLOR", "1")
        .env("HOME", home.path())
        .env("REDIACC_CONFIG", home.path().join("settings.yaml"))
        .env("REDIACC_API_URL", UNREACHABLE_API)
        .env_remove("REDIACC_TOKEN")
        .env_remove("REDIACC_MASTER_PASSWORD")
        .env_remove("REDIACC_PASSWORD");
    cmd
}

fn json_stdout(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

fn credential_file(home: &TempDir) -> std::path::PathBuf {
    home.path().join(".rediacc").join("config.json")
}

// --- status ---

#[test]
fn test_status_unauthenticated_exits_one() {
    let home = TempDir::new().unwrap();
    rediacc(&home)
        .arg("status")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Not logged in"));
}

#[test]
fn test_status_json_unauthenticated() {
    let home = TempDir::new().unwrap();
    let output = rediacc(&home).args(["status", "--json"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(json_stdout(&output)["authenticated"], false);
}

#[test]
fn test_status_reports_environment_token_masked() {
    let home = TempDir::new().unwrap();
    let output = rediacc(&home)
        .args(["status", "--json"])
        .env("REDIACC_TOKEN", TOKEN)
        .output()
        .unwrap();
    assert!(output.status.success());
    let value = json_stdout(&output);
    assert_eq!(value["authenticated"], true);
    assert_eq!(value["source"], "environment");
    assert!(!value["credential"].as_str().unwrap().contains(&TOKEN[9..]));
}

#[test]
fn test_status_reads_stored_credential_and_hides_vault() {
    let home = TempDir::new().unwrap();
    let file = credential_file(&home);
    std::fs::create_dir_all(file.parent().unwrap()).unwrap();
    std::fs::write(
        &file,
        format!(
            r#"{{"token":"{TOKEN}","email":"ops@acme.test","company":"Acme","vault_company":"{{}}"}}"#
        ),
    )
    .unwrap();

    let output = rediacc(&home).args(["--json", "status"]).output().unwrap();
    assert!(output.status.success());
    let value = json_stdout(&output);
    assert_eq!(value["source"], "file");
    assert_eq!(value["email"], "ops@acme.test");
    assert!(value.get("vault_company").is_none());
}

// --- logout ---

#[test]
fn test_logout_clears_local_credentials_when_server_unreachable() {
    let home = TempDir::new().unwrap();
    let file = credential_file(&home);
    std::fs::create_dir_all(file.parent().unwrap()).unwrap();
    std::fs::write(&file, format!(r#"{{"token":"{TOKEN}","vault_company":"{{}}"}}"#)).unwrap();

    rediacc(&home)
        .arg("logout")
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged out"));

    let stored: Value = serde_json::from_str(&std::fs::read_to_string(&file).unwrap()).unwrap();
    assert!(stored.get("token").is_none());
    rediacc(&home).arg("status").assert().code(1);
}

// --- JSON error shape ---

#[test]
fn test_queue_trace_unauthenticated_json_error() {
    let home = TempDir::new().unwrap();
    let output = rediacc(&home)
        .args(["--json", "queue", "trace", "t-1"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let value = json_stdout(&output);
    assert_eq!(value["status_code"], 401);
    assert!(value["error"].as_str().unwrap().contains("rediacc login"));
}

#[test]
fn test_queue_trace_unauthenticated_human_error() {
    let home = TempDir::new().unwrap();
    rediacc(&home)
        .args(["queue", "trace", "t-1"])
        .assert()
        .code(1)
        .stderr(predicate::str::starts_with("Error: "))
        .stderr(predicate::str::contains("Not authenticated"));
}

#[test]
fn test_ssh_with_unreachable_api_reports_connection_error() {
    let home = TempDir::new().unwrap();
    let output = rediacc(&home)
        .args(["--json", "ssh", "ops", "web-1"])
        .env("REDIACC_TOKEN", TOKEN)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let value = json_stdout(&output);
    assert_eq!(value["status_code"], 503);
    assert!(value["error"].as_str().unwrap().contains("Connection error"));
}

#[test]
fn test_login_with_unreachable_api_fails_without_storing() {
    let home = TempDir::new().unwrap();
    rediacc(&home)
        .args(["login", "--email", "ops@acme.test"])
        .env("REDIACC_PASSWORD", "hunter2")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Connection error"));
    assert!(!credential_file(&home).exists());
}
