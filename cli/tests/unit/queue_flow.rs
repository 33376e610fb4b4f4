//! Queue submission and polling through the full gateway stack.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;

use rediacc_cli::application::ports::CredentialStore;
use rediacc_cli::application::services::gateway::Gateway;
use rediacc_cli::application::services::{connection, queue};
use rediacc_cli::domain::machine::UniversalUser;
use rediacc_cli::domain::queue::{PollOptions, QueueVault, SubmitOptions, SubmitRequest};
use rediacc_common::QueueStatus;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::time::Instant;

use crate::mocks::{
    RecordingReporter, RecordingTelemetry, ScriptedTransport, TOKEN_A, credential_store,
    file_lock, gateway_config,
};

fn created(task_id: &str) -> Value {
    json!({"resultSets": [{"data": []}, {"data": [{"taskId": task_id}]}]})
}

fn status(s: &str) -> Value {
    json!({"resultSets": [{"data": []}, {"data": [{"status": s}]}]})
}

fn completed_with_output(output: &str) -> Value {
    let inner = json!({"status": "completed", "command_output": output}).to_string();
    let vault = json!({"result": inner}).to_string();
    json!({"resultSets": [
        {"data": []},
        {"data": [{"status": "COMPLETED"}]},
        {"data": [{"vaultContent": vault}]}
    ]})
}

fn body(transport: &ScriptedTransport, n: usize) -> Value {
    transport.requests()[n].body.clone()
}

#[tokio::test(start_paused = true)]
async fn test_submit_and_wait_end_to_end() {
    let dir = TempDir::new().unwrap();
    let store = credential_store(dir.path());
    store.set_credential(TOKEN_A, None).unwrap();
    store.set_vault_company("{}").unwrap();

    let lock = file_lock(dir.path());
    let transport = ScriptedTransport::default();
    let telemetry = RecordingTelemetry::default();
    let gateway = Gateway::new(&store, &lock, &transport, &telemetry, gateway_config());

    transport.push_ok(created("abc123"));
    transport.push_ok(status("RUNNING"));
    transport.push_ok(status("RUNNING"));
    transport.push_ok(completed_with_output("ok"));

    let request = SubmitRequest {
        team: "T".into(),
        machine: "M".into(),
        bridge: "B".into(),
        vault: "{}".into(),
        priority: 3,
    };
    let opts = SubmitOptions {
        wait: true,
        poll_interval: Duration::from_secs(1),
        ..SubmitOptions::default()
    };
    let reporter = RecordingReporter::default();

    let started = Instant::now();
    let outcome = queue::submit_and_wait(&gateway, &request, &opts, &reporter)
        .await
        .unwrap();

    assert_eq!(outcome.task_id, "abc123");
    assert_eq!(outcome.output.as_deref(), Some("ok"));
    let completion = outcome.completion.unwrap();
    assert!(completion.completed);
    assert_eq!(completion.status, QueueStatus::Completed);
    assert!(started.elapsed() <= Duration::from_secs(2));

    let requests = transport.requests();
    assert_eq!(requests.len(), 4);
    assert!(requests[0].url.ends_with("/api/StoredProcedure/CreateQueueItem"));
    assert_eq!(body(&transport, 0)["teamName"], "T");
    assert_eq!(body(&transport, 0)["machineName"], "M");
    assert_eq!(body(&transport, 0)["bridgeName"], "B");
    assert_eq!(body(&transport, 0)["queueVault"], "{}");
    assert_eq!(body(&transport, 1)["taskId"], "abc123");

    // RUNNING is reported once, not per poll.
    let steps = reporter
        .lines()
        .into_iter()
        .filter(|l| l.starts_with("step:"))
        .count();
    assert_eq!(steps, 1);
}

#[tokio::test(start_paused = true)]
async fn test_poll_times_out_without_error() {
    let dir = TempDir::new().unwrap();
    let store = credential_store(dir.path());
    store.set_credential(TOKEN_A, None).unwrap();
    store.set_vault_company("{}").unwrap();

    let lock = file_lock(dir.path());
    let transport = ScriptedTransport::default();
    for _ in 0..10 {
        transport.push_ok(status("PENDING"));
    }
    let telemetry = RecordingTelemetry::default();
    let gateway = Gateway::new(&store, &lock, &transport, &telemetry, gateway_config());

    let opts = PollOptions {
        interval: Duration::from_secs(1),
        timeout: Duration::from_secs(3),
    };
    let started = Instant::now();
    let result = queue::poll_until_terminal(&gateway, "t-1", &opts, &RecordingReporter::default())
        .await
        .unwrap();

    assert_eq!(result.status, QueueStatus::Timeout);
    assert!(!result.completed);
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert!(result.require_finished(opts.timeout).is_err());
}

#[tokio::test]
async fn test_function_submission_carries_resolved_machine() {
    let dir = TempDir::new().unwrap();
    let store = credential_store(dir.path());
    store.set_credential(TOKEN_A, None).unwrap();
    store.set_vault_company("{}").unwrap();

    let lock = file_lock(dir.path());
    let transport = ScriptedTransport::default();
    let telemetry = RecordingTelemetry::default();
    let gateway = Gateway::new(&store, &lock, &transport, &telemetry, gateway_config());

    let machine_vault = json!({"ip": "10.0.0.7", "user": "deploy"}).to_string();
    transport.push_ok(json!({"resultSets": [
        {"data": []},
        {"data": [{"machineName": "web-1", "bridgeName": "br-eu", "vaultContent": machine_vault}]}
    ]}));
    transport.push_ok(created("t-9"));

    let resolved =
        connection::resolve_machine(&gateway, "ops", "web-1", &UniversalUser::default())
            .await
            .unwrap();
    assert_eq!(resolved.bridge.as_deref(), Some("br-eu"));

    let vault = QueueVault::new("repo_up", "ops")
        .param("repo", "site")
        .machine(resolved.info.clone())
        .to_json();
    let request = SubmitRequest {
        team: "ops".into(),
        machine: "web-1".into(),
        bridge: resolved.bridge.unwrap(),
        vault,
        priority: 2,
    };
    let task_id = queue::submit(&gateway, &request).await.unwrap();
    assert_eq!(task_id, "t-9");

    let sent: Value =
        serde_json::from_str(body(&transport, 1)["queueVault"].as_str().unwrap()).unwrap();
    assert_eq!(sent["function"], "repo_up");
    assert_eq!(sent["params"]["repo"], "site");
    assert_eq!(sent["contextData"]["MACHINES"]["web-1"]["IP"], "10.0.0.7");
    assert_eq!(body(&transport, 1)["bridgeName"], "br-eu");
}
