//! Gateway behaviour against the real credential file and lock file.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;

use rediacc_cli::application::ports::{ApiCaller, CredentialStore, SingleFlightLock};
use rediacc_cli::application::services::auth;
use rediacc_cli::application::services::gateway::{Gateway, GatewayConfig};
use rediacc_cli::domain::api::{HEADER_REQUEST_TOKEN, HEADER_USER_EMAIL, HEADER_USER_HASH};
use rediacc_cli::domain::credential::{CredentialSource, Identity};
use rediacc_cli::domain::error::ClientError;
use serde_json::{Map, json};
use tempfile::TempDir;

use crate::mocks::{
    RecordingTelemetry, ScriptedTransport, TOKEN_A, TOKEN_B, credential_store,
    file_lock, gateway_config, ok_body, rotation_body,
};

fn login_body(token: &str) -> serde_json::Value {
    json!({"resultSets": [
        {"data": [{"nextRequestToken": token}]},
        {"data": [{"companyName": "Acme", "vaultCompany": "{\"UNIVERSAL_USER_NAME\":\"svc\"}"}]}
    ]})
}

#[tokio::test]
async fn test_login_call_rotate_logout_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = credential_store(dir.path());
    let lock = file_lock(dir.path());
    let transport = ScriptedTransport::default();
    let telemetry = RecordingTelemetry::default();
    let gateway = Gateway::new(&store, &lock, &transport, &telemetry, gateway_config());

    transport.push_ok(login_body(TOKEN_A));
    let identity = auth::login(&gateway, "ops@acme.test", "hunter2").await.unwrap();
    assert_eq!(identity.company.as_deref(), Some("Acme"));
    assert_eq!(transport.header(0, HEADER_USER_EMAIL).as_deref(), Some("ops@acme.test"));
    assert!(transport.header(0, HEADER_USER_HASH).unwrap().starts_with("0x"));
    assert!(transport.header(0, HEADER_REQUEST_TOKEN).is_none());

    let status = auth::status(&store, None);
    assert!(status.authenticated);
    assert_eq!(status.source, Some(CredentialSource::File));

    transport.push_ok(rotation_body(TOKEN_B));
    gateway.call("GetTeamMachines", Map::new()).await.unwrap();
    assert_eq!(transport.header(1, HEADER_REQUEST_TOKEN).as_deref(), Some(TOKEN_A));
    assert_eq!(store.stored_token().unwrap().as_deref(), Some(TOKEN_B));

    transport.push_ok(ok_body());
    gateway.call("GetCompanyTeams", Map::new()).await.unwrap();
    assert_eq!(transport.header(2, HEADER_REQUEST_TOKEN).as_deref(), Some(TOKEN_B));

    transport.push_ok(ok_body());
    let outcome = auth::logout(&gateway).await.unwrap();
    assert!(outcome.server_confirmed);
    assert!(store.stored_token().unwrap().is_none());
    assert_eq!(store.identity().unwrap(), Identity::default());

    let operations: Vec<String> = telemetry.events().into_iter().map(|e| e.operation).collect();
    assert_eq!(
        operations,
        [
            "CreateAuthenticationRequest",
            "GetTeamMachines",
            "GetCompanyTeams",
            "DeleteUserRequest"
        ]
    );
}

#[tokio::test]
async fn test_rotation_visible_to_a_second_store_on_the_same_file() {
    let dir = TempDir::new().unwrap();
    let store = credential_store(dir.path());
    let other_process = credential_store(dir.path());
    store.set_credential(TOKEN_A, None).unwrap();
    store.set_vault_company("{}").unwrap();

    let lock = file_lock(dir.path());
    let transport = ScriptedTransport::default();
    let telemetry = RecordingTelemetry::default();
    let gateway = Gateway::new(&store, &lock, &transport, &telemetry, gateway_config());

    transport.push_ok(rotation_body(TOKEN_B));
    gateway.call("GetTeamMachines", Map::new()).await.unwrap();

    assert_eq!(other_process.stored_token().unwrap().as_deref(), Some(TOKEN_B));
}

#[tokio::test]
async fn test_401_with_unchanged_credential_surfaces_and_keeps_file() {
    let dir = TempDir::new().unwrap();
    let store = credential_store(dir.path());
    store.set_credential(TOKEN_A, None).unwrap();
    store.set_vault_company("{}").unwrap();

    let lock = file_lock(dir.path());
    let transport = ScriptedTransport::default();
    let telemetry = RecordingTelemetry::default();
    let gateway = Gateway::new(&store, &lock, &transport, &telemetry, gateway_config());

    transport.push_status(401, json!({"errors": ["expired"]}));
    let err = gateway.call("GetTeamMachines", Map::new()).await.unwrap_err();

    assert_eq!(err.status_code(), 401);
    assert_eq!(transport.requests().len(), 1);
    assert_eq!(store.stored_token().unwrap().as_deref(), Some(TOKEN_A));
    assert_eq!(telemetry.events()[0].status_code, Some(401));
}

#[tokio::test]
async fn test_call_waits_for_lock_then_times_out() {
    let dir = TempDir::new().unwrap();
    let store = credential_store(dir.path());
    store.set_credential(TOKEN_A, None).unwrap();

    let holder = file_lock(dir.path());
    let _held = holder.acquire(Duration::from_secs(1)).await.unwrap();

    let lock = file_lock(dir.path());
    let transport = ScriptedTransport::default();
    let telemetry = RecordingTelemetry::default();
    let gateway = Gateway::new(
        &store,
        &lock,
        &transport,
        &telemetry,
        GatewayConfig {
            lock_timeout: Duration::from_millis(250),
            ..gateway_config()
        },
    );

    let err = gateway.call("GetTeamMachines", Map::new()).await.unwrap_err();
    assert!(matches!(err, ClientError::LockTimeout(_)));
    assert_eq!(err.status_code(), 408);
    assert!(transport.requests().is_empty());
    assert!(!telemetry.events()[0].success);
}

#[tokio::test]
async fn test_logout_clears_file_even_when_server_unreachable() {
    let dir = TempDir::new().unwrap();
    let store = credential_store(dir.path());
    store.set_credential(TOKEN_A, None).unwrap();
    store.set_vault_company("{}").unwrap();

    let lock = file_lock(dir.path());
    let transport = ScriptedTransport::default();
    transport.push_err(ClientError::Transport("connection refused".into()));
    let telemetry = RecordingTelemetry::default();
    let gateway = Gateway::new(&store, &lock, &transport, &telemetry, gateway_config());

    let outcome = auth::logout(&gateway).await.unwrap();
    assert!(!outcome.server_confirmed);
    assert!(!auth::status(&store, None).authenticated);
}

#[tokio::test]
async fn test_unauthenticated_call_never_reaches_the_network() {
    let dir = TempDir::new().unwrap();
    let store = credential_store(dir.path());
    let lock = file_lock(dir.path());
    let transport = ScriptedTransport::default();
    let telemetry = RecordingTelemetry::default();
    let gateway = Gateway::new(&store, &lock, &transport, &telemetry, gateway_config());

    let err = gateway.call("GetTeamMachines", Map::new()).await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthenticated));
    assert_eq!(err.status_code(), 401);
    assert!(transport.requests().is_empty());
}
