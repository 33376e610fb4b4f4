//! Shared fakes for unit tests.
//!
//! Provides a scripted HTTP transport, a scripted process runner, telemetry
//! capture and on-disk store constructors so each test file doesn't have to
//! re-define the same boilerplate.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::Path;
use std::process::{ExitStatus, Output};
use std::time::Duration;

use anyhow::Result;
use rediacc_cli::application::ports::{
    CommandRunner, HttpRequest, HttpResponse, HttpTransport, ProgressReporter, TelemetryEvent,
    TelemetrySink,
};
use rediacc_cli::application::services::gateway::{Gateway, GatewayConfig};
use rediacc_cli::domain::error::ClientError;
use rediacc_cli::infra::credential_store::FileCredentialStore;
use rediacc_cli::infra::lock::FileLock;
use serde_json::{Value, json};

pub const TOKEN_A: &str = "aaaaaaaa-aaaa-4aaa-8aaa-aaaaaaaaaaaa";
pub const TOKEN_B: &str = "bbbbbbbb-bbbb-4bbb-8bbb-bbbbbbbbbbbb";
pub const TOKEN_C: &str = "cccccccc-cccc-4ccc-8ccc-cccccccccccc";

/// Env var nobody sets, so host `REDIACC_TOKEN` never leaks into tests.
pub const UNSET_TOKEN_VAR: &str = "REDIACC_UNIT_TEST_TOKEN_UNSET";

// ── Cross-platform ExitStatus construction ───────────────────────────────────

#[cfg(unix)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(code << 8)
}

#[cfg(windows)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    #[allow(clippy::cast_sign_loss)]
    ExitStatus::from_raw(code as u32)
}

pub fn ok_output(stdout: &[u8]) -> Output {
    Output {
        status: exit_status(0),
        stdout: stdout.to_vec(),
        stderr: Vec::new(),
    }
}

pub fn err_output(code: i32, stderr: &[u8]) -> Output {
    Output {
        status: exit_status(code),
        stdout: Vec::new(),
        stderr: stderr.to_vec(),
    }
}

// ── Response bodies ──────────────────────────────────────────────────────────

pub fn ok_body() -> Value {
    json!({"resultSets": [{"data": []}]})
}

pub fn rotation_body(token: &str) -> Value {
    json!({"resultSets": [{"data": [{"nextRequestToken": token}]}]})
}

// ── On-disk stores ───────────────────────────────────────────────────────────

pub fn credential_store(dir: &Path) -> FileCredentialStore {
    FileCredentialStore::with_path(dir.join("config.json")).with_env_var(UNSET_TOKEN_VAR)
}

pub fn file_lock(dir: &Path) -> FileLock {
    FileLock::with_path(dir.join("api_call.lock"))
}

pub fn gateway_config() -> GatewayConfig {
    GatewayConfig {
        base_url: "http://api.test".into(),
        lock_timeout: Duration::from_secs(2),
        master_password: None,
    }
}

pub type TestGateway<'a> =
    Gateway<'a, FileCredentialStore, FileLock, ScriptedTransport, RecordingTelemetry>;

// ── Transport ────────────────────────────────────────────────────────────────

/// Replays queued responses in order and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: RefCell<VecDeque<Result<HttpResponse, ClientError>>>,
    requests: RefCell<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn push_status(&self, status: u16, body: Value) {
        self.responses.borrow_mut().push_back(Ok(HttpResponse {
            status,
            body: body.to_string(),
        }));
    }

    pub fn push_ok(&self, body: Value) {
        self.push_status(200, body);
    }

    pub fn push_err(&self, err: ClientError) {
        self.responses.borrow_mut().push_back(Err(err));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.borrow().clone()
    }

    /// Value of `name` in the `n`th request's headers.
    pub fn header(&self, n: usize, name: &str) -> Option<String> {
        self.requests.borrow().get(n).and_then(|r| {
            r.headers
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        })
    }
}

impl HttpTransport for ScriptedTransport {
    async fn post_json(&self, request: &HttpRequest) -> Result<HttpResponse, ClientError> {
        self.requests.borrow_mut().push(request.clone());
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::Transport("no scripted response".into())))
    }
}

// ── Telemetry ────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingTelemetry {
    events: RefCell<Vec<TelemetryEvent>>,
}

impl RecordingTelemetry {
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.borrow().clone()
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn record(&self, event: &TelemetryEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

// ── Command runner ───────────────────────────────────────────────────────────

/// Replays queued outputs in order and records each program name.
#[derive(Default)]
pub struct ScriptedRunner {
    outputs: RefCell<VecDeque<Output>>,
    programs: RefCell<Vec<String>>,
}

impl ScriptedRunner {
    pub fn push(&self, output: Output) {
        self.outputs.borrow_mut().push_back(output);
    }

    pub fn programs(&self) -> Vec<String> {
        self.programs.borrow().clone()
    }

    fn next(&self, program: &str) -> Result<Output> {
        self.programs.borrow_mut().push(program.to_string());
        self.outputs
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("failed to spawn {program}"))
    }
}

impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, _: &[&str], _: &[(&str, &str)]) -> Result<Output> {
        self.next(program)
    }

    async fn run_with_stdin(
        &self,
        program: &str,
        _: &[&str],
        _: &[(&str, &str)],
        _: &[u8],
    ) -> Result<Output> {
        self.next(program)
    }

    async fn run_status(
        &self,
        program: &str,
        _: &[&str],
        _: &[(&str, &str)],
    ) -> Result<ExitStatus> {
        self.next(program).map(|o| o.status)
    }
}

// ── Progress reporter ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingReporter {
    lines: RefCell<Vec<String>>,
}

impl RecordingReporter {
    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }
}

impl ProgressReporter for RecordingReporter {
    fn step(&self, message: &str) {
        self.lines.borrow_mut().push(format!("step: {message}"));
    }
    fn success(&self, message: &str) {
        self.lines.borrow_mut().push(format!("ok: {message}"));
    }
    fn warn(&self, message: &str) {
        self.lines.borrow_mut().push(format!("warn: {message}"));
    }
}
