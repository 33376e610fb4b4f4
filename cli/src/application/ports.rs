//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` and the shared wire crate,
//! never from `crate::infra`, `crate::commands`, or `crate::output`.

use std::path::PathBuf;
use std::process::{ExitStatus, Output};
use std::time::Duration;

use anyhow::Result;
use rediacc_common::ApiResponse;
use serde_json::{Map, Value};

use crate::domain::config::RediaccConfig;
use crate::domain::credential::{Credential, CredentialSource, Identity, TOKEN_ENV};
use crate::domain::error::ClientError;

// ── Credential Store Port ─────────────────────────────────────────────────────

/// Persistence for the session credential and its identity metadata.
///
/// Implementations must not cache: every read goes back to storage, because
/// another process may have rotated the credential since the last call.
pub trait CredentialStore {
    /// Raw token currently in storage, unvalidated.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Storage`] if storage exists but cannot be read.
    fn stored_token(&self) -> Result<Option<String>, ClientError>;

    /// Raw token injected through the environment, unvalidated.
    fn env_token(&self) -> Option<String>;

    /// Identity metadata currently in storage.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Storage`] if storage exists but cannot be read.
    fn identity(&self) -> Result<Identity, ClientError>;

    /// Atomically replaces the stored credential. `None` keeps the current
    /// identity metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Storage`] if the write does not land.
    fn save(&self, credential: &Credential, identity: Option<&Identity>)
    -> Result<(), ClientError>;

    /// Caches the company vault blob next to the credential.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Storage`] if the write does not land.
    fn set_vault_company(&self, vault: &str) -> Result<(), ClientError>;

    /// Removes the credential and identity metadata, keeping unrelated keys.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Storage`] if the write does not land.
    fn clear(&self) -> Result<(), ClientError>;

    /// Validates `token` and stores it.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidFormat`] for a malformed token, or a
    /// storage error.
    fn set_credential(&self, token: &str, identity: Option<&Identity>) -> Result<(), ClientError> {
        let credential = Credential::parse(token)?;
        self.save(&credential, identity)
    }

    /// Active credential and its source.
    ///
    /// Precedence: `override_token`, then the environment, then storage.
    /// Each candidate is validated; an invalid one is logged and treated as
    /// absent.
    fn resolve_credential(
        &self,
        override_token: Option<&str>,
    ) -> Option<(Credential, CredentialSource)> {
        if let Some(raw) = override_token {
            match Credential::parse(raw) {
                Ok(c) => return Some((c, CredentialSource::Override)),
                Err(e) => tracing::warn!("ignoring explicit credential: {e}"),
            }
        }
        if let Some(raw) = self.env_token() {
            match Credential::parse(&raw) {
                Ok(c) => return Some((c, CredentialSource::Environment)),
                Err(e) => tracing::warn!("ignoring {TOKEN_ENV}: {e}"),
            }
        }
        self.stored_credential()
            .map(|c| (c, CredentialSource::File))
    }

    fn get_credential(&self, override_token: Option<&str>) -> Option<Credential> {
        self.resolve_credential(override_token).map(|(c, _)| c)
    }

    /// Validated credential from storage only, ignoring the environment.
    fn stored_credential(&self) -> Option<Credential> {
        match self.stored_token() {
            Ok(Some(raw)) => match Credential::parse(&raw) {
                Ok(c) => Some(c),
                Err(e) => {
                    tracing::warn!("ignoring stored credential: {e}");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("{e}");
                None
            }
        }
    }

    /// `true` when a valid environment credential shadows storage.
    fn env_override_active(&self) -> bool {
        self.env_token()
            .is_some_and(|raw| Credential::parse(&raw).is_ok())
    }
}

// ── Single-flight Lock Port ───────────────────────────────────────────────────

/// Mutual exclusion for credential-bearing calls across processes.
#[allow(async_fn_in_trait)]
pub trait SingleFlightLock {
    /// Released on drop.
    type Guard;

    /// Waits up to `timeout` for the lock.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::LockTimeout`] if the lock is still held when
    /// `timeout` elapses, or [`ClientError::Storage`] if the lock file cannot
    /// be opened.
    async fn acquire(&self, timeout: Duration) -> Result<Self::Guard, ClientError>;
}

// ── HTTP Transport Port ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

/// Raw status and body. Error statuses are returned here, not as `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

#[allow(async_fn_in_trait)]
pub trait HttpTransport {
    /// POSTs `request.body` as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] only when no HTTP response was
    /// received (DNS, connect, TLS, timeout).
    async fn post_json(&self, request: &HttpRequest) -> Result<HttpResponse, ClientError>;
}

// ── API Caller Port ───────────────────────────────────────────────────────────

/// An authenticated `StoredProcedure` call. Implemented by the gateway;
/// faked in queue and connection tests.
#[allow(async_fn_in_trait)]
pub trait ApiCaller {
    async fn call(
        &self,
        endpoint: &str,
        params: Map<String, Value>,
    ) -> Result<ApiResponse, ClientError>;
}

// ── Telemetry Port ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryEvent {
    /// Endpoint name or `ssh.session`.
    pub operation: String,
    pub success: bool,
    pub duration: Duration,
    pub status_code: Option<u16>,
}

impl TelemetryEvent {
    #[must_use]
    pub fn from_result<T>(operation: &str, duration: Duration, result: &Result<T, ClientError>) -> Self {
        Self {
            operation: operation.to_string(),
            success: result.is_ok(),
            duration,
            status_code: result.as_ref().err().map(ClientError::status_code),
        }
    }
}

/// Fire-and-forget operation reporting. Must never fail the caller.
#[cfg_attr(test, mockall::automock)]
pub trait TelemetrySink {
    fn record(&self, event: &TelemetryEvent);
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program with extra environment variables and capture its output.
    async fn run(&self, program: &str, args: &[&str], env: &[(&str, &str)]) -> Result<Output>;
    /// Run a program with stdin piped from `stdin`.
    async fn run_with_stdin(
        &self,
        program: &str,
        args: &[&str],
        env: &[(&str, &str)],
        stdin: &[u8],
    ) -> Result<Output>;
    /// Run a program with inherited stdio and return its exit status.
    async fn run_status(
        &self,
        program: &str,
        args: &[&str],
        env: &[(&str, &str)],
    ) -> Result<ExitStatus>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait, no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

// ── Config Port ───────────────────────────────────────────────────────────────

/// Abstracts settings persistence.
pub trait ConfigStore {
    /// Load settings, defaults when the file is absent.
    fn load(&self) -> Result<RediaccConfig>;
    /// Persist settings.
    fn save(&self, config: &RediaccConfig) -> Result<()>;
    /// Location of the settings file.
    fn path(&self) -> Result<PathBuf>;
}
