//! Application context: unified state passed to every command handler.
//!
//! `AppContext` owns the production port implementations (credential file,
//! API lock, HTTP transport, process runner, settings) and hands out a
//! [`Gateway`] borrowing them.

use anyhow::{Context, Result};
use zeroize::Zeroizing;

use crate::application::ports::ConfigStore;
use crate::application::services::gateway::{Gateway, GatewayConfig};
use crate::domain::config::{API_URL_ENV, RediaccConfig};
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::config::YamlConfigStore;
use crate::infra::credential_store::FileCredentialStore;
use crate::infra::lock::FileLock;
use crate::infra::telemetry::TracingTelemetry;
use crate::infra::transport::ReqwestTransport;
use crate::output::{HumanRenderer, JsonRenderer, OutputContext, Renderer, TerminalReporter};

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Enable JSON output mode.
    pub json: bool,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    /// Output rendering options.
    pub output: OutputFlags,
    /// Master password for vault fields. Never persisted.
    pub master_password: Option<String>,
}

/// The gateway wired to the production ports.
pub type AppGateway<'a> =
    Gateway<'a, FileCredentialStore, FileLock, ReqwestTransport, TracingTelemetry>;

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Output rendering mode (human vs JSON).
    pub mode: OutputMode,
    pub config_store: YamlConfigStore,
    /// Settings as loaded at startup.
    pub config: RediaccConfig,
    pub credentials: FileCredentialStore,
    pub lock: FileLock,
    pub transport: ReqwestTransport,
    pub telemetry: TracingTelemetry,
    pub runner: TokioCommandRunner,
    master_password: Option<Zeroizing<String>>,
    api_url_override: Option<String>,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined, the
    /// settings file cannot be parsed, or the HTTP client cannot be built.
    pub fn new(flags: AppFlags) -> Result<Self> {
        let mode = if flags.output.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };
        let config_store = YamlConfigStore::default();
        let config = config_store.load().context("loading settings")?;

        Ok(Self {
            output: OutputContext::new(flags.output.no_color, flags.output.quiet),
            mode,
            config_store,
            config,
            credentials: FileCredentialStore::new()?,
            lock: FileLock::new()?,
            transport: ReqwestTransport::new()?,
            telemetry: TracingTelemetry,
            runner: TokioCommandRunner::default(),
            master_password: flags
                .master_password
                .filter(|p| !p.is_empty())
                .map(Zeroizing::new),
            api_url_override: std::env::var(API_URL_ENV)
                .ok()
                .filter(|v| !v.trim().is_empty()),
        })
    }

    /// Returns `true` when JSON output mode is active.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Returns the appropriate `Renderer` variant for the current output mode.
    #[must_use]
    pub fn renderer(&self) -> Renderer<'_> {
        match self.mode {
            OutputMode::Human => Renderer::Human(HumanRenderer::new(&self.output)),
            OutputMode::Json => Renderer::Json(JsonRenderer),
        }
    }

    #[must_use]
    pub fn reporter(&self) -> TerminalReporter<'_> {
        TerminalReporter::new(&self.output)
    }

    /// Spinners only on an interactive, non-JSON terminal.
    #[must_use]
    pub fn show_progress(&self) -> bool {
        !self.is_json() && self.output.show_progress()
    }

    #[must_use]
    pub fn master_password(&self) -> Option<&str> {
        self.master_password.as_ref().map(|p| p.as_str())
    }

    /// Effective API base URL: `REDIACC_API_URL`, else settings.
    #[must_use]
    pub fn api_url(&self) -> String {
        self.config.api_url(self.api_url_override.as_deref())
    }

    #[must_use]
    pub fn gateway(&self) -> AppGateway<'_> {
        Gateway::new(
            &self.credentials,
            &self.lock,
            &self.transport,
            &self.telemetry,
            GatewayConfig {
                base_url: self.api_url(),
                lock_timeout: self.config.lock_timeout(),
                master_password: self.master_password.clone(),
            },
        )
    }
}
