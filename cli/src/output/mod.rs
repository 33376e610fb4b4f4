//! Output formatting module

pub mod human;
pub mod json;
pub mod progress;
pub mod reporter;
pub mod styles;

use anyhow::Result;
use console::Term;
use owo_colors::OwoColorize as _;

pub use human::HumanRenderer;
pub use json::JsonRenderer;
pub use reporter::TerminalReporter;
pub use styles::Styles;

use crate::application::services::auth::{LogoutOutcome, SessionStatus};
use crate::application::services::queue::SubmitOutcome;
use crate::domain::config::RediaccConfig;
use crate::domain::credential::Identity;
use crate::domain::queue::CompletionResult;

/// Output context carrying styling and terminal state.
pub struct OutputContext {
    /// Stylesheet for colored output.
    pub styles: Styles,
    /// Whether stdout is a TTY.
    pub is_tty: bool,
    /// Whether to suppress non-error output.
    pub quiet: bool,
}

impl OutputContext {
    /// Create output context based on CLI flags and environment.
    #[must_use]
    pub fn new(no_color: bool, quiet: bool) -> Self {
        let is_tty = Term::stdout().is_term();
        let env_no_color = std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty());
        let use_colors = !no_color && is_tty && !env_no_color;

        let mut styles = Styles::default();
        if use_colors {
            styles.colorize();
        }

        Self {
            styles,
            is_tty,
            quiet,
        }
    }

    /// Check if progress indicators should be shown.
    #[must_use]
    pub fn show_progress(&self) -> bool {
        self.is_tty && !self.quiet
    }

    /// Print a success message prefixed with `✓`. Suppressed when `quiet`.
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "✓".style(self.styles.success));
        }
    }

    /// Print a warning message prefixed with `⚠`. Suppressed when `quiet`.
    pub fn warn(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "⚠".style(self.styles.warning));
        }
    }

    /// Print an error message prefixed with `✗` to stderr. Never suppressed.
    pub fn error(&self, msg: &str) {
        eprintln!("  {} {msg}", "✗".style(self.styles.error));
    }

    /// Print an info message prefixed with `ℹ`. Suppressed when `quiet`.
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", "ℹ".style(self.styles.info));
        }
    }

    /// Print a section header. Suppressed when `quiet`.
    pub fn header(&self, msg: &str) {
        if !self.quiet {
            println!("  {}", msg.style(self.styles.header));
        }
    }

    /// Print a key-value pair with the key dimmed. Suppressed when `quiet`.
    pub fn kv(&self, key: &str, value: &str) {
        if !self.quiet {
            println!("  {}  {value}", key.style(self.styles.dim));
        }
    }
}

/// Human or JSON rendering, chosen once per invocation.
pub enum Renderer<'a> {
    Human(HumanRenderer<'a>),
    Json(JsonRenderer),
}

impl Renderer<'_> {
    /// # Errors
    ///
    /// JSON serialization failures.
    pub fn render_login(&self, identity: &Identity) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_login(identity);
                Ok(())
            }
            Self::Json(r) => r.render_login(identity),
        }
    }

    /// # Errors
    ///
    /// JSON serialization failures.
    pub fn render_logout(&self, outcome: &LogoutOutcome) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_logout(outcome);
                Ok(())
            }
            Self::Json(r) => r.render_logout(outcome),
        }
    }

    /// # Errors
    ///
    /// JSON serialization failures.
    pub fn render_status(&self, status: &SessionStatus) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_status(status);
                Ok(())
            }
            Self::Json(r) => r.render_status(status),
        }
    }

    /// # Errors
    ///
    /// JSON serialization failures.
    pub fn render_submit(&self, outcome: &SubmitOutcome) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_submit(outcome);
                Ok(())
            }
            Self::Json(r) => r.render_submit(outcome),
        }
    }

    /// # Errors
    ///
    /// JSON serialization failures.
    pub fn render_trace(&self, result: &CompletionResult) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_trace(result);
                Ok(())
            }
            Self::Json(r) => r.render_trace(result),
        }
    }

    /// # Errors
    ///
    /// JSON serialization failures.
    pub fn render_config(&self, config: &RediaccConfig, path: &std::path::Path) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_config(config, path);
                Ok(())
            }
            Self::Json(r) => r.render_config(config, path),
        }
    }

    /// Confirms `config set`; JSON mode prints the whole updated config.
    ///
    /// # Errors
    ///
    /// JSON serialization failures.
    pub fn render_config_set(
        &self,
        key: &str,
        config: &RediaccConfig,
        path: &std::path::Path,
    ) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_config_set(key, config);
                Ok(())
            }
            Self::Json(r) => r.render_config(config, path),
        }
    }
}
