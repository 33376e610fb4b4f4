//! Human-readable terminal renderer.

use owo_colors::OwoColorize as _;
use rediacc_common::QueueStatus;

use crate::application::services::auth::{LogoutOutcome, SessionStatus};
use crate::application::services::queue::SubmitOutcome;
use crate::domain::config::{API_URL_ENV, RediaccConfig};
use crate::domain::credential::{CredentialSource, Identity, TOKEN_ENV};
use crate::domain::queue::CompletionResult;
use crate::output::OutputContext;

/// Renders domain types as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    pub fn render_login(&self, identity: &Identity) {
        let who = identity.email.as_deref().unwrap_or("unknown user");
        self.ctx.success(&format!("Logged in as {who}"));
        if let Some(company) = &identity.company {
            self.ctx.kv("Company:", company);
        }
    }

    pub fn render_logout(&self, outcome: &LogoutOutcome) {
        self.ctx.success("Logged out");
        if !outcome.server_confirmed {
            self.ctx
                .warn("Server session could not be ended; local credentials were removed");
        }
    }

    pub fn render_status(&self, status: &SessionStatus) {
        if !status.authenticated {
            self.ctx.warn("Not logged in");
            self.ctx.info("Run: rediacc login");
            return;
        }
        self.ctx.success("Authenticated");
        if let Some(source) = status.source {
            self.ctx.kv("Source:", source_display(source));
        }
        if let Some(credential) = &status.credential {
            self.ctx.kv("Token:", credential);
        }
        if let Some(email) = &status.identity.email {
            self.ctx.kv("User:", email);
        }
        if let Some(company) = &status.identity.company {
            self.ctx.kv("Company:", company);
        }
        let encrypted = status
            .identity
            .vault_company
            .as_deref()
            .is_some_and(crate::domain::vault::is_encrypted);
        if encrypted {
            self.ctx.kv("Vault:", "encrypted (needs master password)");
        }
    }

    pub fn render_submit(&self, outcome: &SubmitOutcome) {
        if !self.ctx.quiet {
            println!(
                "  Task ID: {}",
                outcome.task_id.style(self.ctx.styles.task_id)
            );
        }
        if let Some(completion) = &outcome.completion {
            self.ctx.kv("Status:", &status_display(self.ctx, &completion.status));
        }
        if let Some(output) = &outcome.output {
            print_command_output(output);
        }
    }

    pub fn render_trace(&self, result: &CompletionResult) {
        self.ctx.kv("Task:", &result.task_id);
        self.ctx.kv("Status:", &status_display(self.ctx, &result.status));
        self.ctx
            .kv("Finished:", if result.completed { "yes" } else { "no" });
        if let Some(output) = result.command_output() {
            print_command_output(&output);
        }
    }

    /// Render the current settings.
    pub fn render_config(&self, config: &RediaccConfig, path: &std::path::Path) {
        println!();
        println!(
            "  {}",
            format!("Configuration ({})", path.display()).style(self.ctx.styles.header)
        );
        println!();
        for (key, value) in config.entries() {
            println!("  {:<28} {value}", format!("{key}:"));
        }
        println!();
        println!("  {}", "Environment:".style(self.ctx.styles.bold));
        for var in [API_URL_ENV, TOKEN_ENV, "REDIACC_CONFIG", "NO_COLOR"] {
            let shown = match std::env::var(var) {
                Ok(_) if var == TOKEN_ENV => "(set)".to_string(),
                Ok(v) => v,
                Err(_) => "(not set)".to_string(),
            };
            println!("    {:<26} {shown}", format!("{var}:"));
        }
        println!();
    }

    pub fn render_config_set(&self, key: &str, config: &RediaccConfig) {
        let shown = config.get(key).unwrap_or_default();
        self.ctx.success(&format!("Set {key} = {shown}"));
    }
}

/// Remote output is the payload: printed verbatim, even when quiet.
fn print_command_output(output: &str) {
    if output.ends_with('\n') {
        print!("{output}");
    } else {
        println!("{output}");
    }
}

// ── Display helpers ──────────────────────────────────────────────────────────

#[must_use]
pub fn source_display(source: CredentialSource) -> &'static str {
    match source {
        CredentialSource::Override => "command line",
        CredentialSource::Environment => TOKEN_ENV,
        CredentialSource::File => "~/.rediacc/config.json",
    }
}

#[must_use]
pub fn status_display(ctx: &OutputContext, status: &QueueStatus) -> String {
    status
        .as_str()
        .style(ctx.styles.for_status(status))
        .to_string()
}
