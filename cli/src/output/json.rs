//! JSON output helpers.
//!
//! Every `--json` success path prints one pretty-printed document on stdout.
//! Failures print the `{error, status_code}` object instead.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;

use crate::application::services::auth::{LogoutOutcome, SessionStatus};
use crate::application::services::queue::SubmitOutcome;
use crate::domain::config::RediaccConfig;
use crate::domain::credential::Identity;
use crate::domain::error::{ClientError, ErrorBody};
use crate::domain::queue::CompletionResult;

/// Status code reported for failures that are not a [`ClientError`].
pub const GENERIC_ERROR_STATUS: u16 = 500;

/// `{error, status_code}` for any command failure.
///
/// A [`ClientError`] anywhere in the chain supplies the status code.
#[must_use]
pub fn error_body(err: &anyhow::Error) -> ErrorBody {
    match err.chain().find_map(|e| e.downcast_ref::<ClientError>()) {
        Some(client) => ErrorBody {
            error: format!("{err:#}"),
            status_code: client.status_code(),
        },
        None => ErrorBody {
            error: format!("{err:#}"),
            status_code: GENERIC_ERROR_STATUS,
        },
    }
}

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": "...",
///   "status_code": 401
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(body: &ErrorBody) -> Result<String> {
    serde_json::to_string_pretty(body).context("JSON serialization failed")
}

fn print<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("JSON serialization failed")?
    );
    Ok(())
}

/// Renders results as JSON on stdout.
pub struct JsonRenderer;

impl JsonRenderer {
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_login(&self, identity: &Identity) -> Result<()> {
        print(&json!({
            "authenticated": true,
            "email": identity.email,
            "company": identity.company,
        }))
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_logout(&self, outcome: &LogoutOutcome) -> Result<()> {
        print(outcome)
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_status(&self, status: &SessionStatus) -> Result<()> {
        let mut value = serde_json::to_value(status).context("JSON serialization failed")?;
        if let Some(map) = value.as_object_mut() {
            map.remove("vault_company");
        }
        print(&value)
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_submit(&self, outcome: &SubmitOutcome) -> Result<()> {
        print(outcome)
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_trace(&self, result: &CompletionResult) -> Result<()> {
        let mut value = serde_json::to_value(result).context("JSON serialization failed")?;
        if let (Some(map), Some(output)) = (value.as_object_mut(), result.command_output()) {
            map.insert("output".into(), output.into());
        }
        print(&value)
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_config(&self, config: &RediaccConfig, path: &std::path::Path) -> Result<()> {
        print(&json!({
            "path": path.display().to_string(),
            "settings": config,
        }))
    }
}
