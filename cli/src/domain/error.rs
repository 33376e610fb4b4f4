//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

// ── Client errors ─────────────────────────────────────────────────────────────

/// Failure taxonomy shared by the gateway, queue client, vault codec and SSH
/// session manager.
///
/// Every variant maps to an HTTP-shaped status code so CLI and JSON callers
/// can render failures uniformly via [`ErrorBody`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Not authenticated. Run 'rediacc login' first.")]
    Unauthenticated,

    #[error("Invalid token format: {0}")]
    InvalidFormat(String),

    #[error(
        "Another rediacc process held the API lock for more than {}s",
        .0.as_secs()
    )]
    LockTimeout(Duration),

    #[error("Connection error: {0}")]
    Transport(String),

    #[error("{message}")]
    Http { status: u16, message: String },

    #[error("Failed to decrypt vault data. Check the master password.")]
    DecryptionFailed,

    #[error("Failed to encrypt vault data")]
    EncryptionFailed,

    #[error("Invalid SSH private key: {0}")]
    InvalidKeyMaterial(String),

    #[error("SSH setup failed: {0}")]
    SshSetupFailed(String),

    #[error("Task {task_id} did not reach a final state within {}s", .timeout.as_secs())]
    TaskTimeout { task_id: String, timeout: Duration },

    #[error("Unexpected API response: {0}")]
    MalformedResponse(String),

    #[error("Credential storage error: {0}")]
    Storage(String),
}

impl ClientError {
    /// HTTP-shaped status code for this failure.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthenticated => 401,
            Self::LockTimeout(_) | Self::TaskTimeout { .. } => 408,
            Self::Http { status, .. } => *status,
            Self::InvalidFormat(_) | Self::DecryptionFailed | Self::InvalidKeyMaterial(_) => 400,
            Self::MalformedResponse(_) => 502,
            Self::Transport(_) => 503,
            Self::EncryptionFailed | Self::SshSetupFailed(_) | Self::Storage(_) => 500,
        }
    }

    /// Errors worth retrying on the next poll: network trouble, lock
    /// contention, server-side faults and garbled bodies.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::LockTimeout(_) | Self::MalformedResponse(_) => true,
            Self::Http { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            _ => false,
        }
    }
}

/// `{error, status_code}` rendering of a [`ClientError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub status_code: u16,
}

impl From<&ClientError> for ErrorBody {
    fn from(err: &ClientError) -> Self {
        Self {
            error: err.to_string(),
            status_code: err.status_code(),
        }
    }
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to configuration key/value validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown setting: {key}\n\nValid settings: {valid}")]
    UnknownKey { key: String, valid: String },

    #[error("Invalid value for {key}: {value}\n\nExpected: {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: String,
    },
}
