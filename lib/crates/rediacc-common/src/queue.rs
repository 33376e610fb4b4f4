//! Queue item status as reported by `GetQueueItemTrace`.

use serde::{Deserialize, Serialize};

/// Status of a queue item.
///
/// `Timeout` never comes from the server; the client synthesizes it when its
/// own polling deadline passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QueueStatus {
    Queued,
    Assigned,
    Processing,
    Running,
    Completed,
    Failed,
    Cancelled,
    Error,
    Timeout,
    /// Any status string this client does not know about.
    Other(String),
}

impl QueueStatus {
    /// Parses a wire status, case-insensitively.
    #[must_use]
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "QUEUED" => Self::Queued,
            "ASSIGNED" => Self::Assigned,
            "PROCESSING" => Self::Processing,
            "RUNNING" => Self::Running,
            "COMPLETED" => Self::Completed,
            "FAILED" => Self::Failed,
            "CANCELLED" => Self::Cancelled,
            "ERROR" => Self::Error,
            "TIMEOUT" => Self::Timeout,
            _ => Self::Other(raw.trim().to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "QUEUED",
            Self::Assigned => "ASSIGNED",
            Self::Processing => "PROCESSING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Error => "ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Other(s) => s,
        }
    }

    /// Server-side terminal states; the client-side `Timeout` is not one.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Error
        )
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        *self == Self::Completed
    }
}

impl From<String> for QueueStatus {
    fn from(raw: String) -> Self {
        Self::from_wire(&raw)
    }
}

impl From<QueueStatus> for String {
    fn from(status: QueueStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
