//! Queue protocol types: submission options, completion results, the
//! instruction ("queue vault") builder and nested result decoding.

use std::collections::BTreeMap;
use std::time::Duration;

use rediacc_common::{ApiResponse, QueueStatus, ResultTable, row_str};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::domain::error::ClientError;
use crate::domain::machine::MachineConnectionInfo;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_PRIORITY: u8 = 3;

/// Table holding the nested `vaultContent` of a finished task.
pub const RESPONSE_VAULT_TABLE: usize = 2;

// ── Options ──────────────────────────────────────────────────────────────────

/// Polling cadence for [`QueueStatus`] checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TASK_TIMEOUT,
        }
    }
}

/// Options for a queue submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOptions {
    /// Poll until the task reaches a final state.
    pub wait: bool,
    pub poll_interval: Duration,
    pub timeout: Duration,
    /// 1 (highest) to 5 (lowest).
    pub priority: u8,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            wait: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TASK_TIMEOUT,
            priority: DEFAULT_PRIORITY,
        }
    }
}

impl SubmitOptions {
    #[must_use]
    pub fn poll(&self) -> PollOptions {
        PollOptions {
            interval: self.poll_interval,
            timeout: self.timeout,
        }
    }
}

/// A queue item ready to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    pub team: String,
    pub machine: String,
    pub bridge: String,
    /// Serialized instruction, plaintext or already encrypted.
    pub vault: String,
    pub priority: u8,
}

impl SubmitRequest {
    /// Request parameters for `CreateQueueItem`.
    #[must_use]
    pub fn params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("teamName".into(), json!(self.team));
        params.insert("machineName".into(), json!(self.machine));
        params.insert("bridgeName".into(), json!(self.bridge));
        params.insert("queueVault".into(), json!(self.vault));
        params.insert("priority".into(), json!(self.priority));
        params
    }
}

// ── Results ──────────────────────────────────────────────────────────────────

/// Outcome of polling a task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionResult {
    pub task_id: String,
    pub status: QueueStatus,
    /// `true` only when a server-side final state was observed.
    pub completed: bool,
    /// Every table but 0, keyed by its index in the response.
    pub tables: BTreeMap<usize, ResultTable>,
}

impl CompletionResult {
    /// Final result built from a terminal trace response.
    #[must_use]
    pub fn terminal(task_id: &str, status: QueueStatus, response: &ApiResponse) -> Self {
        let tables = response
            .result_sets
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, t)| (i, t.clone()))
            .collect();
        Self {
            task_id: task_id.to_string(),
            status,
            completed: true,
            tables,
        }
    }

    /// Client-side timeout; not a server status.
    #[must_use]
    pub fn timed_out(task_id: &str) -> Self {
        Self {
            task_id: task_id.to_string(),
            status: QueueStatus::Timeout,
            completed: false,
            tables: BTreeMap::new(),
        }
    }

    /// Converts a timeout into [`ClientError::TaskTimeout`].
    ///
    /// # Errors
    ///
    /// Returns the error when `status` is `TIMEOUT`.
    pub fn require_finished(self, timeout: Duration) -> Result<Self, ClientError> {
        if self.status == QueueStatus::Timeout {
            return Err(ClientError::TaskTimeout {
                task_id: self.task_id,
                timeout,
            });
        }
        Ok(self)
    }

    #[must_use]
    pub fn command_output(&self) -> Option<String> {
        extract_command_output(&self.tables)
    }
}

/// Task id from table 1 row 0 of a `CreateQueueItem` response.
///
/// # Errors
///
/// Returns [`ClientError::MalformedResponse`] if the field is missing.
pub fn extract_task_id(response: &ApiResponse) -> Result<String, ClientError> {
    response
        .first_row(1)
        .and_then(|row| row_str(row, "taskId"))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ClientError::MalformedResponse("no taskId in response".into()))
}

/// Status from table 1 row 0 of a `GetQueueItemTrace` response.
#[must_use]
pub fn extract_status(response: &ApiResponse) -> Option<QueueStatus> {
    response
        .first_row(1)
        .and_then(|row| row_str(row, "status"))
        .map(QueueStatus::from_wire)
}

// ── Nested result decoding ───────────────────────────────────────────────────

/// First decode stage: the `vaultContent` column.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseVault {
    /// JSON text of the task result; some agents inline the object.
    #[serde(default)]
    pub result: Option<Value>,
}

/// Second decode stage: the task result written by the remote agent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TaskResult {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub command_output: Option<String>,
    #[serde(default)]
    pub exit_code: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Decodes `vaultContent` text into a [`TaskResult`].
///
/// Returns `None` if either stage does not parse.
#[must_use]
pub fn decode_task_result(vault_content: &str) -> Option<TaskResult> {
    let outer: ResponseVault = serde_json::from_str(vault_content).ok()?;
    match outer.result? {
        Value::String(inner) => serde_json::from_str(&inner).ok(),
        obj @ Value::Object(_) => serde_json::from_value(obj).ok(),
        _ => None,
    }
}

/// `command_output` of a finished task, or `None` for "no output".
#[must_use]
pub fn extract_command_output(tables: &BTreeMap<usize, ResultTable>) -> Option<String> {
    let row = tables.get(&RESPONSE_VAULT_TABLE)?.first_row()?;
    let content = row_str(row, "vaultContent")?;
    decode_task_result(content)?.command_output
}

// ── Instruction builder ──────────────────────────────────────────────────────

/// Builds the instruction payload (`queueVault`) executed by a bridge.
#[derive(Debug, Clone)]
pub struct QueueVault {
    function: String,
    params: Map<String, Value>,
    description: Option<String>,
    priority: u8,
    team: String,
    machine: Option<MachineConnectionInfo>,
}

impl QueueVault {
    #[must_use]
    pub fn new(function: &str, team: &str) -> Self {
        Self {
            function: function.to_string(),
            params: Map::new(),
            description: None,
            priority: DEFAULT_PRIORITY,
            team: team.to_string(),
            machine: None,
        }
    }

    #[must_use]
    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn description(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }

    #[must_use]
    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn machine(mut self, info: MachineConnectionInfo) -> Self {
        self.machine = Some(info);
        self
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut general = Map::new();
        general.insert("TEAM_NAME".into(), json!(self.team));
        let mut machines = Map::new();
        if let Some(info) = &self.machine {
            general.insert("MACHINE_NAME".into(), json!(info.name));
            general.insert("UNIVERSAL_USER_NAME".into(), json!(info.universal_user.name));
            general.insert("UNIVERSAL_USER_ID".into(), json!(info.universal_user.id));
            machines.insert(
                info.name.clone(),
                json!({
                    "IP": info.ip,
                    "USER": info.user,
                    "DATASTORE": info.datastore,
                }),
            );
        }
        json!({
            "type": "bash_function",
            "function": self.function,
            "params": self.params,
            "priority": self.priority,
            "description": self.description.clone().unwrap_or_else(|| self.function.clone()),
            "addedVia": "rediacc-cli",
            "contextData": {
                "GENERAL_SETTINGS": general,
                "MACHINES": machines,
            },
        })
    }

    #[must_use]
    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }
}
