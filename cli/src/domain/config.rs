//! Domain types and validators for client settings.
//!
//! Pure functions only. No I/O, no async, no filesystem access.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;
use crate::domain::machine::{DEFAULT_UNIVERSAL_USER, DEFAULT_UNIVERSAL_USER_ID, UniversalUser};
use crate::domain::queue::{DEFAULT_POLL_INTERVAL, DEFAULT_TASK_TIMEOUT};

// ── Constants ────────────────────────────────────────────────────────────────

pub const DEFAULT_API_URL: &str = "https://www.rediacc.com/api";
pub const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 30;

/// Overrides `api.url`.
pub const API_URL_ENV: &str = "REDIACC_API_URL";

pub const VALID_CONFIG_KEYS: &[&str] = &[
    "api.url",
    "api.lock_timeout_secs",
    "queue.poll_interval_secs",
    "queue.timeout_secs",
    "ssh.prefer_agent",
    "universal_user.name",
    "universal_user.id",
];

// ── Config schema ────────────────────────────────────────────────────────────

/// Settings stored in `~/.rediacc/settings.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct RediaccConfig {
    pub api: ApiConfig,
    pub queue: QueueConfig,
    pub ssh: SshConfig,
    pub universal_user: UniversalUserConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApiConfig {
    pub url: String,
    /// Bound on the wait for the cross-process API lock.
    pub lock_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_API_URL.to_string(),
            lock_timeout_secs: DEFAULT_LOCK_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QueueConfig {
    pub poll_interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            timeout_secs: DEFAULT_TASK_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SshConfig {
    /// Try `ssh-agent` before falling back to a key file.
    pub prefer_agent: bool,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self { prefer_agent: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UniversalUserConfig {
    pub name: String,
    pub id: String,
}

impl Default for UniversalUserConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_UNIVERSAL_USER.to_string(),
            id: DEFAULT_UNIVERSAL_USER_ID.to_string(),
        }
    }
}

impl RediaccConfig {
    /// API base URL, with `env_override` taking precedence when non-empty.
    #[must_use]
    pub fn api_url(&self, env_override: Option<&str>) -> String {
        env_override
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.api.url)
            .to_string()
    }

    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.api.lock_timeout_secs)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.queue.poll_interval_secs)
    }

    #[must_use]
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.queue.timeout_secs)
    }

    #[must_use]
    pub fn universal_user(&self) -> UniversalUser {
        UniversalUser {
            name: self.universal_user.name.clone(),
            id: self.universal_user.id.clone(),
        }
    }

    /// Current value of `key` rendered as text.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        Some(match key {
            "api.url" => self.api.url.clone(),
            "api.lock_timeout_secs" => self.api.lock_timeout_secs.to_string(),
            "queue.poll_interval_secs" => self.queue.poll_interval_secs.to_string(),
            "queue.timeout_secs" => self.queue.timeout_secs.to_string(),
            "ssh.prefer_agent" => self.ssh.prefer_agent.to_string(),
            "universal_user.name" => self.universal_user.name.clone(),
            "universal_user.id" => self.universal_user.id.clone(),
            _ => return None,
        })
    }

    /// Validates and applies `value` to `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value is invalid.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        validate_config_value(key, value)?;
        match key {
            "api.url" => self.api.url = value.trim_end_matches('/').to_string(),
            "api.lock_timeout_secs" => self.api.lock_timeout_secs = parse_secs(key, value)?,
            "queue.poll_interval_secs" => {
                self.queue.poll_interval_secs = parse_secs(key, value)?;
            }
            "queue.timeout_secs" => self.queue.timeout_secs = parse_secs(key, value)?,
            "ssh.prefer_agent" => self.ssh.prefer_agent = parse_bool(key, value)?,
            "universal_user.name" => self.universal_user.name = value.to_string(),
            "universal_user.id" => self.universal_user.id = value.to_string(),
            _ => validate_config_key(key)?,
        }
        Ok(())
    }

    /// Every settable key with its current value, in display order.
    #[must_use]
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        VALID_CONFIG_KEYS
            .iter()
            .filter_map(|k| self.get(k).map(|v| (*k, v)))
            .collect()
    }
}

// ── Validators ───────────────────────────────────────────────────────────────

/// Validates a configuration key against the whitelist.
///
/// # Errors
///
/// Returns an error if the key is not in the allowed list.
pub fn validate_config_key(key: &str) -> Result<()> {
    if !VALID_CONFIG_KEYS.contains(&key) {
        return Err(ConfigError::UnknownKey {
            key: key.to_string(),
            valid: VALID_CONFIG_KEYS.join(", "),
        }
        .into());
    }
    Ok(())
}

/// Validates a configuration value for the given key.
///
/// # Errors
///
/// Returns an error if the value is not valid for the key.
pub fn validate_config_value(key: &str, value: &str) -> Result<()> {
    match key {
        "api.url" => {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                return Err(invalid(key, value, "an http:// or https:// URL"));
            }
        }
        "api.lock_timeout_secs" | "queue.poll_interval_secs" | "queue.timeout_secs" => {
            parse_secs(key, value)?;
        }
        "ssh.prefer_agent" => {
            parse_bool(key, value)?;
        }
        "universal_user.name" => {
            let ok = !value.is_empty()
                && value
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
            if !ok {
                return Err(invalid(key, value, "a Unix user name"));
            }
        }
        "universal_user.id" => {
            if value.parse::<u32>().is_err() {
                return Err(invalid(key, value, "a numeric uid"));
            }
        }
        _ => {}
    }
    Ok(())
}

fn parse_secs(key: &str, value: &str) -> Result<u64> {
    match value.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(invalid(key, value, "a positive number of seconds")),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(invalid(key, value, "true or false")),
    }
}

fn invalid(key: &str, value: &str, expected: &str) -> anyhow::Error {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        expected: expected.to_string(),
    }
    .into()
}

// ── Unit tests ───────────────────────────────────────────────────────────────
