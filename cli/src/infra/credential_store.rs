//! Infrastructure implementation of the `CredentialStore` port.
//!
//! `FileCredentialStore` keeps the credential in `~/.rediacc/config.json`
//! and rewrites it atomically (temp file + rename). Keys it does not own are
//! preserved across writes.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::application::ports::CredentialStore;
use crate::domain::credential::{Credential, Identity, TOKEN_ENV};
use crate::domain::error::ClientError;
use crate::infra::fs::{ensure_private_dir, rediacc_dir, set_mode};

pub const CREDENTIAL_FILE: &str = "config.json";

const WRITE_ATTEMPTS: u32 = 5;
const WRITE_BACKOFF: Duration = Duration::from_millis(50);

/// On-disk layout of `config.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    vault_company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_rotated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl StoredConfig {
    fn identity(&self) -> Identity {
        Identity {
            email: self.email.clone(),
            company: self.company.clone(),
            vault_company: self.vault_company.clone(),
        }
    }

    fn clear_session(&mut self) {
        self.token = None;
        self.email = None;
        self.company = None;
        self.vault_company = None;
        self.token_rotated_at = None;
    }
}

/// File-backed credential store. Never caches; every call reads the file.
pub struct FileCredentialStore {
    path: PathBuf,
    env_var: String,
}

impl FileCredentialStore {
    /// Store at `~/.rediacc/config.json`, honouring `REDIACC_TOKEN`.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self::with_path(rediacc_dir()?.join(CREDENTIAL_FILE)))
    }

    /// Store at an explicit path (used in tests).
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            env_var: TOKEN_ENV.to_string(),
        }
    }

    /// Reads the environment override from `name` instead of `REDIACC_TOKEN`.
    #[must_use]
    pub fn with_env_var(mut self, name: &str) -> Self {
        self.env_var = name.to_string();
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw file content; `None` when the file is missing or blank.
    fn read(&self) -> Result<Option<String>, ClientError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))
            .map_err(storage)?;
        Ok((!content.trim().is_empty()).then_some(content))
    }

    fn parse(&self, content: &str) -> Result<StoredConfig, ClientError> {
        serde_json::from_str(content)
            .with_context(|| format!("parsing {}", self.path.display()))
            .map_err(storage)
    }

    fn load(&self) -> Result<StoredConfig, ClientError> {
        match self.read()? {
            Some(content) => self.parse(&content),
            None => Ok(StoredConfig::default()),
        }
    }

    /// Where an unparseable file is moved aside before it is replaced.
    #[must_use]
    pub fn backup_path(&self) -> PathBuf {
        self.path.with_extension("json.corrupt")
    }

    /// An unreadable file fails the write. An unparseable one is copied to
    /// [`Self::backup_path`] first so none of its keys are lost for good.
    fn update(&self, apply: impl FnOnce(&mut StoredConfig)) -> Result<(), ClientError> {
        let mut config = match self.read()? {
            None => StoredConfig::default(),
            Some(content) => match self.parse(&content) {
                Ok(config) => config,
                Err(e) => {
                    let backup = self.backup_path();
                    std::fs::write(&backup, &content)
                        .with_context(|| format!("backing up to {}", backup.display()))
                        .and_then(|()| set_mode(&backup, 0o600))
                        .map_err(storage)?;
                    tracing::warn!("{e}; previous content saved to {}", backup.display());
                    StoredConfig::default()
                }
            },
        };
        apply(&mut config);
        let content = serde_json::to_string_pretty(&config)
            .context("serializing credentials")
            .map_err(storage)?;

        let mut attempt = 1;
        loop {
            match self.write_atomic(content.as_bytes()) {
                Ok(()) => return Ok(()),
                Err(e) if attempt < WRITE_ATTEMPTS => {
                    tracing::debug!(attempt, "credential write failed, retrying: {e:#}");
                    std::thread::sleep(WRITE_BACKOFF * attempt);
                    attempt += 1;
                }
                Err(e) => return Err(storage(e)),
            }
        }
    }

    fn write_atomic(&self, content: &[u8]) -> anyhow::Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("{} has no parent", self.path.display()))?;
        ensure_private_dir(parent)?;

        let temp_path = parent.join(format!(".{CREDENTIAL_FILE}.{}.tmp", std::process::id()));
        let result = (|| {
            let mut file = std::fs::File::create(&temp_path)
                .with_context(|| format!("writing temp file {}", temp_path.display()))?;
            set_mode(&temp_path, 0o600)?;
            file.write_all(content)?;
            file.sync_all()?;
            std::fs::rename(&temp_path, &self.path)
                .with_context(|| format!("finalizing {}", self.path.display()))
        })();
        if result.is_err() {
            let _ = std::fs::remove_file(&temp_path);
        }
        result
    }
}

fn storage(err: anyhow::Error) -> ClientError {
    ClientError::Storage(format!("{err:#}"))
}

impl CredentialStore for FileCredentialStore {
    fn stored_token(&self) -> Result<Option<String>, ClientError> {
        Ok(self.load()?.token)
    }

    fn env_token(&self) -> Option<String> {
        std::env::var(&self.env_var)
            .ok()
            .filter(|v| !v.trim().is_empty())
    }

    fn identity(&self) -> Result<Identity, ClientError> {
        Ok(self.load()?.identity())
    }

    fn save(&self, credential: &Credential, identity: Option<&Identity>) -> Result<(), ClientError> {
        self.update(|c| {
            c.token = Some(credential.as_str().to_string());
            c.token_rotated_at = Some(Utc::now());
            if let Some(id) = identity {
                c.email.clone_from(&id.email);
                c.company.clone_from(&id.company);
                c.vault_company.clone_from(&id.vault_company);
            }
        })
    }

    fn set_vault_company(&self, vault: &str) -> Result<(), ClientError> {
        self.update(|c| c.vault_company = Some(vault.to_string()))
    }

    fn clear(&self) -> Result<(), ClientError> {
        self.update(StoredConfig::clear_session)
    }
}
