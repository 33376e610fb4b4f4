//! Persistent host-key pins in `~/.rediacc/known_hosts`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::domain::ssh::KnownHostsEntry;
use crate::infra::fs::{ensure_private_dir, rediacc_dir, set_mode};

pub struct KnownHostsStore {
    path: PathBuf,
}

impl KnownHostsStore {
    /// Store at `~/.rediacc/known_hosts`.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self> {
        Ok(Self::with_path(rediacc_dir()?.join("known_hosts")))
    }

    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pinned entry whose host list contains `host`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn lookup(&self, host: &str) -> Result<Option<KnownHostsEntry>> {
        Ok(self
            .entries()?
            .into_iter()
            .find(|e| e.hosts.iter().any(|h| h == host)))
    }

    /// Pins `entry`, replacing any entry that shares one of its hosts.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn remember(&self, entry: &KnownHostsEntry) -> Result<()> {
        let mut entries = self.entries()?;
        entries.retain(|e| !e.hosts.iter().any(|h| entry.hosts.contains(h)));
        entries.push(entry.clone());
        self.write(&entries)
    }

    /// Drops every entry for `host`. Returns whether anything was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be rewritten.
    pub fn remove(&self, host: &str) -> Result<bool> {
        let mut entries = self.entries()?;
        let before = entries.len();
        entries.retain(|e| !e.hosts.iter().any(|h| h == host));
        if entries.len() == before {
            return Ok(false);
        }
        self.write(&entries)?;
        Ok(true)
    }

    fn entries(&self) -> Result<Vec<KnownHostsEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("read {}", self.path.display()))?;
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .filter_map(|l| match KnownHostsEntry::parse(l) {
                Ok(e) => Some(e),
                Err(e) => {
                    tracing::warn!("skipping known_hosts line: {e}");
                    None
                }
            })
            .collect())
    }

    fn write(&self, entries: &[KnownHostsEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            ensure_private_dir(parent)?;
        }
        let content: String = entries.iter().map(KnownHostsEntry::to_line).collect();
        std::fs::write(&self.path, content)
            .with_context(|| format!("write {}", self.path.display()))?;
        set_mode(&self.path, 0o600)
    }
}
