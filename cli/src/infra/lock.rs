//! Infrastructure implementation of the `SingleFlightLock` port.
//!
//! An advisory exclusive lock on `~/.rediacc/api_call.lock` serializes
//! credential-bearing API calls across every CLI process of the user.

use std::fs::{File, OpenOptions, TryLockError};
use std::path::PathBuf;
use std::time::Duration;

use tokio::time::Instant;

use crate::application::ports::SingleFlightLock;
use crate::domain::error::ClientError;
use crate::infra::fs::{ensure_private_dir, rediacc_dir};

pub const LOCK_FILE: &str = "api_call.lock";

const RETRY_INTERVAL: Duration = Duration::from_millis(100);

pub struct FileLock {
    path: PathBuf,
}

impl FileLock {
    /// Lock at `~/.rediacc/api_call.lock`.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self::with_path(rediacc_dir()?.join(LOCK_FILE)))
    }

    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    fn open(&self) -> Result<File, ClientError> {
        if let Some(parent) = self.path.parent() {
            ensure_private_dir(parent).map_err(|e| ClientError::Storage(format!("{e:#}")))?;
        }
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.path)
            .map_err(|e| ClientError::Storage(format!("opening {}: {e}", self.path.display())))
    }
}

/// Holds the lock until dropped.
#[derive(Debug)]
pub struct FileLockGuard {
    file: File,
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::debug!("releasing api lock: {e}");
        }
    }
}

impl SingleFlightLock for FileLock {
    type Guard = FileLockGuard;

    async fn acquire(&self, timeout: Duration) -> Result<FileLockGuard, ClientError> {
        let file = self.open()?;
        let deadline = Instant::now() + timeout;
        loop {
            match file.try_lock() {
                Ok(()) => return Ok(FileLockGuard { file }),
                Err(TryLockError::WouldBlock) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(ClientError::LockTimeout(timeout));
                    }
                    tokio::time::sleep(RETRY_INTERVAL.min(deadline - now)).await;
                }
                Err(TryLockError::Error(e)) => {
                    return Err(ClientError::Storage(format!(
                        "locking {}: {e}",
                        self.path.display()
                    )));
                }
            }
        }
    }
}
