//! Filesystem helpers shared by the file-backed stores.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// `~/.rediacc`, the directory holding credentials, settings and the lock.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn rediacc_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))
        .map(|h| h.join(".rediacc"))
}

/// Creates `path` and its parents, restricting `path` itself to the owner.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or restricted.
pub fn ensure_private_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("creating directory {}", path.display()))?;
    set_mode(path, 0o700)
}

/// Sets Unix permission bits. No-op elsewhere.
///
/// # Errors
///
/// Returns an error if the permissions cannot be changed.
pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
            .with_context(|| format!("setting permissions on {}", path.display()))?;
    }
    #[cfg(not(unix))]
    let _ = (path, mode);
    Ok(())
}
