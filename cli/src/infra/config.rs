//! Infrastructure implementation of the `ConfigStore` port.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::application::ports::ConfigStore;
use crate::domain::config::RediaccConfig;
use crate::infra::fs::{rediacc_dir, set_mode};

pub const CONFIG_ENV: &str = "REDIACC_CONFIG";
pub const SETTINGS_FILE: &str = "settings.yaml";

/// YAML settings on disk: `$REDIACC_CONFIG`, else `~/.rediacc/settings.yaml`.
#[derive(Default)]
pub struct YamlConfigStore {
    path: Option<PathBuf>,
}

impl YamlConfigStore {
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }
}

impl ConfigStore for YamlConfigStore {
    fn load(&self) -> Result<RediaccConfig> {
        let path = self.path()?;
        if !path.exists() {
            return Ok(RediaccConfig::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(RediaccConfig::default());
        }
        serde_yaml::from_str(&content).with_context(|| format!("cannot parse {}", path.display()))
    }

    fn save(&self, config: &RediaccConfig) -> Result<()> {
        let path = self.path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        let content = serde_yaml::to_string(config).context("cannot serialize config")?;
        std::fs::write(&path, content)
            .with_context(|| format!("cannot write {}", path.display()))?;
        set_mode(&path, 0o600)
    }

    fn path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        if let Ok(val) = std::env::var(CONFIG_ENV)
            && !val.trim().is_empty()
        {
            return Ok(PathBuf::from(val));
        }
        Ok(rediacc_dir()?.join(SETTINGS_FILE))
    }
}
