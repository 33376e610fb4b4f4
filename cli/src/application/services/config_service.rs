//! Application service: settings use-cases.

use anyhow::Result;

use crate::application::ports::ConfigStore;
use crate::domain::config::RediaccConfig;

/// Load configuration.
pub fn load_config(store: &impl ConfigStore) -> Result<RediaccConfig> {
    store.load()
}

/// Validate, apply and persist one setting. Returns the updated settings.
pub fn set_value(store: &impl ConfigStore, key: &str, value: &str) -> Result<RediaccConfig> {
    let mut config = store.load()?;
    config.set(key, value)?;
    store.save(&config)?;
    Ok(config)
}
