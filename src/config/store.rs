//! Configuration file read/write
//!
//! A missing file is not an error: the loop runs on defaults until the
//! settings panel writes one.

use super::schema::LoopConfig;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Config-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Read the loop configuration, falling back to defaults when absent
pub fn load_config(path: &Path) -> Result<LoopConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!("No config at {:?}, using defaults", path);
        return Ok(LoopConfig::default());
    }

    let content = fs::read_to_string(path)?;
    let config: LoopConfig = serde_json::from_str(&content)?;
    config.validate()?;

    tracing::debug!("Loaded config from {:?}: {:?}", path, config);

    Ok(config)
}

/// Write the loop configuration, creating parent directories as needed
pub fn save_config(config: &LoopConfig, path: &Path) -> Result<(), ConfigError> {
    config.validate()?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content)?;

    tracing::debug!("Saved config to {:?}", path);

    Ok(())
}
