//! Core TOML config loading: read from path or platform default.

use crate::schema::TetherConfig;
use crate::validation;
use std::path::Path;
use tether_common::ConfigError;
use tracing::info;

use super::paths::{create_default_config, default_config_path};

/// Parse and validate config from TOML text.
pub fn load_from_str(content: &str) -> Result<TetherConfig, ConfigError> {
    let config: TetherConfig = toml::from_str(content)
        .map_err(|e| ConfigError::ParseError(format!("failed to parse TOML: {e}")))?;

    validation::validate(&config)?;
    Ok(config)
}

/// Load config from a specific TOML file path.
///
/// Deserializes the file using serde defaults for any missing fields, then
/// validates it. Unlike cosmetic settings, a client cannot run on an invalid
/// config (there is no usable default app id), so validation errors are returned.
pub fn load_from_path(path: &Path) -> Result<TetherConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ParseError(format!("failed to read {}: {e}", path.display())))?;

    let config = load_from_str(&content)?;

    info!("loaded config from {}", path.display());
    Ok(config)
}

/// Load config from the platform-specific default path.
///
/// On macOS: `~/Library/Application Support/tether/config.toml`
/// On Linux: `~/.config/tether/config.toml`
///
/// If the file does not exist, a commented template is written first; the
/// template leaves `app_id` empty, so the caller gets a validation error
/// telling them what to fill in.
pub fn load_default() -> Result<TetherConfig, ConfigError> {
    let path = default_config_path()?;

    if !path.exists() {
        info!("no config found at {}, creating default", path.display());
        create_default_config(&path)?;
    }

    load_from_path(&path)
}
