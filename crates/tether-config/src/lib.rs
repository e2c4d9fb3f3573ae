//! Tether configuration system.
//!
//! Provides TOML-based configuration for the client session layer: the
//! application identity, default call media settings, TURN refresh and
//! logging. All sections use defaults so partial configs work, but the
//! application id has no usable default and must be set.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tether_config::{init_logging, load_config};
//!
//! let config = load_config().expect("failed to load config");
//! init_logging(&config.logging).expect("logger already installed");
//! ```

pub mod logging;
pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use logging::init_logging;
pub use schema::{
    AppConfig, CallConfig, IceServerConfig, LogLevel, LoggingConfig, TetherConfig, TurnConfig,
    CONFIG_SCHEMA_VERSION,
};
pub use toml_loader::{load_from_path, load_from_str};

use tether_common::ConfigError;

/// Convenience function to load config from the platform default path.
pub fn load_config() -> Result<TetherConfig, ConfigError> {
    toml_loader::load_default()
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &TetherConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}
