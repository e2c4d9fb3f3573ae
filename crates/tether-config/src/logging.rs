//! `tracing` subscriber setup from the `[logging]` section.

use tether_common::ConfigError;
use tracing_subscriber::EnvFilter;

use crate::schema::LoggingConfig;

/// Build the filter for a logging config. `RUST_LOG` wins when set.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    let level = config.level.as_directive();
    let directive = if config.tether_only {
        format!("tether_session={level},tether_config={level}")
    } else {
        level.to_string()
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive))
}

/// Install a global fmt subscriber.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ConfigError> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .try_init()
        .map_err(|e| ConfigError::ParseError(format!("failed to install logger: {e}")))
}
