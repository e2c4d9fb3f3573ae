//! Call defaults and TURN refresh configuration.

use serde::{Deserialize, Serialize};

/// One ICE server entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

/// Default media settings applied to every call unless overridden per call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    pub audio: bool,
    pub video: bool,
    pub ice_servers: Vec<IceServerConfig>,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
            ice_servers: Vec::new(),
        }
    }
}

/// TURN credential refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnConfig {
    pub enabled: bool,
    /// Refresh interval in seconds (valid range: 60-604800).
    pub refresh_interval_secs: u32,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh_interval_secs: 72_000,
        }
    }
}
