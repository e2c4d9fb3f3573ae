//! Client and call settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tether_common::SessionError;
use tether_config::{IceServerConfig, TetherConfig};

/// One ICE server, as handed to the media layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl From<&IceServerConfig> for IceServer {
    fn from(config: &IceServerConfig) -> Self {
        Self {
            urls: config.urls.clone(),
            username: config.username.clone(),
            credential: config.credential.clone(),
        }
    }
}

/// The ICE server list used for a call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServers {
    pub ice_servers: Vec<IceServer>,
}

/// Media constraints. `extra` carries anything the media layer understands
/// beyond the audio/video switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
            extra: serde_json::Map::new(),
        }
    }
}

/// Settings a call is built with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallSettings {
    pub constraints: MediaConstraints,
    pub servers: IceServers,
}

impl CallSettings {
    /// Overlay per-call values on a copy of these settings. Per-call values win.
    pub fn merged(
        &self,
        constraints: Option<MediaConstraints>,
        servers: Option<IceServers>,
    ) -> CallSettings {
        CallSettings {
            constraints: constraints.unwrap_or_else(|| self.constraints.clone()),
            servers: servers.unwrap_or_else(|| self.servers.clone()),
        }
    }
}

/// TURN credential refresh settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnSettings {
    pub enabled: bool,
    pub refresh_interval: Duration,
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh_interval: Duration::from_secs(20 * 60 * 60),
        }
    }
}

/// Everything a [`Client`](crate::Client) needs besides its collaborators.
#[derive(Debug, Clone, Default)]
pub struct ClientSettings {
    pub app_id: String,
    pub base_url: Option<String>,
    pub call: CallSettings,
    pub turn: TurnSettings,
}

impl ClientSettings {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            ..Default::default()
        }
    }

    /// Build settings from a loaded config.
    pub fn from_config(config: &TetherConfig) -> Result<Self, SessionError> {
        if config.app.app_id.trim().is_empty() {
            return Err(SessionError::invalid("app_id is required"));
        }
        Ok(Self {
            app_id: config.app.app_id.clone(),
            base_url: config.app.base_url.clone(),
            call: CallSettings {
                constraints: MediaConstraints {
                    audio: config.call.audio,
                    video: config.call.video,
                    extra: serde_json::Map::new(),
                },
                servers: IceServers {
                    ice_servers: config.call.ice_servers.iter().map(IceServer::from).collect(),
                },
            },
            turn: TurnSettings {
                enabled: config.turn.enabled,
                refresh_interval: Duration::from_secs(u64::from(config.turn.refresh_interval_secs)),
            },
        })
    }
}
