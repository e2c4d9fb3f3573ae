//! Application identity configuration.

use serde::{Deserialize, Serialize};

/// Which application the client authenticates as.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct AppConfig {
    /// Application id issued by the signaling service. Required.
    pub app_id: String,
    pub base_url: Option<String>,
}
