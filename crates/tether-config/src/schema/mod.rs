//! Configuration schema types for tether.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod app;
mod call;
mod system;

pub use app::*;
pub use call::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for a tether client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct TetherConfig {
    pub app: AppConfig,
    pub call: CallConfig,
    pub turn: TurnConfig,
    pub logging: LoggingConfig,
}

// =============================================================================
// Tests
// =============================================================================
