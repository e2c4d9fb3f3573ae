use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A fresh v4 UUID, used for call ids the transport didn't assign.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Short tag attached to every log line a client instance emits, so two
/// clients in one process can be told apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    const LEN: usize = 8;

    pub fn new() -> Self {
        let mut tag = Uuid::new_v4().simple().to_string();
        tag.truncate(Self::LEN);
        Self(tag)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
