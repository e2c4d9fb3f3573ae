//! Presence values, priority ordering, and the shared presence state.
//!
//! Presence on the wire is opaque: usually one of the well-known strings,
//! but any JSON value is carried through untouched. Well-known values have
//! a fixed priority (most present first); everything else ranks below them.

use std::fmt;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tether_common::EventBus;
use tokio::sync::broadcast;

use crate::sync::{read, write};

/// Well-known presence strings, most present first.
pub const PRIORITY: [&str; 6] = ["chat", "available", "away", "dnd", "xa", "unavailable"];

/// A presence value.
///
/// Converting from a string or JSON value normalizes the well-known names
/// into their variants, so `Custom` only ever holds unrecognized values
/// unless constructed directly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum Presence {
    Chat,
    Available,
    Away,
    Dnd,
    Xa,
    #[default]
    Unavailable,
    Custom(serde_json::Value),
}

impl Presence {
    /// Position in [`PRIORITY`]; unrecognized values rank last.
    pub fn rank(&self) -> usize {
        match self {
            Presence::Chat => 0,
            Presence::Available => 1,
            Presence::Away => 2,
            Presence::Dnd => 3,
            Presence::Xa => 4,
            Presence::Unavailable => 5,
            Presence::Custom(_) => usize::MAX,
        }
    }

    /// The well-known name, if this is a well-known value.
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            Presence::Custom(_) => None,
            known => Some(PRIORITY[known.rank()]),
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "chat" => Some(Presence::Chat),
            "available" => Some(Presence::Available),
            "away" => Some(Presence::Away),
            "dnd" => Some(Presence::Dnd),
            "xa" => Some(Presence::Xa),
            "unavailable" => Some(Presence::Unavailable),
            _ => None,
        }
    }
}

impl From<&str> for Presence {
    fn from(value: &str) -> Self {
        Presence::from_name(value)
            .unwrap_or_else(|| Presence::Custom(serde_json::Value::String(value.to_string())))
    }
}

impl From<String> for Presence {
    fn from(value: String) -> Self {
        Presence::from_name(&value).unwrap_or(Presence::Custom(serde_json::Value::String(value)))
    }
}

impl From<serde_json::Value> for Presence {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => Presence::from(s),
            other => Presence::Custom(other),
        }
    }
}

impl From<Presence> for serde_json::Value {
    fn from(presence: Presence) -> Self {
        match presence {
            Presence::Custom(value) => value,
            known => serde_json::Value::String(known.to_string()),
        }
    }
}

impl fmt::Display for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Presence::Custom(serde_json::Value::String(s)) => f.write_str(s),
            Presence::Custom(other) => write!(f, "{other}"),
            known => f.write_str(PRIORITY[known.rank()]),
        }
    }
}

/// Anything that currently holds a presence value.
pub trait HasPresence {
    fn presence(&self) -> Presence;
}

/// Sort `items` by presence priority and return the winning value.
///
/// The sort is stable: items with equal rank keep their relative order.
/// Returns [`Presence::Unavailable`] for an empty slice. Each item's
/// presence is read exactly once.
pub fn resolve_aggregate_presence<T: HasPresence>(items: &mut [T]) -> Presence {
    items.sort_by_cached_key(|item| item.presence().rank());
    items
        .first()
        .map(HasPresence::presence)
        .unwrap_or_default()
}

/// Input to a `set_presence` call.
#[derive(Debug, Clone, Default)]
pub struct PresenceUpdate {
    /// Defaults to `available` when absent.
    pub presence: Option<Presence>,
    /// Required when the target is an endpoint.
    pub connection_id: Option<String>,
}

impl PresenceUpdate {
    pub fn new(presence: impl Into<Presence>) -> Self {
        Self {
            presence: Some(presence.into()),
            connection_id: None,
        }
    }

    pub fn for_connection(mut self, connection_id: impl Into<String>) -> Self {
        self.connection_id = Some(connection_id.into());
        self
    }

    pub(crate) fn presence_or_available(&self) -> Presence {
        self.presence.clone().unwrap_or(Presence::Available)
    }
}

/// Presence storage plus change notification, composed into every entity
/// that has a presence.
#[derive(Debug, Default)]
pub struct PresenceState {
    current: RwLock<Presence>,
    changes: EventBus<Presence>,
}

impl PresenceState {
    pub fn get(&self) -> Presence {
        read(&self.current).clone()
    }

    pub(crate) fn store(&self, presence: Presence) {
        *write(&self.current) = presence;
    }

    pub(crate) fn notify(&self, presence: Presence) {
        self.changes.publish(presence);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Presence> {
        self.changes.subscribe()
    }
}
