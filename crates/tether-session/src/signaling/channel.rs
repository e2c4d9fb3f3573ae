//! The signaling transport contract and the payloads that cross it.
//!
//! The transport owns the wire encoding; this layer only decides what is
//! sent, to whom, and for which logical flow.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tether_common::TransportError;

use crate::presence::Presence;
use crate::settings::IceServer;

/// Which logical flow an outbound signal belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignalTarget {
    Call,
    DirectConnection,
}

impl SignalTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalTarget::Call => "call",
            SignalTarget::DirectConnection => "directConnection",
        }
    }
}

/// SDP direction for `send_sdp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

/// A call-scoped signal addressed to one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundSignal {
    pub target: SignalTarget,
    /// Set for offers and answers only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_type: Option<SdpType>,
    pub call_id: String,
    /// Recipient endpoint id.
    pub recipient: String,
    /// Pins the signal to one of the recipient's connections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    /// Opaque body produced by the media layer.
    pub payload: serde_json::Value,
}

/// A text or structured message addressed to an endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSignal {
    pub recipient: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    pub message: serde_json::Value,
}

/// Identity returned by a successful authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub id: String,
    pub name: String,
}

/// One roster entry of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    pub endpoint_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
}

/// The transport collaborator. Every operation is a single round trip and
/// reports failure as a [`TransportError`]; retries, timeouts and encoding
/// are the implementation's business.
#[async_trait]
pub trait SignalingChannel: Send + Sync {
    async fn open(&self, app_id: &str, token: Option<&str>) -> Result<(), TransportError>;

    async fn authenticate(&self, app_id: &str) -> Result<AuthenticatedUser, TransportError>;

    fn is_open(&self) -> bool;

    async fn close(&self) -> Result<(), TransportError>;

    async fn join_group(&self, group_id: &str) -> Result<(), TransportError>;

    async fn leave_group(&self, group_id: &str) -> Result<(), TransportError>;

    async fn get_group_members(&self, group_id: &str) -> Result<Vec<GroupMember>, TransportError>;

    async fn get_turn_credentials(&self) -> Result<Vec<IceServer>, TransportError>;

    async fn send_message(&self, message: MessageSignal) -> Result<(), TransportError>;

    async fn send_sdp(&self, signal: OutboundSignal) -> Result<(), TransportError>;

    async fn send_connected(&self, signal: OutboundSignal) -> Result<(), TransportError>;

    async fn send_modify(&self, signal: OutboundSignal) -> Result<(), TransportError>;

    async fn send_candidate(&self, signal: OutboundSignal) -> Result<(), TransportError>;

    async fn send_bye(&self, signal: OutboundSignal) -> Result<(), TransportError>;

    async fn send_presence(&self, presence: &Presence) -> Result<(), TransportError>;
}
