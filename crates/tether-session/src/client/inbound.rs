//! Routing of decoded server pushes into the registries.

use serde::{Deserialize, Serialize};
use tether_common::SessionError;
use tracing::debug;

use super::{Client, ClientEvent};
use crate::presence::{Presence, PresenceUpdate};

/// A server push, already decoded by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum InboundEvent {
    /// A remote connection changed its presence.
    Presence {
        endpoint_id: String,
        connection_id: String,
        presence: Presence,
    },
    GroupJoin {
        group_id: String,
        endpoint_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        connection_id: Option<String>,
    },
    GroupLeave {
        group_id: String,
        endpoint_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        connection_id: Option<String>,
    },
    Message {
        endpoint_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        connection_id: Option<String>,
        message: serde_json::Value,
    },
}

impl Client {
    /// Apply a server push. Unknown endpoints and connections are created on
    /// demand; events for groups that aren't tracked are ignored.
    pub fn dispatch(&self, event: InboundEvent) -> Result<(), SessionError> {
        match event {
            InboundEvent::Presence {
                endpoint_id,
                connection_id,
                presence,
            } => {
                let endpoint = self.require_endpoint(&endpoint_id)?;
                endpoint.set_presence(PresenceUpdate::new(presence).for_connection(connection_id))
            }
            InboundEvent::GroupJoin {
                group_id,
                endpoint_id,
                connection_id,
            } => {
                let Some(group) = self.get_group(&group_id)? else {
                    debug!(group_id = %group_id, endpoint_id = %endpoint_id, "join for untracked group");
                    return Ok(());
                };
                let endpoint = self.require_endpoint(&endpoint_id)?;
                if let Some(connection_id) = connection_id {
                    endpoint.connection_or_insert(&connection_id)?;
                }
                group.add_member(endpoint);
                Ok(())
            }
            InboundEvent::GroupLeave {
                group_id,
                endpoint_id,
                ..
            } => {
                let Some(group) = self.get_group(&group_id)? else {
                    debug!(group_id = %group_id, endpoint_id = %endpoint_id, "leave for untracked group");
                    return Ok(());
                };
                group.remove_member(&endpoint_id);
                Ok(())
            }
            InboundEvent::Message {
                endpoint_id,
                connection_id,
                message,
            } => {
                let endpoint = self.require_endpoint(&endpoint_id)?;
                self.publish(ClientEvent::Message {
                    endpoint,
                    connection_id,
                    message,
                });
                Ok(())
            }
        }
    }

    fn require_endpoint(&self, endpoint_id: &str) -> Result<crate::endpoint::Endpoint, SessionError> {
        self.get_endpoint(endpoint_id, true)?
            .ok_or_else(|| SessionError::invalid(format!("can't track endpoint {endpoint_id}")))
    }
}
