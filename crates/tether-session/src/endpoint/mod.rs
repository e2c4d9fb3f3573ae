//! Remote identities and their aggregate presence.
//!
//! An endpoint is one remote person or service, possibly signed in from
//! several devices at once. Each device is a [`Connection`]; the endpoint's
//! presence is always derived from them, never set directly.

mod calls;


use std::sync::{Arc, RwLock};

use tether_common::SessionError;
use tokio::sync::broadcast;
use tracing::debug;

use crate::call::DirectConnectionHandle;
use crate::client::Client;
use crate::connection::Connection;
use crate::context::SessionContext;
use crate::presence::{resolve_aggregate_presence, HasPresence, Presence, PresenceState, PresenceUpdate};
use crate::signaling::MessageSignal;
use crate::sync::{read, write};

/// A remote identity. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Endpoint {
    inner: Arc<EndpointInner>,
}

struct EndpointInner {
    id: String,
    ctx: SessionContext,
    presence: PresenceState,
    state: RwLock<EndpointState>,
}

#[derive(Default)]
struct EndpointState {
    connections: Vec<Connection>,
    direct_connection: Option<DirectConnectionHandle>,
}

impl Endpoint {
    /// Build an endpoint bound to `client`. The endpoint is not registered;
    /// use [`Client::get_endpoint`] for a tracked instance.
    pub fn new(client: &Client, id: impl Into<String>) -> Self {
        Self::with_context(client.context(), id)
    }

    pub(crate) fn with_context(ctx: SessionContext, id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EndpointInner {
                id: id.into(),
                ctx,
                presence: PresenceState::default(),
                state: RwLock::new(EndpointState::default()),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub(crate) fn context(&self) -> &SessionContext {
        &self.inner.ctx
    }

    /// True if both handles point at the same endpoint instance.
    pub fn ptr_eq(&self, other: &Endpoint) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn on_presence(&self) -> broadcast::Receiver<Presence> {
        self.inner.presence.subscribe()
    }

    /// Snapshot of the connections in their current priority order.
    pub fn connections(&self) -> Vec<Connection> {
        read(&self.inner.state).connections.clone()
    }

    pub fn direct_connection(&self) -> Option<DirectConnectionHandle> {
        read(&self.inner.state).direct_connection.clone()
    }

    /// Find a connection by id. Without an id the endpoint must have exactly
    /// one connection, which is returned.
    pub fn get_connection(&self, connection_id: Option<&str>) -> Result<Option<Connection>, SessionError> {
        let state = read(&self.inner.state);
        match connection_id {
            Some(id) => Ok(state.connections.iter().find(|c| c.id() == id).cloned()),
            None if state.connections.len() <= 1 => Ok(state.connections.first().cloned()),
            None => Err(SessionError::invalid(format!(
                "endpoint {} has {} connections; a connection id is required",
                self.id(),
                state.connections.len()
            ))),
        }
    }

    /// Find a connection by id, creating and resolving it if unknown.
    pub(crate) fn connection_or_insert(&self, connection_id: &str) -> Result<Connection, SessionError> {
        {
            let state = read(&self.inner.state);
            if let Some(existing) = state.connections.iter().find(|c| c.id() == connection_id) {
                return Ok(existing.clone());
            }
        }

        let connection = {
            let mut state = write(&self.inner.state);
            match state.connections.iter().find(|c| c.id() == connection_id) {
                Some(existing) => existing.clone(),
                None => {
                    let connection =
                        Connection::new(self.inner.ctx.clone(), connection_id, self.id())?;
                    state.connections.push(connection.clone());
                    debug!(endpoint_id = %self.id(), connection_id, "connection added");
                    connection
                }
            }
        };
        self.resolve_presence();
        Ok(connection)
    }

    /// Record a presence change from one of this endpoint's connections and
    /// notify subscribers of the new aggregate.
    pub fn set_presence(&self, update: PresenceUpdate) -> Result<(), SessionError> {
        let Some(connection_id) = update.connection_id.as_deref().filter(|id| !id.is_empty()) else {
            return Err(SessionError::invalid(format!(
                "can't set presence on endpoint {} without a connection id",
                self.id()
            )));
        };

        let connection = self.connection_or_insert(connection_id)?;
        connection.presence_state().store(update.presence_or_available());

        let aggregate = self.resolve_presence();
        self.inner.presence.notify(aggregate);
        Ok(())
    }

    /// Re-sort the connections by presence priority and adopt the first
    /// one's presence, or `unavailable` without connections. Emits nothing.
    pub fn resolve_presence(&self) -> Presence {
        let mut state = write(&self.inner.state);
        let presence = resolve_aggregate_presence(&mut state.connections);
        self.inner.presence.store(presence.clone());
        presence
    }

    pub(crate) fn clear_connections(&self) {
        write(&self.inner.state).connections.clear();
        self.resolve_presence();
    }

    pub async fn send_message(
        &self,
        connection_id: Option<String>,
        message: serde_json::Value,
    ) -> Result<(), SessionError> {
        if self.id().is_empty() {
            return Err(SessionError::invalid("can't send a message to an endpoint without an id"));
        }
        let signal = MessageSignal {
            recipient: self.id().to_string(),
            connection_id,
            message,
        };
        self.inner.ctx.channel().send_message(signal).await?;
        Ok(())
    }

    pub(crate) fn store_direct_connection(&self, handle: Option<DirectConnectionHandle>) {
        write(&self.inner.state).direct_connection = handle;
    }

    /// Clear the stored handle only if it is still the one identified by `id`.
    pub(crate) fn clear_direct_connection(&self, id: &str) {
        let mut state = write(&self.inner.state);
        if state.direct_connection.as_ref().is_some_and(|dc| dc.id() == id) {
            state.direct_connection = None;
        }
    }
}

impl HasPresence for Endpoint {
    fn presence(&self) -> Presence {
        self.inner.presence.get()
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = read(&self.inner.state);
        f.debug_struct("Endpoint")
            .field("id", &self.inner.id)
            .field("presence", &self.inner.presence.get())
            .field("connections", &state.connections.len())
            .field("direct_connection", &state.direct_connection.as_ref().map(|dc| dc.id().to_string()))
            .finish()
    }
}
