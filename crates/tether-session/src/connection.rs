//! One authenticated device or tab of a remote endpoint.

use std::sync::Arc;

use tether_common::SessionError;
use tokio::sync::broadcast;
use tracing::{debug, error};

use crate::call::{CallHandle, CallOptions, DirectConnectionHandle, DirectConnectionOptions};
use crate::context::SessionContext;
use crate::endpoint::Endpoint;
use crate::presence::{HasPresence, Presence, PresenceState, PresenceUpdate};

/// A single session of an [`Endpoint`].
///
/// Messaging and calling through a connection delegate to the owning
/// endpoint with the connection id pinned, so the resulting call or
/// message can only be answered by this session.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    id: String,
    endpoint_id: String,
    ctx: SessionContext,
    presence: PresenceState,
}

impl Connection {
    pub(crate) fn new(
        ctx: SessionContext,
        id: impl Into<String>,
        endpoint_id: impl Into<String>,
    ) -> Result<Self, SessionError> {
        let id = id.into();
        if id.is_empty() {
            return Err(SessionError::invalid("can't make a connection without an id"));
        }
        Ok(Self {
            inner: Arc::new(ConnectionInner {
                id,
                endpoint_id: endpoint_id.into(),
                ctx,
                presence: PresenceState::default(),
            }),
        })
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn endpoint_id(&self) -> &str {
        &self.inner.endpoint_id
    }

    pub fn on_presence(&self) -> broadcast::Receiver<Presence> {
        self.inner.presence.subscribe()
    }

    pub(crate) fn presence_state(&self) -> &PresenceState {
        &self.inner.presence
    }

    /// Overwrite this session's presence (default `available`), re-resolve
    /// the owning endpoint, then notify this connection's subscribers.
    pub fn set_presence(&self, update: PresenceUpdate) -> Result<(), SessionError> {
        let presence = update.presence_or_available();
        self.inner.presence.store(presence.clone());

        match self.endpoint()? {
            Some(endpoint) => {
                endpoint.resolve_presence();
            }
            None => {
                debug!(connection_id = %self.id(), endpoint_id = %self.endpoint_id(), "presence set on connection of untracked endpoint");
            }
        }

        self.inner.presence.notify(presence);
        Ok(())
    }

    /// The owning endpoint, looked up in the client's registry every time.
    pub fn endpoint(&self) -> Result<Option<Endpoint>, SessionError> {
        self.inner.ctx.client()?.get_endpoint(self.endpoint_id(), false)
    }

    fn require_endpoint(&self) -> Result<Endpoint, SessionError> {
        self.endpoint()?.ok_or_else(|| {
            SessionError::invalid(format!("endpoint {} is not tracked", self.endpoint_id()))
        })
    }

    pub async fn send_message(&self, message: serde_json::Value) -> Result<(), SessionError> {
        self.require_endpoint()?
            .send_message(Some(self.id().to_string()), message)
            .await
    }

    pub fn call(&self, mut options: CallOptions) -> Option<CallHandle> {
        options.connection_id = Some(self.id().to_string());
        match self.require_endpoint() {
            Ok(endpoint) => endpoint.call(options),
            Err(e) => {
                error!(connection_id = %self.id(), error = %e, "can't start a call");
                None
            }
        }
    }

    pub async fn get_direct_connection(
        &self,
        mut options: DirectConnectionOptions,
    ) -> Result<DirectConnectionHandle, SessionError> {
        options.connection_id = Some(self.id().to_string());
        self.require_endpoint()?
            .get_direct_connection(options)
            .await
    }
}

impl HasPresence for Connection {
    fn presence(&self) -> Presence {
        self.inner.presence.get()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("endpoint_id", &self.inner.endpoint_id)
            .field("presence", &self.inner.presence.get())
            .finish()
    }
}
