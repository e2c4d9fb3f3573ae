//! The explicit session handle every entity is constructed with.

use std::sync::{Arc, Weak};

use tether_common::SessionError;

use crate::client::{Client, ClientInner};
use crate::signaling::SignalingChannel;

/// Back-reference from an entity to the client that owns it.
///
/// Holds the client weakly so registries can own entities without a cycle;
/// once the client is dropped every lookup through the context fails with
/// [`SessionError::Closed`].
#[derive(Clone)]
pub(crate) struct SessionContext {
    client: Weak<ClientInner>,
    channel: Arc<dyn SignalingChannel>,
}

impl SessionContext {
    pub(crate) fn new(client: Weak<ClientInner>, channel: Arc<dyn SignalingChannel>) -> Self {
        Self { client, channel }
    }

    pub(crate) fn client(&self) -> Result<Client, SessionError> {
        self.client
            .upgrade()
            .map(Client::from_inner)
            .ok_or(SessionError::Closed)
    }

    pub(crate) fn channel(&self) -> &Arc<dyn SignalingChannel> {
        &self.channel
    }

    /// True when both contexts belong to the same client instance.
    pub(crate) fn same_session(&self, other: &SessionContext) -> bool {
        Weak::ptr_eq(&self.client, &other.client)
    }
}
