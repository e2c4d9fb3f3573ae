//! The locally authenticated user.

use std::sync::{Arc, RwLock, Weak};

use tether_common::{EventBus, SessionError};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::call::{Call, CallHandle, CallOptions, DirectConnectionEvent, IncomingCall};
use crate::context::SessionContext;
use crate::endpoint::Endpoint;
use crate::presence::{HasPresence, Presence, PresenceState, PresenceUpdate};
use crate::signaling::AuthenticatedUser;
use crate::sync::{read, write};

/// The identity this client authenticated as. Owns the list of calls in
/// progress, media calls and direct-connection carriers alike.
#[derive(Clone)]
pub struct User {
    inner: Arc<UserInner>,
}

/// Non-owning handle, used by call hooks so a call never keeps its user alive.
#[derive(Clone)]
pub(crate) struct WeakUser(Weak<UserInner>);

struct UserInner {
    id: String,
    name: String,
    ctx: SessionContext,
    presence: PresenceState,
    calls: RwLock<Vec<TrackedCall>>,
    incoming: EventBus<IncomingCall>,
    direct_connections: EventBus<DirectConnectionEvent>,
}

struct TrackedCall {
    call: CallHandle,
    endpoint_id: String,
}

impl User {
    pub(crate) fn new(ctx: SessionContext, identity: AuthenticatedUser) -> Self {
        Self {
            inner: Arc::new(UserInner {
                id: identity.id,
                name: identity.name,
                ctx,
                presence: PresenceState::default(),
                calls: RwLock::new(Vec::new()),
                incoming: EventBus::default(),
                direct_connections: EventBus::default(),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub(crate) fn downgrade(&self) -> WeakUser {
        WeakUser(Arc::downgrade(&self.inner))
    }

    pub fn on_presence(&self) -> broadcast::Receiver<Presence> {
        self.inner.presence.subscribe()
    }

    /// Inbound calls. Without a subscriber, inbound calls are rejected.
    pub fn on_call(&self) -> broadcast::Receiver<IncomingCall> {
        self.inner.incoming.subscribe()
    }

    pub fn on_direct_connection(&self) -> broadcast::Receiver<DirectConnectionEvent> {
        self.inner.direct_connections.subscribe()
    }

    pub(crate) fn has_direct_connection_listeners(&self) -> bool {
        self.inner.direct_connections.has_listeners()
    }

    pub(crate) fn publish_direct_connection(&self, event: DirectConnectionEvent) {
        self.inner.direct_connections.publish(event);
    }

    /// Publish a presence (default `available`) and adopt it locally once
    /// the server has acknowledged it.
    pub async fn set_presence(&self, update: PresenceUpdate) -> Result<(), SessionError> {
        let presence = update.presence_or_available();
        info!(user_id = %self.id(), presence = %presence, "sending presence update");

        self.inner.ctx.channel().send_presence(&presence).await?;

        self.inner.presence.store(presence.clone());
        self.inner.presence.notify(presence);
        Ok(())
    }

    pub async fn set_online(&self) -> Result<(), SessionError> {
        self.set_presence(PresenceUpdate::new(Presence::Available)).await
    }

    pub fn calls(&self) -> Vec<CallHandle> {
        read(&self.inner.calls)
            .iter()
            .map(|tracked| tracked.call.clone())
            .collect()
    }

    /// Find a call by id, or failing that by remote endpoint. With `create`,
    /// an unmatched lookup builds an inbound (non-initiating) call to
    /// `endpoint_id`.
    pub fn get_call(
        &self,
        id: Option<&str>,
        endpoint_id: Option<&str>,
        create: bool,
    ) -> Result<Option<CallHandle>, SessionError> {
        let found = {
            let calls = read(&self.inner.calls);
            calls
                .iter()
                .find(|tracked| match (id, endpoint_id) {
                    (Some(id), _) => tracked.call.id() == id,
                    (None, Some(endpoint_id)) => tracked.endpoint_id == endpoint_id,
                    (None, None) => false,
                })
                .map(|tracked| tracked.call.clone())
        };
        if found.is_some() || !create {
            return Ok(found);
        }

        let Some(endpoint_id) = endpoint_id.filter(|id| !id.is_empty()) else {
            return Err(SessionError::invalid("can't create a call without an endpoint id"));
        };
        let endpoint = self
            .inner
            .ctx
            .client()?
            .get_endpoint(endpoint_id, true)?
            .ok_or_else(|| SessionError::invalid(format!("unknown endpoint {endpoint_id}")))?;

        Ok(endpoint.call(CallOptions {
            id: id.map(str::to_string),
            initiator: Some(false),
            ..Default::default()
        }))
    }

    /// Track a media call. Inbound calls are announced to `on_call`
    /// subscribers; with none, the call is rejected and `None` returned.
    ///
    /// Returns the tracked call: `call` itself, or the call already tracked
    /// under the same id, in which case `call` is left untracked.
    pub(crate) fn add_call(&self, call: CallHandle, endpoint: &Endpoint) -> Option<CallHandle> {
        if !call.initiator() && !self.inner.incoming.has_listeners() {
            warn!(call_id = %call.id(), endpoint_id = %endpoint.id(), "got an incoming call with no handlers to accept it");
            call.reject();
            return None;
        }
        if let Some(existing) = self.track(call.clone(), endpoint) {
            return Some(existing);
        }
        if !call.initiator() {
            self.inner.incoming.publish(IncomingCall {
                endpoint: endpoint.clone(),
                call: call.clone(),
            });
        }
        Some(call)
    }

    /// Track a call without announcing it.
    pub(crate) fn track_call(&self, call: CallHandle, endpoint: &Endpoint) {
        self.track(call, endpoint);
    }

    /// Returns the call already tracked under the same id, if any.
    fn track(&self, call: CallHandle, endpoint: &Endpoint) -> Option<CallHandle> {
        let mut calls = write(&self.inner.calls);
        if let Some(existing) = calls.iter().find(|tracked| tracked.call.id() == call.id()) {
            debug!(call_id = %call.id(), "call already tracked");
            return Some(existing.call.clone());
        }
        calls.push(TrackedCall {
            call,
            endpoint_id: endpoint.id().to_string(),
        });
        None
    }

    /// Stop tracking this call instance. Another instance carrying the same
    /// id stays tracked.
    pub(crate) fn untrack_call(&self, call: &dyn Call) -> bool {
        let removed = {
            let mut calls = write(&self.inner.calls);
            let before = calls.len();
            let target = std::ptr::from_ref(call);
            calls.retain(|tracked| !std::ptr::addr_eq(Arc::as_ptr(&tracked.call), target));
            before != calls.len()
        };
        if removed {
            debug!(call_id = %call.id(), "call untracked");
        }
        removed
    }

    /// Stop tracking the call with `id`. Returns whether anything was removed.
    pub fn remove_call(&self, id: &str) -> bool {
        let removed = {
            let mut calls = write(&self.inner.calls);
            let before = calls.len();
            calls.retain(|tracked| tracked.call.id() != id);
            before != calls.len()
        };
        if removed {
            debug!(call_id = id, "call removed");
        } else {
            warn!(call_id = id, "no call removed");
        }
        removed
    }
}

impl WeakUser {
    pub(crate) fn upgrade(&self) -> Option<User> {
        self.0.upgrade().map(|inner| User { inner })
    }
}

impl HasPresence for User {
    fn presence(&self) -> Presence {
        self.inner.presence.get()
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("presence", &self.inner.presence.get())
            .field("calls", &read(&self.inner.calls).len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{connected_harness, MockCall, SentKind};

    #[tokio::test]
    async fn set_presence_is_adopted_after_acknowledgement() {
        let h = connected_harness().await;
        let user = h.client.user().unwrap();
        let mut rx = user.on_presence();

        user.set_presence(PresenceUpdate::new("dnd")).await.unwrap();

        assert_eq!(user.presence(), Presence::Dnd);
        assert_eq!(rx.recv().await.unwrap(), Presence::Dnd);
        assert_eq!(h.channel.presences().last(), Some(&Presence::Dnd));
    }

    #[tokio::test]
    async fn rejected_presence_is_not_adopted() {
        let h = connected_harness().await;
        let user = h.client.user().unwrap();
        assert_eq!(user.presence(), Presence::Available);

        h.channel.fail(SentKind::Presence);
        let err = user.set_presence(PresenceUpdate::new("away")).await.unwrap_err();

        assert!(matches!(err, SessionError::Transport(_)));
        assert_eq!(user.presence(), Presence::Available);
    }

    #[tokio::test]
    async fn add_call_dedupes_by_id() {
        let h = connected_harness().await;
        let user = h.client.user().unwrap();
        let endpoint = Endpoint::new(&h.client, "alice");
        let call: CallHandle = MockCall::standalone("call-1", true);

        assert!(user.add_call(call.clone(), &endpoint).is_some());
        assert!(user.add_call(call, &endpoint).is_some());
        assert_eq!(user.calls().len(), 1);
    }

    #[tokio::test]
    async fn second_instance_with_a_tracked_id_stays_untracked() {
        let h = connected_harness().await;
        let user = h.client.user().unwrap();
        let endpoint = Endpoint::new(&h.client, "alice");
        let first: CallHandle = MockCall::standalone("call-1", true);
        let second: CallHandle = MockCall::standalone("call-1", true);
        user.add_call(first.clone(), &endpoint);

        let tracked = user.add_call(second.clone(), &endpoint).unwrap();

        assert!(Arc::ptr_eq(&tracked, &first));
        assert!(!user.untrack_call(second.as_ref()));
        assert_eq!(user.calls().len(), 1);
        assert!(user.untrack_call(first.as_ref()));
        assert!(user.calls().is_empty());
    }

    #[tokio::test]
    async fn inbound_call_without_listener_is_rejected() {
        let h = connected_harness().await;
        let user = h.client.user().unwrap();
        let endpoint = Endpoint::new(&h.client, "alice");
        let call = MockCall::standalone("call-1", false);

        assert!(user.add_call(call.clone(), &endpoint).is_none());
        assert!(call.rejected());
        assert!(user.calls().is_empty());
    }

    #[tokio::test]
    async fn inbound_call_is_announced() {
        let h = connected_harness().await;
        let user = h.client.user().unwrap();
        let mut rx = user.on_call();
        let endpoint = Endpoint::new(&h.client, "alice");
        let call = MockCall::standalone("call-1", false);

        assert!(user.add_call(call.clone(), &endpoint).is_some());

        let incoming = rx.recv().await.unwrap();
        assert_eq!(incoming.call.id(), "call-1");
        assert_eq!(incoming.endpoint.id(), "alice");
        assert!(!call.rejected());
    }

    #[tokio::test]
    async fn remove_call_reports_whether_it_removed() {
        let h = connected_harness().await;
        let user = h.client.user().unwrap();
        let endpoint = Endpoint::new(&h.client, "alice");
        user.add_call(MockCall::standalone("call-1", true), &endpoint);

        assert!(user.remove_call("call-1"));
        assert!(!user.remove_call("call-1"));
        assert!(user.calls().is_empty());
    }

    #[tokio::test]
    async fn get_call_matches_by_id_then_endpoint() {
        let h = connected_harness().await;
        let user = h.client.user().unwrap();
        let alice = Endpoint::new(&h.client, "alice");
        let bob = Endpoint::new(&h.client, "bob");
        user.add_call(MockCall::standalone("call-a", true), &alice);
        user.add_call(MockCall::standalone("call-b", true), &bob);

        let by_id = user.get_call(Some("call-b"), None, false).unwrap().unwrap();
        assert_eq!(by_id.id(), "call-b");
        let by_endpoint = user.get_call(None, Some("alice"), false).unwrap().unwrap();
        assert_eq!(by_endpoint.id(), "call-a");
        assert!(user.get_call(Some("nope"), None, false).unwrap().is_none());
    }

    #[tokio::test]
    async fn get_call_creates_an_inbound_call() {
        let h = connected_harness().await;
        let user = h.client.user().unwrap();
        let _rx = user.on_call();

        let call = user
            .get_call(Some("remote-1"), Some("carol"), true)
            .unwrap()
            .unwrap();

        assert_eq!(call.id(), "remote-1");
        assert!(!call.initiator());
        let mock = h.calls.find("remote-1").unwrap();
        assert_eq!(mock.answers(), 0);
        assert!(h.client.get_endpoint("carol", false).unwrap().is_some());
        assert_eq!(user.calls().len(), 1);
    }

    #[tokio::test]
    async fn get_call_create_requires_endpoint() {
        let h = connected_harness().await;
        let user = h.client.user().unwrap();
        let err = user.get_call(Some("x"), None, true).unwrap_err();
        assert!(matches!(err, SessionError::InvalidArgument(_)));
    }
}
