//! Contracts for the call and direct-connection collaborators.
//!
//! The media negotiation state machine lives outside this crate. It is
//! constructed through a [`CallFactory`] with the settings, the signal
//! bindings it must use for every outbound message, and a pair of internal
//! lifecycle hooks through which this layer tracks it.

use std::sync::Arc;

use crate::endpoint::Endpoint;
use crate::settings::{CallSettings, IceServers, MediaConstraints};
use crate::signaling::SignalBindings;

pub type CallHandle = Arc<dyn Call>;
pub type DirectConnectionHandle = Arc<dyn DirectConnection>;

/// Fired once by the call when it hangs up.
pub type HangupHook = Box<dyn FnOnce(&dyn Call) + Send>;
/// Fired once by the call when its direct connection is established.
pub type DirectConnectionHook = Box<dyn FnOnce(&dyn Call, DirectConnectionHandle) + Send>;
/// Fired once by a direct connection when it closes.
pub type CloseHook = Box<dyn FnOnce() + Send>;

/// A media call (or the negotiation carrier of a direct connection).
pub trait Call: Send + Sync {
    fn id(&self) -> &str;

    fn initiator(&self) -> bool;

    /// Start (initiator) or accept (callee) the local media flow.
    fn answer(&self);

    /// Tear the call down. With `signal == false` no bye is sent to the peer.
    fn hangup(&self, signal: bool);

    fn reject(&self);

    /// Whether application code subscribed to this call's direct-connection
    /// event. Internal hooks do not count.
    fn has_direct_connection_listeners(&self) -> bool;
}

/// A peer-to-peer data channel negotiated over a call.
pub trait DirectConnection: Send + Sync {
    fn id(&self) -> &str;

    fn accept(&self);

    fn reject(&self);

    fn close(&self);

    /// Register an internal close hook.
    fn on_close(&self, hook: CloseHook);
}

impl std::fmt::Debug for dyn Call {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Call")
            .field("id", &self.id())
            .field("initiator", &self.initiator())
            .finish()
    }
}

impl std::fmt::Debug for dyn DirectConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectConnection").field("id", &self.id()).finish()
    }
}

/// Internal lifecycle hooks handed to a new call.
#[derive(Default)]
pub struct CallHooks {
    pub on_hangup: Option<HangupHook>,
    pub on_direct_connection: Option<DirectConnectionHook>,
}

impl std::fmt::Debug for CallHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallHooks")
            .field("on_hangup", &self.on_hangup.is_some())
            .field("on_direct_connection", &self.on_direct_connection.is_some())
            .finish()
    }
}

/// Everything a call is constructed with.
#[derive(Debug)]
pub struct CallParams {
    /// Pre-assigned id for inbound calls; the factory generates one otherwise.
    pub id: Option<String>,
    pub remote_endpoint: Endpoint,
    pub connection_id: Option<String>,
    pub settings: CallSettings,
    pub initiator: bool,
    pub direct_connection_only: bool,
    pub signals: SignalBindings,
    pub hooks: CallHooks,
}

/// Builds call objects.
pub trait CallFactory: Send + Sync {
    fn create(&self, params: CallParams) -> CallHandle;
}

/// Caller-supplied options for [`Endpoint::call`].
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub id: Option<String>,
    pub connection_id: Option<String>,
    pub constraints: Option<MediaConstraints>,
    pub servers: Option<IceServers>,
    /// Defaults to `true`.
    pub initiator: Option<bool>,
}

/// Caller-supplied options for [`Endpoint::get_direct_connection`].
#[derive(Debug, Clone, Default)]
pub struct DirectConnectionOptions {
    pub id: Option<String>,
    pub connection_id: Option<String>,
    pub servers: Option<IceServers>,
    /// Defaults to `true`.
    pub initiator: Option<bool>,
}

/// Published to `User::on_call` subscribers for every inbound call.
#[derive(Clone)]
pub struct IncomingCall {
    pub endpoint: Endpoint,
    pub call: CallHandle,
}

impl std::fmt::Debug for IncomingCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncomingCall")
            .field("endpoint", &self.endpoint.id())
            .field("call", &self.call.id())
            .finish()
    }
}

/// Published when a peer opens a direct connection to this client.
#[derive(Clone)]
pub struct DirectConnectionEvent {
    pub endpoint: Endpoint,
    pub direct_connection: DirectConnectionHandle,
}

impl std::fmt::Debug for DirectConnectionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectConnectionEvent")
            .field("endpoint", &self.endpoint.id())
            .field("direct_connection", &self.direct_connection.id())
            .finish()
    }
}
