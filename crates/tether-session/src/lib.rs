//! Client-side session layer for real-time communication.
//!
//! A [`Client`] authenticates against a signaling service through a
//! [`SignalingChannel`] and keeps registries of the remote [`Endpoint`]s and
//! [`Group`]s it learns about. Endpoints aggregate the presence of their
//! [`Connection`]s; calls and direct connections are built through a
//! [`CallFactory`] and wired to the transport with [`SignalBindings`].

pub mod call;
pub mod presence;
pub mod settings;
pub mod signaling;

mod client;
mod connection;
mod context;
mod endpoint;
mod group;
mod sync;
mod user;

#[cfg(test)]
mod testing;

pub use call::{
    Call, CallFactory, CallHandle, CallHooks, CallOptions, CallParams, DirectConnection,
    DirectConnectionEvent, DirectConnectionHandle, DirectConnectionOptions, IncomingCall,
};
pub use client::{Client, ClientEvent, InboundEvent};
pub use connection::Connection;
pub use endpoint::Endpoint;
pub use group::Group;
pub use presence::{resolve_aggregate_presence, HasPresence, Presence, PresenceUpdate};
pub use settings::{CallSettings, ClientSettings, IceServer, IceServers, MediaConstraints, TurnSettings};
pub use signaling::{SignalBindings, SignalTarget, SignalingChannel};
pub use user::User;
