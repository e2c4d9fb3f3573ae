//! Signaling: the transport contract and the per-call signal bindings.

mod bindings;
mod channel;

pub use bindings::SignalBindings;
pub use channel::{
    AuthenticatedUser, GroupMember, MessageSignal, OutboundSignal, SdpType, SignalTarget,
    SignalingChannel,
};
