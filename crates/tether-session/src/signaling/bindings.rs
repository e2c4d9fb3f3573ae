//! Signal bindings: the outbound half of the call adapter.
//!
//! A call never talks to the transport directly. It is handed a
//! [`SignalBindings`] bound to one recipient endpoint and one target flow,
//! and awaits the matching method whenever it needs to emit a signal.
//! Failures of offer/answer/connected end the call; the rest are best
//! effort and only logged.

use std::sync::Arc;

use tracing::{debug, error, warn};

use super::channel::{OutboundSignal, SdpType, SignalTarget, SignalingChannel};
use crate::call::Call;
use crate::endpoint::Endpoint;

pub struct SignalBindings {
    target: SignalTarget,
    recipient: Endpoint,
    connection_id: Option<String>,
    channel: Arc<dyn SignalingChannel>,
}

impl SignalBindings {
    pub(crate) fn new(
        target: SignalTarget,
        recipient: Endpoint,
        connection_id: Option<String>,
        channel: Arc<dyn SignalingChannel>,
    ) -> Self {
        Self {
            target,
            recipient,
            connection_id,
            channel,
        }
    }

    pub fn target(&self) -> SignalTarget {
        self.target
    }

    pub fn recipient(&self) -> &Endpoint {
        &self.recipient
    }

    pub fn connection_id(&self) -> Option<&str> {
        self.connection_id.as_deref()
    }

    fn signal(
        &self,
        call: &dyn Call,
        signal_type: Option<SdpType>,
        payload: serde_json::Value,
    ) -> OutboundSignal {
        OutboundSignal {
            target: self.target,
            signal_type,
            call_id: call.id().to_string(),
            recipient: self.recipient.id().to_string(),
            connection_id: self.connection_id.clone(),
            payload,
        }
    }

    pub async fn offer(&self, call: &dyn Call, sdp: serde_json::Value) {
        let signal = self.signal(call, Some(SdpType::Offer), sdp);
        if let Err(e) = self.channel.send_sdp(signal).await {
            error!(call_id = %call.id(), target = self.target.as_str(), error = %e, "couldn't send offer");
            call.hangup(true);
        }
    }

    /// On failure the call hangs up without a bye: the peer may already be
    /// gone, and signaling it again would only fail the same way.
    pub async fn answer(&self, call: &dyn Call, sdp: serde_json::Value) {
        let signal = self.signal(call, Some(SdpType::Answer), sdp);
        if let Err(e) = self.channel.send_sdp(signal).await {
            error!(call_id = %call.id(), target = self.target.as_str(), error = %e, "couldn't send answer");
            call.hangup(false);
        }
    }

    pub async fn connected(&self, call: &dyn Call) {
        let signal = self.signal(call, None, serde_json::Value::Null);
        if let Err(e) = self.channel.send_connected(signal).await {
            error!(call_id = %call.id(), target = self.target.as_str(), error = %e, "couldn't send connected");
            call.hangup(true);
        }
    }

    pub async fn modify(&self, call: &dyn Call, payload: serde_json::Value) {
        let signal = self.signal(call, None, payload);
        if let Err(e) = self.channel.send_modify(signal).await {
            warn!(call_id = %call.id(), target = self.target.as_str(), error = %e, "couldn't send modify");
        }
    }

    pub async fn candidate(&self, call: &dyn Call, candidate: serde_json::Value) {
        let signal = self.signal(call, None, candidate);
        if let Err(e) = self.channel.send_candidate(signal).await {
            warn!(call_id = %call.id(), target = self.target.as_str(), error = %e, "couldn't send candidate");
        }
    }

    pub async fn terminate(&self, call: &dyn Call) {
        let signal = self.signal(call, None, serde_json::Value::Null);
        if let Err(e) = self.channel.send_bye(signal).await {
            warn!(call_id = %call.id(), target = self.target.as_str(), error = %e, "couldn't send bye");
        }
    }

    /// Call quality reports are tagged and logged, never sent.
    pub fn report(&self, call: &dyn Call, mut report: serde_json::Value) {
        if let Some(obj) = report.as_object_mut() {
            obj.insert("target".into(), self.target.as_str().into());
        }
        debug!(call_id = %call.id(), report = %report, "not sending call report");
    }
}

impl std::fmt::Debug for SignalBindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalBindings")
            .field("target", &self.target)
            .field("recipient", &self.recipient.id())
            .field("connection_id", &self.connection_id)
            .finish()
    }
}
