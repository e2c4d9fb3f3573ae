//! The call adapter: turns an endpoint-scoped request into a wired call.

use std::sync::{Arc, Weak};

use tether_common::SessionError;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::{Endpoint, EndpointInner};
use crate::call::{
    Call, CallHandle, CallHooks, CallOptions, CallParams, DirectConnectionEvent,
    DirectConnectionHandle, DirectConnectionHook, DirectConnectionOptions, HangupHook,
};
use crate::signaling::{SignalBindings, SignalTarget};
use crate::user::User;

type Establishment = oneshot::Sender<Result<DirectConnectionHandle, SessionError>>;

impl Endpoint {
    /// Start (or, with `initiator: Some(false)`, accept) a media call with
    /// this endpoint.
    ///
    /// Returns `None` and logs when the call can't be built: the endpoint has
    /// no id, the client is gone or not connected, or an inbound call was
    /// rejected for lack of a handler.
    pub fn call(&self, options: CallOptions) -> Option<CallHandle> {
        if self.id().is_empty() {
            error!("can't call an endpoint without an id");
            return None;
        }
        let client = match self.inner.ctx.client() {
            Ok(client) => client,
            Err(e) => {
                error!(endpoint_id = %self.id(), error = %e, "can't call without a client");
                return None;
            }
        };
        let Some(user) = client.user() else {
            error!(endpoint_id = %self.id(), "can't call before the client is connected");
            return None;
        };

        let initiator = options.initiator.unwrap_or(true);
        let settings = client
            .call_settings()
            .merged(options.constraints, options.servers);
        let signals = SignalBindings::new(
            SignalTarget::Call,
            self.clone(),
            options.connection_id.clone(),
            self.inner.ctx.channel().clone(),
        );

        let call = client.call_factory().create(CallParams {
            id: options.id,
            remote_endpoint: self.clone(),
            connection_id: options.connection_id,
            settings,
            initiator,
            direct_connection_only: false,
            signals,
            hooks: CallHooks {
                on_hangup: Some(untrack_on_hangup(&user)),
                on_direct_connection: None,
            },
        });

        let tracked = user.add_call(call.clone(), self)?;
        if !Arc::ptr_eq(&tracked, &call) {
            warn!(call_id = %call.id(), endpoint_id = %self.id(), "call id already in progress, keeping the tracked call");
            return Some(tracked);
        }
        info!(call_id = %call.id(), endpoint_id = %self.id(), initiator, "call created");

        if initiator {
            call.answer();
        }
        Some(call)
    }

    /// The live direct connection to this endpoint, negotiating one if none
    /// exists yet.
    ///
    /// On the receiving side (`initiator: Some(false)`) the incoming handle is
    /// rejected with [`SessionError::PolicyRejection`] unless someone is
    /// subscribed to direct-connection events on the user, the client or the
    /// carrying call.
    pub async fn get_direct_connection(
        &self,
        options: DirectConnectionOptions,
    ) -> Result<DirectConnectionHandle, SessionError> {
        if let Some(existing) = self.direct_connection() {
            return Ok(existing);
        }
        if self.id().is_empty() {
            return Err(SessionError::invalid(
                "can't open a direct connection to an endpoint without an id",
            ));
        }
        let client = self.inner.ctx.client()?;
        let user = client.user().ok_or(SessionError::Closed)?;

        let initiator = options.initiator.unwrap_or(true);
        let settings = client.call_settings().merged(None, options.servers);
        let signals = SignalBindings::new(
            SignalTarget::DirectConnection,
            self.clone(),
            options.connection_id.clone(),
            self.inner.ctx.channel().clone(),
        );

        let (tx, rx) = oneshot::channel();
        let call = client.call_factory().create(CallParams {
            id: options.id,
            remote_endpoint: self.clone(),
            connection_id: options.connection_id,
            settings,
            initiator,
            direct_connection_only: true,
            signals,
            hooks: CallHooks {
                on_hangup: Some(untrack_on_hangup(&user)),
                on_direct_connection: Some(self.establish_hook(initiator, tx)),
            },
        });
        user.track_call(call.clone(), self);
        debug!(call_id = %call.id(), endpoint_id = %self.id(), initiator, "direct connection requested");

        if initiator {
            call.answer();
        }

        // The sender is dropped unfired if the call ends before establishing.
        let outcome = rx.await.unwrap_or(Err(SessionError::Closed));
        if outcome.is_err() {
            // An inbound carrier can fail while being created, before it was tracked.
            user.untrack_call(call.as_ref());
        }
        outcome
    }

    fn establish_hook(&self, initiator: bool, tx: Establishment) -> DirectConnectionHook {
        let endpoint = self.clone();
        Box::new(move |call: &dyn Call, handle: DirectConnectionHandle| {
            let outcome = endpoint.adopt_direct_connection(call, handle, initiator);
            if tx.send(outcome).is_err() {
                debug!(endpoint_id = %endpoint.id(), "direct connection requester went away");
            }
        })
    }

    fn adopt_direct_connection(
        &self,
        call: &dyn Call,
        handle: DirectConnectionHandle,
        initiator: bool,
    ) -> Result<DirectConnectionHandle, SessionError> {
        let client = match self.inner.ctx.client() {
            Ok(client) => client,
            Err(e) => {
                handle.reject();
                call.hangup(false);
                return Err(e);
            }
        };
        let user = client.user();

        if !initiator {
            let listened = user.as_ref().is_some_and(User::has_direct_connection_listeners)
                || client.has_direct_connection_listeners()
                || call.has_direct_connection_listeners();
            if !listened {
                warn!(call_id = %call.id(), endpoint_id = %self.id(), "rejecting incoming direct connection with no handlers");
                handle.reject();
                call.hangup(false);
                return Err(SessionError::PolicyRejection(
                    "got an incoming direct connection with no handlers to accept it".into(),
                ));
            }
        }

        self.store_direct_connection(Some(handle.clone()));
        let owner = Arc::downgrade(&self.inner);
        let id = handle.id().to_string();
        handle.on_close(Box::new(move || clear_on_close(&owner, &id)));

        if !initiator {
            let event = DirectConnectionEvent {
                endpoint: self.clone(),
                direct_connection: handle.clone(),
            };
            client.publish_direct_connection(event.clone());
            if let Some(user) = user {
                user.publish_direct_connection(event);
            }
        }
        info!(direct_connection_id = %handle.id(), endpoint_id = %self.id(), initiator, "direct connection established");
        Ok(handle)
    }
}

fn clear_on_close(owner: &Weak<EndpointInner>, id: &str) {
    if let Some(inner) = owner.upgrade() {
        let endpoint = Endpoint { inner };
        endpoint.clear_direct_connection(id);
        debug!(endpoint_id = %endpoint.id(), direct_connection_id = id, "direct connection closed");
    }
}

/// Untracks the call from the user when it hangs up. Fires at most once.
fn untrack_on_hangup(user: &User) -> HangupHook {
    let user = user.downgrade();
    Box::new(move |call: &dyn Call| {
        if let Some(user) = user.upgrade() {
            user.untrack_call(call);
        }
    })
}
