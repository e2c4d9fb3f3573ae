//! The session client: connection lifecycle, call settings and registries.

mod inbound;
mod registry;


use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use futures_util::future::try_join_all;
use tether_common::{EventBus, InstanceId, SessionError, TransportError};
use tether_config::TetherConfig;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::call::{CallFactory, CallHandle, CallOptions, DirectConnectionEvent};
use crate::context::SessionContext;
use crate::endpoint::Endpoint;
use crate::group::Group;
use crate::settings::{CallSettings, ClientSettings, IceServers, MediaConstraints};
use crate::signaling::SignalingChannel;
use crate::sync::{read, write};
use crate::user::User;

pub use inbound::InboundEvent;
use registry::Registry;

/// Session-level notifications, delivered to [`Client::subscribe`].
#[derive(Debug, Clone)]
pub enum ClientEvent {
    Connected { user: User },
    Disconnected,
    Message {
        endpoint: Endpoint,
        connection_id: Option<String>,
        message: serde_json::Value,
    },
    GroupJoined { group: Group },
    GroupRemoved { group_id: String },
    EndpointRemoved { endpoint_id: String },
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// One session against the signaling service. Cheap to clone; every clone
/// drives the same session.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    instance_id: InstanceId,
    settings: ClientSettings,
    channel: Arc<dyn SignalingChannel>,
    call_factory: Arc<dyn CallFactory>,
    registry: RwLock<Registry>,
    call_settings: RwLock<CallSettings>,
    user: RwLock<Option<User>>,
    connected: AtomicBool,
    events: EventBus<ClientEvent>,
    direct_connections: EventBus<DirectConnectionEvent>,
    turn_refresher: RwLock<Option<AbortHandle>>,
}

impl Client {
    pub fn new(
        settings: ClientSettings,
        channel: Arc<dyn SignalingChannel>,
        call_factory: Arc<dyn CallFactory>,
    ) -> Result<Self, SessionError> {
        if settings.app_id.trim().is_empty() {
            return Err(SessionError::invalid("can't create a client without an app id"));
        }
        let instance_id = InstanceId::new();
        debug!(instance = %instance_id, app_id = %settings.app_id, "client created");

        Ok(Self {
            inner: Arc::new(ClientInner {
                instance_id,
                call_settings: RwLock::new(settings.call.clone()),
                settings,
                channel,
                call_factory,
                registry: RwLock::new(Registry::default()),
                user: RwLock::new(None),
                connected: AtomicBool::new(false),
                events: EventBus::default(),
                direct_connections: EventBus::default(),
                turn_refresher: RwLock::new(None),
            }),
        })
    }

    pub fn from_config(
        config: &TetherConfig,
        channel: Arc<dyn SignalingChannel>,
        call_factory: Arc<dyn CallFactory>,
    ) -> Result<Self, SessionError> {
        Self::new(ClientSettings::from_config(config)?, channel, call_factory)
    }

    pub(crate) fn from_inner(inner: Arc<ClientInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn context(&self) -> SessionContext {
        SessionContext::new(Arc::downgrade(&self.inner), self.inner.channel.clone())
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.inner.instance_id
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.inner.settings
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// The authenticated user, once connected.
    pub fn user(&self) -> Option<User> {
        read(&self.inner.user).clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.events.subscribe()
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

    pub(crate) fn publish(&self, event: ClientEvent) {
        self.inner.events.publish(event);
    }

    pub(crate) fn call_factory(&self) -> &Arc<dyn CallFactory> {
        &self.inner.call_factory
    }

    // -- lifecycle ----------------------------------------------------------

    /// Open the transport, authenticate and go online.
    pub async fn connect(&self, token: Option<&str>) -> Result<User, SessionError> {
        let app_id = self.inner.settings.app_id.as_str();
        info!(instance = %self.inner.instance_id, app_id, "connecting");

        self.inner.channel.open(app_id, token).await?;
        let identity = self.inner.channel.authenticate(app_id).await?;

        let user = User::new(self.context(), identity);
        *write(&self.inner.user) = Some(user.clone());
        self.inner.connected.store(true, Ordering::SeqCst);

        if let Err(e) = user.set_online().await {
            warn!(user_id = %user.id(), error = %e, "couldn't publish initial presence");
        }
        if self.inner.settings.turn.enabled {
            self.start_turn_refresher();
        }

        info!(user_id = %user.id(), name = %user.name(), "logged in");
        self.publish(ClientEvent::Connected { user: user.clone() });
        Ok(user)
    }

    /// Leave every group and close the transport if it is still open, then
    /// drop all session state. State is dropped even when leaving fails.
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        let outcome = if self.inner.channel.is_open() {
            self.leave_all_and_close().await
        } else {
            debug!(instance = %self.inner.instance_id, "transport already closed");
            Ok(())
        };

        self.teardown();
        info!(instance = %self.inner.instance_id, "disconnected");
        self.publish(ClientEvent::Disconnected);
        outcome.map_err(SessionError::from)
    }

    async fn leave_all_and_close(&self) -> Result<(), TransportError> {
        let group_ids: Vec<String> = self.groups().iter().map(|g| g.id().to_string()).collect();
        try_join_all(group_ids.iter().map(|id| self.inner.channel.leave_group(id))).await?;
        self.inner.channel.close().await
    }

    fn teardown(&self) {
        self.inner.connected.store(false, Ordering::SeqCst);
        if let Some(refresher) = write(&self.inner.turn_refresher).take() {
            refresher.abort();
        }
        let (groups, endpoints) = write(&self.inner.registry).drain();
        for tracked in groups {
            tracked.stop();
        }
        for endpoint in endpoints {
            endpoint.clear_connections();
        }
        *write(&self.inner.user) = None;
    }

    // -- calls ----------------------------------------------------------------

    /// Call a tracked endpoint by id.
    pub fn call(&self, endpoint_id: &str, options: CallOptions) -> Result<Option<CallHandle>, SessionError> {
        let endpoint = self
            .get_endpoint(endpoint_id, false)?
            .ok_or_else(|| SessionError::invalid(format!("can't find an endpoint with id {endpoint_id}")))?;
        Ok(endpoint.call(options))
    }

    /// A copy of the default call settings.
    pub fn call_settings(&self) -> CallSettings {
        read(&self.inner.call_settings).clone()
    }

    pub fn set_default_call_settings(
        &self,
        constraints: Option<MediaConstraints>,
        servers: Option<IceServers>,
    ) {
        let mut settings = write(&self.inner.call_settings);
        if let Some(constraints) = constraints {
            settings.constraints = constraints;
        }
        if let Some(servers) = servers {
            settings.servers = servers;
        }
    }

    /// Refresh the default ICE servers: configured servers first, then the
    /// TURN servers the signaling service hands out.
    pub async fn update_turn_credentials(&self) -> Result<(), SessionError> {
        if !self.inner.settings.turn.enabled {
            debug!("turn disabled, not fetching credentials");
            return Ok(());
        }
        let fetched = self.inner.channel.get_turn_credentials().await?;
        let mut ice_servers = self.inner.settings.call.servers.ice_servers.clone();
        debug!(configured = ice_servers.len(), fetched = fetched.len(), "turn credentials updated");
        ice_servers.extend(fetched);
        write(&self.inner.call_settings).servers = IceServers { ice_servers };
        Ok(())
    }

    fn start_turn_refresher(&self) {
        let client = Arc::downgrade(&self.inner);
        let period = self.inner.settings.turn.refresh_interval;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let Some(inner) = client.upgrade() else { break };
                if let Err(e) = Client::from_inner(inner).update_turn_credentials().await {
                    warn!(error = %e, "couldn't refresh turn credentials");
                }
            }
        });
        if let Some(previous) = write(&self.inner.turn_refresher).replace(task.abort_handle()) {
            previous.abort();
        }
    }

    // -- groups ---------------------------------------------------------------

    /// Join a group on the transport and start tracking it.
    pub async fn join(&self, group_id: &str) -> Result<Group, SessionError> {
        if group_id.is_empty() {
            return Err(SessionError::invalid("can't join a group with no group id"));
        }
        self.inner.channel.join_group(group_id).await?;

        let group = self.add_group(Group::with_context(self.context(), group_id))?;
        info!(group_id, "joined group");
        self.publish(ClientEvent::GroupJoined { group: group.clone() });
        Ok(group)
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        if let Some(refresher) = write(&self.turn_refresher).take() {
            refresher.abort();
        }
        let (groups, _) = write(&self.registry).drain();
        for tracked in groups {
            tracked.stop();
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("instance_id", &self.inner.instance_id)
            .field("app_id", &self.inner.settings.app_id)
            .field("connected", &self.is_connected())
            .finish()
    }
}
