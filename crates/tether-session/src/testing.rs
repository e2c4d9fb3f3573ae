//! In-memory collaborators for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tether_common::{new_id, TransportError};

use crate::call::{
    Call, CallFactory, CallHandle, CallHooks, CallParams, CloseHook, DirectConnection,
};
use crate::client::Client;
use crate::presence::Presence;
use crate::settings::{CallSettings, ClientSettings, IceServer};
use crate::signaling::{
    AuthenticatedUser, GroupMember, MessageSignal, OutboundSignal, SignalBindings,
    SignalingChannel,
};

/// Every transport operation, for recording and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum SentKind {
    Open,
    Authenticate,
    Close,
    JoinGroup,
    LeaveGroup,
    Members,
    Turn,
    Message,
    Sdp,
    Connected,
    Modify,
    Candidate,
    Bye,
    Presence,
}

impl SentKind {
    fn operation(self) -> &'static str {
        match self {
            SentKind::Open => "open",
            SentKind::Authenticate => "authenticate",
            SentKind::Close => "close",
            SentKind::JoinGroup => "join_group",
            SentKind::LeaveGroup => "leave_group",
            SentKind::Members => "get_group_members",
            SentKind::Turn => "get_turn_credentials",
            SentKind::Message => "send_message",
            SentKind::Sdp => "send_sdp",
            SentKind::Connected => "send_connected",
            SentKind::Modify => "send_modify",
            SentKind::Candidate => "send_candidate",
            SentKind::Bye => "send_bye",
            SentKind::Presence => "send_presence",
        }
    }
}

// ---------------------------------------------------------------------------
// Signaling channel
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct MockChannel {
    open: AtomicBool,
    closes: AtomicUsize,
    failures: Mutex<HashSet<SentKind>>,
    sent: Mutex<Vec<(SentKind, OutboundSignal)>>,
    messages: Mutex<Vec<MessageSignal>>,
    presences: Mutex<Vec<Presence>>,
    members: Mutex<HashMap<String, Vec<GroupMember>>>,
    member_fetches: Mutex<HashMap<String, usize>>,
    joined: Mutex<Vec<String>>,
    left: Mutex<Vec<String>>,
    turn: Mutex<Vec<IceServer>>,
    turn_fetches: AtomicUsize,
}

impl MockChannel {
    pub(crate) fn fail(&self, kind: SentKind) {
        self.failures.lock().unwrap().insert(kind);
    }

    pub(crate) fn recover(&self, kind: SentKind) {
        self.failures.lock().unwrap().remove(&kind);
    }

    /// Call-scoped signals sent so far, in order.
    pub(crate) fn sent(&self) -> Vec<(SentKind, OutboundSignal)> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn messages(&self) -> Vec<MessageSignal> {
        self.messages.lock().unwrap().clone()
    }

    pub(crate) fn presences(&self) -> Vec<Presence> {
        self.presences.lock().unwrap().clone()
    }

    pub(crate) fn set_members(&self, group_id: &str, members: Vec<GroupMember>) {
        self.members.lock().unwrap().insert(group_id.to_string(), members);
    }

    pub(crate) fn member_fetches(&self, group_id: &str) -> usize {
        self.member_fetches.lock().unwrap().get(group_id).copied().unwrap_or(0)
    }

    pub(crate) fn joined_groups(&self) -> Vec<String> {
        self.joined.lock().unwrap().clone()
    }

    pub(crate) fn left_groups(&self) -> Vec<String> {
        self.left.lock().unwrap().clone()
    }

    pub(crate) fn set_turn_servers(&self, servers: Vec<IceServer>) {
        *self.turn.lock().unwrap() = servers;
    }

    pub(crate) fn turn_fetches(&self) -> usize {
        self.turn_fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Simulate the socket dropping underneath the client.
    pub(crate) fn drop_connection(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    fn check(&self, kind: SentKind) -> Result<(), TransportError> {
        if self.failures.lock().unwrap().contains(&kind) {
            return Err(TransportError::rejected(kind.operation(), "injected failure"));
        }
        Ok(())
    }

    fn record(&self, kind: SentKind, signal: OutboundSignal) -> Result<(), TransportError> {
        self.check(kind)?;
        self.sent.lock().unwrap().push((kind, signal));
        Ok(())
    }
}

#[async_trait]
impl SignalingChannel for MockChannel {
    async fn open(&self, _app_id: &str, _token: Option<&str>) -> Result<(), TransportError> {
        self.check(SentKind::Open)?;
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn authenticate(&self, _app_id: &str) -> Result<AuthenticatedUser, TransportError> {
        self.check(SentKind::Authenticate)?;
        Ok(AuthenticatedUser {
            id: "me".into(),
            name: "Me".into(),
        })
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.check(SentKind::Close)?;
        self.open.store(false, Ordering::SeqCst);
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn join_group(&self, group_id: &str) -> Result<(), TransportError> {
        self.check(SentKind::JoinGroup)?;
        self.joined.lock().unwrap().push(group_id.to_string());
        Ok(())
    }

    async fn leave_group(&self, group_id: &str) -> Result<(), TransportError> {
        self.check(SentKind::LeaveGroup)?;
        self.left.lock().unwrap().push(group_id.to_string());
        Ok(())
    }

    async fn get_group_members(&self, group_id: &str) -> Result<Vec<GroupMember>, TransportError> {
        self.check(SentKind::Members)?;
        *self
            .member_fetches
            .lock()
            .unwrap()
            .entry(group_id.to_string())
            .or_default() += 1;
        Ok(self
            .members
            .lock()
            .unwrap()
            .get(group_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_turn_credentials(&self) -> Result<Vec<IceServer>, TransportError> {
        self.check(SentKind::Turn)?;
        self.turn_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.turn.lock().unwrap().clone())
    }

    async fn send_message(&self, message: MessageSignal) -> Result<(), TransportError> {
        self.check(SentKind::Message)?;
        self.messages.lock().unwrap().push(message);
        Ok(())
    }

    async fn send_sdp(&self, signal: OutboundSignal) -> Result<(), TransportError> {
        self.record(SentKind::Sdp, signal)
    }

    async fn send_connected(&self, signal: OutboundSignal) -> Result<(), TransportError> {
        self.record(SentKind::Connected, signal)
    }

    async fn send_modify(&self, signal: OutboundSignal) -> Result<(), TransportError> {
        self.record(SentKind::Modify, signal)
    }

    async fn send_candidate(&self, signal: OutboundSignal) -> Result<(), TransportError> {
        self.record(SentKind::Candidate, signal)
    }

    async fn send_bye(&self, signal: OutboundSignal) -> Result<(), TransportError> {
        self.record(SentKind::Bye, signal)
    }

    async fn send_presence(&self, presence: &Presence) -> Result<(), TransportError> {
        self.check(SentKind::Presence)?;
        self.presences.lock().unwrap().push(presence.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Calls and direct connections
// ---------------------------------------------------------------------------

#[derive(Default)]
pub(crate) struct MockDirectConnection {
    id: String,
    accepted: AtomicBool,
    rejected: AtomicBool,
    closed: AtomicBool,
    close_hooks: Mutex<Vec<CloseHook>>,
}

impl MockDirectConnection {
    pub(crate) fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            ..Default::default()
        })
    }

    pub(crate) fn accepted(&self) -> bool {
        self.accepted.load(Ordering::SeqCst)
    }

    pub(crate) fn rejected(&self) -> bool {
        self.rejected.load(Ordering::SeqCst)
    }

    pub(crate) fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl DirectConnection for MockDirectConnection {
    fn id(&self) -> &str {
        &self.id
    }

    fn accept(&self) {
        self.accepted.store(true, Ordering::SeqCst);
    }

    fn reject(&self) {
        self.rejected.store(true, Ordering::SeqCst);
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let hooks = std::mem::take(&mut *self.close_hooks.lock().unwrap());
        for hook in hooks {
            hook();
        }
    }

    fn on_close(&self, hook: CloseHook) {
        self.close_hooks.lock().unwrap().push(hook);
    }
}

pub(crate) struct MockCall {
    id: String,
    initiator: bool,
    connection_id: Option<String>,
    direct_connection_only: bool,
    settings: CallSettings,
    signals: Option<SignalBindings>,
    hooks: Mutex<CallHooks>,
    answers: AtomicUsize,
    hangups: Mutex<Vec<bool>>,
    rejected: AtomicBool,
    direct_connection_listeners: AtomicBool,
    establish_on_answer: bool,
    established: Mutex<Option<Arc<MockDirectConnection>>>,
}

impl MockCall {
    /// A call built outside any factory, with no signals and no hooks.
    pub(crate) fn standalone(id: &str, initiator: bool) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            initiator,
            connection_id: None,
            direct_connection_only: false,
            settings: CallSettings::default(),
            signals: None,
            hooks: Mutex::new(CallHooks::default()),
            answers: AtomicUsize::new(0),
            hangups: Mutex::new(Vec::new()),
            rejected: AtomicBool::new(false),
            direct_connection_listeners: AtomicBool::new(false),
            establish_on_answer: false,
            established: Mutex::new(None),
        })
    }

    pub(crate) fn hangups(&self) -> Vec<bool> {
        self.hangups.lock().unwrap().clone()
    }

    pub(crate) fn answers(&self) -> usize {
        self.answers.load(Ordering::SeqCst)
    }

    pub(crate) fn rejected(&self) -> bool {
        self.rejected.load(Ordering::SeqCst)
    }

    pub(crate) fn connection_id(&self) -> Option<String> {
        self.connection_id.clone()
    }

    pub(crate) fn direct_connection_only(&self) -> bool {
        self.direct_connection_only
    }

    pub(crate) fn settings(&self) -> &CallSettings {
        &self.settings
    }

    pub(crate) fn established(&self) -> Option<Arc<MockDirectConnection>> {
        self.established.lock().unwrap().clone()
    }

    pub(crate) async fn send_offer(&self) {
        if let Some(signals) = &self.signals {
            signals.offer(self, json!({"type": "offer", "sdp": "v=0"})).await;
        }
    }

    /// Complete negotiation of the direct connection and fire the hook.
    pub(crate) fn establish(&self) -> Arc<MockDirectConnection> {
        let handle = MockDirectConnection::new(&format!("dc-{}", self.id));
        *self.established.lock().unwrap() = Some(handle.clone());
        let hook = self.hooks.lock().unwrap().on_direct_connection.take();
        if let Some(hook) = hook {
            hook(self, handle.clone());
        }
        handle
    }
}

impl Call for MockCall {
    fn id(&self) -> &str {
        &self.id
    }

    fn initiator(&self) -> bool {
        self.initiator
    }

    fn answer(&self) {
        self.answers.fetch_add(1, Ordering::SeqCst);
        if self.establish_on_answer && self.direct_connection_only {
            self.establish();
        }
    }

    fn hangup(&self, signal: bool) {
        self.hangups.lock().unwrap().push(signal);
        // A hung-up call drops its unfired direct-connection hook too.
        let hooks = std::mem::take(&mut *self.hooks.lock().unwrap());
        if let Some(hook) = hooks.on_hangup {
            hook(self);
        }
    }

    fn reject(&self) {
        self.rejected.store(true, Ordering::SeqCst);
    }

    fn has_direct_connection_listeners(&self) -> bool {
        self.direct_connection_listeners.load(Ordering::SeqCst)
    }
}

/// Builds [`MockCall`]s and keeps every one it built.
#[derive(Default)]
pub(crate) struct MockCallFactory {
    calls: Mutex<Vec<Arc<MockCall>>>,
    establish_on_answer: AtomicBool,
    establish_inbound: AtomicBool,
    call_listeners: AtomicBool,
}

impl MockCallFactory {
    /// Outgoing direct connections establish as soon as they are answered.
    pub(crate) fn establish_on_answer(&self, on: bool) {
        self.establish_on_answer.store(on, Ordering::SeqCst);
    }

    /// Incoming direct connections establish while being created.
    pub(crate) fn establish_inbound(&self, on: bool) {
        self.establish_inbound.store(on, Ordering::SeqCst);
    }

    /// New calls report a direct-connection subscriber of their own.
    pub(crate) fn with_call_listeners(&self, on: bool) {
        self.call_listeners.store(on, Ordering::SeqCst);
    }

    pub(crate) fn created(&self) -> Vec<Arc<MockCall>> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn find(&self, id: &str) -> Option<Arc<MockCall>> {
        self.calls.lock().unwrap().iter().find(|c| c.id == id).cloned()
    }
}

impl CallFactory for MockCallFactory {
    fn create(&self, params: CallParams) -> CallHandle {
        let call = Arc::new(MockCall {
            id: params.id.unwrap_or_else(new_id),
            initiator: params.initiator,
            connection_id: params.connection_id,
            direct_connection_only: params.direct_connection_only,
            settings: params.settings,
            signals: Some(params.signals),
            hooks: Mutex::new(params.hooks),
            answers: AtomicUsize::new(0),
            hangups: Mutex::new(Vec::new()),
            rejected: AtomicBool::new(false),
            direct_connection_listeners: AtomicBool::new(self.call_listeners.load(Ordering::SeqCst)),
            establish_on_answer: self.establish_on_answer.load(Ordering::SeqCst),
            established: Mutex::new(None),
        });
        self.calls.lock().unwrap().push(call.clone());

        if call.direct_connection_only
            && !call.initiator
            && self.establish_inbound.load(Ordering::SeqCst)
        {
            call.establish();
        }
        call
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub(crate) struct Harness {
    pub client: Client,
    pub channel: Arc<MockChannel>,
    pub calls: Arc<MockCallFactory>,
}

/// A client over mocks, not yet connected. TURN refresh is off so call
/// settings only change when a test changes them.
pub(crate) fn harness() -> Harness {
    let mut settings = ClientSettings::new("test-app");
    settings.turn.enabled = false;
    harness_with(settings)
}

pub(crate) fn harness_with(settings: ClientSettings) -> Harness {
    let channel = Arc::new(MockChannel::default());
    let calls = Arc::new(MockCallFactory::default());
    let client = Client::new(settings, channel.clone(), calls.clone()).unwrap();
    Harness {
        client,
        channel,
        calls,
    }
}

pub(crate) async fn connected_harness() -> Harness {
    let h = harness();
    h.client.connect(Some("token")).await.unwrap();
    h
}
