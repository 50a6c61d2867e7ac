//! In-process transports for exercising the session without a network.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::peer::{DataChannel, PeerConnection, PeerStack};
use super::{
    ChannelId, Transport, TransportAttempt, TransportConnector, TransportEvent, TransportEventSink,
};
use crate::core::realtime::base::{
    HealthSignal, RealtimeError, RealtimeResult, RetryPolicy, SessionError,
};
use crate::core::realtime::config::TransportKind;
use crate::core::realtime::messages::ClientEvent;

// =============================================================================
// Fake peer stack
// =============================================================================

#[derive(Default)]
struct PeerState {
    label: Option<String>,
    answer: Option<String>,
    sent: Vec<String>,
    restarts: usize,
    released: bool,
}

#[derive(Default)]
pub(crate) struct FakePeerStack {
    state: Arc<Mutex<PeerState>>,
    stall_gathering: bool,
    deny: bool,
}

impl FakePeerStack {
    pub(crate) fn stalled_gathering() -> Self {
        Self {
            stall_gathering: true,
            ..Default::default()
        }
    }

    pub(crate) fn denied() -> Self {
        Self {
            deny: true,
            ..Default::default()
        }
    }

    pub(crate) fn applied_answer(&self) -> Option<String> {
        self.state.lock().answer.clone()
    }

    pub(crate) fn data_channel_label(&self) -> Option<String> {
        self.state.lock().label.clone()
    }

    pub(crate) fn released(&self) -> bool {
        self.state.lock().released
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.state.lock().sent.clone()
    }
}

#[async_trait]
impl PeerStack for FakePeerStack {
    async fn acquire_capture(
        &self,
        events: TransportEventSink,
    ) -> RealtimeResult<Arc<dyn PeerConnection>> {
        if self.deny {
            return Err(RealtimeError::InternalError(
                "permission denied".to_string(),
            ));
        }
        Ok(Arc::new(FakePeerConnection {
            state: self.state.clone(),
            events,
            stall_gathering: self.stall_gathering,
        }))
    }
}

struct FakePeerConnection {
    state: Arc<Mutex<PeerState>>,
    events: TransportEventSink,
    stall_gathering: bool,
}

#[async_trait]
impl PeerConnection for FakePeerConnection {
    async fn open_data_channel(&self, label: &str) -> RealtimeResult<Arc<dyn DataChannel>> {
        self.state.lock().label = Some(label.to_string());
        self.events.emit(TransportEvent::Open);
        Ok(Arc::new(FakeDataChannel {
            state: self.state.clone(),
            open: AtomicBool::new(true),
        }))
    }

    async fn create_offer(&self) -> RealtimeResult<()> {
        Ok(())
    }

    async fn wait_ice_gathering(&self) {
        if self.stall_gathering {
            std::future::pending::<()>().await;
        }
    }

    async fn local_description(&self) -> RealtimeResult<String> {
        Ok("v=0 offer".to_string())
    }

    async fn apply_answer(&self, sdp: &str) -> RealtimeResult<()> {
        self.state.lock().answer = Some(sdp.to_string());
        self.events
            .emit(TransportEvent::Health(HealthSignal::Connected));
        Ok(())
    }

    async fn restart_ice(&self) -> RealtimeResult<()> {
        self.state.lock().restarts += 1;
        Ok(())
    }

    async fn release(&self) {
        self.state.lock().released = true;
    }
}

struct FakeDataChannel {
    state: Arc<Mutex<PeerState>>,
    open: AtomicBool,
}

#[async_trait]
impl DataChannel for FakeDataChannel {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn send_text(&self, text: String) -> RealtimeResult<()> {
        self.state.lock().sent.push(text);
        Ok(())
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

// =============================================================================
// Scripted connector
// =============================================================================

/// What the next attempt's negotiation does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Script {
    /// Connect and report `Health(Connected)` plus `Open`
    Connect,
    /// Produce a transport that never reports connected
    Silent,
    /// Never finish negotiating
    Hang,
    /// Fail negotiation
    Fail,
}

/// Counters shared by every attempt and transport of a [`ScriptedConnector`].
#[derive(Default)]
pub(crate) struct ConnectorLog {
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
    pub transports_created: AtomicUsize,
    pub transports_closed: AtomicUsize,
    pub restarts: AtomicUsize,
    pub sent: Mutex<Vec<(ChannelId, ClientEvent)>>,
    pub sinks: Mutex<Vec<TransportEventSink>>,
}

impl ConnectorLog {
    pub(crate) fn open_transports(&self) -> usize {
        self.transports_created.load(Ordering::SeqCst)
            - self.transports_closed.load(Ordering::SeqCst)
    }

    pub(crate) fn sent_types(&self) -> Vec<&'static str> {
        self.sent.lock().iter().map(|(_, e)| e.event_type()).collect()
    }

    /// Sink of the most recent attempt.
    pub(crate) fn last_sink(&self) -> Option<TransportEventSink> {
        self.sinks.lock().last().cloned()
    }
}

pub(crate) struct ScriptedConnector {
    scripts: Mutex<VecDeque<Script>>,
    deny_capture: AtomicBool,
    pub log: Arc<ConnectorLog>,
}

impl ScriptedConnector {
    /// Attempts follow `scripts` in order, then `Connect` once exhausted.
    pub(crate) fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            deny_capture: AtomicBool::new(false),
            log: Arc::new(ConnectorLog::default()),
        }
    }

    pub(crate) fn deny_capture(&self) {
        self.deny_capture.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl TransportConnector for ScriptedConnector {
    fn kind(&self) -> TransportKind {
        TransportKind::WebSocket
    }

    async fn acquire(
        &self,
        events: TransportEventSink,
    ) -> Result<Arc<dyn TransportAttempt>, SessionError> {
        if self.deny_capture.load(Ordering::SeqCst) {
            return Err(SessionError::CaptureDenied("denied".to_string()));
        }
        self.log.acquired.fetch_add(1, Ordering::SeqCst);
        self.log.sinks.lock().push(events.clone());
        let script = self.scripts.lock().pop_front().unwrap_or(Script::Connect);
        Ok(Arc::new(ScriptedAttempt {
            script,
            events,
            log: self.log.clone(),
            released: AtomicBool::new(false),
        }))
    }
}

struct ScriptedAttempt {
    script: Script,
    events: TransportEventSink,
    log: Arc<ConnectorLog>,
    released: AtomicBool,
}

#[async_trait]
impl TransportAttempt for ScriptedAttempt {
    async fn negotiate(&self, _policy: &RetryPolicy) -> Result<Arc<dyn Transport>, SessionError> {
        match self.script {
            Script::Hang => std::future::pending().await,
            Script::Fail => Err(SessionError::NegotiationFailed("scripted".to_string())),
            Script::Connect | Script::Silent => {
                self.log.transports_created.fetch_add(1, Ordering::SeqCst);
                let transport = Arc::new(ScriptedTransport {
                    channel: self.events.channel(),
                    open: AtomicBool::new(true),
                    log: self.log.clone(),
                });
                if self.script == Script::Connect {
                    self.events
                        .emit(TransportEvent::Health(HealthSignal::Connected));
                    self.events.emit(TransportEvent::Open);
                }
                Ok(transport)
            }
        }
    }

    async fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.log.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

struct ScriptedTransport {
    channel: ChannelId,
    open: AtomicBool,
    log: Arc<ConnectorLog>,
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn channel_id(&self) -> ChannelId {
        self.channel
    }

    fn kind(&self) -> TransportKind {
        TransportKind::WebSocket
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn send(&self, event: &ClientEvent) -> RealtimeResult<()> {
        if !self.is_open() {
            return Err(RealtimeError::ChannelUnavailable);
        }
        self.log.sent.lock().push((self.channel, event.clone()));
        Ok(())
    }

    async fn restart(&self) -> RealtimeResult<()> {
        self.log.restarts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            self.log.transports_closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// A bare transport recording sends, for router tests.
pub(crate) struct RecordingTransport {
    channel: ChannelId,
    open: AtomicBool,
    pub sent: Mutex<Vec<ClientEvent>>,
}

impl RecordingTransport {
    pub(crate) fn new() -> Self {
        Self {
            channel: ChannelId::next(),
            open: AtomicBool::new(true),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn closed() -> Self {
        let transport = Self::new();
        transport.open.store(false, Ordering::SeqCst);
        transport
    }

    pub(crate) fn sent_types(&self) -> Vec<&'static str> {
        self.sent.lock().iter().map(ClientEvent::event_type).collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    fn channel_id(&self) -> ChannelId {
        self.channel
    }

    fn kind(&self) -> TransportKind {
        TransportKind::WebSocket
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn send(&self, event: &ClientEvent) -> RealtimeResult<()> {
        if !self.is_open() {
            return Err(RealtimeError::ChannelUnavailable);
        }
        self.sent.lock().push(event.clone());
        Ok(())
    }

    async fn restart(&self) -> RealtimeResult<()> {
        Ok(())
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}
