//! Realtime session controller.
//!
//! [`RealtimeSession`] owns the [`SessionMachine`] and carries out the effects
//! of each transition: acquiring and negotiating transports, arming timers,
//! sending the session configuration, tearing down. Every suspension it
//! starts runs in its own task and feeds its outcome back as a
//! [`SessionInput`] tagged with the generation it belongs to; a result whose
//! generation is no longer current is dropped. Transport events are likewise
//! accepted only from the channel of the current attempt.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::Weak;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{Mutex, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::base::{
    RealtimeConfig, RealtimeError, RealtimeResult, SessionError, SessionStatus, StatusCallback,
    TerminalCallback,
};
use super::messages::{ClientEvent, ConversationItem};
use super::router::SessionEventRouter;
use super::state_machine::{Effect, SessionInput, SessionMachine, transition};
use super::transport::{
    ChannelId, Transport, TransportAttempt, TransportConnector, TransportEnvelope,
    TransportEvent, TransportEventSink,
};
use crate::core::tools::ToolRegistry;

/// Generation of the session state; bumped for every attempt and teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SessionId(u64);

impl SessionId {
    fn bump(&mut self) -> Self {
        self.0 += 1;
        *self
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

struct SessionState {
    machine: SessionMachine,
    generation: SessionId,
    channel: Option<ChannelId>,
    attempt: Option<Arc<dyn TransportAttempt>>,
    transport: Option<Arc<dyn Transport>>,
    /// Channel opened before negotiation returned its transport
    config_pending: bool,
    cancel: CancellationToken,
}

/// Observer notification, delivered in order outside the state lock
enum Notice {
    Status(SessionStatus),
    Terminal(SessionError),
}

struct SessionInner {
    config: RealtimeConfig,
    registry: Arc<ToolRegistry>,
    connector: Arc<dyn TransportConnector>,
    router: Arc<SessionEventRouter>,
    state: Mutex<SessionState>,
    status_tx: watch::Sender<SessionStatus>,
    events_tx: mpsc::UnboundedSender<TransportEnvelope>,
    events_rx: parking_lot::Mutex<Option<mpsc::UnboundedReceiver<TransportEnvelope>>>,
    notices_tx: mpsc::UnboundedSender<Notice>,
    notices_rx: parking_lot::Mutex<Option<mpsc::UnboundedReceiver<Notice>>>,
    status_callback: RwLock<Option<StatusCallback>>,
    terminal_callback: RwLock<Option<TerminalCallback>>,
}

/// One live connection to the realtime model, at most one transport at a time.
#[derive(Clone)]
pub struct RealtimeSession {
    inner: Arc<SessionInner>,
}

impl RealtimeSession {
    pub fn new(
        config: RealtimeConfig,
        registry: Arc<ToolRegistry>,
        connector: Arc<dyn TransportConnector>,
        router: Arc<SessionEventRouter>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (notices_tx, notices_rx) = mpsc::unbounded_channel();
        let (status_tx, _) = watch::channel(SessionStatus::Idle);
        let machine = SessionMachine::new(&config.retry);

        Self {
            inner: Arc::new(SessionInner {
                config,
                registry,
                connector,
                router,
                state: Mutex::new(SessionState {
                    machine,
                    generation: SessionId::default(),
                    channel: None,
                    attempt: None,
                    transport: None,
                    config_pending: false,
                    cancel: CancellationToken::new(),
                }),
                status_tx,
                events_tx,
                events_rx: parking_lot::Mutex::new(Some(events_rx)),
                notices_tx,
                notices_rx: parking_lot::Mutex::new(Some(notices_rx)),
                status_callback: RwLock::new(None),
                terminal_callback: RwLock::new(None),
            }),
        }
    }

    pub fn router(&self) -> &Arc<SessionEventRouter> {
        &self.inner.router
    }

    pub fn on_status(&self, callback: StatusCallback) {
        *self.inner.status_callback.write() = Some(callback);
    }

    pub fn on_terminal(&self, callback: TerminalCallback) {
        *self.inner.terminal_callback.write() = Some(callback);
    }

    /// Start a new session; a running one is torn down first.
    pub async fn start(&self) {
        self.inner.spawn_pumps();
        info!(transport = %self.inner.connector.kind(), "Session start requested");
        self.inner.apply(None, SessionInput::Start).await;
    }

    /// Stop from any state. Pending timers and negotiations are abandoned.
    pub async fn stop(&self) {
        info!("Session stop requested");
        let inner = &self.inner;
        inner.spawn_pumps();
        let mut state = inner.state.lock().await;
        state.generation.bump();
        state.cancel.cancel();
        state.cancel = CancellationToken::new();
        inner.drive(&mut state, SessionInput::Stop).await;
    }

    pub fn status(&self) -> SessionStatus {
        *self.inner.status_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.inner.status_tx.subscribe()
    }

    /// Retries used by the current logical connect.
    pub async fn retries(&self) -> u32 {
        self.inner.state.lock().await.machine.retries
    }

    pub async fn generation(&self) -> SessionId {
        self.inner.state.lock().await.generation
    }

    /// Send a typed user message and ask the model to respond.
    pub async fn send_text(&self, text: &str) -> RealtimeResult<()> {
        let transport = {
            let state = self.inner.state.lock().await;
            match (state.machine.status, state.transport.clone()) {
                (SessionStatus::Open | SessionStatus::Degraded, Some(transport)) => transport,
                _ => return Err(RealtimeError::ChannelUnavailable),
            }
        };
        transport
            .send(&ClientEvent::ConversationItemCreate {
                item: ConversationItem::user_text(text),
                previous_item_id: None,
            })
            .await?;
        transport.send(&ClientEvent::response_create()).await
    }
}

impl SessionInner {
    fn spawn_pumps(self: &Arc<Self>) {
        self.spawn_event_pump();
        self.spawn_notifier();
    }

    /// Runs observer callbacks one at a time; a slow observer never holds up
    /// a transition.
    fn spawn_notifier(self: &Arc<Self>) {
        let Some(mut rx) = self.notices_rx.lock().take() else {
            return;
        };
        let weak: Weak<SessionInner> = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(notice) = rx.recv().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                match notice {
                    Notice::Status(status) => {
                        let callback = inner.status_callback.read().clone();
                        drop(inner);
                        if let Some(cb) = callback {
                            cb(status).await;
                        }
                    }
                    Notice::Terminal(err) => {
                        let callback = inner.terminal_callback.read().clone();
                        drop(inner);
                        if let Some(cb) = callback {
                            cb(err).await;
                        }
                    }
                }
            }
            debug!("Session notifier ended");
        });
    }

    fn spawn_event_pump(self: &Arc<Self>) {
        let Some(mut rx) = self.events_rx.lock().take() else {
            return;
        };
        let weak: Weak<SessionInner> = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.on_transport_event(envelope).await;
            }
            debug!("Session event pump ended");
        });
    }

    async fn on_transport_event(self: &Arc<Self>, envelope: TransportEnvelope) {
        let mut state = self.state.lock().await;
        if state.channel != Some(envelope.channel) {
            debug!(channel = %envelope.channel, "Dropping event from stale channel");
            return;
        }

        let input = match envelope.event {
            TransportEvent::Open => SessionInput::ChannelOpen,
            TransportEvent::Health(signal) => {
                debug!(channel = %envelope.channel, signal = %signal, "Transport health");
                SessionInput::Health(signal)
            }
            TransportEvent::Closed { reason } => {
                info!(channel = %envelope.channel, reason = ?reason, "Transport closed by remote");
                SessionInput::RemoteClosed
            }
            TransportEvent::Message(raw) => {
                let Some(transport) = state.transport.clone() else {
                    debug!(channel = %envelope.channel, "Message before transport ready, dropping");
                    return;
                };
                drop(state);
                self.router.on_message(transport.as_ref(), &raw).await;
                return;
            }
        };
        self.drive(&mut state, input).await;
    }

    /// Apply an input unless it belongs to a superseded generation.
    async fn apply(self: &Arc<Self>, generation: Option<SessionId>, input: SessionInput) {
        let mut state = self.state.lock().await;
        if let Some(generation) = generation {
            if generation != state.generation {
                debug!(
                    stale = %generation,
                    current = %state.generation,
                    input = ?input,
                    "Dropping stale session input"
                );
                return;
            }
        }
        self.drive(&mut state, input).await;
    }

    async fn drive(self: &Arc<Self>, state: &mut SessionState, input: SessionInput) {
        let mut queue = VecDeque::from([input]);
        while let Some(input) = queue.pop_front() {
            let from = state.machine.status;
            let (next, effects) = transition(&state.machine, input.clone());
            state.machine = next;
            debug!(
                generation = %state.generation,
                from = %from,
                to = %state.machine.status,
                input = ?input,
                effects = effects.len(),
                "Session transition"
            );
            for effect in effects {
                self.execute(state, effect, &mut queue).await;
            }
        }
    }

    async fn execute(
        self: &Arc<Self>,
        state: &mut SessionState,
        effect: Effect,
        queue: &mut VecDeque<SessionInput>,
    ) {
        let policy = &self.config.retry;
        match effect {
            Effect::ReportStatus(status) => {
                info!(generation = %state.generation, status = %status, "Session status");
                self.status_tx.send_replace(status);
                let _ = self.notices_tx.send(Notice::Status(status));
            }
            Effect::Teardown => {
                self.release(state).await;
                queue.push_back(SessionInput::TeardownComplete);
            }
            Effect::ReleaseResources => self.release(state).await,
            Effect::Settle { delay } => {
                self.schedule(state, delay, SessionInput::Start);
            }
            Effect::BeginConnect => self.begin_connect(state),
            Effect::BeginNegotiation => self.begin_negotiation(state),
            Effect::SendSessionConfig => {
                if let Some(transport) = state.transport.clone() {
                    self.send_session_config(transport.as_ref()).await;
                } else {
                    state.config_pending = true;
                }
            }
            Effect::RestartTransport => self.restart_transport(state),
            Effect::ArmRestartTimer { delay } => {
                self.schedule(state, delay, SessionInput::RestartTimeout);
            }
            Effect::ScheduleRetry { attempt, delay } => {
                info!(
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Scheduling reconnect"
                );
                self.schedule(state, delay, SessionInput::RetryFired);
            }
            Effect::ReportTerminal(err) => {
                error!("Session failed permanently: {}", err);
                let _ = self.notices_tx.send(Notice::Terminal(err));
            }
        }
    }

    /// Feed `input` after `delay` unless the generation moves on first.
    fn schedule(self: &Arc<Self>, state: &SessionState, delay: Duration, input: SessionInput) {
        let inner = self.clone();
        let generation = state.generation;
        let cancel = state.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    inner.apply(Some(generation), input).await;
                }
            }
        });
    }

    /// Restart the transport in place; a refusal counts as a restart timeout.
    fn restart_transport(self: &Arc<Self>, state: &SessionState) {
        let Some(transport) = state.transport.clone() else {
            return;
        };
        let inner = self.clone();
        let generation = state.generation;
        tokio::spawn(async move {
            if let Err(e) = transport.restart().await {
                warn!(generation = %generation, "In-place restart failed: {}", e);
                inner.apply(Some(generation), SessionInput::RestartTimeout).await;
            }
        });
    }

    /// Close the transport and release capture of the current attempt.
    async fn release(&self, state: &mut SessionState) {
        state.generation.bump();
        state.cancel.cancel();
        state.cancel = CancellationToken::new();
        state.channel = None;
        state.config_pending = false;

        if let Some(transport) = state.transport.take() {
            transport.close().await;
        }
        if let Some(attempt) = state.attempt.take() {
            attempt.release().await;
        }
    }

    fn begin_connect(self: &Arc<Self>, state: &mut SessionState) {
        if state.machine.retries == 0 {
            self.router.reset();
        }
        let generation = state.generation.bump();
        let channel = ChannelId::next();
        state.channel = Some(channel);

        let sink = TransportEventSink::new(channel, self.events_tx.clone());
        let inner = self.clone();
        let cancel = state.cancel.clone();
        let timeout = self.config.retry.connect_timeout();

        tokio::spawn(async move {
            let acquired = tokio::select! {
                _ = cancel.cancelled() => return,
                result = tokio::time::timeout(timeout, inner.connector.acquire(sink)) => result,
            };
            match acquired {
                Ok(Ok(attempt)) => inner.attempt_acquired(generation, attempt).await,
                Ok(Err(e)) => {
                    warn!(generation = %generation, "Capture acquisition failed: {}", e);
                    inner.apply(Some(generation), SessionInput::CaptureDenied).await;
                }
                Err(_) => {
                    warn!(generation = %generation, "Capture acquisition timed out");
                    inner.apply(Some(generation), SessionInput::CaptureDenied).await;
                }
            }
        });
    }

    async fn attempt_acquired(self: &Arc<Self>, generation: SessionId, attempt: Arc<dyn TransportAttempt>) {
        let mut state = self.state.lock().await;
        if state.generation != generation {
            drop(state);
            debug!(generation = %generation, "Releasing capture of abandoned attempt");
            attempt.release().await;
            return;
        }
        state.attempt = Some(attempt);
        self.drive(&mut state, SessionInput::CaptureAcquired).await;
    }

    fn begin_negotiation(self: &Arc<Self>, state: &mut SessionState) {
        let generation = state.generation;
        let Some(attempt) = state.attempt.clone() else {
            warn!(generation = %generation, "Negotiation requested without an attempt");
            return;
        };
        let inner = self.clone();
        let cancel = state.cancel.clone();
        let policy = self.config.retry.clone();

        tokio::spawn(async move {
            let negotiated = tokio::select! {
                _ = cancel.cancelled() => return,
                result = tokio::time::timeout(policy.connect_timeout(), attempt.negotiate(&policy)) => result,
            };
            match negotiated {
                Ok(Ok(transport)) => inner.transport_ready(generation, transport).await,
                Ok(Err(e)) => {
                    warn!(generation = %generation, "Negotiation failed: {}", e);
                    inner.apply(Some(generation), SessionInput::NegotiationFailed).await;
                }
                Err(_) => {
                    warn!(
                        generation = %generation,
                        "{}",
                        SessionError::NegotiationTimeout
                    );
                    inner.apply(Some(generation), SessionInput::NegotiationFailed).await;
                }
            }
        });
    }

    async fn transport_ready(self: &Arc<Self>, generation: SessionId, transport: Arc<dyn Transport>) {
        let mut state = self.state.lock().await;
        if state.generation != generation {
            drop(state);
            debug!(generation = %generation, "Closing transport of abandoned attempt");
            transport.close().await;
            return;
        }

        info!(
            generation = %generation,
            channel = %transport.channel_id(),
            transport = %transport.kind(),
            "Transport negotiated"
        );
        state.transport = Some(transport.clone());

        if state.config_pending {
            state.config_pending = false;
            self.send_session_config(transport.as_ref()).await;
        }
        if state.machine.status == SessionStatus::Negotiating {
            let delay = self.config.retry.connect_timeout();
            self.schedule(&state, delay, SessionInput::ConnectTimeout);
        }
    }

    async fn send_session_config(&self, transport: &dyn Transport) {
        let session = self.config.session_config(&self.registry);
        let tools = session.tools.len();
        match transport.send(&ClientEvent::SessionUpdate { session }).await {
            Ok(()) => info!(channel = %transport.channel_id(), tools, "Sent session configuration"),
            Err(e) => warn!(
                channel = %transport.channel_id(),
                "Failed to send session configuration: {}",
                e
            ),
        }
    }
}
