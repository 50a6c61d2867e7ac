//! Shared application state handed to every route.
//!
//! The process runs a single [`RealtimeSession`]. Every control socket drives
//! that one session and observes it through the [`SessionNotice`] broadcast.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::core::mail::{Inbox, SharedInbox};
use crate::core::realtime::messages::ApiError;
use crate::core::realtime::{
    EphemeralTokenClient, LogCallback, LogEntry, PeerConnector, PeerStack, RealtimeConfig,
    RealtimeErrorCallback, RealtimeSession, SdpExchange, SessionError, SessionEventRouter,
    SessionStatus, StatusCallback, TerminalCallback, ToolCallCallback, ToolCallRecord,
    TransportConnector, TransportKind, WsConnector,
};
use crate::core::tools::ToolDispatcher;

const NOTICE_BUFFER_SIZE: usize = 256;

/// Something a control socket should tell its client about the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    Status(SessionStatus),
    Terminal(SessionError),
    Log(LogEntry),
    ToolCall(ToolCallRecord),
    ModelError(ApiError),
}

pub struct AppState {
    pub config: ServerConfig,
    /// Inbox shared by the tool dispatcher and the REST inbox actions
    pub inbox: SharedInbox,
    pub dispatcher: Arc<ToolDispatcher>,
    pub http: reqwest::Client,
    pub tokens: EphemeralTokenClient,
    realtime: RealtimeConfig,
    session: RealtimeSession,
    notices: broadcast::Sender<SessionNotice>,
    control_clients: AtomicUsize,
}

impl AppState {
    pub async fn new(config: ServerConfig) -> Arc<Self> {
        Self::build(config, None)
    }

    /// State whose session may use the negotiated peer transport.
    pub fn with_peer_stack(config: ServerConfig, stack: Arc<dyn PeerStack>) -> Arc<Self> {
        Self::build(config, Some(stack))
    }

    fn build(config: ServerConfig, peer_stack: Option<Arc<dyn PeerStack>>) -> Arc<Self> {
        let inbox = match &config.mail_fixtures_path {
            Some(path) => Inbox::from_json_file(path).unwrap_or_else(|e| {
                warn!("Falling back to bundled demo mails: {}", e);
                Inbox::with_mock_data()
            }),
            None => Inbox::with_mock_data(),
        }
        .into_shared();

        let dispatcher = Arc::new(ToolDispatcher::for_inbox(inbox.clone()));
        let http = reqwest::Client::new();
        let realtime = config.realtime_config();
        let tokens = EphemeralTokenClient::new(http.clone(), &realtime);

        info!(
            transport = %realtime.transport,
            model = %realtime.model,
            tools = dispatcher.registry().len(),
            "Application state initialized"
        );

        let connector = connector_for(&realtime, &peer_stack, &tokens, &http);
        let router = Arc::new(SessionEventRouter::new(dispatcher.clone(), config.log_order));
        let session = RealtimeSession::new(
            realtime.clone(),
            dispatcher.registry().clone(),
            connector,
            router,
        );
        let (notices, _) = broadcast::channel(NOTICE_BUFFER_SIZE);
        publish_notices(&session, &notices);

        Arc::new(Self {
            config,
            inbox,
            dispatcher,
            http,
            tokens,
            realtime,
            session,
            notices,
            control_clients: AtomicUsize::new(0),
        })
    }

    pub fn realtime_config(&self) -> &RealtimeConfig {
        &self.realtime
    }

    /// The process-wide model session.
    pub fn session(&self) -> &RealtimeSession {
        &self.session
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<SessionNotice> {
        self.notices.subscribe()
    }

    /// Register a control socket; returns the number now attached.
    pub fn attach_control_client(&self) -> usize {
        self.control_clients.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Unregister a control socket. The session is stopped once the last one
    /// is gone.
    pub async fn detach_control_client(&self) {
        let remaining = self.control_clients.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        if remaining == 0 {
            info!("Last control client detached, stopping session");
            self.session.stop().await;
        }
    }
}

/// Without a peer media stack the websocket transport is used instead.
fn connector_for(
    realtime: &RealtimeConfig,
    peer_stack: &Option<Arc<dyn PeerStack>>,
    tokens: &EphemeralTokenClient,
    http: &reqwest::Client,
) -> Arc<dyn TransportConnector> {
    match (realtime.transport, peer_stack) {
        (TransportKind::Peer, Some(stack)) => Arc::new(PeerConnector::new(
            stack.clone(),
            tokens.clone(),
            SdpExchange::new(http.clone(), realtime),
        )),
        (TransportKind::Peer, None) => {
            warn!("Peer transport requested without a media stack, using websocket");
            Arc::new(WsConnector::new(realtime))
        }
        (TransportKind::WebSocket, _) => Arc::new(WsConnector::new(realtime)),
    }
}

/// Fan session and router callbacks out to every subscribed control socket.
/// Sending never waits; a lagging subscriber loses notices instead.
fn publish_notices(session: &RealtimeSession, notices: &broadcast::Sender<SessionNotice>) {
    let tx = notices.clone();
    let status_callback: StatusCallback = Arc::new(move |status: SessionStatus| {
        let _ = tx.send(SessionNotice::Status(status));
        Box::pin(async {}) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    session.on_status(status_callback);

    let tx = notices.clone();
    let terminal_callback: TerminalCallback = Arc::new(move |err: SessionError| {
        let _ = tx.send(SessionNotice::Terminal(err));
        Box::pin(async {}) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    session.on_terminal(terminal_callback);

    let router = session.router();

    let tx = notices.clone();
    let log_callback: LogCallback = Arc::new(move |entry: LogEntry| {
        let _ = tx.send(SessionNotice::Log(entry));
        Box::pin(async {}) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    router.on_log(log_callback);

    let tx = notices.clone();
    let tool_call_callback: ToolCallCallback = Arc::new(move |record: ToolCallRecord| {
        let _ = tx.send(SessionNotice::ToolCall(record));
        Box::pin(async {}) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    router.on_tool_call(tool_call_callback);

    let tx = notices.clone();
    let error_callback: RealtimeErrorCallback = Arc::new(move |err: ApiError| {
        let _ = tx.send(SessionNotice::ModelError(err));
        Box::pin(async {}) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    router.on_error(error_callback);
}
