//! Socket-style transport: one persistent websocket to the realtime endpoint.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use super::{
    ChannelId, Transport, TransportAttempt, TransportConnector, TransportEvent, TransportEventSink,
};
use crate::core::realtime::base::{
    HealthSignal, RealtimeConfig, RealtimeError, RealtimeResult, RetryPolicy, SessionError,
};
use crate::core::realtime::config::TransportKind;
use crate::core::realtime::messages::ClientEvent;

/// Outbound queue depth between `send` and the socket writer.
const WS_CHANNEL_CAPACITY: usize = 256;

/// Build the endpoint URL with the `model` query parameter.
pub fn build_ws_url(base: &str, model: &str) -> RealtimeResult<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| RealtimeError::InvalidConfiguration(format!("invalid realtime URL: {e}")))?;
    url.query_pairs_mut().append_pair("model", model);
    Ok(url)
}

/// A connected websocket.
pub struct WebSocketTransport {
    channel: ChannelId,
    sender: mpsc::Sender<Message>,
    open: Arc<AtomicBool>,
    cancel: CancellationToken,
    handle: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl WebSocketTransport {
    /// Connect and spawn the connection task.
    ///
    /// Inbound text frames and lifecycle changes are pushed to `events`.
    pub async fn connect(
        url: &Url,
        api_key: &str,
        events: TransportEventSink,
    ) -> RealtimeResult<Self> {
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;
        let headers = request.headers_mut();
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|e| RealtimeError::InvalidConfiguration(e.to_string()))?,
        );
        headers.insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        let channel = events.channel();
        info!(channel = %channel, "Connected to realtime endpoint");

        let (mut ws_sink, mut ws_stream) = ws_stream.split();
        let (tx, mut rx) = mpsc::channel::<Message>(WS_CHANNEL_CAPACITY);
        let open = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();

        let task_open = open.clone();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => {
                        let _ = ws_sink.send(Message::Close(None)).await;
                        debug!(channel = %channel, "Websocket closed locally");
                        break;
                    }

                    Some(msg) = rx.recv() => {
                        if let Err(e) = ws_sink.send(msg).await {
                            error!(channel = %channel, "Failed to send websocket message: {}", e);
                            task_open.store(false, Ordering::SeqCst);
                            events.emit(TransportEvent::Health(HealthSignal::Failed));
                            break;
                        }
                    }

                    msg = ws_stream.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                events.emit(TransportEvent::Message(text.to_string()));
                            }
                            Some(Ok(Message::Ping(data))) => {
                                if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                    warn!(channel = %channel, "Failed to send pong: {}", e);
                                }
                            }
                            Some(Ok(Message::Close(frame))) => {
                                info!(channel = %channel, "Websocket closed by server");
                                task_open.store(false, Ordering::SeqCst);
                                events.emit(TransportEvent::Closed {
                                    reason: frame.map(|f| f.reason.to_string()),
                                });
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                error!(channel = %channel, "Websocket error: {}", e);
                                task_open.store(false, Ordering::SeqCst);
                                events.emit(TransportEvent::Health(HealthSignal::Failed));
                                break;
                            }
                            None => {
                                warn!(channel = %channel, "Websocket stream ended without close frame");
                                task_open.store(false, Ordering::SeqCst);
                                events.emit(TransportEvent::Health(HealthSignal::Failed));
                                break;
                            }
                        }
                    }
                }
            }
            task_open.store(false, Ordering::SeqCst);
        });

        Ok(Self {
            channel,
            sender: tx,
            open,
            cancel,
            handle: parking_lot::Mutex::new(Some(handle)),
        })
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
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
        let json = event.to_wire()?;
        self.sender
            .send(Message::Text(json.into()))
            .await
            .map_err(|_| RealtimeError::ChannelUnavailable)
    }

    async fn restart(&self) -> RealtimeResult<()> {
        Err(RealtimeError::ConnectionFailed(
            "websocket transport cannot restart in place".to_string(),
        ))
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        self.cancel.cancel();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

/// Connector for [`WebSocketTransport`], authenticating with the API key directly.
pub struct WsConnector {
    realtime_url: String,
    api_key: String,
    model: String,
}

impl WsConnector {
    pub fn new(config: &RealtimeConfig) -> Self {
        Self {
            realtime_url: config.realtime_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }
}

#[async_trait]
impl TransportConnector for WsConnector {
    fn kind(&self) -> TransportKind {
        TransportKind::WebSocket
    }

    async fn acquire(
        &self,
        events: TransportEventSink,
    ) -> Result<Arc<dyn TransportAttempt>, SessionError> {
        let url = build_ws_url(&self.realtime_url, &self.model)?;
        Ok(Arc::new(WsAttempt {
            url,
            api_key: self.api_key.clone(),
            events,
            transport: tokio::sync::Mutex::new(None),
        }))
    }
}

struct WsAttempt {
    url: Url,
    api_key: String,
    events: TransportEventSink,
    transport: tokio::sync::Mutex<Option<Arc<WebSocketTransport>>>,
}

#[async_trait]
impl TransportAttempt for WsAttempt {
    async fn negotiate(&self, policy: &RetryPolicy) -> Result<Arc<dyn Transport>, SessionError> {
        let connect = WebSocketTransport::connect(&self.url, &self.api_key, self.events.clone());
        let transport = match tokio::time::timeout(policy.connect_timeout(), connect).await {
            Ok(result) => Arc::new(result?),
            Err(_) => return Err(SessionError::NegotiationTimeout),
        };

        // A websocket is connected and ready for sends in the same instant
        self.events
            .emit(TransportEvent::Health(HealthSignal::Connected));
        self.events.emit(TransportEvent::Open);

        *self.transport.lock().await = Some(transport.clone());
        Ok(transport)
    }

    async fn release(&self) {
        let transport = self.transport.lock().await.take();
        if let Some(transport) = transport {
            transport.close().await;
        }
    }
}
