//! Realtime WebSocket handler
//!
//! Every UI connection controls the one process-wide [`RealtimeSession`]. A
//! start from any client tears down the running session before connecting
//! again. Session status, conversation log entries, answered tool calls and
//! model errors are forwarded to every connected client as they happen.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::{select, time::Duration};
use tracing::{debug, error, info, warn};

use crate::core::realtime::RealtimeSession;
use crate::state::{AppState, SessionNotice};

use super::messages::{RealtimeIncomingMessage, RealtimeMessageRoute, RealtimeOutgoingMessage};

const CHANNEL_BUFFER_SIZE: usize = 256;

/// Maximum WebSocket message size (1 MB)
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

/// Idle check interval
const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Connections with no client traffic for this long are closed
const IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// Upgrades the HTTP connection to the session control WebSocket.
pub async fn realtime_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    info!("Realtime WebSocket connection upgrade requested");

    ws.max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_realtime_socket(socket, state))
}

async fn handle_realtime_socket(socket: WebSocket, app_state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (message_tx, mut message_rx) = mpsc::channel::<RealtimeMessageRoute>(CHANNEL_BUFFER_SIZE);

    let sender_task = tokio::spawn(async move {
        while let Some(route) = message_rx.recv().await {
            let should_close = matches!(route, RealtimeMessageRoute::Close);

            let result = match route {
                RealtimeMessageRoute::Outgoing(message) => match serde_json::to_string(&message) {
                    Ok(json_str) => sender.send(Message::Text(json_str.into())).await,
                    Err(e) => {
                        error!("Failed to serialize outgoing message: {}", e);
                        continue;
                    }
                },
                RealtimeMessageRoute::Close => sender.send(Message::Close(None)).await,
            };

            if let Err(e) = result {
                debug!("Failed to send WebSocket message: {}", e);
                break;
            }

            if should_close {
                break;
            }
        }
    });

    let clients = app_state.attach_control_client();
    let session = app_state.session().clone();
    let forward_task = tokio::spawn(forward_notices(
        app_state.subscribe_notices(),
        message_tx.clone(),
    ));
    let _ = message_tx
        .send(RealtimeMessageRoute::Outgoing(RealtimeOutgoingMessage::status(
            session.status(),
        )))
        .await;
    info!(clients, "Realtime WebSocket connection established");

    let mut last_activity = std::time::Instant::now();

    loop {
        select! {
            msg_result = receiver.next() => {
                last_activity = std::time::Instant::now();

                match msg_result {
                    Some(Ok(msg)) => {
                        if !process_realtime_message(msg, &session, &message_tx).await {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        warn!("Realtime WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        info!("Realtime WebSocket connection closed by client");
                        break;
                    }
                }
            }
            _ = tokio::time::sleep(IDLE_CHECK_INTERVAL) => {
                if last_activity.elapsed() > IDLE_TIMEOUT {
                    warn!(
                        "Realtime WebSocket connection idle for {}s, closing",
                        last_activity.elapsed().as_secs()
                    );
                    let _ = message_tx
                        .send(RealtimeMessageRoute::Outgoing(RealtimeOutgoingMessage::error(
                            "idle_timeout",
                            "Connection closed due to inactivity",
                        )))
                        .await;
                    let _ = message_tx.send(RealtimeMessageRoute::Close).await;
                    break;
                }
            }
        }
    }

    forward_task.abort();
    app_state.detach_control_client().await;
    drop(message_tx);
    let _ = tokio::time::timeout(Duration::from_secs(1), sender_task).await;

    info!("Realtime WebSocket connection terminated");
}

async fn forward_notices(
    mut notices: broadcast::Receiver<SessionNotice>,
    message_tx: mpsc::Sender<RealtimeMessageRoute>,
) {
    loop {
        let message = match notices.recv().await {
            Ok(SessionNotice::Status(status)) => RealtimeOutgoingMessage::status(status),
            Ok(SessionNotice::Terminal(err)) => RealtimeOutgoingMessage::Terminal {
                message: err.to_string(),
            },
            Ok(SessionNotice::Log(entry)) => RealtimeOutgoingMessage::Log { entry },
            Ok(SessionNotice::ToolCall(record)) => RealtimeOutgoingMessage::ToolCall { record },
            Ok(SessionNotice::ModelError(err)) => RealtimeOutgoingMessage::Error {
                code: err.code,
                message: err.message,
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Control client lagging, notices dropped");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        if message_tx
            .send(RealtimeMessageRoute::Outgoing(message))
            .await
            .is_err()
        {
            break;
        }
    }
}

/// Returns false when the connection should close.
async fn process_realtime_message(
    msg: Message,
    session: &RealtimeSession,
    message_tx: &mpsc::Sender<RealtimeMessageRoute>,
) -> bool {
    match msg {
        Message::Text(text) => {
            let incoming: RealtimeIncomingMessage = match serde_json::from_str(&text) {
                Ok(msg) => msg,
                Err(e) => {
                    warn!("Failed to parse realtime message: {}", e);
                    let _ = message_tx
                        .send(RealtimeMessageRoute::Outgoing(RealtimeOutgoingMessage::error(
                            "parse_error",
                            format!("Invalid message format: {e}"),
                        )))
                        .await;
                    return true;
                }
            };

            if let Err(e) = incoming.validate_size() {
                let _ = message_tx
                    .send(RealtimeMessageRoute::Outgoing(RealtimeOutgoingMessage::error(
                        "validation_error",
                        e.to_string(),
                    )))
                    .await;
                return true;
            }

            match incoming {
                RealtimeIncomingMessage::Start => session.start().await,
                RealtimeIncomingMessage::Stop => session.stop().await,
                RealtimeIncomingMessage::Text { text } => {
                    if let Err(e) = session.send_text(&text).await {
                        let _ = message_tx
                            .send(RealtimeMessageRoute::Outgoing(RealtimeOutgoingMessage::error(
                                "text_error",
                                format!("Failed to send text: {e}"),
                            )))
                            .await;
                    }
                }
            }
            true
        }
        Message::Binary(_) => {
            debug!("Ignoring binary frame on realtime control socket");
            true
        }
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            info!("Realtime WebSocket close received");
            false
        }
    }
}
