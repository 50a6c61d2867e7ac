//! Negotiated peer transport: offer/answer over HTTPS, events over a data channel.
//!
//! The media stack itself sits behind [`PeerStack`]. Implementations push
//! connectivity changes as `Health(..)` and data channel activity as
//! `Open` / `Message` / `Closed` into the [`TransportEventSink`] they are
//! handed when capture is acquired.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::{debug, info, warn};
use url::Url;

use super::{ChannelId, Transport, TransportAttempt, TransportConnector, TransportEventSink};
use crate::core::realtime::base::{
    RealtimeConfig, RealtimeError, RealtimeResult, RetryPolicy, SessionError,
};
use crate::core::realtime::config::{DATA_CHANNEL_LABEL, TransportKind};
use crate::core::realtime::messages::ClientEvent;
use crate::core::realtime::token::EphemeralTokenClient;

/// Local peer-connection library.
#[async_trait]
pub trait PeerStack: Send + Sync {
    /// Acquire local capture and create a fresh peer connection.
    async fn acquire_capture(
        &self,
        events: TransportEventSink,
    ) -> RealtimeResult<Arc<dyn PeerConnection>>;
}

/// One local peer connection holding captured media.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Create the ordered, reliable event channel. Must precede the offer.
    async fn open_data_channel(&self, label: &str) -> RealtimeResult<Arc<dyn DataChannel>>;

    /// Produce the local offer and start candidate gathering.
    async fn create_offer(&self) -> RealtimeResult<()>;

    /// Resolves when candidate gathering completes.
    async fn wait_ice_gathering(&self);

    /// Current local description, including gathered candidates.
    async fn local_description(&self) -> RealtimeResult<String>;

    async fn apply_answer(&self, sdp: &str) -> RealtimeResult<()>;

    async fn restart_ice(&self) -> RealtimeResult<()>;

    /// Stop capture tracks and close the connection. Idempotent.
    async fn release(&self);
}

#[async_trait]
pub trait DataChannel: Send + Sync {
    fn is_open(&self) -> bool;

    async fn send_text(&self, text: String) -> RealtimeResult<()>;

    async fn close(&self);
}

// =============================================================================
// Offer/answer exchange
// =============================================================================

/// One-shot HTTPS offer/answer call.
#[derive(Clone)]
pub struct SdpExchange {
    http: reqwest::Client,
    api_base: String,
    model: String,
}

impl SdpExchange {
    pub fn new(http: reqwest::Client, config: &RealtimeConfig) -> Self {
        Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        }
    }

    pub fn endpoint(&self) -> RealtimeResult<Url> {
        let mut url = Url::parse(&format!("{}/realtime", self.api_base)).map_err(|e| {
            RealtimeError::InvalidConfiguration(format!("invalid API base URL: {e}"))
        })?;
        url.query_pairs_mut().append_pair("model", &self.model);
        Ok(url)
    }

    /// Post the local offer and return the remote answer.
    pub async fn exchange(&self, offer_sdp: &str, token: &str) -> RealtimeResult<String> {
        let response = self
            .http
            .post(self.endpoint()?)
            .header("Authorization", format!("Bearer {token}"))
            .header("Content-Type", "application/sdp")
            .body(offer_sdp.to_string())
            .send()
            .await
            .map_err(|e| RealtimeError::NegotiationFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RealtimeError::NegotiationFailed(format!(
                "SDP exchange error ({status}): {error_body}"
            )));
        }

        response
            .text()
            .await
            .map_err(|e| RealtimeError::NegotiationFailed(e.to_string()))
    }
}

// =============================================================================
// Transport
// =============================================================================

/// A negotiated peer connection with its open event channel.
pub struct PeerTransport {
    channel: ChannelId,
    connection: Arc<dyn PeerConnection>,
    data_channel: Arc<dyn DataChannel>,
    closed: AtomicBool,
}

impl PeerTransport {
    pub fn new(
        channel: ChannelId,
        connection: Arc<dyn PeerConnection>,
        data_channel: Arc<dyn DataChannel>,
    ) -> Self {
        Self {
            channel,
            connection,
            data_channel,
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Transport for PeerTransport {
    fn channel_id(&self) -> ChannelId {
        self.channel
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Peer
    }

    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.data_channel.is_open()
    }

    async fn send(&self, event: &ClientEvent) -> RealtimeResult<()> {
        if !self.is_open() {
            return Err(RealtimeError::ChannelUnavailable);
        }
        self.data_channel.send_text(event.to_wire()?).await
    }

    async fn restart(&self) -> RealtimeResult<()> {
        info!(channel = %self.channel, "Restarting ICE in place");
        self.connection.restart_ice().await
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.data_channel.close().await;
        self.connection.release().await;
        debug!(channel = %self.channel, "Peer transport closed");
    }
}

// =============================================================================
// Connector
// =============================================================================

/// Connector for [`PeerTransport`]; mints an ephemeral token per attempt.
pub struct PeerConnector {
    stack: Arc<dyn PeerStack>,
    tokens: EphemeralTokenClient,
    sdp: SdpExchange,
}

impl PeerConnector {
    pub fn new(stack: Arc<dyn PeerStack>, tokens: EphemeralTokenClient, sdp: SdpExchange) -> Self {
        Self { stack, tokens, sdp }
    }
}

#[async_trait]
impl TransportConnector for PeerConnector {
    fn kind(&self) -> TransportKind {
        TransportKind::Peer
    }

    async fn acquire(
        &self,
        events: TransportEventSink,
    ) -> Result<Arc<dyn TransportAttempt>, SessionError> {
        let channel = events.channel();
        let connection = self
            .stack
            .acquire_capture(events)
            .await
            .map_err(|e| SessionError::CaptureDenied(e.to_string()))?;

        Ok(Arc::new(PeerAttempt {
            channel,
            connection,
            tokens: self.tokens.clone(),
            sdp: self.sdp.clone(),
            released: AtomicBool::new(false),
        }))
    }
}

struct PeerAttempt {
    channel: ChannelId,
    connection: Arc<dyn PeerConnection>,
    tokens: EphemeralTokenClient,
    sdp: SdpExchange,
    released: AtomicBool,
}

#[async_trait]
impl TransportAttempt for PeerAttempt {
    async fn negotiate(&self, policy: &RetryPolicy) -> Result<Arc<dyn Transport>, SessionError> {
        let data_channel = self
            .connection
            .open_data_channel(DATA_CHANNEL_LABEL)
            .await?;
        self.connection.create_offer().await?;

        if tokio::time::timeout(
            policy.ice_gather_timeout(),
            self.connection.wait_ice_gathering(),
        )
        .await
        .is_err()
        {
            warn!(
                channel = %self.channel,
                timeout_ms = policy.ice_gather_timeout_ms,
                "Candidate gathering timed out, sending partial offer"
            );
        }
        let offer = self.connection.local_description().await?;

        let token = self
            .tokens
            .fetch()
            .await
            .map_err(|e| SessionError::TokenUnavailable(e.to_string()))?;

        let answer = self.sdp.exchange(&offer, &token.value).await?;
        self.connection.apply_answer(&answer).await?;
        info!(channel = %self.channel, "Applied remote answer");

        Ok(Arc::new(PeerTransport::new(
            self.channel,
            self.connection.clone(),
            data_channel,
        )))
    }

    async fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        self.connection.release().await;
    }
}
