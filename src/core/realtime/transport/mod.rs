//! Transports carrying the realtime event stream.
//!
//! A [`TransportConnector`] produces one [`TransportAttempt`] per connect
//! attempt: the attempt owns local resources (capture) from the moment it is
//! acquired and yields a live [`Transport`] once negotiation succeeds. Every
//! lifecycle event a transport produces is pushed into the session's event
//! queue tagged with the [`ChannelId`] it was created with, so events from a
//! superseded transport can be recognised and dropped.

pub mod peer;
pub mod websocket;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

use super::base::{HealthSignal, RealtimeResult, RetryPolicy, SessionError};
use super::config::TransportKind;
use super::messages::ClientEvent;

pub use peer::{
    DataChannel, PeerConnection, PeerConnector, PeerStack, PeerTransport, SdpExchange,
};
pub use websocket::{WebSocketTransport, WsConnector};

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one transport instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u64);

impl ChannelId {
    /// Allocate a fresh, process-unique id.
    pub fn next() -> Self {
        Self(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch-{}", self.0)
    }
}

/// Lifecycle notification from a transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The event channel is ready for sends
    Open,
    /// One inbound text message
    Message(String),
    /// Connectivity change
    Health(HealthSignal),
    /// The remote end closed the channel
    Closed { reason: Option<String> },
}

/// A [`TransportEvent`] tagged with the channel that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportEnvelope {
    pub channel: ChannelId,
    pub event: TransportEvent,
}

/// Sending half handed to a transport for its lifecycle events.
#[derive(Debug, Clone)]
pub struct TransportEventSink {
    channel: ChannelId,
    tx: mpsc::UnboundedSender<TransportEnvelope>,
}

impl TransportEventSink {
    pub fn new(channel: ChannelId, tx: mpsc::UnboundedSender<TransportEnvelope>) -> Self {
        Self { channel, tx }
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Push an event; returns false once the session side has gone away.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx
            .send(TransportEnvelope {
                channel: self.channel,
                event,
            })
            .is_ok()
    }
}

/// A live bidirectional event channel to the model.
#[async_trait]
pub trait Transport: Send + Sync {
    fn channel_id(&self) -> ChannelId;

    fn kind(&self) -> TransportKind;

    fn is_open(&self) -> bool;

    /// Serialize and send one client event.
    ///
    /// Returns [`RealtimeError::ChannelUnavailable`](super::base::RealtimeError::ChannelUnavailable)
    /// when the channel is not open.
    async fn send(&self, event: &ClientEvent) -> RealtimeResult<()>;

    /// Attempt in-place recovery after a `Failed` health signal.
    async fn restart(&self) -> RealtimeResult<()>;

    /// Close the channel and release everything it holds. Idempotent.
    async fn close(&self);
}

/// Local resources held for a single connect attempt.
#[async_trait]
pub trait TransportAttempt: Send + Sync {
    /// Run the offer/answer (or handshake) and return the live transport.
    async fn negotiate(&self, policy: &RetryPolicy) -> Result<Arc<dyn Transport>, SessionError>;

    /// Release capture and any half-built connection. Idempotent.
    async fn release(&self);
}

/// Builds connect attempts for one transport kind.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Acquire local resources for a new attempt.
    ///
    /// Lifecycle events of the resulting transport go to `events`.
    async fn acquire(
        &self,
        events: TransportEventSink,
    ) -> Result<Arc<dyn TransportAttempt>, SessionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_ids_are_unique_and_ordered() {
        let a = ChannelId::next();
        let b = ChannelId::next();
        assert_ne!(a, b);
        assert!(b > a);
        assert!(a.to_string().starts_with("ch-"));
    }

    #[tokio::test]
    async fn test_sink_tags_events_with_channel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let channel = ChannelId::next();
        let sink = TransportEventSink::new(channel, tx);

        assert!(sink.emit(TransportEvent::Health(HealthSignal::Connected)));
        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.channel, channel);
        assert_eq!(envelope.event, TransportEvent::Health(HealthSignal::Connected));

        drop(rx);
        assert!(!sink.emit(TransportEvent::Open));
    }
}
