//! Realtime model session module.
//!
//! This module owns the live connection to an OpenAI-Realtime-compatible
//! model endpoint: the event protocol, the transports that carry it, the
//! session lifecycle and the routing of inbound events to tools.
//!
//! # Architecture
//!
//! - [`messages`]: tagged client and server event types
//! - [`transport`]: the `Transport` abstraction with a websocket and a
//!   negotiated peer implementation
//! - [`state_machine`]: the pure lifecycle transition function
//! - [`RealtimeSession`]: executes transitions, guards stale callbacks
//! - [`SessionEventRouter`]: conversation log and tool-call round trips
//!
//! # Example
//!
//! ```rust,ignore
//! use mailvoice_gateway::core::realtime::{
//!     LogOrder, RealtimeConfig, RealtimeSession, SessionEventRouter, WsConnector,
//! };
//! use mailvoice_gateway::core::tools::ToolDispatcher;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = RealtimeConfig {
//!         api_key: "sk-...".to_string(),
//!         ..Default::default()
//!     };
//!     let dispatcher = Arc::new(ToolDispatcher::for_inbox(inbox));
//!     let registry = dispatcher.registry().clone();
//!     let router = Arc::new(SessionEventRouter::new(dispatcher, LogOrder::default()));
//!     let connector = Arc::new(WsConnector::new(&config));
//!
//!     let session = RealtimeSession::new(config, registry, connector, router);
//!     session.start().await;
//! }
//! ```

mod base;
pub mod config;
pub mod messages;
pub mod router;
pub mod session;
pub mod state_machine;
pub mod token;
pub mod transport;

pub use base::{
    HealthSignal, LogCallback, LogEntry, RealtimeConfig, RealtimeError, RealtimeErrorCallback,
    RealtimeResult, RetryPolicy, SessionError, SessionStatus, StatusCallback, TerminalCallback,
    ToolCallCallback, ToolCallRecord, TranscriptRole,
};
pub use config::{
    DATA_CHANNEL_LABEL, DEFAULT_INSTRUCTIONS, DEFAULT_REALTIME_MODEL, OPENAI_API_BASE,
    OPENAI_REALTIME_URL, RealtimeVoice, TransportKind,
};
pub use messages::{ClientEvent, ServerEvent, SessionConfig, TurnDetection};
pub use router::{ConversationLog, LogOrder, RouteOutcome, SessionEventRouter};
pub use session::{RealtimeSession, SessionId};
pub use state_machine::{Effect, SessionInput, SessionMachine, transition};
pub use token::{EphemeralToken, EphemeralTokenClient};
pub use transport::{
    ChannelId, PeerConnector, PeerStack, SdpExchange, Transport, TransportConnector,
    TransportEvent, WsConnector,
};
