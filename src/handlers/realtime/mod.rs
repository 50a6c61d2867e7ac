//! Realtime session control WebSocket
//!
//! ## Client → Server
//!
//! - **start**: Start (or restart) the model session
//! - **stop**: Stop the model session
//! - **text**: Send a typed message to the conversation
//!
//! ## Server → Client
//!
//! - **status**: Session status and its indicator
//! - **log**: Conversation log entry
//! - **tool_call**: Tool call answered for the model
//! - **error**: Error reported by the model or the gateway
//! - **terminal**: The session gave up after exhausting its retries

mod handler;
pub mod messages;

pub use handler::realtime_handler;
