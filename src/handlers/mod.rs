//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `gmail` - Mail function calls and credential verification
//! - `inbox` - Inbox UI actions
//! - `session` - Ephemeral realtime session tokens
//! - `realtime` - Session control WebSocket

pub mod api;
pub mod gmail;
pub mod inbox;
pub mod realtime;
pub mod session;

pub use realtime::realtime_handler;
