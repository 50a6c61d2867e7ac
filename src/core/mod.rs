pub mod mail;
pub mod realtime;
pub mod tools;

// Re-export commonly used types for convenience
pub use mail::{Email, Inbox, InboxMailProvider, MailError, MailProvider, SharedInbox};

pub use realtime::{
    LogOrder, RealtimeConfig, RealtimeError, RealtimeResult, RealtimeSession, SessionError,
    SessionEventRouter, SessionStatus, TransportKind,
};

pub use tools::{ToolDefinition, ToolDispatcher, ToolRegistry, ToolResult};
