//! Realtime WebSocket message types
//!
//! Messages exchanged between a UI client and the gateway. The gateway owns
//! the model session; the client only starts, stops and observes it.

use serde::{Deserialize, Serialize};

use crate::core::realtime::{LogEntry, SessionStatus, ToolCallRecord};

/// Maximum allowed size for text messages (50 KB)
pub const MAX_TEXT_SIZE: usize = 50 * 1024;

// =============================================================================
// Incoming Messages (Client -> Server)
// =============================================================================

/// Incoming WebSocket messages from client
#[derive(Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum RealtimeIncomingMessage {
    /// Start (or restart) the model session
    #[serde(rename = "start")]
    Start,

    /// Stop the model session
    #[serde(rename = "stop")]
    Stop,

    /// Typed user message
    #[serde(rename = "text")]
    Text {
        /// Text content
        text: String,
    },
}

// =============================================================================
// Outgoing Messages (Server -> Client)
// =============================================================================

/// Outgoing WebSocket messages to client
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum RealtimeOutgoingMessage {
    /// Session status changed
    #[serde(rename = "status")]
    Status {
        status: SessionStatus,
        /// Indicator color for the status
        indicator: String,
    },

    /// Conversation log entry
    #[serde(rename = "log")]
    Log { entry: LogEntry },

    /// Tool call answered on behalf of the model
    #[serde(rename = "tool_call")]
    ToolCall { record: ToolCallRecord },

    /// Error message
    #[serde(rename = "error")]
    Error {
        /// Error code (optional)
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        /// Error message
        message: String,
    },

    /// The session gave up after exhausting its retries
    #[serde(rename = "terminal")]
    Terminal { message: String },
}

impl RealtimeOutgoingMessage {
    pub fn status(status: SessionStatus) -> Self {
        Self::Status {
            status,
            indicator: status.indicator().to_string(),
        }
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: Some(code.to_string()),
            message: message.into(),
        }
    }
}

// =============================================================================
// Message Routing
// =============================================================================

/// Message routing for the socket writer task
pub enum RealtimeMessageRoute {
    /// JSON text message
    Outgoing(RealtimeOutgoingMessage),
    /// Close connection
    Close,
}

// =============================================================================
// Validation
// =============================================================================

/// Error type for message validation failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum RealtimeValidationError {
    #[error("Text too large: {size} bytes (max: {max} bytes)")]
    TextTooLarge { size: usize, max: usize },
}

impl RealtimeIncomingMessage {
    /// Validates message field sizes to prevent resource exhaustion.
    pub fn validate_size(&self) -> Result<(), RealtimeValidationError> {
        if let RealtimeIncomingMessage::Text { text } = self {
            let size = text.len();
            if size > MAX_TEXT_SIZE {
                return Err(RealtimeValidationError::TextTooLarge {
                    size,
                    max: MAX_TEXT_SIZE,
                });
            }
        }
        Ok(())
    }
}
