//! Base types for realtime model sessions.
//!
//! This module defines the error taxonomy, retry policy, session configuration,
//! lifecycle status and callback types shared by the transports, the session
//! controller and the event router.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::config::{
    DEFAULT_INSTRUCTIONS, DEFAULT_REALTIME_MODEL, OPENAI_API_BASE, OPENAI_REALTIME_URL,
    RealtimeVoice, TransportKind,
};
use super::messages::{ApiError, InputAudioTranscription, SessionConfig, TurnDetection};
use crate::core::tools::ToolRegistry;

// =============================================================================
// Error Types
// =============================================================================

/// Protocol and transport level errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RealtimeError {
    /// Connection to the endpoint failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Offer/answer exchange failed
    #[error("Negotiation failed: {0}")]
    NegotiationFailed(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Operation timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Send attempted with no open channel
    #[error("Channel unavailable")]
    ChannelUnavailable,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

/// Session level failures, driving status transitions.
///
/// Only [`SessionError::RetriesExhausted`] is reported to the user as a
/// terminal failure.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    #[error("Negotiation timed out")]
    NegotiationTimeout,

    #[error("Negotiation failed: {0}")]
    NegotiationFailed(String),

    #[error("Transport failed: {0}")]
    TransportFailed(String),

    #[error("Connection retries exhausted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("No open channel")]
    ChannelUnavailable,

    #[error("Local capture unavailable: {0}")]
    CaptureDenied(String),

    #[error("Session token unavailable: {0}")]
    TokenUnavailable(String),
}

impl From<RealtimeError> for SessionError {
    fn from(err: RealtimeError) -> Self {
        match err {
            RealtimeError::ChannelUnavailable => SessionError::ChannelUnavailable,
            RealtimeError::NegotiationFailed(reason) => SessionError::NegotiationFailed(reason),
            RealtimeError::Timeout(_) => SessionError::NegotiationTimeout,
            RealtimeError::AuthenticationFailed(reason) => SessionError::TokenUnavailable(reason),
            other => SessionError::TransportFailed(other.to_string()),
        }
    }
}

// =============================================================================
// Retry Policy
// =============================================================================

/// Bounded retry and timeout settings for one logical connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Reconnect attempts after the initial one before giving up.
    /// Default: 3
    pub max_retries: u32,

    /// Fixed delay before each retry (milliseconds).
    /// Default: 2000ms
    pub retry_delay_ms: u64,

    /// Pause between tearing down a previous session and starting anew.
    /// Default: 500ms
    pub settle_delay_ms: u64,

    /// Upper bound on local candidate gathering (milliseconds).
    /// Default: 5000ms
    pub ice_gather_timeout_ms: u64,

    /// Upper bound on waiting for the transport to report connected.
    /// Default: 10000ms
    pub connect_timeout_ms: u64,

    /// How long an in-place transport restart may take to recover.
    /// Default: 5000ms
    pub restart_timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 2000,
            settle_delay_ms: 500,
            ice_gather_timeout_ms: 5000,
            connect_timeout_ms: 10000,
            restart_timeout_ms: 5000,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Check if another retry is allowed after `attempt` retries.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn ice_gather_timeout(&self) -> Duration {
        Duration::from_millis(self.ice_gather_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn restart_timeout(&self) -> Duration {
        Duration::from_millis(self.restart_timeout_ms)
    }
}

// =============================================================================
// Configuration Types
// =============================================================================

/// Configuration for a realtime model session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// API key for authentication
    pub api_key: String,

    /// REST base for ephemeral tokens and SDP exchange
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Websocket endpoint
    #[serde(default = "default_realtime_url")]
    pub realtime_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub voice: RealtimeVoice,

    #[serde(default)]
    pub instructions: Option<String>,

    /// Temperature for response generation (0.6 to 1.2)
    #[serde(default)]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub tool_choice: Option<String>,

    #[serde(default)]
    pub modalities: Option<Vec<String>>,

    /// Transcription model for user audio (e.g., "whisper-1")
    #[serde(default)]
    pub transcription_model: Option<String>,

    #[serde(default)]
    pub turn_detection: Option<TurnDetection>,

    #[serde(default)]
    pub transport: TransportKind,

    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_api_base() -> String {
    OPENAI_API_BASE.to_string()
}

fn default_realtime_url() -> String {
    OPENAI_REALTIME_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_REALTIME_MODEL.to_string()
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: default_api_base(),
            realtime_url: default_realtime_url(),
            model: default_model(),
            voice: RealtimeVoice::default(),
            instructions: None,
            temperature: None,
            tool_choice: Some("auto".to_string()),
            modalities: None,
            transcription_model: None,
            turn_detection: None,
            transport: TransportKind::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl RealtimeConfig {
    pub fn validate(&self) -> RealtimeResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(RealtimeError::InvalidConfiguration(
                "API key is required".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(RealtimeError::InvalidConfiguration(
                "model is required".to_string(),
            ));
        }
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(RealtimeError::InvalidConfiguration(format!(
                    "temperature {temperature} is out of range"
                )));
            }
        }
        Ok(())
    }

    /// Build the `session.update` payload sent once the channel opens.
    pub fn session_config(&self, registry: &ToolRegistry) -> SessionConfig {
        SessionConfig {
            modalities: self.modalities.clone(),
            instructions: self
                .instructions
                .clone()
                .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string()),
            voice: Some(self.voice.as_str().to_string()),
            input_audio_transcription: self
                .transcription_model
                .as_ref()
                .map(|model| InputAudioTranscription {
                    model: model.clone(),
                }),
            turn_detection: self.turn_detection.clone(),
            tools: registry.list_tools().to_vec(),
            tool_choice: self.tool_choice.clone(),
            temperature: self.temperature,
        }
    }
}

// =============================================================================
// Session Status
// =============================================================================

/// Lifecycle status of a realtime session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// No session has been started
    #[default]
    Idle,
    /// Acquiring local resources
    Connecting,
    /// Offer/answer exchange and waiting for the transport
    Negotiating,
    /// Channel open, session configured
    Open,
    /// Transient disconnect, may self-heal
    Degraded,
    /// Unrecoverable transport failure, restart or retry in progress
    Failed,
    /// Releasing resources
    Closing,
    /// Torn down
    Closed,
}

impl SessionStatus {
    /// Status shown to the user: disconnected, connecting, connected, degraded or failed
    pub fn indicator(&self) -> &'static str {
        match self {
            SessionStatus::Idle | SessionStatus::Closing | SessionStatus::Closed => "disconnected",
            SessionStatus::Connecting | SessionStatus::Negotiating => "connecting",
            SessionStatus::Open => "connected",
            SessionStatus::Degraded => "degraded",
            SessionStatus::Failed => "failed",
        }
    }

    /// True for every status that holds (or is acquiring) resources
    pub fn is_active(&self) -> bool {
        !matches!(
            self,
            SessionStatus::Idle | SessionStatus::Closing | SessionStatus::Closed
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Idle => write!(f, "idle"),
            SessionStatus::Connecting => write!(f, "connecting"),
            SessionStatus::Negotiating => write!(f, "negotiating"),
            SessionStatus::Open => write!(f, "open"),
            SessionStatus::Degraded => write!(f, "degraded"),
            SessionStatus::Failed => write!(f, "failed"),
            SessionStatus::Closing => write!(f, "closing"),
            SessionStatus::Closed => write!(f, "closed"),
        }
    }
}

/// Transport self-reported connectivity, modelled on ICE connection states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthSignal {
    New,
    Checking,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl HealthSignal {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "new" => Some(Self::New),
            "checking" => Some(Self::Checking),
            "connected" | "completed" => Some(Self::Connected),
            "disconnected" => Some(Self::Disconnected),
            "failed" => Some(Self::Failed),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for HealthSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthSignal::New => write!(f, "new"),
            HealthSignal::Checking => write!(f, "checking"),
            HealthSignal::Connected => write!(f, "connected"),
            HealthSignal::Disconnected => write!(f, "disconnected"),
            HealthSignal::Failed => write!(f, "failed"),
            HealthSignal::Closed => write!(f, "closed"),
        }
    }
}

// =============================================================================
// Callback Types
// =============================================================================

/// Role of the speaker in a conversation log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptRole {
    User,
    Assistant,
}

impl fmt::Display for TranscriptRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriptRole::User => write!(f, "user"),
            TranscriptRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// One line of the conversation display log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub role: TranscriptRole,
    pub text: String,
    /// False for streaming deltas
    pub is_final: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
}

/// A processed tool call and the result sent back for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub call_id: String,
    pub name: String,
    pub success: bool,
    pub output: serde_json::Value,
}

/// Callback type for status transitions.
pub type StatusCallback =
    Arc<dyn Fn(SessionStatus) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback type for the terminal failure of a session.
pub type TerminalCallback =
    Arc<dyn Fn(SessionError) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback type for error events sent by the model.
pub type RealtimeErrorCallback =
    Arc<dyn Fn(ApiError) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback type for conversation log entries.
pub type LogCallback =
    Arc<dyn Fn(LogEntry) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Callback type for processed tool calls.
pub type ToolCallCallback =
    Arc<dyn Fn(ToolCallRecord) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_should_retry() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert!(!RetryPolicy::disabled().should_retry(0));
    }

    #[test]
    fn test_retry_policy_durations() {
        let policy = RetryPolicy {
            retry_delay_ms: 250,
            ..Default::default()
        };
        assert_eq!(policy.retry_delay(), Duration::from_millis(250));
        assert_eq!(policy.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_status_indicator_mapping() {
        assert_eq!(SessionStatus::Idle.indicator(), "disconnected");
        assert_eq!(SessionStatus::Negotiating.indicator(), "connecting");
        assert_eq!(SessionStatus::Open.indicator(), "connected");
        assert_eq!(SessionStatus::Degraded.indicator(), "degraded");
        assert_eq!(SessionStatus::Failed.indicator(), "failed");
        assert_eq!(SessionStatus::Closed.indicator(), "disconnected");
        assert!(SessionStatus::Degraded.is_active());
        assert!(!SessionStatus::Closed.is_active());
    }

    #[test]
    fn test_health_signal_parse() {
        assert_eq!(HealthSignal::parse("completed"), Some(HealthSignal::Connected));
        assert_eq!(HealthSignal::parse("Disconnected"), Some(HealthSignal::Disconnected));
        assert_eq!(HealthSignal::parse("weird"), None);
    }

    #[test]
    fn test_config_validation() {
        let mut config = RealtimeConfig::default();
        assert!(matches!(
            config.validate(),
            Err(RealtimeError::InvalidConfiguration(_))
        ));

        config.api_key = "sk-test".to_string();
        assert!(config.validate().is_ok());

        config.temperature = Some(3.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_session_config_uses_defaults_and_registry() {
        let config = RealtimeConfig {
            api_key: "sk-test".to_string(),
            transcription_model: Some("whisper-1".to_string()),
            ..Default::default()
        };
        let session = config.session_config(&ToolRegistry::email_tools());

        assert_eq!(session.instructions, DEFAULT_INSTRUCTIONS);
        assert_eq!(session.voice.as_deref(), Some("coral"));
        assert_eq!(session.tools.len(), 6);
        assert_eq!(session.tool_choice.as_deref(), Some("auto"));
        assert_eq!(
            session.input_audio_transcription.unwrap().model,
            "whisper-1"
        );
    }

    #[test]
    fn test_realtime_error_maps_to_session_error() {
        assert_eq!(
            SessionError::from(RealtimeError::ChannelUnavailable),
            SessionError::ChannelUnavailable
        );
        assert_eq!(
            SessionError::from(RealtimeError::Timeout("ice".to_string())),
            SessionError::NegotiationTimeout
        );
        assert!(matches!(
            SessionError::from(RealtimeError::WebSocketError("reset".to_string())),
            SessionError::TransportFailed(_)
        ));
    }
}
