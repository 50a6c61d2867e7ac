//! Realtime endpoint constants, voice selection and transport kind.

use serde::{Deserialize, Serialize};

/// Socket-style realtime endpoint
pub const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// REST base used for ephemeral tokens and the SDP offer/answer exchange
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview";

/// Data channel label used by the negotiated peer transport
pub const DATA_CHANNEL_LABEL: &str = "oai-events";

pub const DEFAULT_INSTRUCTIONS: &str = "You are a helpful assistant that interacts with Gmail. \
Use the provided tools to help the user manage their Gmail account. \
When a tool reports an error, explain the problem to the user briefly.";

// =============================================================================
// Voices
// =============================================================================

/// Available realtime voices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RealtimeVoice {
    Alloy,
    Ash,
    Ballad,
    #[default]
    Coral,
    Echo,
    Sage,
    Shimmer,
    Verse,
}

impl RealtimeVoice {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Ash => "ash",
            Self::Ballad => "ballad",
            Self::Coral => "coral",
            Self::Echo => "echo",
            Self::Sage => "sage",
            Self::Shimmer => "shimmer",
            Self::Verse => "verse",
        }
    }

    /// Parse from string, with fallback to default.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "alloy" => Self::Alloy,
            "ash" => Self::Ash,
            "ballad" => Self::Ballad,
            "coral" => Self::Coral,
            "echo" => Self::Echo,
            "sage" => Self::Sage,
            "shimmer" => Self::Shimmer,
            "verse" => Self::Verse,
            _ => Self::default(),
        }
    }
}

impl std::fmt::Display for RealtimeVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Transport kind
// =============================================================================

/// Which transport carries the session's event stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Persistent websocket to the realtime endpoint
    #[default]
    WebSocket,
    /// Offer/answer negotiated peer connection with a data channel
    Peer,
}

impl TransportKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "websocket" | "ws" | "socket" => Some(Self::WebSocket),
            "peer" | "webrtc" | "rtc" => Some(Self::Peer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WebSocket => "websocket",
            Self::Peer => "peer",
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_fallback_is_coral() {
        assert_eq!(RealtimeVoice::from_str_or_default("SAGE"), RealtimeVoice::Sage);
        assert_eq!(RealtimeVoice::from_str_or_default("robot"), RealtimeVoice::Coral);
    }

    #[test]
    fn test_transport_kind_parse() {
        assert_eq!(TransportKind::parse("WebRTC"), Some(TransportKind::Peer));
        assert_eq!(TransportKind::parse(" ws "), Some(TransportKind::WebSocket));
        assert_eq!(TransportKind::parse("carrier-pigeon"), None);
        assert_eq!(TransportKind::Peer.to_string(), "peer");
    }
}
