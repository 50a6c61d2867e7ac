//! Realtime protocol events.
//!
//! Every event is a JSON document discriminated by its `type` field.
//!
//! Client events (sent to the model):
//! - session.update - configure instructions, voice and tools
//! - conversation.item.create - add a user message or a function call output
//! - response.create - ask the model for a new turn
//! - response.cancel, input_audio_buffer.commit, input_audio_buffer.clear
//!
//! Server events (received from the model) are parsed with [`ServerEvent::parse`].
//! Tags this crate does not model become [`ServerEvent::Unrecognized`] instead of
//! failing the parse.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::base::{RealtimeError, RealtimeResult};
use crate::core::tools::{ToolArguments, ToolDefinition};

// =============================================================================
// Session Configuration
// =============================================================================

/// Session configuration carried by `session.update`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,

    pub instructions: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<InputAudioTranscription>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_detection: Option<TurnDetection>,

    pub tools: Vec<ToolDefinition>,

    /// "auto", "none", "required" or a function name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputAudioTranscription {
    /// Transcription model (e.g., "whisper-1")
    pub model: String,
}

/// Turn detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    #[serde(rename = "server_vad")]
    ServerVad {
        #[serde(skip_serializing_if = "Option::is_none")]
        threshold: Option<f32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        prefix_padding_ms: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        silence_duration_ms: Option<u32>,
    },
    #[serde(rename = "semantic_vad")]
    SemanticVad {
        #[serde(skip_serializing_if = "Option::is_none")]
        eagerness: Option<String>,
    },
}

// =============================================================================
// Conversation Items
// =============================================================================

/// Function call arguments: the model usually sends a JSON string, but an
/// inline object is accepted as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FunctionArguments {
    Text(String),
    Json(Value),
}

impl From<FunctionArguments> for ToolArguments {
    fn from(arguments: FunctionArguments) -> Self {
        match arguments {
            FunctionArguments::Text(raw) => ToolArguments::Raw(raw),
            FunctionArguments::Json(value) => ToolArguments::Structured(value),
        }
    }
}

/// Conversation item, used both inbound (response output) and outbound.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationItem {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<String>,
    /// message, function_call, function_call_output
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub content: Option<Vec<ContentPart>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub arguments: Option<FunctionArguments>,
    /// String-encoded JSON result of a function call
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub output: Option<String>,
}

impl ConversationItem {
    pub fn function_call_output(call_id: &str, output: String) -> Self {
        Self {
            item_type: "function_call_output".to_string(),
            call_id: Some(call_id.to_string()),
            output: Some(output),
            ..Default::default()
        }
    }

    pub fn user_text(text: &str) -> Self {
        Self {
            item_type: "message".to_string(),
            role: Some("user".to_string()),
            content: Some(vec![ContentPart {
                content_type: "input_text".to_string(),
                text: Some(text.to_string()),
                transcript: None,
            }]),
            ..Default::default()
        }
    }

    pub fn is_function_call(&self) -> bool {
        self.item_type == "function_call"
    }

    /// Concatenated text or transcript of all content parts
    pub fn text(&self) -> Option<String> {
        let parts = self.content.as_ref()?;
        let text: Vec<&str> = parts
            .iter()
            .filter_map(|part| part.text.as_deref().or(part.transcript.as_deref()))
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text.join(""))
        }
    }
}

/// Content part within a conversation item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    /// input_text, input_audio, text, audio
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub transcript: Option<String>,
}

// =============================================================================
// Client Events (sent to the model)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },

    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate {
        item: ConversationItem,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        previous_item_id: Option<String>,
    },

    #[serde(rename = "response.create")]
    ResponseCreate {
        #[serde(skip_serializing_if = "Option::is_none", default)]
        response: Option<Value>,
    },

    #[serde(rename = "response.cancel")]
    ResponseCancel,

    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit,

    #[serde(rename = "input_audio_buffer.clear")]
    InputAudioBufferClear,
}

/// Outbound wire form: the event plus a client-generated `event_id`
#[derive(Serialize)]
struct OutboundEnvelope<'a> {
    event_id: String,
    #[serde(flatten)]
    event: &'a ClientEvent,
}

impl ClientEvent {
    pub fn function_call_output(call_id: &str, output: String) -> Self {
        ClientEvent::ConversationItemCreate {
            item: ConversationItem::function_call_output(call_id, output),
            previous_item_id: None,
        }
    }

    /// The "continue" signal asking the model for a new turn
    pub fn response_create() -> Self {
        ClientEvent::ResponseCreate { response: None }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            ClientEvent::SessionUpdate { .. } => "session.update",
            ClientEvent::ConversationItemCreate { .. } => "conversation.item.create",
            ClientEvent::ResponseCreate { .. } => "response.create",
            ClientEvent::ResponseCancel => "response.cancel",
            ClientEvent::InputAudioBufferCommit => "input_audio_buffer.commit",
            ClientEvent::InputAudioBufferClear => "input_audio_buffer.clear",
        }
    }

    /// Serialize for the wire, stamping a fresh `event_id`
    pub fn to_wire(&self) -> RealtimeResult<String> {
        serde_json::to_string(&OutboundEnvelope {
            event_id: uuid::Uuid::new_v4().to_string(),
            event: self,
        })
        .map_err(|e| RealtimeError::SerializationError(e.to_string()))
    }
}

// =============================================================================
// Server Events (received from the model)
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub param: Option<String>,
    #[serde(default)]
    pub event_id: Option<String>,
}

/// Response envelope carried by `response.created` and `response.done`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub output: Vec<ConversationItem>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "error")]
    Error { error: ApiError },

    #[serde(rename = "session.created")]
    SessionCreated {
        #[serde(default)]
        session: Value,
    },

    #[serde(rename = "session.updated")]
    SessionUpdated {
        #[serde(default)]
        session: Value,
    },

    #[serde(rename = "conversation.item.created")]
    ConversationItemCreated {
        #[serde(default)]
        item: Option<ConversationItem>,
    },

    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputTranscriptionCompleted {
        #[serde(default)]
        item_id: Option<String>,
        transcript: String,
    },

    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        #[serde(default)]
        item_id: Option<String>,
    },

    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped {
        #[serde(default)]
        item_id: Option<String>,
    },

    #[serde(rename = "response.created")]
    ResponseCreated {
        #[serde(default)]
        response: Response,
    },

    /// Turn complete; `response.output` may contain function calls
    #[serde(rename = "response.done")]
    ResponseDone { response: Response },

    #[serde(rename = "response.text.delta")]
    TextDelta {
        #[serde(default)]
        item_id: Option<String>,
        delta: String,
    },

    #[serde(rename = "response.text.done")]
    TextDone {
        #[serde(default)]
        item_id: Option<String>,
        text: String,
    },

    #[serde(rename = "response.audio_transcript.delta")]
    AudioTranscriptDelta {
        #[serde(default)]
        item_id: Option<String>,
        delta: String,
    },

    #[serde(rename = "response.audio_transcript.done")]
    AudioTranscriptDone {
        #[serde(default)]
        item_id: Option<String>,
        transcript: String,
    },

    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta {
        #[serde(default)]
        call_id: Option<String>,
        delta: String,
    },

    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone {
        #[serde(default)]
        call_id: Option<String>,
        #[serde(default)]
        name: Option<String>,
        arguments: String,
    },

    #[serde(rename = "rate_limits.updated")]
    RateLimitsUpdated {
        #[serde(default)]
        rate_limits: Vec<Value>,
    },

    /// Any event type not modelled above
    #[serde(skip_deserializing)]
    Unrecognized { event_type: String, payload: Value },
}

const KNOWN_SERVER_EVENT_TYPES: &[&str] = &[
    "error",
    "session.created",
    "session.updated",
    "conversation.item.created",
    "conversation.item.input_audio_transcription.completed",
    "input_audio_buffer.speech_started",
    "input_audio_buffer.speech_stopped",
    "response.created",
    "response.done",
    "response.text.delta",
    "response.text.done",
    "response.audio_transcript.delta",
    "response.audio_transcript.done",
    "response.function_call_arguments.delta",
    "response.function_call_arguments.done",
    "rate_limits.updated",
];

impl ServerEvent {
    /// Parse one inbound message.
    ///
    /// Fails for invalid JSON, a missing `type`, or a known type with a
    /// malformed body. Unknown types map to [`ServerEvent::Unrecognized`].
    pub fn parse(raw: &str) -> RealtimeResult<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| RealtimeError::SerializationError(e.to_string()))?;

        let event_type = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                RealtimeError::SerializationError("event has no 'type' field".to_string())
            })?
            .to_string();

        if !KNOWN_SERVER_EVENT_TYPES.contains(&event_type.as_str()) {
            return Ok(ServerEvent::Unrecognized {
                event_type,
                payload: value,
            });
        }

        serde_json::from_value(value).map_err(|e| {
            RealtimeError::SerializationError(format!("malformed '{event_type}' event: {e}"))
        })
    }

    pub fn event_type(&self) -> &str {
        match self {
            ServerEvent::Error { .. } => "error",
            ServerEvent::SessionCreated { .. } => "session.created",
            ServerEvent::SessionUpdated { .. } => "session.updated",
            ServerEvent::ConversationItemCreated { .. } => "conversation.item.created",
            ServerEvent::InputTranscriptionCompleted { .. } => {
                "conversation.item.input_audio_transcription.completed"
            }
            ServerEvent::SpeechStarted { .. } => "input_audio_buffer.speech_started",
            ServerEvent::SpeechStopped { .. } => "input_audio_buffer.speech_stopped",
            ServerEvent::ResponseCreated { .. } => "response.created",
            ServerEvent::ResponseDone { .. } => "response.done",
            ServerEvent::TextDelta { .. } => "response.text.delta",
            ServerEvent::TextDone { .. } => "response.text.done",
            ServerEvent::AudioTranscriptDelta { .. } => "response.audio_transcript.delta",
            ServerEvent::AudioTranscriptDone { .. } => "response.audio_transcript.done",
            ServerEvent::FunctionCallArgumentsDelta { .. } => {
                "response.function_call_arguments.delta"
            }
            ServerEvent::FunctionCallArgumentsDone { .. } => {
                "response.function_call_arguments.done"
            }
            ServerEvent::RateLimitsUpdated { .. } => "rate_limits.updated",
            ServerEvent::Unrecognized { event_type, .. } => event_type,
        }
    }
}
