use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

/// Registry construction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Duplicate tool registration: {0}")]
    DuplicateTool(String),

    #[error("Invalid tool definition for {0}: {1}")]
    InvalidDefinition(String, String), // Tool name, reason
}

/// Kind of a failed tool call, reported back to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolErrorKind {
    UnknownTool,
    MalformedArguments,
    NotFound,
    ProviderError,
}

impl std::fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolErrorKind::UnknownTool => write!(f, "UnknownTool"),
            ToolErrorKind::MalformedArguments => write!(f, "MalformedArguments"),
            ToolErrorKind::NotFound => write!(f, "NotFound"),
            ToolErrorKind::ProviderError => write!(f, "ProviderError"),
        }
    }
}

/// Outcome of one dispatched tool call: a success payload or an error, never both
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    Success(Value),
    Error { kind: ToolErrorKind, message: String },
}

impl ToolResult {
    pub fn error(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        ToolResult::Error {
            kind,
            message: message.into(),
        }
    }

    pub fn unknown_tool(name: &str) -> Self {
        Self::error(
            ToolErrorKind::UnknownTool,
            format!("Function '{name}' is not supported"),
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolResult::Success(_))
    }

    pub fn error_kind(&self) -> Option<ToolErrorKind> {
        match self {
            ToolResult::Success(_) => None,
            ToolResult::Error { kind, .. } => Some(*kind),
        }
    }

    /// JSON payload as returned over HTTP and embedded in `function_call_output`
    pub fn to_json(&self) -> Value {
        match self {
            ToolResult::Success(value) => value.clone(),
            ToolResult::Error { kind, message } => json!({
                "error": message,
                "kind": kind,
            }),
        }
    }

    /// String-encoded payload for the `output` field of a tool result event
    pub fn to_output_string(&self) -> String {
        self.to_json().to_string()
    }
}
