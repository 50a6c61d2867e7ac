use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::error::ToolError;

/// Function tool advertised to the realtime model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Always "function"
    #[serde(rename = "type")]
    pub tool_type: String,
    pub name: String,
    pub description: String,
    /// JSON Schema for the arguments object
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn function(name: &str, description: &str, parameters: Value) -> Self {
        Self {
            tool_type: "function".to_string(),
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }

    /// Names listed in the schema's `required` array
    pub fn required_params(&self) -> Vec<&str> {
        self.parameters
            .get("required")
            .and_then(Value::as_array)
            .map(|required| required.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// Immutable, ordered catalog of callable tools
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<ToolDefinition>) -> Result<Self, ToolError> {
        let mut seen = HashSet::new();
        for tool in &tools {
            if tool.name.is_empty() {
                return Err(ToolError::InvalidDefinition(
                    tool.name.clone(),
                    "name must not be empty".to_string(),
                ));
            }
            if !tool.parameters.is_object() {
                return Err(ToolError::InvalidDefinition(
                    tool.name.clone(),
                    "parameters must be a JSON schema object".to_string(),
                ));
            }
            if !seen.insert(tool.name.as_str()) {
                return Err(ToolError::DuplicateTool(tool.name.clone()));
            }
        }
        Ok(Self { tools })
    }

    /// The email assistant tool set
    pub fn email_tools() -> Self {
        Self {
            tools: email_tool_definitions(),
        }
    }

    pub fn list_tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

fn email_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::function(
            "get_emails",
            "Get a list of emails from the user's inbox",
            json!({
                "type": "object",
                "properties": {
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of emails to retrieve"
                    },
                    "filter": {
                        "type": "string",
                        "description": "Optional filter for emails (e.g., 'unread', 'important')"
                    }
                },
                "required": ["limit"]
            }),
        ),
        ToolDefinition::function(
            "read_email",
            "Read the content of a specific email",
            json!({
                "type": "object",
                "properties": {
                    "email_id": { "type": "string", "description": "ID of the email to read" }
                },
                "required": ["email_id"]
            }),
        ),
        ToolDefinition::function(
            "send_reply",
            "Send a reply to a specific email",
            json!({
                "type": "object",
                "properties": {
                    "email_id": { "type": "string", "description": "ID of the email to reply to" },
                    "message": { "type": "string", "description": "Content of the reply" }
                },
                "required": ["email_id", "message"]
            }),
        ),
        ToolDefinition::function(
            "delete_email",
            "Delete a specific email",
            json!({
                "type": "object",
                "properties": {
                    "email_id": { "type": "string", "description": "ID of the email to delete" }
                },
                "required": ["email_id"]
            }),
        ),
        ToolDefinition::function(
            "search_mails",
            "Search for emails using Gmail's search syntax",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query using Gmail's search operators (e.g., 'from:example@gmail.com', 'subject:hello', 'is:unread')"
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "Maximum number of emails to retrieve (default: 10)"
                    }
                },
                "required": ["query"]
            }),
        ),
        ToolDefinition::function(
            "read_mail",
            "Get detailed information about a specific email including its content",
            json!({
                "type": "object",
                "properties": {
                    "message_id": { "type": "string", "description": "ID of the email to read" }
                },
                "required": ["message_id"]
            }),
        ),
    ]
}
