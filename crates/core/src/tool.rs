//! Tool call contract: what the chat transport delivers and receives.
//!
//! The transport hands the core a [`ToolCall`] (name, arguments, opaque call
//! id) and gets back a [`ToolResult`] carrying the same call id. The catalog
//! of callable tools is a list of [`ToolDefinition`] triples.

use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A request to execute a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as received from the model (object, JSON string, or null)
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Give the call an id when the model sent none, so its result can be
    /// paired with it.
    pub fn ensure_id(&mut self) {
        if self.id.trim().is_empty() {
            self.id = format!("call_{}", uuid::Uuid::new_v4().simple());
        }
    }
}

/// The result of a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content (an error payload when `success` is false)
    pub output: String,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    pub fn success(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            success: true,
            output: output.into(),
            data: None,
        }
    }

    /// Render a dispatch failure as data the model can react to.
    pub fn failure(call_id: impl Into<String>, error: &ToolError) -> Self {
        let payload = error.to_payload();
        Self {
            call_id: call_id.into(),
            success: false,
            output: payload.to_string(),
            data: Some(payload),
        }
    }
}
