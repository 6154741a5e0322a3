//! ChatTransport trait: the abstraction over the LLM client.
//!
//! The core only needs "submit request, receive response or error". The
//! response is tagged: either plain text or a request to call tools.
//! Streaming, retries and provider-specific request shaping belong to the
//! transport implementation, not the core.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::message::Memory;
use crate::tool::{ToolCall, ToolDefinition};

/// A conversation snapshot ready to be sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// System turn first, then history, with active context injected
    pub messages: Vec<Memory>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

/// What the model answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatResponse {
    /// A plain text answer; the exchange is complete.
    Text { content: String },

    /// The model wants tools executed before it continues.
    ToolCalls {
        #[serde(default)]
        content: String,
        calls: Vec<ToolCall>,
    },
}

impl ChatResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self::ToolCalls {
            content: String::new(),
            calls,
        }
    }
}

/// The LLM client seam.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// A human-readable name for this transport (e.g., "openai", "ollama").
    fn name(&self) -> &str;

    /// Send a snapshot and wait for the model's answer.
    async fn send(&self, request: ChatRequest) -> std::result::Result<ChatResponse, TransportError>;
}
