//! Conversation and Turn domain types.
//!
//! A [`Conversation`] is an append-only sequence of [`Turn`]s. Each turn
//! carries a UI-facing display text and a model-facing [`Memory`]. The
//! serialized shape is the persistence contract:
//!
//! ```json
//! {
//!   "name": "...",
//!   "systemMessage": "...",
//!   "turns": [ { "displayText": "...", "memory": { "type": "USER", "content": "..." } } ]
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::tool::ToolCall;

/// What the model sees for one turn.
///
/// Serialized with an internal `type` tag; an unknown tag is a hard
/// deserialization error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Memory {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Ai {
        content: String,
        #[serde(default, rename = "toolCalls", skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    ToolResult {
        #[serde(rename = "callId")]
        call_id: String,
        content: String,
    },
}

impl Memory {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self::Ai {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::ToolResult {
            call_id: call_id.into(),
            content: content.into(),
        }
    }

    pub fn memory_type(&self) -> MemoryType {
        match self {
            Self::System { .. } => MemoryType::System,
            Self::User { .. } => MemoryType::User,
            Self::Ai { .. } => MemoryType::Ai,
            Self::ToolResult { .. } => MemoryType::ToolResult,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::System { content }
            | Self::User { content }
            | Self::Ai { content, .. }
            | Self::ToolResult { content, .. } => content,
        }
    }
}

/// The kind of a [`Memory`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemoryType {
    System,
    User,
    Ai,
    ToolResult,
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::System => "SYSTEM",
            Self::User => "USER",
            Self::Ai => "AI",
            Self::ToolResult => "TOOL_RESULT",
        };
        f.write_str(name)
    }
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    /// Text shown in the UI; `None` hides the turn from display
    pub display_text: Option<String>,

    /// Model-facing representation
    pub memory: Memory,

    /// When the turn was appended
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(display_text: Option<String>, memory: Memory) -> Self {
        Self {
            display_text,
            memory,
            timestamp: Utc::now(),
        }
    }

    /// A turn displayed exactly as the model sees it.
    pub fn visible(memory: Memory) -> Self {
        let display = memory.content().to_string();
        Self::new(Some(display), memory)
    }

    /// A turn present in model memory only.
    pub fn hidden(memory: Memory) -> Self {
        Self::new(None, memory)
    }
}

/// A named conversation: a system message plus an ordered turn log.
///
/// The first turn is always the single system turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub name: String,
    pub system_message: String,
    pub turns: Vec<Turn>,
}

impl Conversation {
    /// Create a conversation whose only turn is the system turn.
    pub fn new(name: impl Into<String>, system_message: impl Into<String>) -> Self {
        let system_message = system_message.into();
        Self {
            name: name.into(),
            turns: vec![Turn::hidden(Memory::system(system_message.clone()))],
            system_message,
        }
    }

    /// Append a turn. System turns are only valid at position zero.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Model-facing memories in chronological order.
    pub fn memories(&self) -> impl Iterator<Item = &Memory> {
        self.turns.iter().map(|t| &t.memory)
    }

    /// Timestamp of the most recent turn.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.turns.last().map(|t| t.timestamp)
    }

    /// Check the single-leading-system-turn invariant.
    pub fn validate(&self) -> Result<(), String> {
        match self.turns.first().map(|t| t.memory.memory_type()) {
            Some(MemoryType::System) => {}
            Some(other) => return Err(format!("first turn is {other}, expected SYSTEM")),
            None => return Err("conversation has no turns".into()),
        }
        if let Some(pos) = self
            .turns
            .iter()
            .skip(1)
            .position(|t| t.memory.memory_type() == MemoryType::System)
        {
            return Err(format!("unexpected SYSTEM turn at position {}", pos + 1));
        }
        Ok(())
    }
}
