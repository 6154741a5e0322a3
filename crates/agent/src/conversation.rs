//! Conversation manager: the turn log plus request assembly.
//!
//! The system prompt is fixed when the manager is built. Every append adds
//! exactly one turn, and tool results must arrive before the next user turn.

use std::sync::Arc;

use benchmate_context::ActiveContext;
use benchmate_core::error::ConversationError;
use benchmate_core::event::{DomainEvent, EventBus};
use benchmate_core::message::{Conversation, Memory, MemoryType, Turn};
use benchmate_core::tool::ToolCall;
use benchmate_tools::ToolRegistry;
use chrono::Utc;
use tracing::debug;

use crate::prompt::compose_system_prompt;

pub struct ConversationManager {
    conversation: Conversation,
    context: Arc<ActiveContext>,
    /// Tool call ids of the latest assistant turn still awaiting a result.
    pending: Vec<String>,
    closed: bool,
    events: Option<Arc<EventBus>>,
}

impl ConversationManager {
    /// Start a conversation whose system prompt is `base_prompt` plus the
    /// registry's current tool section.
    pub fn new(
        name: impl Into<String>,
        base_prompt: &str,
        registry: &ToolRegistry,
        context: Arc<ActiveContext>,
    ) -> Self {
        let system_prompt = compose_system_prompt(base_prompt, &registry.catalog());
        Self {
            conversation: Conversation::new(name, system_prompt),
            context,
            pending: Vec::new(),
            closed: false,
            events: None,
        }
    }

    /// Resume a stored conversation. Tool calls without results are still
    /// pending afterwards.
    pub fn from_conversation(
        conversation: Conversation,
        context: Arc<ActiveContext>,
    ) -> Result<Self, ConversationError> {
        conversation.validate().map_err(ConversationError::Invalid)?;

        let mut pending: Vec<String> = Vec::new();
        for memory in conversation.memories() {
            match memory {
                Memory::Ai { tool_calls, .. } => {
                    pending = tool_calls.iter().map(|c| c.id.clone()).collect();
                }
                Memory::ToolResult { call_id, .. } => pending.retain(|id| id != call_id),
                Memory::System { .. } | Memory::User { .. } => {}
            }
        }

        Ok(Self {
            conversation,
            context,
            pending,
            closed: false,
            events: None,
        })
    }

    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn name(&self) -> &str {
        &self.conversation.name
    }

    pub fn system_prompt(&self) -> &str {
        &self.conversation.system_message
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn context(&self) -> &Arc<ActiveContext> {
        &self.context
    }

    pub fn pending_tool_calls(&self) -> &[String] {
        &self.pending
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn append_user(&mut self, text: impl Into<String>) -> Result<(), ConversationError> {
        self.ensure_open()?;
        if !self.pending.is_empty() {
            return Err(ConversationError::PendingToolCalls(self.pending.clone()));
        }
        self.push(Turn::visible(Memory::user(text)));
        Ok(())
    }

    pub fn append_assistant(&mut self, text: impl Into<String>) -> Result<(), ConversationError> {
        self.ensure_open()?;
        self.push(Turn::visible(Memory::ai(text)));
        Ok(())
    }

    /// An assistant turn requesting tool calls. The turn is displayed as its
    /// text, or as the list of tools when the text is empty. Fails while the
    /// previous calls still lack results.
    pub fn append_assistant_tool_calls(
        &mut self,
        text: impl Into<String>,
        calls: Vec<ToolCall>,
    ) -> Result<(), ConversationError> {
        self.ensure_open()?;
        if !self.pending.is_empty() {
            return Err(ConversationError::PendingToolCalls(self.pending.clone()));
        }
        let text = text.into();
        let display = if text.trim().is_empty() {
            let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
            format!("Using tools: {}", names.join(", "))
        } else {
            text.clone()
        };
        self.pending = calls.iter().map(|c| c.id.clone()).collect();
        self.push(Turn::new(
            Some(display),
            Memory::Ai {
                content: text,
                tool_calls: calls,
            },
        ));
        Ok(())
    }

    pub fn append_tool_result(
        &mut self,
        call_id: &str,
        text: impl Into<String>,
    ) -> Result<(), ConversationError> {
        self.tool_result(call_id, text.into(), true)
    }

    /// A tool result the model sees but the UI does not show.
    pub fn append_hidden_tool_result(
        &mut self,
        call_id: &str,
        text: impl Into<String>,
    ) -> Result<(), ConversationError> {
        self.tool_result(call_id, text.into(), false)
    }

    /// What to send for the next request: the system turn and history in
    /// order, with the active context placed right before the latest user
    /// turn. Does not modify the conversation.
    pub fn snapshot_for_request(&self) -> Vec<Memory> {
        let mut memories: Vec<Memory> = self.conversation.memories().cloned().collect();
        if let Some(block) = self.context.render() {
            let at = memories
                .iter()
                .rposition(|m| m.memory_type() == MemoryType::User)
                .unwrap_or(memories.len());
            memories.insert(at, Memory::user(block));
        }
        memories
    }

    /// No further turns may be appended.
    pub fn close(&mut self) {
        if !self.closed {
            debug!(conversation = %self.conversation.name, "Conversation closed");
            self.closed = true;
        }
    }

    fn tool_result(&mut self, call_id: &str, text: String, visible: bool) -> Result<(), ConversationError> {
        self.ensure_open()?;
        let Some(index) = self.pending.iter().position(|id| id == call_id) else {
            return Err(ConversationError::UnknownToolCall(call_id.to_string()));
        };
        self.pending.remove(index);

        let memory = Memory::tool_result(call_id, text);
        let turn = if visible {
            Turn::visible(memory)
        } else {
            Turn::hidden(memory)
        };
        self.push(turn);
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), ConversationError> {
        if self.closed {
            return Err(ConversationError::Closed(self.conversation.name.clone()));
        }
        Ok(())
    }

    fn push(&mut self, turn: Turn) {
        let memory_type = turn.memory.memory_type();
        debug!(conversation = %self.conversation.name, %memory_type, "Turn appended");
        self.conversation.push(turn);
        if let Some(bus) = &self.events {
            bus.publish(DomainEvent::TurnAppended {
                conversation: self.conversation.name.clone(),
                memory_type: memory_type.to_string(),
                timestamp: Utc::now(),
            });
        }
    }
}
