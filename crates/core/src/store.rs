//! ConversationStore trait: durable storage of conversations.
//!
//! The core defines the in-memory [`Conversation`] shape; persisting it is
//! the store's job. A store must round-trip conversations exactly, and a
//! single unreadable conversation must never prevent the others from
//! loading: [`ConversationStore::load_all`] reports it as skipped instead.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::PersistenceError;
use crate::message::Conversation;

/// A conversation that could not be loaded.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedConversation {
    /// Where it came from (file name, key, ...)
    pub source: String,

    /// Why it was skipped
    pub reason: String,
}

/// Outcome of loading every stored conversation.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub conversations: Vec<Conversation>,
    pub skipped: Vec<SkippedConversation>,
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// The name of this backend (e.g., "file", "in_memory").
    fn name(&self) -> &str;

    /// Save (create or overwrite) a conversation under its name.
    async fn save(&self, conversation: &Conversation) -> Result<(), PersistenceError>;

    /// Load one conversation by name.
    async fn load(&self, name: &str) -> Result<Conversation, PersistenceError>;

    /// Load every conversation, skipping the unreadable ones.
    async fn load_all(&self) -> Result<LoadReport, PersistenceError>;

    /// Names of all stored conversations.
    async fn list(&self) -> Result<Vec<String>, PersistenceError>;

    /// Delete a conversation. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool, PersistenceError>;
}
