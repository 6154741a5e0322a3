//! In-memory conversation store: useful for testing and unsaved sessions.

use std::collections::BTreeMap;

use async_trait::async_trait;
use benchmate_core::error::PersistenceError;
use benchmate_core::message::Conversation;
use benchmate_core::store::{ConversationStore, LoadReport};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryStore {
    conversations: RwLock<BTreeMap<String, Conversation>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn save(&self, conversation: &Conversation) -> Result<(), PersistenceError> {
        conversation.validate().map_err(|reason| PersistenceError::Invalid {
            name: conversation.name.clone(),
            reason,
        })?;
        self.conversations
            .write()
            .await
            .insert(conversation.name.clone(), conversation.clone());
        Ok(())
    }

    async fn load(&self, name: &str) -> Result<Conversation, PersistenceError> {
        self.conversations
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| PersistenceError::NotFound(name.to_string()))
    }

    async fn load_all(&self) -> Result<LoadReport, PersistenceError> {
        Ok(LoadReport {
            conversations: self.conversations.read().await.values().cloned().collect(),
            skipped: Vec::new(),
        })
    }

    async fn list(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(self.conversations.read().await.keys().cloned().collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, PersistenceError> {
        Ok(self.conversations.write().await.remove(name).is_some())
    }
}
