//! Conversation history backends.
//!
//! - [`FileStore`]: one JSON document per conversation in a directory
//! - [`InMemoryStore`]: for tests and sessions that are not saved

pub mod file_store;
pub mod in_memory;

pub use file_store::FileStore;
pub use in_memory::InMemoryStore;

use std::path::PathBuf;
use std::sync::Arc;

use benchmate_core::store::ConversationStore;

/// The file store at `dir`, or an in-memory store when there is no directory.
pub fn create_store(dir: Option<PathBuf>) -> Arc<dyn ConversationStore> {
    match dir {
        Some(dir) => Arc::new(FileStore::new(dir)),
        None => Arc::new(InMemoryStore::new()),
    }
}
