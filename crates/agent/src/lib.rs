//! Conversation driving for the Benchmate assistant.
//!
//! 1. [`ConversationManager`] keeps the turn log and assembles each request
//!    (system prompt, history, active context)
//! 2. [`ChatSession`] sends it through a [`ChatTransport`], dispatches any
//!    tool calls through the registry and loops until the model answers
//! 3. [`resolve_providers`] decides which chat providers have credentials
//!
//! [`ChatTransport`]: benchmate_core::transport::ChatTransport

pub mod conversation;
pub mod prompt;
pub mod providers;
pub mod session;

pub use conversation::ConversationManager;
pub use prompt::compose_system_prompt;
pub use providers::{ResolvedProvider, pick_provider, resolve_providers};
pub use session::{ChatSession, Reply, SessionError};
