//! # Benchmate Core
//!
//! Domain types, traits, and error definitions for the Benchmate workbench
//! assistant. This crate has **no host dependencies**: it defines the model
//! that the tool, context, history and agent crates implement against.
//!
//! ## Design Philosophy
//!
//! Every seam to the host application is a trait here:
//! - [`Capability`]: a host-side provider of callable actions
//! - [`ChatTransport`]: the LLM client that sends a conversation snapshot
//! - [`ConversationStore`]: durable storage of conversations
//! - [`CredentialLookup`]: secret lookup for LLM providers
//!
//! Implementations live in their respective crates (or in the host).

pub mod capability;
pub mod credentials;
pub mod error;
pub mod event;
pub mod message;
pub mod store;
pub mod tool;
pub mod transport;

// Re-export key types at crate root for ergonomics
pub use capability::{
    Action, ActionDescriptor, ActionHandler, ActionOutput, ArgValue, Arguments, Capability,
    ParamSpec, ParamType,
};
pub use credentials::{CredentialLookup, EnvCredentials, StaticCredentials};
pub use error::{
    ActionError, ConversationError, MergeError, PersistenceError, RegistrationError, ToolError,
    TransportError,
};
pub use event::{DomainEvent, EventBus};
pub use message::{Conversation, Memory, MemoryType, Turn};
pub use store::{ConversationStore, LoadReport, SkippedConversation};
pub use tool::{ToolCall, ToolDefinition, ToolResult};
pub use transport::{ChatRequest, ChatResponse, ChatTransport};
