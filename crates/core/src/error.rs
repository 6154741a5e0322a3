//! Error types for the Benchmate domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error type:
//!
//! - [`RegistrationError`]: configuration errors, fatal at registration time
//! - [`ToolError`]: dispatch errors, always converted to a payload for the model
//! - [`ActionError`]: what a capability's action handler reports
//! - [`MergeError`]: context item contract violations
//! - [`PersistenceError`]: unreadable or corrupt saved conversations

use std::path::PathBuf;

use thiserror::Error;

/// A capability provider could not be added to the tool registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("Provider '{provider}' rejected: action name must not be empty")]
    EmptyActionName { provider: String },

    #[error("Provider '{provider}' rejected: action '{action}' is declared more than once")]
    DuplicateAction { provider: String, action: String },

    #[error(
        "Provider '{provider}' rejected: action '{action}' declares parameter '{param}' more than once"
    )]
    DuplicateParameter {
        provider: String,
        action: String,
        param: String,
    },

    #[error("Tool '{action}' from '{provider}' is already registered by '{existing}'")]
    NameConflict {
        action: String,
        provider: String,
        existing: String,
    },
}

/// Failure of a single tool call. Never crosses the dispatch boundary as an
/// error: the dispatcher renders it with [`ToolError::to_payload`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid argument '{argument}' for {tool}: {reason}")]
    InvalidArgument {
        tool: String,
        argument: String,
        reason: String,
    },

    #[error("Tool execution failed: {tool}: {reason}")]
    ExecutionFailed { tool: String, reason: String },

    #[error("Tool timed out: {tool} after {timeout_ms}ms")]
    Timeout { tool: String, timeout_ms: u64 },

    #[error("Tool cancelled: {tool}")]
    Cancelled { tool: String },
}

impl ToolError {
    /// Stable machine-readable kind, used in the error payload.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTool(_) => "unknown_tool",
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::ExecutionFailed { .. } => "execution_failed",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled { .. } => "cancelled",
        }
    }

    /// The tool the failed call was addressed to.
    pub fn tool_name(&self) -> &str {
        match self {
            Self::UnknownTool(tool)
            | Self::InvalidArgument { tool, .. }
            | Self::ExecutionFailed { tool, .. }
            | Self::Timeout { tool, .. }
            | Self::Cancelled { tool } => tool,
        }
    }

    /// Structured payload the model receives in place of a result.
    pub fn to_payload(&self) -> serde_json::Value {
        let mut error = serde_json::json!({
            "kind": self.kind(),
            "tool": self.tool_name(),
            "message": self.to_string(),
        });
        if let Self::InvalidArgument { argument, .. } = self {
            error["argument"] = serde_json::Value::String(argument.clone());
        }
        serde_json::json!({ "error": error })
    }
}

/// What an action handler reports when it cannot complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("Invalid argument '{argument}': {reason}")]
    InvalidArgument { argument: String, reason: String },

    #[error("{0}")]
    Failed(String),

    #[error("Action was cancelled")]
    Cancelled,
}

impl ActionError {
    pub fn invalid(argument: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument: argument.into(),
            reason: reason.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// `merge_with` was called on an item that cannot merge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("Merging not supported for context items of kind '{kind}'")]
    Unsupported { kind: String },
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error at {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("Corrupt conversation '{name}': {reason}")]
    Corrupt { name: String, reason: String },

    #[error("Invalid conversation '{name}': {reason}")]
    Invalid { name: String, reason: String },

    #[error("Conversation not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Chat request failed: {0}")]
    RequestFailed(String),

    #[error("Chat request timed out after {0}s")]
    Timeout(u64),

    #[error("Transport not configured: {0}")]
    NotConfigured(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversationError {
    #[error("Conversation '{0}' is closed")]
    Closed(String),

    #[error("Tool calls still awaiting results: {}", .0.join(", "))]
    PendingToolCalls(Vec<String>),

    #[error("No pending tool call with id '{0}'")]
    UnknownToolCall(String),

    #[error("Invalid conversation: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_error_displays_correctly() {
        let err = RegistrationError::NameConflict {
            action: "search".into(),
            provider: "Docs".into(),
            existing: "Commands".into(),
        };
        assert_eq!(err.to_string(), "Tool 'search' from 'Docs' is already registered by 'Commands'");
    }

    #[test]
    fn tool_error_payload_names_argument() {
        let err = ToolError::InvalidArgument {
            tool: "runCommand".into(),
            argument: "menuPath".into(),
            reason: "must not be empty".into(),
        };
        let payload = err.to_payload();
        assert_eq!(payload["error"]["kind"], "invalid_argument");
        assert_eq!(payload["error"]["argument"], "menuPath");
        assert_eq!(payload["error"]["tool"], "runCommand");
    }

    #[test]
    fn unknown_tool_payload_has_no_argument() {
        let payload = ToolError::UnknownTool("frobnicate".into()).to_payload();
        assert_eq!(payload["error"]["kind"], "unknown_tool");
        assert!(payload["error"]["message"].as_str().unwrap().contains("frobnicate"));
        assert!(payload["error"].get("argument").is_none());
    }

    #[test]
    fn pending_tool_calls_lists_ids() {
        let err = ConversationError::PendingToolCalls(vec!["call_1".into(), "call_2".into()]);
        assert_eq!(err.to_string(), "Tool calls still awaiting results: call_1, call_2");
    }
}
