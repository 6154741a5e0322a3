//! Chat session: drives one request at a time through the transport and
//! routes tool calls back through the registry.

use std::sync::Arc;

use benchmate_config::AssistantConfig;
use benchmate_core::error::{ConversationError, TransportError};
use benchmate_core::message::Conversation;
use benchmate_core::store::ConversationStore;
use benchmate_core::tool::ToolCall;
use benchmate_core::transport::{ChatRequest, ChatResponse, ChatTransport};
use benchmate_tools::ToolRegistry;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::conversation::ConversationManager;

pub const DEFAULT_MAX_ITERATIONS: usize = 10;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error("A request is already in flight")]
    Busy,

    #[error("Request was cancelled")]
    Cancelled,

    #[error("Gave up after {0} tool-call rounds")]
    MaxIterations(usize),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Conversation(#[from] ConversationError),

    #[error("Session task failed: {0}")]
    Internal(String),
}

pub type Reply = oneshot::Receiver<Result<String, SessionError>>;

struct SessionInner {
    manager: Mutex<ConversationManager>,
    registry: Arc<ToolRegistry>,
    transport: Arc<dyn ChatTransport>,
    store: Option<Arc<dyn ConversationStore>>,
    max_iterations: usize,
    in_flight: Mutex<Option<CancellationToken>>,
}

/// A conversation bound to a transport and a tool registry.
#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<SessionInner>,
}

impl ChatSession {
    pub fn new(
        manager: ConversationManager,
        registry: Arc<ToolRegistry>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                manager: Mutex::new(manager),
                registry,
                transport,
                store: None,
                max_iterations: DEFAULT_MAX_ITERATIONS,
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// A session using the configured tool-call round limit. `store` is only
    /// attached when `history.auto_save` is on.
    pub fn from_config(
        manager: ConversationManager,
        registry: Arc<ToolRegistry>,
        transport: Arc<dyn ChatTransport>,
        store: Arc<dyn ConversationStore>,
        config: &AssistantConfig,
    ) -> Self {
        let session = Self::new(manager, registry, transport)
            .with_max_iterations(config.tools.max_iterations as usize);
        if config.history.auto_save {
            session.with_store(store)
        } else {
            debug!("Auto-save disabled, conversation will not be stored");
            session
        }
    }

    /// Save the conversation to `store` after every exchange.
    pub fn with_store(self, store: Arc<dyn ConversationStore>) -> Self {
        self.map_inner(|inner| inner.store = Some(store))
    }

    pub fn with_max_iterations(self, max: usize) -> Self {
        self.map_inner(|inner| inner.max_iterations = max.max(1))
    }

    fn map_inner(self, f: impl FnOnce(&mut SessionInner)) -> Self {
        match Arc::try_unwrap(self.inner) {
            Ok(mut inner) => {
                f(&mut inner);
                Self {
                    inner: Arc::new(inner),
                }
            }
            // Already shared: builder calls after cloning are ignored.
            Err(inner) => Self { inner },
        }
    }

    /// Start an exchange in the background. The reply resolves with the
    /// assistant's final text.
    pub fn submit(&self, text: impl Into<String>) -> Result<Reply, SessionError> {
        let token = {
            let mut slot = self.inner.in_flight.lock();
            if slot.is_some() {
                return Err(SessionError::Busy);
            }
            let token = CancellationToken::new();
            *slot = Some(token.clone());
            token
        };

        let (tx, rx) = oneshot::channel();
        let inner = self.inner.clone();
        let text = text.into();
        tokio::spawn(async move {
            let result = inner.exchange(text, &token).await;
            inner.save().await;
            inner.in_flight.lock().take();
            // The caller may have dropped the receiver.
            let _ = tx.send(result);
        });
        Ok(rx)
    }

    /// Ask the in-flight request and its tool calls to stop. Returns whether
    /// anything was running.
    pub fn cancel(&self) -> bool {
        match self.inner.in_flight.lock().as_ref() {
            Some(token) => {
                info!("Cancelling in-flight request");
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.inner.in_flight.lock().is_some()
    }

    /// A copy of the conversation so far.
    pub fn conversation(&self) -> Conversation {
        self.inner.manager.lock().conversation().clone()
    }

    /// End the conversation; later submits fail with `Closed`.
    pub fn close(&self) {
        self.cancel();
        self.inner.manager.lock().close();
    }
}

impl SessionInner {
    async fn exchange(&self, text: String, cancel: &CancellationToken) -> Result<String, SessionError> {
        self.manager.lock().append_user(text)?;

        for round in 1..=self.max_iterations {
            let request = ChatRequest {
                messages: self.manager.lock().snapshot_for_request(),
                tools: self.registry.definitions(),
            };
            debug!(round, messages = request.messages.len(), tools = request.tools.len(), "Sending chat request");

            let response = tokio::select! {
                response = self.transport.send(request) => response?,
                _ = cancel.cancelled() => return Err(SessionError::Cancelled),
            };

            let (content, mut calls) = match response {
                ChatResponse::Text { content } => (content, Vec::new()),
                ChatResponse::ToolCalls { content, calls } => (content, calls),
            };
            calls.iter_mut().for_each(ToolCall::ensure_id);
            if calls.is_empty() {
                self.manager.lock().append_assistant(content.clone())?;
                return Ok(content);
            }

            debug!(round, count = calls.len(), "Dispatching tool calls");
            self.manager
                .lock()
                .append_assistant_tool_calls(content, calls.clone())?;
            for call in &calls {
                // Cancelled calls still produce a result so the log stays well-formed.
                let result = self.registry.dispatch_with_cancel(call, cancel).await;
                self.manager.lock().append_tool_result(&call.id, result.output)?;
            }
            if cancel.is_cancelled() {
                return Err(SessionError::Cancelled);
            }
        }

        warn!(max = self.max_iterations, "Tool-call round limit reached");
        Err(SessionError::MaxIterations(self.max_iterations))
    }

    async fn save(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let conversation = self.manager.lock().conversation().clone();
        if let Err(e) = store.save(&conversation).await {
            warn!(store = store.name(), conversation = %conversation.name, error = %e, "Failed to save conversation");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use benchmate_context::ActiveContext;
    use benchmate_core::message::{Memory, MemoryType};
    use benchmate_history::InMemoryStore;
    use benchmate_tools::{InMemoryScripts, MenuCommands, default_registry};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Replays canned responses and records every request.
    struct Scripted {
        responses: Mutex<VecDeque<ChatResponse>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl Scripted {
        fn new(responses: Vec<ChatResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatTransport for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn send(&self, request: ChatRequest) -> Result<ChatResponse, TransportError> {
            self.requests.lock().push(request);
            self.responses
                .lock()
                .pop_front()
                .ok_or_else(|| TransportError::RequestFailed("no more responses".into()))
        }
    }

    /// Never answers.
    struct Silent;

    #[async_trait]
    impl ChatTransport for Silent {
        fn name(&self) -> &str {
            "silent"
        }

        async fn send(&self, _request: ChatRequest) -> Result<ChatResponse, TransportError> {
            std::future::pending().await
        }
    }

    fn session(transport: Arc<dyn ChatTransport>) -> ChatSession {
        let registry = Arc::new(
            default_registry(
                Duration::from_secs(5),
                Arc::new(MenuCommands::from_menu_paths(["Analyze>Measure"])),
                Arc::new(InMemoryScripts::new()),
            )
            .unwrap(),
        );
        let manager = ConversationManager::new("session", "persona", &registry, Arc::new(ActiveContext::new()));
        ChatSession::new(manager, registry, transport)
    }

    #[tokio::test]
    async fn text_reply_completes_exchange() {
        let transport = Scripted::new(vec![ChatResponse::text("Hello!")]);
        let session = session(transport.clone());

        let reply = session.submit("Hi").unwrap().await.unwrap().unwrap();
        assert_eq!(reply, "Hello!");
        assert!(!session.is_busy());

        let requests = transport.requests.lock();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages.last(), Some(&Memory::user("Hi")));
        assert!(requests[0].tools.iter().any(|t| t.name == "runCommand"));
    }

    #[tokio::test]
    async fn tool_calls_are_dispatched_and_recorded() {
        let transport = Scripted::new(vec![
            ChatResponse::tool_calls(vec![
                ToolCall::new("c1", "runCommand", json!({"menuPath": "Analyze>Measure"})),
                ToolCall::new("c2", "noSuchTool", json!({})),
            ]),
            ChatResponse::text("Measured."),
        ]);
        let store = Arc::new(InMemoryStore::new());
        let session = session(transport.clone()).with_store(store.clone());

        let reply = session.submit("Measure").unwrap().await.unwrap().unwrap();
        assert_eq!(reply, "Measured.");

        let conversation = session.conversation();
        let types: Vec<MemoryType> = conversation.memories().map(Memory::memory_type).collect();
        assert_eq!(
            types,
            vec![
                MemoryType::System,
                MemoryType::User,
                MemoryType::Ai,
                MemoryType::ToolResult,
                MemoryType::ToolResult,
                MemoryType::Ai,
            ]
        );
        assert_eq!(conversation.turns[3].memory.content(), "Ran 'Measure'.");
        assert!(conversation.turns[4].memory.content().contains("noSuchTool"));

        // The second request carries both tool results.
        assert_eq!(transport.requests.lock()[1].messages.len(), 5);
        assert_eq!(store.load("session").await.unwrap(), conversation);
    }

    #[tokio::test]
    async fn calls_without_ids_get_one() {
        let transport = Scripted::new(vec![
            ChatResponse::tool_calls(vec![ToolCall::new("", "listScripts", json!({}))]),
            ChatResponse::text("No scripts."),
        ]);
        let session = session(transport);
        session.submit("What is open?").unwrap().await.unwrap().unwrap();

        let conversation = session.conversation();
        match &conversation.turns[3].memory {
            Memory::ToolResult { call_id, content } => {
                assert!(call_id.starts_with("call_"));
                assert_eq!(content, "No scripts are open.");
            }
            other => panic!("expected tool result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn second_submit_while_busy_is_rejected() {
        let session = session(Arc::new(Silent));
        let reply = session.submit("one").unwrap();
        assert!(matches!(session.submit("two"), Err(SessionError::Busy)));

        assert!(session.cancel());
        assert!(matches!(reply.await.unwrap(), Err(SessionError::Cancelled)));
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn endless_tool_calls_hit_iteration_limit() {
        let calls = (0..3)
            .map(|i| {
                ChatResponse::tool_calls(vec![ToolCall::new(
                    format!("c{i}"),
                    "runCommand",
                    json!({"menuPath": "Analyze>Measure"}),
                )])
            })
            .collect();
        let session = session(Scripted::new(calls)).with_max_iterations(2);

        let result = session.submit("loop").unwrap().await.unwrap();
        assert!(matches!(result, Err(SessionError::MaxIterations(2))));
        // Every tool call got its result, so the next user turn is accepted.
        assert!(session.conversation().validate().is_ok());
    }

    fn measure_round(id: &str) -> ChatResponse {
        ChatResponse::tool_calls(vec![ToolCall::new(id, "runCommand", json!({"menuPath": "Analyze>Measure"}))])
    }

    fn configured(transport: Arc<dyn ChatTransport>, store: Arc<InMemoryStore>, config: &AssistantConfig) -> ChatSession {
        let registry = Arc::new(ToolRegistry::default());
        let manager = ConversationManager::new("configured", "persona", &registry, Arc::new(ActiveContext::new()));
        ChatSession::from_config(manager, registry, transport, store, config)
    }

    #[tokio::test]
    async fn config_sets_round_limit_and_auto_save() {
        let mut config = AssistantConfig::default();
        config.tools.max_iterations = 1;
        let store = Arc::new(InMemoryStore::new());
        let session = configured(Scripted::new(vec![measure_round("c1"), measure_round("c2")]), store.clone(), &config);

        let result = session.submit("loop").unwrap().await.unwrap();
        assert!(matches!(result, Err(SessionError::MaxIterations(1))));
        assert_eq!(store.list().await.unwrap(), vec!["configured"]);
    }

    #[tokio::test]
    async fn auto_save_off_keeps_store_empty() {
        let mut config = AssistantConfig::default();
        config.history.auto_save = false;
        let store = Arc::new(InMemoryStore::new());
        let session = configured(Scripted::new(vec![ChatResponse::text("Hi")]), store.clone(), &config);

        assert_eq!(session.submit("hello").unwrap().await.unwrap().unwrap(), "Hi");
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn transport_failure_frees_the_slot() {
        let session = session(Scripted::new(Vec::new()));
        let result = session.submit("hi").unwrap().await.unwrap();
        assert!(matches!(result, Err(SessionError::Transport(_))));
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn closed_session_rejects_submit() {
        let session = session(Scripted::new(vec![ChatResponse::text("never")]));
        session.close();
        let result = session.submit("hi").unwrap().await.unwrap();
        assert!(matches!(result, Err(SessionError::Conversation(ConversationError::Closed(_)))));
    }
}
