//! Tool registry: the single catalog of every provider's actions.
//!
//! The catalog is copy-on-write: [`ToolRegistry::catalog`] hands out an
//! immutable `Arc<Catalog>` snapshot, and every mutation builds a complete
//! new catalog before installing it. A rejected registration therefore
//! leaves no partial state behind, and readers (UI, an in-flight dispatch)
//! never observe a half-updated table.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use benchmate_core::capability::{ActionDescriptor, Capability};
use benchmate_core::error::RegistrationError;
use benchmate_core::event::{DomainEvent, EventBus};
use benchmate_core::tool::{ToolCall, ToolDefinition, ToolResult};
use chrono::Utc;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::descriptor::{ActionSet, CapabilityHandle, RegisteredAction};
use crate::dispatcher::Dispatcher;

/// An immutable snapshot of the registered tools.
#[derive(Debug, Default)]
pub struct Catalog {
    sets: Vec<Arc<ActionSet>>,
    index: HashMap<String, (usize, usize)>,
}

impl Catalog {
    /// Combine action sets, failing on the first cross-provider name clash.
    fn from_sets(sets: Vec<Arc<ActionSet>>) -> Result<Self, RegistrationError> {
        let mut index = HashMap::new();
        for (set_idx, set) in sets.iter().enumerate() {
            for (action_idx, action) in set.actions().iter().enumerate() {
                let name = &action.descriptor.name;
                if let Some(&(existing, _)) = index.get(name) {
                    let existing: &Arc<ActionSet> = &sets[existing];
                    return Err(RegistrationError::NameConflict {
                        action: name.clone(),
                        provider: set.provider().to_string(),
                        existing: existing.provider().to_string(),
                    });
                }
                index.insert(name.clone(), (set_idx, action_idx));
            }
        }
        Ok(Self { sets, index })
    }

    pub fn lookup(&self, name: &str) -> Option<&RegisteredAction> {
        self.index
            .get(name)
            .map(|&(set, action)| &self.sets[set].actions()[action])
    }

    /// Provider action sets in registration order.
    pub fn providers(&self) -> &[Arc<ActionSet>] {
        &self.sets
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ActionDescriptor> {
        self.sets.iter().flat_map(|s| s.descriptors())
    }

    /// The tool catalog contract handed to the chat transport.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.descriptors().map(|d| d.to_definition()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.index.keys().map(|s| s.as_str()).collect()
    }

    /// "Available Tools" prompt section, grouped by provider display name.
    pub fn usage_section(&self) -> String {
        if self.sets.is_empty() {
            return String::new();
        }

        let mut section = String::from("## Available Tools\n");
        for set in &self.sets {
            section.push_str(&format!("\n### {}\n", set.provider()));
            if !set.usage().trim().is_empty() {
                section.push_str(set.usage().trim());
                section.push('\n');
            }
            for descriptor in set.descriptors() {
                section.push_str(&format!("- `{}`: {}\n", descriptor.signature(), descriptor.description));
            }
        }
        section
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

struct RegistryState {
    handles: Vec<Arc<CapabilityHandle>>,
    catalog: Arc<Catalog>,
}

/// Aggregates every provider's actions and dispatches calls against them.
pub struct ToolRegistry {
    state: RwLock<RegistryState>,
    dispatcher: Dispatcher,
    events: Option<Arc<EventBus>>,
}

impl ToolRegistry {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            state: RwLock::new(RegistryState {
                handles: Vec::new(),
                catalog: Arc::new(Catalog::default()),
            }),
            dispatcher,
            events: None,
        }
    }

    /// Build a registry from a provider set; fails if any provider is
    /// rejected or any two providers share an action name.
    pub fn from_providers(
        dispatcher: Dispatcher,
        providers: Vec<Arc<dyn Capability>>,
    ) -> Result<Self, RegistrationError> {
        let registry = Self::new(dispatcher);
        registry.register_all(providers)?;
        Ok(registry)
    }

    /// Publish registration and execution events on `bus`.
    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Add one provider's actions.
    pub fn register(&self, provider: Arc<dyn Capability>) -> Result<(), RegistrationError> {
        self.register_all(vec![provider])
    }

    /// Add several providers atomically: either all are installed or none.
    pub fn register_all(&self, providers: Vec<Arc<dyn Capability>>) -> Result<(), RegistrationError> {
        let mut state = self.state.write();
        let mut handles = state.handles.clone();
        handles.extend(providers.into_iter().map(|p| Arc::new(CapabilityHandle::new(p))));

        let catalog = self.build_catalog(&handles)?;
        let added = &handles[state.handles.len()..];
        for handle in added {
            let actions = handle.action_set().map(|s| s.len()).unwrap_or_default();
            info!(provider = %handle.capability().display_name(), actions, "Registered tool provider");
            self.publish(DomainEvent::ToolsRegistered {
                provider: handle.capability().display_name().to_string(),
                actions,
                timestamp: Utc::now(),
            });
        }

        state.catalog = Arc::new(catalog);
        state.handles = handles;
        Ok(())
    }

    /// Recompute the catalog from the registered providers. Action sets are
    /// memoized per provider, so this never duplicates entries.
    pub fn rebuild(&self) -> Result<(), RegistrationError> {
        let mut state = self.state.write();
        let catalog = self.build_catalog(&state.handles)?;
        state.catalog = Arc::new(catalog);
        Ok(())
    }

    /// Replace the whole provider set atomically.
    pub fn reset(&self, providers: Vec<Arc<dyn Capability>>) -> Result<(), RegistrationError> {
        let mut state = self.state.write();
        let handles: Vec<Arc<CapabilityHandle>> = providers
            .into_iter()
            .map(|p| Arc::new(CapabilityHandle::new(p)))
            .collect();
        let catalog = self.build_catalog(&handles)?;

        state.catalog = Arc::new(catalog);
        state.handles = handles;
        Ok(())
    }

    fn build_catalog(&self, handles: &[Arc<CapabilityHandle>]) -> Result<Catalog, RegistrationError> {
        let sets = handles
            .iter()
            .map(|h| h.action_set())
            .collect::<Result<Vec<_>, _>>()
            .and_then(Catalog::from_sets);
        if let Err(e) = &sets {
            error!(error = %e, "Tool registration rejected");
            self.publish(DomainEvent::ErrorOccurred {
                context: "tool_registration".into(),
                error_message: e.to_string(),
                timestamp: Utc::now(),
            });
        }
        sets
    }

    /// Current immutable catalog snapshot.
    pub fn catalog(&self) -> Arc<Catalog> {
        self.state.read().catalog.clone()
    }

    /// Tool catalog contract triples for the current snapshot.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.catalog().definitions()
    }

    /// Execute a tool call. Always returns a result.
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        self.dispatch_with_cancel(call, &CancellationToken::new()).await
    }

    /// Execute a tool call, aborting early if `cancel` fires.
    pub async fn dispatch_with_cancel(&self, call: &ToolCall, cancel: &CancellationToken) -> ToolResult {
        let catalog = self.catalog();
        let start = Instant::now();
        let result = self
            .dispatcher
            .dispatch(catalog.lookup(&call.name), call, cancel)
            .await;

        self.publish(DomainEvent::ToolExecuted {
            tool_name: call.name.clone(),
            success: result.success,
            duration_ms: start.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        });
        result
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new(Dispatcher::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchmate_core::capability::{Action, ActionOutput, Arguments, ParamType};
    use serde_json::json;

    /// A provider exposing a fixed list of echo actions.
    struct Echoes {
        name: &'static str,
        actions: Vec<&'static str>,
    }

    impl Capability for Echoes {
        fn display_name(&self) -> &str {
            self.name
        }

        fn usage(&self) -> &str {
            "Echoes its input."
        }

        fn actions(&self) -> Vec<Action> {
            self.actions
                .iter()
                .map(|name| {
                    Action::new(*name, "Echo the text back", |args: Arguments, _cancel| async move {
                        Ok(ActionOutput::text(args.str("text")?.to_string()))
                    })
                    .required("text", ParamType::String, "Text to echo")
                })
                .collect()
        }
    }

    fn provider(name: &'static str, actions: Vec<&'static str>) -> Arc<dyn Capability> {
        Arc::new(Echoes { name, actions })
    }

    #[test]
    fn registry_register_and_lookup() {
        let registry = ToolRegistry::default();
        registry.register(provider("Echo", vec!["echo"])).unwrap();
        let catalog = registry.catalog();
        assert!(catalog.lookup("echo").is_some());
        assert!(catalog.lookup("nonexistent").is_none());
        assert_eq!(registry.definitions().len(), 1);
    }

    #[test]
    fn duplicate_names_fail_before_any_catalog() {
        let result = ToolRegistry::from_providers(
            Dispatcher::default(),
            vec![provider("Commands", vec!["search"]), provider("Docs", vec!["search"])],
        );
        let err = result.err().expect("registration must fail");
        assert!(matches!(err, RegistrationError::NameConflict { ref action, .. } if action == "search"));

        let registry = ToolRegistry::default();
        assert!(registry
            .register_all(vec![provider("Commands", vec!["search"]), provider("Docs", vec!["search"])])
            .is_err());
        assert!(registry.catalog().is_empty());
    }

    #[test]
    fn rejected_registration_keeps_previous_catalog() {
        let registry = ToolRegistry::default();
        registry.register(provider("Commands", vec!["search", "run"])).unwrap();
        let before = registry.catalog();

        assert!(registry.register(provider("Docs", vec!["lookup", "search"])).is_err());
        let after = registry.catalog();
        assert!(Arc::ptr_eq(&before, &after));
        assert!(after.lookup("lookup").is_none());
        assert_eq!(after.len(), 2);
    }

    #[test]
    fn registration_order_only_affects_display() {
        let a = ToolRegistry::from_providers(
            Dispatcher::default(),
            vec![provider("A", vec!["alpha"]), provider("B", vec!["beta"])],
        )
        .unwrap();
        let b = ToolRegistry::from_providers(
            Dispatcher::default(),
            vec![provider("B", vec!["beta"]), provider("A", vec!["alpha"])],
        )
        .unwrap();

        let mut names_a = a.catalog().names().into_iter().map(String::from).collect::<Vec<_>>();
        let mut names_b = b.catalog().names().into_iter().map(String::from).collect::<Vec<_>>();
        names_a.sort();
        names_b.sort();
        assert_eq!(names_a, names_b);
        assert_eq!(a.catalog().lookup("beta").unwrap().descriptor.provider, "B");
        assert_eq!(b.catalog().lookup("beta").unwrap().descriptor.provider, "B");
    }

    #[test]
    fn rebuild_is_idempotent() {
        let registry = ToolRegistry::default();
        registry.register(provider("Echo", vec!["echo", "shout"])).unwrap();
        registry.rebuild().unwrap();
        registry.rebuild().unwrap();
        assert_eq!(registry.catalog().len(), 2);
        assert_eq!(registry.definitions().len(), 2);
    }

    #[test]
    fn reset_replaces_provider_set() {
        let registry = ToolRegistry::default();
        registry.register(provider("Echo", vec!["echo"])).unwrap();
        registry.reset(vec![provider("Other", vec!["other"])]).unwrap();
        let catalog = registry.catalog();
        assert!(catalog.lookup("echo").is_none());
        assert!(catalog.lookup("other").is_some());
    }

    /// Signals when its action table is requested, then takes a while.
    struct SlowToDescribe {
        started: parking_lot::Mutex<Option<std::sync::mpsc::Sender<()>>>,
    }

    impl Capability for SlowToDescribe {
        fn display_name(&self) -> &str {
            "Slow"
        }

        fn usage(&self) -> &str {
            "Takes a while to describe."
        }

        fn actions(&self) -> Vec<Action> {
            if let Some(started) = self.started.lock().take() {
                let _ = started.send(());
            }
            std::thread::sleep(std::time::Duration::from_millis(100));
            vec![Action::new("slow", "", |_a, _c| async { Ok(ActionOutput::default()) })]
        }
    }

    #[test]
    fn register_during_reset_is_kept() {
        let registry = ToolRegistry::default();
        registry.register(provider("Echo", vec!["echo"])).unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        let slow: Arc<dyn Capability> = Arc::new(SlowToDescribe {
            started: parking_lot::Mutex::new(Some(tx)),
        });

        std::thread::scope(|scope| {
            let resetting = scope.spawn(|| registry.reset(vec![slow]));
            rx.recv().unwrap();
            registry.register(provider("Late", vec!["late"])).unwrap();
            resetting.join().unwrap().unwrap();
        });

        let catalog = registry.catalog();
        assert!(catalog.lookup("echo").is_none());
        assert!(catalog.lookup("slow").is_some());
        assert!(catalog.lookup("late").is_some());
    }

    #[test]
    fn usage_section_groups_by_provider() {
        let registry = ToolRegistry::default();
        registry
            .register_all(vec![provider("Echo", vec!["echo"]), provider("Loud", vec!["shout"])])
            .unwrap();
        let section = registry.catalog().usage_section();
        assert!(section.starts_with("## Available Tools"));
        assert!(section.contains("### Echo\nEchoes its input."));
        assert!(section.contains("- `shout(text: string)`: Echo the text back"));
        assert!(section.find("### Echo").unwrap() < section.find("### Loud").unwrap());
    }

    #[tokio::test]
    async fn registry_dispatches_and_publishes() {
        let bus = Arc::new(EventBus::new(16));
        let mut rx = bus.subscribe();
        let registry = ToolRegistry::default().with_events(bus);
        registry.register(provider("Echo", vec!["echo"])).unwrap();

        let result = registry
            .dispatch(&ToolCall::new("call_1", "echo", json!({"text": "hello world"})))
            .await;
        assert!(result.success);
        assert_eq!(result.output, "hello world");

        let registered = rx.recv().await.unwrap();
        assert!(matches!(registered.as_ref(), DomainEvent::ToolsRegistered { actions: 1, .. }));
        let executed = rx.recv().await.unwrap();
        assert!(matches!(executed.as_ref(), DomainEvent::ToolExecuted { success: true, .. }));
    }

    #[tokio::test]
    async fn dispatch_of_unregistered_name_is_data() {
        let registry = ToolRegistry::default();
        let result = registry
            .dispatch(&ToolCall::new("call_1", "nonexistent", json!({})))
            .await;
        assert!(!result.success);
        assert!(result.output.contains("nonexistent"));
    }
}
