//! Capability descriptor builder.
//!
//! Turns a provider's action table into immutable [`ActionDescriptor`]s
//! paired with their handlers. A [`CapabilityHandle`] memoizes the result
//! for the life of the provider instance, so rebuilding a registry never
//! re-enumerates a provider or duplicates its entries.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use benchmate_core::capability::{ActionDescriptor, ActionHandler, Capability};
use benchmate_core::error::RegistrationError;
use tracing::debug;

/// One callable action: descriptor + bound handler.
#[derive(Clone)]
pub struct RegisteredAction {
    pub descriptor: ActionDescriptor,
    pub handler: ActionHandler,
}

impl std::fmt::Debug for RegisteredAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredAction")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Every action of one provider, in table order.
#[derive(Debug)]
pub struct ActionSet {
    provider: String,
    usage: String,
    actions: Vec<RegisteredAction>,
}

impl ActionSet {
    /// Enumerate a provider's actions.
    ///
    /// Fails when an action name is empty, when two actions share a name, or
    /// when one action declares the same parameter twice.
    pub fn build(capability: &dyn Capability) -> Result<Self, RegistrationError> {
        let provider = capability.display_name().to_string();
        let mut seen = HashSet::new();
        let mut actions = Vec::new();

        for action in capability.actions() {
            let name = action.name.trim();
            if name.is_empty() {
                return Err(RegistrationError::EmptyActionName { provider });
            }
            if !seen.insert(name.to_string()) {
                return Err(RegistrationError::DuplicateAction {
                    provider,
                    action: name.to_string(),
                });
            }

            let mut params = HashSet::new();
            for param in &action.params {
                if !params.insert(param.name.as_str()) {
                    return Err(RegistrationError::DuplicateParameter {
                        provider,
                        action: name.to_string(),
                        param: param.name.clone(),
                    });
                }
            }

            let mut descriptor = action.describe(&provider);
            descriptor.name = name.to_string();
            actions.push(RegisteredAction {
                descriptor,
                handler: action.handler.clone(),
            });
        }

        debug!(provider = %provider, actions = actions.len(), "Built action set");
        Ok(Self {
            provider,
            usage: capability.usage().to_string(),
            actions,
        })
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn usage(&self) -> &str {
        &self.usage
    }

    pub fn actions(&self) -> &[RegisteredAction] {
        &self.actions
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ActionDescriptor> {
        self.actions.iter().map(|a| &a.descriptor)
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredAction> {
        self.actions.iter().find(|a| a.descriptor.name == name)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// A provider plus its lazily built, cached action set.
pub struct CapabilityHandle {
    capability: Arc<dyn Capability>,
    built: OnceLock<Result<Arc<ActionSet>, RegistrationError>>,
}

impl CapabilityHandle {
    pub fn new(capability: Arc<dyn Capability>) -> Self {
        Self {
            capability,
            built: OnceLock::new(),
        }
    }

    pub fn capability(&self) -> &Arc<dyn Capability> {
        &self.capability
    }

    /// The provider's action set, built on first use.
    pub fn action_set(&self) -> Result<Arc<ActionSet>, RegistrationError> {
        self.built
            .get_or_init(|| ActionSet::build(self.capability.as_ref()).map(Arc::new))
            .clone()
    }
}

impl std::fmt::Debug for CapabilityHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityHandle")
            .field("provider", &self.capability.display_name())
            .field("built", &self.built.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchmate_core::capability::{Action, ActionOutput, ParamType};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        names: Vec<&'static str>,
        enumerations: AtomicUsize,
    }

    impl Counting {
        fn new(names: Vec<&'static str>) -> Self {
            Self {
                names,
                enumerations: AtomicUsize::new(0),
            }
        }
    }

    impl Capability for Counting {
        fn display_name(&self) -> &str {
            "Counting"
        }

        fn usage(&self) -> &str {
            "Counts things."
        }

        fn actions(&self) -> Vec<Action> {
            self.enumerations.fetch_add(1, Ordering::SeqCst);
            self.names
                .iter()
                .map(|name| {
                    Action::new(*name, "test action", |_args, _cancel| async {
                        Ok(ActionOutput::text("ok"))
                    })
                })
                .collect()
        }
    }

    #[test]
    fn builds_one_descriptor_per_action() {
        let set = ActionSet::build(&Counting::new(vec!["count", "reset"])).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.provider(), "Counting");
        assert_eq!(set.usage(), "Counts things.");
        let names: Vec<&str> = set.descriptors().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["count", "reset"]);
        assert_eq!(set.get("reset").unwrap().descriptor.provider, "Counting");
    }

    #[test]
    fn duplicate_action_rejects_provider() {
        let err = ActionSet::build(&Counting::new(vec!["count", "count"])).unwrap_err();
        assert_eq!(
            err,
            RegistrationError::DuplicateAction {
                provider: "Counting".into(),
                action: "count".into(),
            }
        );
    }

    #[test]
    fn empty_action_name_rejects_provider() {
        let err = ActionSet::build(&Counting::new(vec!["  "])).unwrap_err();
        assert!(matches!(err, RegistrationError::EmptyActionName { .. }));
    }

    #[test]
    fn duplicate_parameter_rejects_provider() {
        struct Twice;
        impl Capability for Twice {
            fn display_name(&self) -> &str {
                "Twice"
            }
            fn usage(&self) -> &str {
                ""
            }
            fn actions(&self) -> Vec<Action> {
                vec![Action::new("open", "", |_a, _c| async { Ok(ActionOutput::default()) })
                    .required("path", ParamType::String, "")
                    .optional("path", ParamType::String, "")]
            }
        }
        let err = ActionSet::build(&Twice).unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateParameter { ref param, .. } if param == "path"));
    }

    #[test]
    fn handle_memoizes_action_set() {
        let capability = Arc::new(Counting::new(vec!["count"]));
        let handle = CapabilityHandle::new(capability.clone());

        let first = handle.action_set().unwrap();
        let second = handle.action_set().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(capability.enumerations.load(Ordering::SeqCst), 1);
        assert_eq!(second.len(), 1);
    }
}
