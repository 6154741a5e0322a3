//! Tool invocation for the Benchmate assistant.
//!
//! Capability providers describe their actions once ([`descriptor`]), the
//! [`registry`] keeps an immutable catalog of every registered action, and
//! the [`dispatcher`] turns a model's tool call into a bounded, cancellable
//! handler invocation whose outcome is always a [`ToolResult`].
//!
//! [`ToolResult`]: benchmate_core::tool::ToolResult

pub mod capabilities;
pub mod descriptor;
pub mod dispatcher;
pub mod registry;

use std::sync::Arc;
use std::time::Duration;

use benchmate_core::capability::Capability;
use benchmate_core::error::RegistrationError;

pub use capabilities::{
    CommandHost, CommandInfo, CommandsCapability, InMemoryScripts, MenuCommands, Script,
    ScriptEditorCapability, ScriptHost,
};
pub use descriptor::{ActionSet, CapabilityHandle, RegisteredAction};
pub use dispatcher::{Dispatcher, coerce_arguments, sanitize};
pub use registry::{Catalog, ToolRegistry};

/// Create a registry with the built-in command and script editor providers.
pub fn default_registry(
    timeout: Duration,
    commands: Arc<dyn CommandHost>,
    scripts: Arc<dyn ScriptHost>,
) -> Result<ToolRegistry, RegistrationError> {
    let providers: Vec<Arc<dyn Capability>> = vec![
        Arc::new(CommandsCapability::new(commands)),
        Arc::new(ScriptEditorCapability::new(scripts)),
    ];
    ToolRegistry::from_providers(Dispatcher::new(timeout), providers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_builtin_tools() {
        let registry = default_registry(
            Duration::from_secs(5),
            Arc::new(MenuCommands::from_menu_paths(["Analyze>Measure"])),
            Arc::new(InMemoryScripts::new()),
        )
        .unwrap();
        let catalog = registry.catalog();
        let names = catalog.names();
        assert!(names.contains(&"searchCommands"));
        assert!(names.contains(&"runCommand"));
        assert!(names.contains(&"readScript"));
        assert!(names.contains(&"updateScript"));
        assert_eq!(catalog.providers().len(), 2);
        assert_eq!(registry.dispatcher().timeout(), Duration::from_secs(5));
    }
}
