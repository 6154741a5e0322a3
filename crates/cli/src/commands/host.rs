//! The local stand-in for a workbench: configured menu commands and an
//! in-memory script editor.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use benchmate_config::AssistantConfig;
use benchmate_tools::{InMemoryScripts, MenuCommands, ToolRegistry, default_registry};
use tracing::debug;

pub fn load_config(path: Option<&Path>) -> anyhow::Result<AssistantConfig> {
    let config = match path {
        Some(path) => AssistantConfig::load_with_env(path),
        None => AssistantConfig::load(),
    };
    let config = config.context("Failed to load config")?;
    debug!(provider = %config.default_provider, timeout_ms = config.tools.timeout_ms, "Configuration loaded");
    Ok(config)
}

pub fn local_registry(config: &AssistantConfig) -> anyhow::Result<ToolRegistry> {
    let commands = Arc::new(MenuCommands::from_menu_paths(&config.host.commands));
    let scripts = Arc::new(InMemoryScripts::new());
    default_registry(config.tool_timeout(), commands, scripts)
        .context("Built-in tools failed to register")
}
