//! Commands capability: search and run the workbench's menu commands.
//!
//! Command search can be slow on a large plugin collection, so the host
//! receives the dispatcher's cancellation token and is expected to stop
//! when it fires.

use std::sync::Arc;

use async_trait::async_trait;
use benchmate_core::capability::{Action, ActionOutput, Arguments, Capability, ParamType};
use benchmate_core::error::ActionError;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;

/// A menu command known to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandInfo {
    pub name: String,
    pub menu_path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Host side of command search and execution.
#[async_trait]
pub trait CommandHost: Send + Sync {
    async fn search(
        &self,
        query: &str,
        limit: usize,
        cancel: CancellationToken,
    ) -> Result<Vec<CommandInfo>, String>;

    async fn run(&self, menu_path: &str) -> Result<String, String>;
}

pub struct CommandsCapability {
    host: Arc<dyn CommandHost>,
}

impl CommandsCapability {
    pub fn new(host: Arc<dyn CommandHost>) -> Self {
        Self { host }
    }
}

impl Capability for CommandsCapability {
    fn display_name(&self) -> &str {
        "Commands"
    }

    fn usage(&self) -> &str {
        "Find and run workbench menu commands. Search first when unsure of the exact \
         menu path, then run the command with the full path from the search results."
    }

    fn actions(&self) -> Vec<Action> {
        let search_host = self.host.clone();
        let run_host = self.host.clone();

        vec![
            Action::new(
                "searchCommands",
                "Search the menu commands by name or keyword.",
                move |args: Arguments, cancel: CancellationToken| {
                    let host = search_host.clone();
                    async move {
                        let query = args.str("query")?.to_string();
                        let limit = args.opt_int("limit").unwrap_or(DEFAULT_LIMIT);
                        if !(1..=MAX_LIMIT).contains(&limit) {
                            return Err(ActionError::invalid(
                                "limit",
                                format!("must be between 1 and {MAX_LIMIT}"),
                            ));
                        }

                        let found = host
                            .search(&query, limit as usize, cancel.clone())
                            .await
                            .map_err(ActionError::Failed)?;
                        if cancel.is_cancelled() {
                            return Err(ActionError::Cancelled);
                        }
                        debug!(query = %query, hits = found.len(), "Command search finished");

                        let text = if found.is_empty() {
                            format!("No commands match '{query}'.")
                        } else {
                            found
                                .iter()
                                .map(|c| format!("{} ({})", c.name, c.menu_path))
                                .collect::<Vec<_>>()
                                .join("\n")
                        };
                        let data = serde_json::to_value(&found)
                            .map_err(|e| ActionError::failed(e.to_string()))?;
                        Ok(ActionOutput::text(text).with_data(data))
                    }
                },
            )
            .required("query", ParamType::String, "Words to look for in command names")
            .optional("limit", ParamType::Integer, "Maximum number of results (default 10)"),
            Action::new(
                "runCommand",
                "Run a menu command by its full menu path, e.g. 'Process>Filters>Median...'.",
                move |args: Arguments, _cancel: CancellationToken| {
                    let host = run_host.clone();
                    async move {
                        let menu_path = args.str("menuPath")?.trim().to_string();
                        let message = host.run(&menu_path).await.map_err(ActionError::Failed)?;
                        Ok(ActionOutput::text(message))
                    }
                },
            )
            .required("menuPath", ParamType::String, "Full menu path of the command"),
        ]
    }
}

/// A fixed list of menu commands, for hosts without a live command index.
#[derive(Debug, Clone, Default)]
pub struct MenuCommands {
    commands: Vec<CommandInfo>,
}

impl MenuCommands {
    /// Build from menu paths; the command name is the last path segment.
    pub fn from_menu_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let commands = paths
            .into_iter()
            .map(|p| {
                let menu_path = p.as_ref().trim().to_string();
                let name = menu_path
                    .rsplit('>')
                    .next()
                    .unwrap_or(&menu_path)
                    .trim_end_matches("...")
                    .trim()
                    .to_string();
                CommandInfo {
                    name,
                    menu_path,
                    description: String::new(),
                }
            })
            .collect();
        Self { commands }
    }

    pub fn commands(&self) -> &[CommandInfo] {
        &self.commands
    }
}

#[async_trait]
impl CommandHost for MenuCommands {
    async fn search(
        &self,
        query: &str,
        limit: usize,
        cancel: CancellationToken,
    ) -> Result<Vec<CommandInfo>, String> {
        let terms: Vec<String> = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();
        let mut hits = Vec::new();
        for command in &self.commands {
            if cancel.is_cancelled() {
                return Err("search cancelled".into());
            }
            let haystack = command.menu_path.to_lowercase();
            if terms.iter().all(|t| haystack.contains(t.as_str())) {
                hits.push(command.clone());
                if hits.len() >= limit {
                    break;
                }
            }
        }
        Ok(hits)
    }

    async fn run(&self, menu_path: &str) -> Result<String, String> {
        self.commands
            .iter()
            .find(|c| c.menu_path == menu_path)
            .map(|c| format!("Ran '{}'.", c.name))
            .ok_or_else(|| format!("No command at menu path '{menu_path}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Dispatcher;
    use crate::registry::ToolRegistry;
    use benchmate_core::tool::ToolCall;
    use serde_json::json;

    fn registry() -> ToolRegistry {
        let host = Arc::new(MenuCommands::from_menu_paths([
            "Process>Filters>Gaussian Blur...",
            "Process>Filters>Median...",
            "Analyze>Measure",
        ]));
        let registry = ToolRegistry::new(Dispatcher::default());
        registry
            .register(Arc::new(CommandsCapability::new(host)))
            .unwrap();
        registry
    }

    #[test]
    fn menu_command_names_come_from_last_segment() {
        let menu = MenuCommands::from_menu_paths(["Process>Filters>Gaussian Blur..."]);
        assert_eq!(menu.commands()[0].name, "Gaussian Blur");
    }

    #[tokio::test]
    async fn search_matches_all_terms() {
        let result = registry()
            .dispatch(&ToolCall::new("c1", "searchCommands", json!({"query": "filters median"})))
            .await;
        assert!(result.success, "{}", result.output);
        assert_eq!(result.output, "Median (Process>Filters>Median...)");
        assert_eq!(result.data.unwrap()[0]["menuPath"], "Process>Filters>Median...");
    }

    #[tokio::test]
    async fn search_limit_is_bounded() {
        let result = registry()
            .dispatch(&ToolCall::new("c2", "searchCommands", json!({"query": "filters", "limit": 0})))
            .await;
        assert!(!result.success);
        assert_eq!(result.data.unwrap()["error"]["argument"], "limit");

        let result = registry()
            .dispatch(&ToolCall::new("c3", "searchCommands", json!({"query": "filters", "limit": "1"})))
            .await;
        assert!(result.success);
        assert_eq!(result.output.lines().count(), 1);
    }

    #[tokio::test]
    async fn run_command_reports_unknown_path_as_error_payload() {
        let result = registry()
            .dispatch(&ToolCall::new("c4", "runCommand", json!({"menuPath": "Plugins>Nope"})))
            .await;
        assert!(!result.success);
        assert!(result.output.contains("Plugins>Nope"));
    }

    #[tokio::test]
    async fn run_command_with_empty_menu_path_is_rejected() {
        let result = registry()
            .dispatch(&ToolCall::new("c5", "runCommand", json!({"menuPath": ""})))
            .await;
        assert!(!result.success);
        let payload = result.data.unwrap();
        assert_eq!(payload["error"]["argument"], "menuPath");
    }

    #[tokio::test]
    async fn run_command_succeeds() {
        let result = registry()
            .dispatch(&ToolCall::new("c6", "runCommand", json!({"menuPath": "Analyze>Measure"})))
            .await;
        assert!(result.success);
        assert_eq!(result.output, "Ran 'Measure'.");
    }
}
