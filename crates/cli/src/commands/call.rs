//! `benchmate call`: Dispatch one tool call against the local host.

use std::path::Path;

use anyhow::{Context as _, bail};
use benchmate_core::tool::ToolCall;
use serde_json::Value;

use super::host::{load_config, local_registry};

pub async fn run(config_path: Option<&Path>, tool: &str, args: &str, json: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let registry = local_registry(&config)?;
    let arguments: Value = serde_json::from_str(args).context("--args must be valid JSON")?;

    let call = ToolCall::new("cli", tool, arguments);
    let result = registry.dispatch(&call).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.output);
    }
    if !result.success {
        bail!("tool call '{tool}' failed");
    }
    Ok(())
}
