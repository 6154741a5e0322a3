//! `benchmate config`: Configuration management commands.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, bail};
use benchmate_config::AssistantConfig;

use super::host::load_config;

pub fn show(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    println!("{}", toml::to_string_pretty(&config.redacted())?);
    Ok(())
}

pub fn path(config_path: Option<&Path>) {
    println!("{}", resolve(config_path).display());
}

pub fn init(config_path: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let path = resolve(config_path);
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&path, AssistantConfig::default_toml())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn resolve(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(AssistantConfig::config_path)
}
