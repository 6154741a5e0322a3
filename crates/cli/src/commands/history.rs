//! `benchmate history`: Inspect saved conversations.

use std::path::Path;

use anyhow::bail;
use benchmate_core::store::ConversationStore;
use benchmate_history::FileStore;

use super::host::load_config;

fn store(config_path: Option<&Path>) -> anyhow::Result<FileStore> {
    let config = load_config(config_path)?;
    Ok(FileStore::new(config.history_dir()))
}

pub async fn list(config_path: Option<&Path>) -> anyhow::Result<()> {
    let store = store(config_path)?;
    let report = store.load_all().await?;

    if report.conversations.is_empty() {
        println!("No saved conversations in {}", store.dir().display());
    }
    for conversation in &report.conversations {
        let updated = conversation
            .updated_at()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "  {:<32} {:>4} turns  {updated}",
            conversation.name,
            conversation.turns.len()
        );
    }
    for skipped in &report.skipped {
        eprintln!("  skipped {}: {}", skipped.source, skipped.reason);
    }
    Ok(())
}

pub async fn show(config_path: Option<&Path>, name: &str) -> anyhow::Result<()> {
    let conversation = store(config_path)?.load(name).await?;
    println!("# {}", conversation.name);
    for turn in &conversation.turns {
        let memory_type = turn.memory.memory_type();
        match &turn.display_text {
            Some(text) => println!("\n[{memory_type}] {text}"),
            None => println!("\n[{memory_type}, hidden] {}", turn.memory.content()),
        }
    }
    Ok(())
}

pub async fn delete(config_path: Option<&Path>, name: &str) -> anyhow::Result<()> {
    if !store(config_path)?.delete(name).await? {
        bail!("No conversation named '{name}'");
    }
    println!("Deleted '{name}'");
    Ok(())
}
