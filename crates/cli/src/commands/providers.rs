//! `benchmate providers`: Show which chat providers are usable.

use std::path::Path;

use benchmate_agent::{pick_provider, resolve_providers};
use benchmate_config::ConfigCredentials;
use benchmate_core::credentials::EnvCredentials;

use super::host::load_config;

pub fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let providers = resolve_providers(&config, &ConfigCredentials::new(&config));

    println!("  {:<14} {:<20} {:<9} {}", "PROVIDER", "MODEL", "STATUS", "KEY VARIABLE");
    for provider in &providers {
        let status = if provider.enabled() { "enabled" } else { "disabled" };
        let marker = if provider.is_default { "*" } else { " " };
        println!(
            "{marker} {:<14} {:<20} {:<9} {}",
            provider.name,
            provider.model,
            status,
            EnvCredentials::var_name(&provider.name)
        );
    }

    println!();
    match pick_provider(&providers) {
        Some(p) => println!("Requests would go to '{}' ({}).", p.name, p.model),
        None => println!("No provider has credentials; the assistant is offline."),
    }
    Ok(())
}
