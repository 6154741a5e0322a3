//! `benchmate catalog`: List the registered tools.

use std::path::Path;

use super::host::{load_config, local_registry};

pub fn run(config_path: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let registry = local_registry(&config)?;
    let catalog = registry.catalog();

    if json {
        println!("{}", serde_json::to_string_pretty(&catalog.definitions())?);
        return Ok(());
    }

    println!("{} tools from {} providers", catalog.len(), catalog.providers().len());
    for set in catalog.providers() {
        println!();
        println!("  {}", set.provider());
        for descriptor in set.descriptors() {
            println!("    {:<40} {}", descriptor.signature(), descriptor.description);
        }
    }
    Ok(())
}
