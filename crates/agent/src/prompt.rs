//! System prompt composition.

use benchmate_tools::registry::Catalog;

/// Persona text followed by the catalog's "Available Tools" section.
pub fn compose_system_prompt(persona: &str, catalog: &Catalog) -> String {
    let persona = persona.trim();
    if catalog.is_empty() {
        return persona.to_string();
    }
    format!("{persona}\n\n{}", catalog.usage_section().trim_end())
}
