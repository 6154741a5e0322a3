//! Chat provider resolution.
//!
//! A provider without a secret is disabled, not an error: the assistant
//! keeps working with whatever providers remain.

use std::collections::BTreeSet;

use benchmate_config::AssistantConfig;
use benchmate_core::credentials::CredentialLookup;
use serde::Serialize;
use tracing::{debug, info};

#[derive(Clone, Serialize)]
pub struct ResolvedProvider {
    pub name: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    pub is_default: bool,
    #[serde(skip)]
    secret: Option<String>,
}

impl ResolvedProvider {
    pub fn enabled(&self) -> bool {
        self.secret.is_some()
    }

    pub fn secret(&self) -> Option<&str> {
        self.secret.as_deref()
    }
}

impl std::fmt::Debug for ResolvedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedProvider")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("api_url", &self.api_url)
            .field("is_default", &self.is_default)
            .field("enabled", &self.enabled())
            .finish()
    }
}

/// Every configured provider plus the default one, sorted by name.
pub fn resolve_providers(config: &AssistantConfig, credentials: &dyn CredentialLookup) -> Vec<ResolvedProvider> {
    let names: BTreeSet<&str> = config
        .providers
        .keys()
        .map(String::as_str)
        .chain(std::iter::once(config.default_provider.as_str()))
        .collect();

    names
        .into_iter()
        .map(|name| {
            let entry = config.providers.get(name);
            let is_default = name == config.default_provider;
            let model = entry
                .and_then(|p| p.model.clone())
                .unwrap_or_else(|| config.default_model.clone());
            let secret = credentials.get_secret(name).filter(|s| !s.trim().is_empty());
            if secret.is_none() {
                info!(provider = name, "No credentials found, provider disabled");
            } else {
                debug!(provider = name, model = %model, "Provider enabled");
            }
            ResolvedProvider {
                name: name.to_string(),
                model,
                api_url: entry.and_then(|p| p.api_url.clone()),
                is_default,
                secret,
            }
        })
        .collect()
}

/// The default provider when it is enabled, otherwise the first enabled one.
pub fn pick_provider(providers: &[ResolvedProvider]) -> Option<&ResolvedProvider> {
    providers
        .iter()
        .find(|p| p.is_default && p.enabled())
        .or_else(|| providers.iter().find(|p| p.enabled()))
}
