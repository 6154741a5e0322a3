//! Credential lookup: the only thing the core needs from secret storage.
//!
//! An absent secret is a recoverable condition: callers disable the
//! provider that needs it, they never fail.

use std::collections::HashMap;

pub trait CredentialLookup: Send + Sync {
    /// The secret for `provider`, or `None` when not configured.
    fn get_secret(&self, provider: &str) -> Option<String>;
}

/// Reads `BENCHMATE_<PROVIDER>_API_KEY` from the environment.
#[derive(Debug, Clone, Default)]
pub struct EnvCredentials;

impl EnvCredentials {
    /// Environment variable consulted for `provider`.
    pub fn var_name(provider: &str) -> String {
        let normalized: String = provider
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("BENCHMATE_{normalized}_API_KEY")
    }
}

impl CredentialLookup for EnvCredentials {
    fn get_secret(&self, provider: &str) -> Option<String> {
        std::env::var(Self::var_name(provider))
            .ok()
            .filter(|v| !v.trim().is_empty())
    }
}

/// A fixed set of secrets, for tests and embedding hosts that already hold
/// decrypted keys.
#[derive(Default)]
pub struct StaticCredentials {
    secrets: HashMap<String, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: impl Into<String>, secret: impl Into<String>) -> Self {
        self.secrets.insert(provider.into(), secret.into());
        self
    }
}

impl CredentialLookup for StaticCredentials {
    fn get_secret(&self, provider: &str) -> Option<String> {
        self.secrets.get(provider).cloned()
    }
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut providers: Vec<&String> = self.secrets.keys().collect();
        providers.sort();
        f.debug_struct("StaticCredentials")
            .field("providers", &providers)
            .finish()
    }
}
