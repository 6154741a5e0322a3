//! Configuration loading, validation, and management for Benchmate.
//!
//! Loads configuration from `~/.benchmate/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use benchmate_core::credentials::{CredentialLookup, EnvCredentials};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.benchmate/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Base persona prompt; the "Available Tools" section is appended to it
    #[serde(default = "default_persona_prompt")]
    pub persona_prompt: String,

    /// Default chat provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Tool dispatch settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Conversation history settings
    #[serde(default)]
    pub history: HistoryConfig,

    /// Local host settings (used when no workbench is attached)
    #[serde(default)]
    pub host: HostConfig,
}

fn default_persona_prompt() -> String {
    "You are an assistant embedded in a scientific image-analysis workbench. \
     Help the user analyse images, write and debug scripts, and find the right \
     commands. Prefer calling the available tools over guessing."
        .into()
}
fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Bounded wait for a single tool call, in milliseconds
    #[serde(default = "default_tool_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum tool-call rounds per user message
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_tool_timeout_ms() -> u64 {
    30_000
}
fn default_max_iterations() -> u32 {
    10
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_tool_timeout_ms(),
            max_iterations: default_max_iterations(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Directory for saved conversations (defaults to `~/.benchmate/history`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Save the conversation after every completed exchange
    #[serde(default = "default_true")]
    pub auto_save: bool,
}

fn default_true() -> bool {
    true
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            dir: None,
            auto_save: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Menu commands offered by the local host
    #[serde(default = "default_host_commands")]
    pub commands: Vec<String>,
}

fn default_host_commands() -> Vec<String> {
    [
        "File>Open...",
        "Image>Adjust>Threshold...",
        "Process>Filters>Gaussian Blur...",
        "Process>Filters>Median...",
        "Process>Binary>Watershed",
        "Analyze>Analyze Particles...",
        "Analyze>Measure",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            commands: default_host_commands(),
        }
    }
}

impl AssistantConfig {
    /// Load configuration from the default path (~/.benchmate/config.toml).
    ///
    /// Environment overrides:
    /// - `BENCHMATE_PROVIDER`
    /// - `BENCHMATE_MODEL`
    /// - `BENCHMATE_TOOL_TIMEOUT_MS`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_path())
    }

    /// Load `path` and apply the environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;

        if let Ok(provider) = std::env::var("BENCHMATE_PROVIDER") {
            config.default_provider = provider;
        }

        if let Ok(model) = std::env::var("BENCHMATE_MODEL") {
            config.default_model = model;
        }

        if let Ok(raw) = std::env::var("BENCHMATE_TOOL_TIMEOUT_MS") {
            config.tools.timeout_ms = raw.parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "BENCHMATE_TOOL_TIMEOUT_MS must be an integer, got '{raw}'"
                ))
            })?;
            config.validate()?;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| match e {
            ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::new(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".benchmate")
    }

    /// Default config file location.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Directory where conversations are stored.
    pub fn history_dir(&self) -> PathBuf {
        self.history
            .dir
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("history"))
    }

    /// Bounded wait for a single tool call.
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_millis(self.tools.timeout_ms)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.persona_prompt.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "persona_prompt must not be empty".into(),
            ));
        }

        if self.tools.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "tools.timeout_ms must be > 0".into(),
            ));
        }

        if self.tools.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "tools.max_iterations must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// A copy with every API key replaced, safe to print.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        for provider in config.providers.values_mut() {
            if provider.api_key.is_some() {
                provider.api_key = Some("[REDACTED]".into());
            }
        }
        config
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            persona_prompt: default_persona_prompt(),
            default_provider: default_provider(),
            default_model: default_model(),
            providers: HashMap::new(),
            tools: ToolsConfig::default(),
            history: HistoryConfig::default(),
            host: HostConfig::default(),
        }
    }
}

/// Credential lookup backed by the provider table, falling back to
/// [`EnvCredentials`].
pub struct ConfigCredentials {
    keys: HashMap<String, String>,
    env: EnvCredentials,
}

impl ConfigCredentials {
    pub fn new(config: &AssistantConfig) -> Self {
        let keys = config
            .providers
            .iter()
            .filter_map(|(name, p)| p.api_key.clone().map(|k| (name.clone(), k)))
            .collect();
        Self {
            keys,
            env: EnvCredentials,
        }
    }
}

impl CredentialLookup for ConfigCredentials {
    fn get_secret(&self, provider: &str) -> Option<String> {
        self.keys
            .get(provider)
            .filter(|k| !k.trim().is_empty())
            .cloned()
            .or_else(|| self.env.get_secret(provider))
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacted_hides_api_keys() {
        let mut config = AssistantConfig::default();
        config.providers.insert(
            "openai".into(),
            ProviderConfig {
                api_key: Some("sk-secret".into()),
                ..Default::default()
            },
        );
        let shown = toml::to_string_pretty(&config.redacted()).unwrap();
        assert!(!shown.contains("sk-secret"));
        assert!(shown.contains("[REDACTED]"));
        assert_eq!(config.providers["openai"].api_key.as_deref(), Some("sk-secret"));
    }

    #[test]
    fn default_config_is_valid() {
        let config = AssistantConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tools.timeout_ms, 30_000);
        assert_eq!(config.tool_timeout(), Duration::from_secs(30));
        assert!(config.history.auto_save);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AssistantConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AssistantConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.host.commands, config.host.commands);
    }

    #[test]
    fn zero_timeout_rejected() {
        let config = AssistantConfig {
            tools: ToolsConfig {
                timeout_ms: 0,
                max_iterations: 3,
            },
            ..AssistantConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn blank_persona_rejected() {
        let err = AssistantConfig::parse("persona_prompt = \"   \"").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AssistantConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_provider, "openai");
    }

    #[test]
    fn parse_error_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "tools = 12").unwrap();
        match AssistantConfig::load_from(&path) {
            Err(ConfigError::ParseError { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn provider_table_parsing() {
        let toml_str = r#"
default_provider = "anthropic"

[providers.anthropic]
api_key = "sk-ant-test"
model = "claude-sonnet-4"

[providers.ollama]
api_url = "http://localhost:11434"

[tools]
timeout_ms = 5000
"#;
        let config = AssistantConfig::parse(toml_str).unwrap();
        assert_eq!(config.default_provider, "anthropic");
        assert_eq!(config.tools.timeout_ms, 5000);
        assert_eq!(config.tools.max_iterations, 10);
        assert_eq!(config.providers.len(), 2);

        let debug = format!("{:?}", config.providers["anthropic"]);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("sk-ant-test"));

        let creds = ConfigCredentials::new(&config);
        assert_eq!(creds.get_secret("anthropic").as_deref(), Some("sk-ant-test"));
    }

    #[test]
    fn history_dir_defaults_under_config_dir() {
        let config = AssistantConfig::default();
        assert!(config.history_dir().ends_with(".benchmate/history"));

        let custom = AssistantConfig {
            history: HistoryConfig {
                dir: Some(PathBuf::from("/data/chats")),
                auto_save: false,
            },
            ..AssistantConfig::default()
        };
        assert_eq!(custom.history_dir(), PathBuf::from("/data/chats"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AssistantConfig::default_toml();
        assert!(toml_str.contains("persona_prompt"));
        assert!(toml_str.contains("timeout_ms"));
    }
}
