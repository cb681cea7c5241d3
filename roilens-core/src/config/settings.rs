//! Settings configuration loaded from TOML files.
//!
//! This module handles non-sensitive configuration stored in TOML format
//! in the XDG config directory (~/.config/roilens/config.toml).

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default TOML configuration file content
const DEFAULT_CONFIG_TOML: &str = r#"# roilens configuration file
# Located at: ~/.config/roilens/config.toml
#
# This file contains non-sensitive configuration.
# Secrets (endpoints and API keys) are loaded from environment variables:
#   - AZURE_OPENAI_ENDPOINT / AZURE_OPENAI_API_KEY / AZURE_OPENAI_DEPLOYMENT_NAME
#   - DOCUMENT_ANALYSIS_ENDPOINT / DOCUMENT_ANALYSIS_KEY
#   - AGENT_ENDPOINT / AGENT_API_KEY

[gateway]
host = "127.0.0.1"
port = 5000
cors_origin = "http://localhost:5173"

[agent]
name = "roi-analysis-agent"
model = "gpt-4o"
max_wait_seconds = 60

[retry]
max_retries = 3
initial_delay_ms = 1000
backoff_factor = 2.0

[documents]
model_chain = ["prebuilt-document", "prebuilt-layout", "prebuilt-read"]

[sessions]
ttl_minutes = 60

[logging]
level = "info"
"#;

/// Settings loaded from TOML configuration file.
///
/// These are non-sensitive configuration values that can be safely
/// stored in files and version controlled (excluding secrets).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    /// Gateway server configuration
    #[serde(default)]
    pub gateway: GatewaySettings,

    /// Conversational agent configuration
    #[serde(default)]
    pub agent: AgentSettings,

    /// Retry/backoff configuration for remote calls
    #[serde(default)]
    pub retry: RetrySettings,

    /// Document analysis configuration
    #[serde(default)]
    pub documents: DocumentSettings,

    /// Conversation session store configuration
    #[serde(default)]
    pub sessions: SessionSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Gateway server settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewaySettings {
    /// Host to bind to
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Origin allowed by the CORS layer (the frontend URL)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

/// Conversational agent settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentSettings {
    /// Name of the shared persistent agent
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Model the agent runs on
    #[serde(default = "default_agent_model")]
    pub model: String,

    /// Deadline for a single run to complete, in seconds
    #[serde(default = "default_max_wait_seconds")]
    pub max_wait_seconds: u64,
}

/// Retry/backoff settings applied to remote calls
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrySettings {
    /// Retries after the initial attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Multiplier applied to the delay after each rate-limited attempt
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

/// Document analysis settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DocumentSettings {
    /// Ordered analysis-model preference chain; first success wins
    #[serde(default = "default_model_chain")]
    pub model_chain: Vec<String>,
}

/// Conversation session store settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionSettings {
    /// Idle lifetime of a conversation session, in minutes
    #[serde(default = "default_session_ttl_minutes")]
    pub ttl_minutes: u64,
}

/// Logging settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    5000
}

fn default_cors_origin() -> String {
    "http://localhost:5173".to_string()
}

fn default_agent_name() -> String {
    "roi-analysis-agent".to_string()
}

fn default_agent_model() -> String {
    "gpt-4o".to_string()
}

fn default_max_wait_seconds() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_model_chain() -> Vec<String> {
    vec![
        "prebuilt-document".to_string(),
        "prebuilt-layout".to_string(),
        "prebuilt-read".to_string(),
    ]
}

fn default_session_ttl_minutes() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            model: default_agent_model(),
            max_wait_seconds: default_max_wait_seconds(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            model_chain: default_model_chain(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl_minutes: default_session_ttl_minutes(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Errors that can occur when loading settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config directory not found")]
    ConfigDirNotFound,
}

impl Settings {
    /// Load settings from the TOML configuration file.
    ///
    /// If the config file doesn't exist, creates it with default values.
    /// The file is located at `~/.config/roilens/config.toml`.
    pub fn load() -> Result<Self, SettingsError> {
        let config_path = Self::config_path()?;

        // Create default config if it doesn't exist
        if !config_path.exists() {
            tracing::info!("Creating default configuration at {:?}", config_path);
            Self::create_default_config(&config_path)?;
        }

        let content = fs::read_to_string(&config_path)?;
        Self::from_toml(&content)
    }

    /// Parse settings from TOML content.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(content)?;
        Ok(settings)
    }

    /// Serialize settings to TOML content.
    pub fn to_toml(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Get the configuration file path.
    ///
    /// Uses XDG config directory: `~/.config/roilens/config.toml`
    pub fn config_path() -> Result<PathBuf, SettingsError> {
        if let Ok(override_dir) = std::env::var("ROILENS_CONFIG_DIR") {
            let dir = PathBuf::from(override_dir);
            return Ok(dir.join("config.toml"));
        }

        let config_dir = dirs::config_dir()
            .ok_or(SettingsError::ConfigDirNotFound)?
            .join("roilens");

        Ok(config_dir.join("config.toml"))
    }

    /// Create the default configuration file.
    fn create_default_config(path: &PathBuf) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, DEFAULT_CONFIG_TOML)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_parses() {
        let settings = Settings::from_toml(DEFAULT_CONFIG_TOML).unwrap();
        assert_eq!(settings.gateway.port, 5000);
        assert_eq!(settings.gateway.cors_origin, "http://localhost:5173");
        assert_eq!(settings.agent.max_wait_seconds, 60);
        assert_eq!(settings.retry.max_retries, 3);
        assert_eq!(
            settings.documents.model_chain,
            vec!["prebuilt-document", "prebuilt-layout", "prebuilt-read"]
        );
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings.gateway.host, "127.0.0.1");
        assert_eq!(settings.retry.initial_delay_ms, 1000);
        assert_eq!(settings.sessions.ttl_minutes, 60);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let settings = Settings::from_toml("[gateway]\nport = 8080\n").unwrap();
        assert_eq!(settings.gateway.port, 8080);
        assert_eq!(settings.gateway.host, "127.0.0.1");
        assert_eq!(settings.agent.model, "gpt-4o");
    }

    #[test]
    fn load_creates_default_config_file() {
        let dir = tempfile::tempdir().unwrap();
        unsafe {
            std::env::set_var("ROILENS_CONFIG_DIR", dir.path());
        }

        let settings = Settings::load().unwrap();
        assert_eq!(settings.gateway.port, 5000);
        assert!(dir.path().join("config.toml").exists());

        unsafe {
            std::env::remove_var("ROILENS_CONFIG_DIR");
        }
    }

    #[test]
    fn settings_roundtrip_through_toml() {
        let settings = Settings::default();
        let serialized = settings.to_toml().unwrap();
        let parsed = Settings::from_toml(&serialized).unwrap();
        assert_eq!(parsed.gateway.port, settings.gateway.port);
        assert_eq!(parsed.documents.model_chain, settings.documents.model_chain);
    }
}
