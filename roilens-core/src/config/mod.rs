//! Configuration management for roilens.
//!
//! This module provides a unified configuration system that separates
//! secrets (from environment variables) from settings (from TOML files).
//!
//! # Configuration Sources
//!
//! ## Secrets (Environment Variables)
//! - `AZURE_OPENAI_ENDPOINT` / `AZURE_OPENAI_API_KEY` / `AZURE_OPENAI_DEPLOYMENT_NAME`
//!   - chat completion provider (required)
//! - `DOCUMENT_ANALYSIS_ENDPOINT` / `DOCUMENT_ANALYSIS_KEY`
//!   - document analysis provider (optional)
//! - `AGENT_ENDPOINT` / `AGENT_API_KEY`
//!   - conversational agent provider (optional)
//!
//! ## Settings (TOML File)
//! Located at `~/.config/roilens/config.toml`:
//! ```toml
//! [gateway]
//! host = "127.0.0.1"
//! port = 5000
//! cors_origin = "http://localhost:5173"
//!
//! [agent]
//! model = "gpt-4o"
//! max_wait_seconds = 60
//!
//! [retry]
//! max_retries = 3
//! ```

mod secrets;
mod settings;

pub use secrets::{Secrets, SecretsError};
pub use settings::{
    AgentSettings, DocumentSettings, GatewaySettings, LoggingSettings, RetrySettings,
    SessionSettings, Settings, SettingsError,
};

/// Combined configuration containing both secrets and settings.
///
/// This is the main configuration type used throughout the application.
/// It separates sensitive secrets (from env) from non-sensitive settings (from TOML).
#[derive(Debug, Clone)]
pub struct Config {
    /// Secrets loaded from environment variables
    pub secrets: Secrets,
    /// Settings loaded from TOML configuration file
    pub settings: Settings,
}

/// Errors that can occur when loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Secrets error: {0}")]
    Secrets(#[from] SecretsError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Document model chain is empty")]
    EmptyModelChain,
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// This loads:
    /// 1. Secrets from environment variables
    /// 2. Settings from TOML file (creating defaults if needed)
    ///
    /// # Errors
    ///
    /// Returns an error if the chat provider is unconfigured, the TOML file
    /// cannot be read or parsed, or the document model chain is empty.
    pub fn load() -> Result<Self, ConfigError> {
        let secrets = Secrets::from_env()?;
        let settings = Settings::load()?;

        Self::from_parts(secrets, settings)
    }

    /// Combine already-loaded secrets and settings with cross-validation.
    pub fn from_parts(secrets: Secrets, settings: Settings) -> Result<Self, ConfigError> {
        if settings.documents.model_chain.is_empty() {
            return Err(ConfigError::EmptyModelChain);
        }

        Ok(Self { secrets, settings })
    }

    /// Socket address string for the gateway to bind to.
    pub fn bind_addr(&self) -> String {
        format!(
            "{}:{}",
            self.settings.gateway.host, self.settings.gateway.port
        )
    }
}
