//! Secrets configuration loaded from environment variables only.
//!
//! This module handles sensitive configuration like endpoints and API keys
//! that should never be stored in files. All secrets are read from
//! environment variables.

use std::env;

/// Secrets loaded exclusively from environment variables.
///
/// These are sensitive values that should never be written to disk
/// or committed to version control.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    /// Chat completion endpoint (env: AZURE_OPENAI_ENDPOINT)
    pub chat_endpoint: Option<String>,

    /// Chat completion API key (env: AZURE_OPENAI_API_KEY)
    pub chat_api_key: Option<String>,

    /// Chat deployment/model name (env: AZURE_OPENAI_DEPLOYMENT_NAME)
    pub chat_deployment: Option<String>,

    /// Document analysis endpoint (env: DOCUMENT_ANALYSIS_ENDPOINT)
    pub document_endpoint: Option<String>,

    /// Document analysis API key (env: DOCUMENT_ANALYSIS_KEY)
    pub document_api_key: Option<String>,

    /// Conversational agent endpoint (env: AGENT_ENDPOINT)
    pub agent_endpoint: Option<String>,

    /// Conversational agent API key (env: AGENT_API_KEY)
    pub agent_api_key: Option<String>,
}

/// Errors that can occur when loading secrets
#[derive(Debug, thiserror::Error)]
pub enum SecretsError {
    #[error(
        "Chat provider not configured. Set AZURE_OPENAI_ENDPOINT, AZURE_OPENAI_API_KEY and AZURE_OPENAI_DEPLOYMENT_NAME"
    )]
    ChatProviderNotConfigured,
}

impl Secrets {
    /// Load secrets from environment variables.
    ///
    /// This function also loads .env file if present (for development),
    /// but production should rely on actual environment variables.
    pub fn from_env() -> Result<Self, SecretsError> {
        // Load .env file if present (development convenience)
        let _ = dotenvy::dotenv();

        Self::from_env_inner()
    }

    /// Internal method to load from environment without loading .env
    pub(crate) fn from_env_inner() -> Result<Self, SecretsError> {
        let secrets = Self {
            chat_endpoint: non_empty_var("AZURE_OPENAI_ENDPOINT"),
            chat_api_key: non_empty_var("AZURE_OPENAI_API_KEY"),
            chat_deployment: non_empty_var("AZURE_OPENAI_DEPLOYMENT_NAME"),
            document_endpoint: non_empty_var("DOCUMENT_ANALYSIS_ENDPOINT"),
            document_api_key: non_empty_var("DOCUMENT_ANALYSIS_KEY"),
            agent_endpoint: non_empty_var("AGENT_ENDPOINT"),
            agent_api_key: non_empty_var("AGENT_API_KEY"),
        };

        // The direct ROI path cannot work without the chat provider
        if secrets.chat_endpoint.is_none()
            || secrets.chat_api_key.is_none()
            || secrets.chat_deployment.is_none()
        {
            return Err(SecretsError::ChatProviderNotConfigured);
        }

        Ok(secrets)
    }

    /// Whether the document analysis provider is configured
    pub fn has_document_provider(&self) -> bool {
        self.document_endpoint.is_some() && self.document_api_key.is_some()
    }

    /// Whether the conversational agent provider is configured
    pub fn has_agent_provider(&self) -> bool {
        self.agent_endpoint.is_some() && self.agent_api_key.is_some()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Use a mutex to ensure tests that modify environment variables don't run concurrently
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_env() {
        unsafe {
            env::remove_var("AZURE_OPENAI_ENDPOINT");
            env::remove_var("AZURE_OPENAI_API_KEY");
            env::remove_var("AZURE_OPENAI_DEPLOYMENT_NAME");
            env::remove_var("DOCUMENT_ANALYSIS_ENDPOINT");
            env::remove_var("DOCUMENT_ANALYSIS_KEY");
            env::remove_var("AGENT_ENDPOINT");
            env::remove_var("AGENT_API_KEY");
        }
    }

    fn set_chat_env() {
        unsafe {
            env::set_var("AZURE_OPENAI_ENDPOINT", "https://example.openai.azure.com");
            env::set_var("AZURE_OPENAI_API_KEY", "test-key");
            env::set_var("AZURE_OPENAI_DEPLOYMENT_NAME", "gpt-4o");
        }
    }

    #[test]
    fn missing_chat_provider_is_an_error() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        assert!(matches!(
            Secrets::from_env_inner(),
            Err(SecretsError::ChatProviderNotConfigured)
        ));
    }

    #[test]
    fn chat_provider_alone_is_sufficient() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        set_chat_env();

        let secrets = Secrets::from_env_inner().unwrap();
        assert_eq!(secrets.chat_deployment.as_deref(), Some("gpt-4o"));
        assert!(!secrets.has_document_provider());
        assert!(!secrets.has_agent_provider());
        clear_env();
    }

    #[test]
    fn optional_providers_are_detected() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        set_chat_env();
        unsafe {
            env::set_var("AGENT_ENDPOINT", "https://agents.example.com");
            env::set_var("AGENT_API_KEY", "agent-key");
        }

        let secrets = Secrets::from_env_inner().unwrap();
        assert!(secrets.has_agent_provider());
        assert!(!secrets.has_document_provider());
        clear_env();
    }
}
