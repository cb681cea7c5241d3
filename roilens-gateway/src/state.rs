//! Shared application state.
//!
//! All provider clients and the conversation manager live here, owned by a
//! single `Arc<AppState>` handed to the router. Optional providers stay
//! `None` when their secrets are absent and the matching endpoints report
//! that at request time.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use roilens_core::{Config, SecretsError};

use crate::conversation::ConversationManager;
use crate::providers::{AgentClient, ChatClient, DocumentClient};
use crate::retry::RetryPolicy;

pub struct AppState {
    pub config: Config,
    pub chat: ChatClient,
    pub document: Option<DocumentClient>,
    pub conversation: Option<ConversationManager>,
    pub retry: RetryPolicy,
}

impl AppState {
    /// Build the state from loaded configuration, constructing one client
    /// per configured provider. The chat provider is mandatory.
    pub fn new(config: Config) -> Result<Self, SecretsError> {
        let retry = RetryPolicy::from(&config.settings.retry);

        let chat = match (
            config.secrets.chat_endpoint.as_deref(),
            config.secrets.chat_api_key.as_deref(),
            config.secrets.chat_deployment.as_deref(),
        ) {
            (Some(endpoint), Some(key), Some(deployment)) => {
                ChatClient::new(endpoint, key, deployment)
            }
            _ => return Err(SecretsError::ChatProviderNotConfigured),
        };

        let document = match (
            config.secrets.document_endpoint.as_deref(),
            config.secrets.document_api_key.as_deref(),
        ) {
            (Some(endpoint), Some(key)) => Some(DocumentClient::new(endpoint, key)),
            _ => {
                info!("Document analysis not configured, /analyze_documents disabled");
                None
            }
        };

        let conversation = match (
            config.secrets.agent_endpoint.as_deref(),
            config.secrets.agent_api_key.as_deref(),
        ) {
            (Some(endpoint), Some(key)) => Some(ConversationManager::new(
                Arc::new(AgentClient::new(endpoint, key)),
                config.settings.agent.clone(),
                retry.clone(),
                Duration::from_secs(config.settings.sessions.ttl_minutes * 60),
            )),
            _ => {
                info!("Agent service not configured, /ask disabled");
                None
            }
        };

        Ok(Self {
            config,
            chat,
            document,
            conversation,
            retry,
        })
    }
}
