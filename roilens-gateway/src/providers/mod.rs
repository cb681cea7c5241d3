pub mod agent;
pub mod chat;
pub mod document;

/// Errors that can occur when calling a remote provider
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {message}")]
    ApiError { message: String },
    #[error("No content in response")]
    NoContent,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub use agent::{
    AgentApi, AgentClient, MessageContent, RunInfo, RunStatus, RunStatusSource, RunUsage,
    ThreadMessage,
};
pub use chat::ChatClient;
pub use document::{DocumentAnalysisResult, DocumentClient};
