//! Conversational agent client: persistent agents, threads, messages and runs.

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::providers::ProviderError;

/// Client for the conversational agent service.
///
/// The service exposes persistent agents, per-conversation threads, and
/// asynchronous runs that must be polled to completion.
#[derive(Clone)]
pub struct AgentClient {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
}

/// A persistent agent identity (instructions + model), shared across sessions.
#[derive(Debug, Clone, Deserialize)]
pub struct Agent {
    pub id: String,
}

/// A provider-side conversation thread.
#[derive(Debug, Clone, Deserialize)]
pub struct Thread {
    pub id: String,
}

/// Lifecycle status of a run.
///
/// `Timeout` is synthesized locally by the poller when the deadline elapses;
/// the provider never sends it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    Timeout,
}

impl RunStatus {
    /// Whether the run has reached a provider-side terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One run of the agent against a thread's message history.
#[derive(Debug, Clone, Deserialize)]
pub struct RunInfo {
    pub id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub last_error: Option<RunError>,
    #[serde(default)]
    pub usage: Option<RunUsage>,
}

/// Error payload attached to a failed run.
#[derive(Debug, Clone, Deserialize)]
pub struct RunError {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

/// Token usage for one run.
#[derive(Debug, Clone, Deserialize)]
pub struct RunUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One message in a thread, newest first in listings.
#[derive(Debug, Clone, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    pub role: String,
    pub content: MessageContent,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    data: Vec<ThreadMessage>,
}

/// The possible shapes of a thread message's content.
///
/// The provider is not consistent here: depending on model and API version
/// the content arrives as a list of typed blocks, a flat `{"text": ...}`
/// object, a bare string, or some other mapping. Each shape gets one explicit
/// extractor; [`MessageContent::extract_text`] tries them in declaration
/// order with a stringification fallback.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Blocks(Vec<MessageBlock>),
    Flat { text: String },
    Raw(String),
    Other(Value),
}

/// Typed content block inside a block-list message.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub text: Option<BlockText>,
}

/// Text payload of a block: either `{"value": "..."}` or a plain string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BlockText {
    Rich { value: String },
    Plain(String),
}

impl BlockText {
    fn as_str(&self) -> &str {
        match self {
            Self::Rich { value } => value,
            Self::Plain(text) => text,
        }
    }
}

impl MessageContent {
    /// Extract the best-effort text of this message.
    ///
    /// Never fails: content with no recognizable text stringifies to JSON.
    pub fn extract_text(&self) -> String {
        match self {
            Self::Blocks(blocks) => {
                let texts: Vec<&str> = blocks
                    .iter()
                    .filter(|block| block.block_type == "text")
                    .filter_map(|block| block.text.as_ref())
                    .map(BlockText::as_str)
                    .collect();
                if texts.is_empty() {
                    format!("{:?}", blocks)
                } else {
                    texts.join("\n")
                }
            }
            Self::Flat { text } => text.clone(),
            Self::Raw(text) => text.clone(),
            Self::Other(value) => match value {
                Value::String(s) => s.clone(),
                other => other
                    .get("text")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| other.to_string()),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateAgentRequest<'a> {
    name: &'a str,
    instructions: &'a str,
    model: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateMessageRequest<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateRunRequest<'a> {
    assistant_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    additional_instructions: Option<&'a str>,
}

impl AgentClient {
    /// Create a new agent service client.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http_client,
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, ProviderError> {
        let response = self
            .http_client
            .post(self.url(path))
            .header("api-key", &self.api_key)
            .json(body)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, ProviderError> {
        let response = self
            .http_client
            .get(self.url(path))
            .header("api-key", &self.api_key)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                message: format!("HTTP {}: {}", status, error_text),
            });
        }
        Ok(response.json().await?)
    }

    /// Create a persistent agent.
    pub async fn create_agent(
        &self,
        name: &str,
        instructions: &str,
        model: &str,
    ) -> Result<Agent, ProviderError> {
        self.post_json(
            "assistants",
            &CreateAgentRequest {
                name,
                instructions,
                model,
            },
        )
        .await
    }

    /// Create a new conversation thread.
    pub async fn create_thread(&self) -> Result<Thread, ProviderError> {
        self.post_json("threads", &serde_json::json!({})).await
    }

    /// Post a message with the given role to a thread.
    pub async fn create_message(
        &self,
        thread_id: &str,
        role: &str,
        content: &str,
    ) -> Result<ThreadMessage, ProviderError> {
        self.post_json(
            &format!("threads/{}/messages", thread_id),
            &CreateMessageRequest { role, content },
        )
        .await
    }

    /// Start a run of the agent against a thread.
    pub async fn create_run(
        &self,
        thread_id: &str,
        agent_id: &str,
        additional_instructions: Option<&str>,
    ) -> Result<RunInfo, ProviderError> {
        self.post_json(
            &format!("threads/{}/runs", thread_id),
            &CreateRunRequest {
                assistant_id: agent_id,
                additional_instructions,
            },
        )
        .await
    }

    /// Fetch the current status of a run.
    pub async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<RunInfo, ProviderError> {
        self.get_json(&format!("threads/{}/runs/{}", thread_id, run_id))
            .await
    }

    /// List a thread's messages, newest first.
    pub async fn list_messages(
        &self,
        thread_id: &str,
    ) -> Result<Vec<ThreadMessage>, ProviderError> {
        let list: MessageList = self
            .get_json(&format!("threads/{}/messages", thread_id))
            .await?;
        Ok(list.data)
    }
}

/// Source of run status checks, abstracted so the poller can be tested
/// without a live agent service.
#[async_trait::async_trait]
pub trait RunStatusSource: Send + Sync {
    async fn run_status(&self, thread_id: &str, run_id: &str) -> Result<RunInfo, ProviderError>;
}

#[async_trait::async_trait]
impl RunStatusSource for AgentClient {
    async fn run_status(&self, thread_id: &str, run_id: &str) -> Result<RunInfo, ProviderError> {
        self.get_run(thread_id, run_id).await
    }
}

/// Full agent-service surface the conversation flow depends on, abstracted
/// (like [`RunStatusSource`]) so flows can run against a scripted agent in
/// tests.
#[async_trait::async_trait]
pub trait AgentApi: RunStatusSource {
    async fn create_agent(
        &self,
        name: &str,
        instructions: &str,
        model: &str,
    ) -> Result<Agent, ProviderError>;

    async fn create_thread(&self) -> Result<Thread, ProviderError>;

    async fn create_message(
        &self,
        thread_id: &str,
        role: &str,
        content: &str,
    ) -> Result<ThreadMessage, ProviderError>;

    async fn create_run(
        &self,
        thread_id: &str,
        agent_id: &str,
        additional_instructions: Option<&str>,
    ) -> Result<RunInfo, ProviderError>;

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, ProviderError>;
}

#[async_trait::async_trait]
impl AgentApi for AgentClient {
    async fn create_agent(
        &self,
        name: &str,
        instructions: &str,
        model: &str,
    ) -> Result<Agent, ProviderError> {
        AgentClient::create_agent(self, name, instructions, model).await
    }

    async fn create_thread(&self) -> Result<Thread, ProviderError> {
        AgentClient::create_thread(self).await
    }

    async fn create_message(
        &self,
        thread_id: &str,
        role: &str,
        content: &str,
    ) -> Result<ThreadMessage, ProviderError> {
        AgentClient::create_message(self, thread_id, role, content).await
    }

    async fn create_run(
        &self,
        thread_id: &str,
        agent_id: &str,
        additional_instructions: Option<&str>,
    ) -> Result<RunInfo, ProviderError> {
        AgentClient::create_run(self, thread_id, agent_id, additional_instructions).await
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, ProviderError> {
        AgentClient::list_messages(self, thread_id).await
    }
}
