//! Chat completion client for the direct ROI analysis path.

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::providers::ProviderError;

/// Client for an OpenAI-style chat-completions endpoint.
#[derive(Clone)]
pub struct ChatClient {
    http_client: reqwest::Client,
    api_key: String,
    deployment: String,
    base_url: String,
}

/// Request body for the Chat Completions API
#[derive(Debug, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Response from the Chat Completions API
#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

impl ChatClient {
    /// Create a new chat completion client.
    ///
    /// `deployment` is the model/deployment identifier the endpoint expects
    /// in the request body.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        deployment: impl Into<String>,
    ) -> Self {
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
            deployment: deployment.into(),
            base_url: base_url.into(),
        }
    }

    /// Send one system + user prompt pair and return the assistant text.
    pub async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let request_body = ChatCompletionsRequest {
            model: self.deployment.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
            max_tokens,
            temperature,
        };

        let response = self
            .http_client
            .post(&url)
            .header("api-key", &self.api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                message: format!("HTTP {}: {}", status, error_text),
            });
        }

        let completion: ChatCompletionsResponse = response.json().await?;
        extract_completion_text(completion)
    }
}

/// Pull the first non-empty choice out of a completion response.
fn extract_completion_text(completion: ChatCompletionsResponse) -> Result<String, ProviderError> {
    completion
        .choices
        .into_iter()
        .filter_map(|choice| choice.message.content)
        .map(|text| text.trim().to_string())
        .find(|text| !text.is_empty())
        .ok_or(ProviderError::NoContent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_client_creation() {
        let client = ChatClient::new("https://example.openai.azure.com/v1", "test-key", "gpt-4o");
        assert_eq!(client.api_key, "test-key");
        assert_eq!(client.deployment, "gpt-4o");
    }

    #[test]
    fn extracts_first_non_empty_choice() {
        let completion: ChatCompletionsResponse = serde_json::from_str(
            r#"{"choices": [
                {"message": {"role": "assistant", "content": "  "}},
                {"message": {"role": "assistant", "content": "ROI looks strong.  "}}
            ]}"#,
        )
        .unwrap();

        let text = extract_completion_text(completion).unwrap();
        assert_eq!(text, "ROI looks strong.");
    }

    #[test]
    fn empty_choices_is_no_content() {
        let completion: ChatCompletionsResponse =
            serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            extract_completion_text(completion),
            Err(ProviderError::NoContent)
        ));
    }
}
