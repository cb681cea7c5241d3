//! Document analysis client with an ordered model-preference fallback.

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::debug;

use crate::providers::ProviderError;

/// Client for a document-analysis endpoint (layout/key-value extraction).
#[derive(Clone)]
pub struct DocumentClient {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
}

/// Envelope the analysis endpoint wraps its result in
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeEnvelope {
    analyze_result: DocumentAnalysisResult,
}

/// Raw analysis result for one document, as returned by the provider.
///
/// Every field is optional in practice; simpler models (plain OCR) only
/// populate `pages`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentAnalysisResult {
    pub model_id: Option<String>,
    pub doc_type: Option<String>,
    pub key_value_pairs: Vec<KeyValuePair>,
    pub tables: Vec<AnalyzedTable>,
    pub entities: Vec<AnalyzedEntity>,
    pub pages: Vec<AnalyzedPage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeyValuePair {
    pub key: Option<TextSpan>,
    pub value: Option<TextSpan>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextSpan {
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzedTable {
    pub row_count: usize,
    pub column_count: usize,
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableCell {
    pub row_index: usize,
    pub column_index: usize,
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalyzedEntity {
    pub category: String,
    pub content: String,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalyzedPage {
    pub content: Option<String>,
    pub lines: Vec<PageLine>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageLine {
    pub content: String,
}

impl DocumentClient {
    /// Create a new document analysis client.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );

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

    /// Analyze a document with one specific model.
    pub async fn analyze(
        &self,
        model_id: &str,
        document: &[u8],
    ) -> Result<DocumentAnalysisResult, ProviderError> {
        let url = format!(
            "{}/documentModels/{}:analyze",
            self.base_url.trim_end_matches('/'),
            model_id
        );

        let response = self
            .http_client
            .post(&url)
            .header("api-key", &self.api_key)
            .body(document.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                message: format!("HTTP {}: {}", status, error_text),
            });
        }

        let envelope: AnalyzeEnvelope = response.json().await?;
        Ok(envelope.analyze_result)
    }

    /// Try each model in `model_chain` in order; first success wins.
    ///
    /// This is an explicit result-returning fallback: a per-model failure is
    /// logged and the next model is attempted. When every model fails, the
    /// last error is returned.
    pub async fn analyze_with_fallback(
        &self,
        model_chain: &[String],
        document: &[u8],
    ) -> Result<DocumentAnalysisResult, ProviderError> {
        let mut last_error = ProviderError::NoContent;

        for model_id in model_chain {
            match self.analyze(model_id, document).await {
                Ok(result) => {
                    debug!("Document analyzed with model '{}'", model_id);
                    return Ok(result);
                }
                Err(e) => {
                    debug!("Model '{}' failed, trying next in chain: {}", model_id, e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}
