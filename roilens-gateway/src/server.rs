//! HTTP surface for the ROI analysis backend.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};

use roilens_core::types::{DocumentOutcome, RoiRequest};

use crate::conversation::AskParams;
use crate::normalizer;
use crate::prompt::{self, MAX_TOKENS, SYSTEM_PROMPT, TEMPERATURE};
use crate::state::AppState;
use crate::upload;

/// Successful ROI analysis response
#[derive(Debug, Serialize)]
pub struct RoiResponse {
    pub response: String,
}

/// One uploaded document, base64-encoded.
#[derive(Debug, Deserialize)]
pub struct DocumentUpload {
    pub filename: String,
    /// Base64-encoded file bytes
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeDocumentsRequest {
    pub files: Vec<DocumentUpload>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeDocumentsResponse {
    pub results: Vec<DocumentOutcome>,
}

/// Conversational question request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub context_version: Option<String>,
    #[serde(default)]
    pub is_new_session: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AskResponse {
    pub answer: String,
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Run the HTTP server
pub async fn run(state: Arc<AppState>, bind_addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Create the router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.settings.gateway.cors_origin);

    Router::new()
        .route("/health", get(health_handler))
        .route("/calculate_roi", post(calculate_roi_handler))
        .route("/analyze_documents", post(analyze_documents_handler))
        .route("/ask", post(ask_handler))
        .with_state(state)
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    match origin.parse::<HeaderValue>() {
        Ok(value) => layer.allow_origin(value),
        Err(_) => {
            warn!("Invalid CORS origin '{}', cross-origin calls disabled", origin);
            layer
        }
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// ROI analysis handler - POST /calculate_roi
async fn calculate_roi_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RoiRequest>,
) -> Response {
    if let Err(e) = request.validate() {
        return error_response(StatusCode::BAD_REQUEST, e.to_string());
    }

    let prompt = prompt::build_analysis_prompt(&request);
    debug!("Built analysis prompt ({} chars)", prompt.len());

    match state
        .retry
        .execute(|| state.chat.complete(SYSTEM_PROMPT, &prompt, MAX_TOKENS, TEMPERATURE))
        .await
    {
        Ok(analysis) => Json(RoiResponse { response: analysis }).into_response(),
        Err(e) => {
            error!("ROI analysis failed: {}", e);
            error_response(
                StatusCode::BAD_GATEWAY,
                format!("Failed to generate ROI analysis: {}", e),
            )
        }
    }
}

/// Document extraction handler - POST /analyze_documents
async fn analyze_documents_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeDocumentsRequest>,
) -> Response {
    let Some(document_client) = state.document.as_ref() else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Document analysis is not configured".to_string(),
        );
    };

    let model_chain = &state.config.settings.documents.model_chain;
    let mut results = Vec::with_capacity(request.files.len());

    // Per-file isolation: one bad file never aborts the batch.
    for file in &request.files {
        let filename = upload::sanitize_filename(&file.filename).to_string();
        results.push(
            analyze_one_document(&state, document_client, model_chain, &filename, &file.content)
                .await,
        );
    }

    Json(AnalyzeDocumentsResponse { results }).into_response()
}

async fn analyze_one_document(
    state: &AppState,
    client: &crate::providers::DocumentClient,
    model_chain: &[String],
    filename: &str,
    content: &str,
) -> DocumentOutcome {
    if !upload::allowed_file(filename) {
        return DocumentOutcome::Failed {
            filename: filename.to_string(),
            error: "Unsupported file type".to_string(),
        };
    }

    let bytes = match base64::engine::general_purpose::STANDARD.decode(content) {
        Ok(bytes) => bytes,
        Err(e) => {
            return DocumentOutcome::Failed {
                filename: filename.to_string(),
                error: format!("Invalid base64 content: {}", e),
            };
        }
    };

    debug!("Analyzing {} ({} bytes)", filename, bytes.len());

    match state
        .retry
        .execute(|| client.analyze_with_fallback(model_chain, &bytes))
        .await
    {
        Ok(analysis) => DocumentOutcome::Extracted(normalizer::normalize(&analysis, filename)),
        Err(e) => {
            warn!("Document analysis for {} failed: {}", filename, e);
            DocumentOutcome::Failed {
                filename: filename.to_string(),
                error: format!("Analysis failed: {}", e),
            }
        }
    }
}

/// Conversational follow-up handler - POST /ask
async fn ask_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AskRequest>,
) -> Response {
    if request.question.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "question is required".to_string());
    }

    let Some(conversation) = state.conversation.as_ref() else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Conversational agent is not configured".to_string(),
        );
    };

    let params = AskParams {
        question: request.question,
        context: request.context,
        session_id: request.session_id,
        context_version: request.context_version,
        is_new_session: request.is_new_session,
    };

    match conversation.ask(params).await {
        Ok(answer) => Json(AskResponse {
            answer: answer.answer,
            session_id: answer.session_id,
        })
        .into_response(),
        Err(e) => {
            error!("Question answering failed: {}", e);
            error_response(
                StatusCode::BAD_GATEWAY,
                format!("Failed to answer question: {}", e),
            )
        }
    }
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ask_request_accepts_minimal_body() {
        let request: AskRequest = serde_json::from_value(json!({
            "question": "What drives the payback period?"
        }))
        .unwrap();
        assert!(request.session_id.is_none());
        assert!(!request.is_new_session);
    }

    #[test]
    fn ask_request_reads_camel_case_fields() {
        let request: AskRequest = serde_json::from_value(json!({
            "question": "And with a bigger budget?",
            "sessionId": "s-1",
            "contextVersion": "v2",
            "isNewSession": true
        }))
        .unwrap();
        assert_eq!(request.session_id.as_deref(), Some("s-1"));
        assert_eq!(request.context_version.as_deref(), Some("v2"));
        assert!(request.is_new_session);
    }

    #[test]
    fn error_bodies_always_carry_an_error_string() {
        let body = serde_json::to_value(ErrorResponse {
            error: "budget is required".to_string(),
        })
        .unwrap();
        assert_eq!(body, json!({"error": "budget is required"}));
    }

    #[test]
    fn ask_response_serializes_camel_case() {
        let body = serde_json::to_value(AskResponse {
            answer: "See the summary.".to_string(),
            session_id: "s-1".to_string(),
        })
        .unwrap();
        assert_eq!(body, json!({"answer": "See the summary.", "sessionId": "s-1"}));
    }
}
