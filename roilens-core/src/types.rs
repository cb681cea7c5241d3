//! Shared domain types exchanged between the HTTP surface and the analysis flows.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// ROI analysis request.
///
/// `budget`, `employees` and `duration` arrive as JSON values because clients
/// send them either as strings or numbers; [`RoiRequest::validate`] enforces
/// presence before any prompt is built.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoiRequest {
    pub budget: Option<Value>,
    pub employees: Option<Value>,
    pub duration: Option<Value>,
    /// Names of supporting files, echoed into the prompt.
    pub files: Vec<String>,
    /// Caller-defined parameters, rendered in insertion order.
    pub custom_fields: serde_json::Map<String, Value>,
    /// Documents already normalized by the document pipeline.
    pub document_data: Vec<ExtractedDocument>,
}

/// A required ROI field that is missing or empty.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("{0} is required")]
pub struct ValidationError(pub String);

impl RoiRequest {
    /// Check that budget, employees and duration are all present and non-empty.
    ///
    /// Absence is a caller error, never a computed default.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (value, name) in [
            (&self.budget, "budget"),
            (&self.employees, "employees"),
            (&self.duration, "duration"),
        ] {
            if value.as_ref().and_then(value_text).is_none() {
                return Err(ValidationError(name.to_string()));
            }
        }
        Ok(())
    }

    pub fn budget_text(&self) -> Option<String> {
        self.budget.as_ref().and_then(value_text)
    }

    pub fn employees_text(&self) -> Option<String> {
        self.employees.as_ref().and_then(value_text)
    }

    pub fn duration_text(&self) -> Option<String> {
        self.duration.as_ref().and_then(value_text)
    }
}

/// Render a JSON value as display text, treating empty/zero/null as absent.
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => (n.as_f64() != Some(0.0)).then(|| n.to_string()),
        Value::Bool(b) => b.then(|| "true".to_string()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Canonical, provider-independent record produced from one analyzed document.
///
/// Created once by the normalizer and immutable afterwards; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractedDocument {
    pub filename: String,
    pub financial_data: BTreeMap<String, String>,
    pub key_metrics: BTreeMap<String, String>,
    pub dates: BTreeMap<String, String>,
    pub entities: Vec<DocumentEntity>,
    /// Row-major cell grids, one per detected table.
    pub tables: Vec<Vec<Vec<String>>>,
    pub raw_text: Option<String>,
    /// Identifier of the analysis model that produced this result.
    pub model_used: String,
}

impl ExtractedDocument {
    /// Whether any of the three structured categories holds data.
    pub fn has_structured_data(&self) -> bool {
        !self.financial_data.is_empty() || !self.key_metrics.is_empty() || !self.dates.is_empty()
    }
}

/// Entity detected in a document, copied verbatim from the analysis result.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DocumentEntity {
    pub category: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Per-file normalization outcome: a bad file yields an error record
/// instead of aborting the batch.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum DocumentOutcome {
    Failed { filename: String, error: String },
    Extracted(ExtractedDocument),
}
