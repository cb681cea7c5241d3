//! End-to-end flow tests for the ROI analysis pipeline, exercised through
//! the public API: request JSON -> validation -> prompt, and provider
//! analysis JSON -> normalization -> outcome serialization.

use roilens_core::types::{DocumentOutcome, RoiRequest};
use roilens_gateway::normalizer;
use roilens_gateway::prompt::build_analysis_prompt;
use roilens_gateway::providers::DocumentAnalysisResult;
use serde_json::json;

fn request_from(value: serde_json::Value) -> RoiRequest {
    serde_json::from_value(value).unwrap()
}

#[test]
fn plain_request_renders_all_header_lines() {
    let request = request_from(json!({
        "budget": "50000",
        "employees": "120",
        "duration": "6"
    }));
    request.validate().unwrap();

    let prompt = build_analysis_prompt(&request);
    assert!(prompt.contains("Budget: $50000"));
    assert!(prompt.contains("Number of Impacted Employees: 120"));
    assert!(prompt.contains("Project Duration: 6 months"));
    assert!(prompt.contains("No supporting documents provided"));
}

#[test]
fn numeric_json_values_render_like_strings() {
    let request = request_from(json!({
        "budget": 50000,
        "employees": 120,
        "duration": 6
    }));
    request.validate().unwrap();

    let prompt = build_analysis_prompt(&request);
    assert!(prompt.contains("Budget: $50000"));
    assert!(prompt.contains("Project Duration: 6 months"));
}

#[test]
fn custom_fields_render_in_request_order_with_decoration() {
    let request = request_from(json!({
        "budget": "50000",
        "employees": "120",
        "duration": "6",
        "customFields": {
            "Hourly Rate": "$45.50",
            "Adoption Target": "85%",
            "Region": "EMEA"
        }
    }));

    let prompt = build_analysis_prompt(&request);
    assert!(prompt.contains("  - Hourly Rate: $45.50\n"));
    assert!(prompt.contains("  - Adoption Target: 85%\n"));
    assert!(prompt.contains("  - Region: EMEA\n"));

    let rate = prompt.find("Hourly Rate").unwrap();
    let target = prompt.find("Adoption Target").unwrap();
    let region = prompt.find("Region").unwrap();
    assert!(rate < target && target < region);
}

#[test]
fn missing_budget_fails_validation_before_any_remote_work() {
    let request = request_from(json!({
        "employees": "120",
        "duration": "6"
    }));
    let error = request.validate().unwrap_err();
    assert_eq!(error.to_string(), "budget is required");
}

#[test]
fn empty_and_zero_values_count_as_missing() {
    let request = request_from(json!({
        "budget": "",
        "employees": 0,
        "duration": "6"
    }));
    assert!(request.validate().is_err());
}

#[test]
fn unstructured_raw_text_falls_back_to_pattern_extraction() {
    let analysis: DocumentAnalysisResult = serde_json::from_value(json!({
        "modelId": "prebuilt-read",
        "pages": [
            {"content": "Our budget is $120,000 for this project"}
        ]
    }))
    .unwrap();

    let doc = normalizer::normalize(&analysis, "notes.pdf");
    assert_eq!(doc.financial_data.get("budget").unwrap(), "$120,000");
    assert_eq!(doc.model_used, "prebuilt-read");
}

#[test]
fn structured_fields_suppress_the_regex_fallback() {
    let analysis: DocumentAnalysisResult = serde_json::from_value(json!({
        "modelId": "prebuilt-document",
        "keyValuePairs": [
            {"key": {"content": "Budget"}, "value": {"content": "$95,000"}}
        ],
        "pages": [
            {"content": "Our budget is $120,000 for this project"}
        ]
    }))
    .unwrap();

    let doc = normalizer::normalize(&analysis, "plan.pdf");
    assert_eq!(doc.financial_data.get("budget").unwrap(), "$95,000");
}

#[test]
fn extracted_documents_flow_back_through_a_request() {
    let analysis: DocumentAnalysisResult = serde_json::from_value(json!({
        "modelId": "prebuilt-document",
        "keyValuePairs": [
            {"key": {"content": "Budget"}, "value": {"content": "$95,000"}},
            {"key": {"content": "Project Duration"}, "value": {"content": "12 months"}}
        ]
    }))
    .unwrap();
    let doc = normalizer::normalize(&analysis, "plan.pdf");

    // Round-trip the way the frontend does: serialize the extraction result,
    // then embed it in the next /calculate_roi request body.
    let request = request_from(json!({
        "budget": "95000",
        "employees": "40",
        "duration": "12",
        "files": ["plan.pdf"],
        "documentData": [serde_json::to_value(&doc).unwrap()]
    }));

    let prompt = build_analysis_prompt(&request);
    assert!(prompt.contains("- Supporting Documents: plan.pdf"));
    assert!(prompt.contains("Document: plan.pdf (analyzed with prebuilt-document)"));
    assert!(prompt.contains("budget: $95,000"));
}

#[test]
fn mixed_outcome_batches_serialize_per_file() {
    let analysis: DocumentAnalysisResult = serde_json::from_value(json!({
        "modelId": "prebuilt-document",
        "keyValuePairs": [
            {"key": {"content": "Budget"}, "value": {"content": "$95,000"}}
        ]
    }))
    .unwrap();

    let outcomes = vec![
        DocumentOutcome::Extracted(normalizer::normalize(&analysis, "plan.pdf")),
        DocumentOutcome::Failed {
            filename: "broken.pdf".to_string(),
            error: "Analysis failed: no content".to_string(),
        },
    ];

    let body = serde_json::to_value(&outcomes).unwrap();
    assert_eq!(body[0]["filename"], "plan.pdf");
    assert_eq!(body[0]["financial_data"]["budget"], "$95,000");
    assert_eq!(body[1]["filename"], "broken.pdf");
    assert_eq!(body[1]["error"], "Analysis failed: no content");

    // Deserializing the mixed batch recovers the same variants.
    let parsed: Vec<DocumentOutcome> = serde_json::from_value(body).unwrap();
    assert!(matches!(parsed[0], DocumentOutcome::Extracted(_)));
    assert!(matches!(parsed[1], DocumentOutcome::Failed { .. }));
}

#[test]
fn normalization_is_idempotent() {
    let analysis: DocumentAnalysisResult = serde_json::from_value(json!({
        "modelId": "prebuilt-document",
        "keyValuePairs": [
            {"key": {"content": "Budget"}, "value": {"content": "$95,000"}}
        ],
        "pages": [
            {"content": "Savings of $4,000 per month expected"}
        ]
    }))
    .unwrap();

    let first = normalizer::normalize(&analysis, "plan.pdf");
    let second = normalizer::normalize(&analysis, "plan.pdf");
    assert_eq!(first, second);
}
