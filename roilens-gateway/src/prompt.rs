//! Builds the ROI analysis prompt from request parameters, custom fields and
//! extracted document data.
//!
//! The rendering contracts here are load-bearing: header lines, custom-field
//! decoration and the document excerpt cap are asserted by tests and relied
//! on by the model instructions.

use roilens_core::types::{ExtractedDocument, RoiRequest};
use serde_json::Value;

/// System persona for the chat completion provider.
pub const SYSTEM_PROMPT: &str =
    "You are a change management specialist, assisting leaders with providing analysis and insights.";

/// Token budget for one analysis completion.
pub const MAX_TOKENS: u32 = 1000;

/// Sampling temperature for analysis completions.
pub const TEMPERATURE: f32 = 0.7;

/// Raw-text excerpt cap per document, in characters.
const EXCERPT_CHARS: usize = 300;

/// Assemble the full analysis prompt.
///
/// The caller is responsible for validating the required fields; missing
/// values render as empty strings rather than panicking.
pub fn build_analysis_prompt(request: &RoiRequest) -> String {
    let budget = request.budget_text().unwrap_or_default();
    let employees = request.employees_text().unwrap_or_default();
    let duration = request.duration_text().unwrap_or_default();

    let mut prompt = String::new();
    prompt.push_str("Project ROI Analysis Request:\n");
    prompt.push_str(&format!("- Budget: ${}\n", budget));
    prompt.push_str(&format!("- Number of Impacted Employees: {}\n", employees));
    prompt.push_str(&format!("- Project Duration: {} months\n", duration));

    if request.files.is_empty() {
        prompt.push_str("- No supporting documents provided\n");
    } else {
        prompt.push_str(&format!(
            "- Supporting Documents: {}\n",
            request.files.join(", ")
        ));
    }

    if !request.custom_fields.is_empty() {
        prompt.push_str("\nAdditional Custom Parameters:\n");
        for (name, value) in &request.custom_fields {
            prompt.push_str(&format!(
                "  - {}: {}\n",
                name,
                render_custom_value(&value_to_text(value))
            ));
        }
    }

    if !request.document_data.is_empty() {
        prompt.push_str("\nExtracted Document Data:\n");
        for doc in &request.document_data {
            render_document(&mut prompt, doc);
        }
    }

    prompt.push_str(INSTRUCTIONS);
    prompt
}

/// Canonicalize a custom field value.
///
/// Values that are numeric once "$", "%" and "," are stripped get their
/// original decoration reattached: a "$" prefix, or failing that a "%"
/// suffix, never both. Anything non-numeric passes through unchanged.
fn render_custom_value(raw: &str) -> String {
    let raw = raw.trim();
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | '%' | ','))
        .collect();

    if cleaned.trim().parse::<f64>().is_err() {
        return raw.to_string();
    }

    let without_dollar = raw.strip_prefix('$').unwrap_or(raw);
    let body = without_dollar.strip_suffix('%').unwrap_or(without_dollar);
    if raw.starts_with('$') {
        format!("${}", body)
    } else if raw.ends_with('%') {
        format!("{}%", body)
    } else {
        body.to_string()
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn render_document(prompt: &mut String, doc: &ExtractedDocument) {
    prompt.push_str(&format!(
        "\nDocument: {} (analyzed with {})\n",
        doc.filename,
        if doc.model_used.is_empty() {
            "unknown"
        } else {
            &doc.model_used
        }
    ));

    if !doc.financial_data.is_empty() {
        prompt.push_str("  Financial Data:\n");
        for (key, value) in &doc.financial_data {
            prompt.push_str(&format!("    {}: {}\n", key, value));
        }
    }
    if !doc.key_metrics.is_empty() {
        prompt.push_str("  Key Metrics:\n");
        for (key, value) in &doc.key_metrics {
            prompt.push_str(&format!("    {}: {}\n", key, value));
        }
    }
    if !doc.dates.is_empty() {
        prompt.push_str("  Dates:\n");
        for (key, value) in &doc.dates {
            prompt.push_str(&format!("    {}: {}\n", key, value));
        }
    }
    if let Some(raw_text) = doc.raw_text.as_deref() {
        prompt.push_str("  Raw Text Excerpt:\n");
        prompt.push_str(&format!("    {}\n", excerpt(raw_text)));
    }
}

/// Cap a raw-text excerpt at [`EXCERPT_CHARS`] characters with an ellipsis marker.
fn excerpt(text: &str) -> String {
    if text.chars().count() <= EXCERPT_CHARS {
        text.to_string()
    } else {
        let capped: String = text.chars().take(EXCERPT_CHARS).collect();
        format!("{}...", capped)
    }
}

const INSTRUCTIONS: &str = r#"
Please provide a detailed ROI analysis for this change management project. Include:
1. Executive summary
2. Cost-benefit analysis
3. Estimated ROI percentage
4. Payback period
5. Key risks and assumptions
6. Recommendations

Requirements for the analysis:
- Explicitly use every custom parameter listed above in the calculations you show.
- Use the values extracted from the supporting documents to validate your assumptions.
- Format the response with Markdown section headers, **bold** emphasis for key figures, and bullet lists.
- Wrap simple inline math in single dollar signs, e.g. $120 \times 6$.
- Wrap any formula containing \text or \frac in double dollar signs.
- Use these formulas exactly as given:
  $$\text{ROI} = \frac{\text{Net Benefit}}{\text{Total Cost}} \times 100\%$$
  $$\text{Payback Period} = \frac{\text{Total Cost}}{\text{Monthly Savings}}$$
- Do not recommend reducing headcount as a cost-saving measure, even if the numbers would support it.
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use roilens_core::types::ExtractedDocument;
    use serde_json::json;

    fn base_request() -> RoiRequest {
        serde_json::from_value(json!({
            "budget": "50000",
            "employees": "120",
            "duration": "6"
        }))
        .unwrap()
    }

    #[test]
    fn renders_required_header_lines() {
        let prompt = build_analysis_prompt(&base_request());
        assert!(prompt.contains("Budget: $50000"));
        assert!(prompt.contains("Number of Impacted Employees: 120"));
        assert!(prompt.contains("Project Duration: 6 months"));
        assert!(prompt.contains("No supporting documents provided"));
    }

    #[test]
    fn lists_supporting_files_when_present() {
        let mut request = base_request();
        request.files = vec!["plan.pdf".to_string(), "costs.xlsx".to_string()];
        let prompt = build_analysis_prompt(&request);
        assert!(prompt.contains("- Supporting Documents: plan.pdf, costs.xlsx"));
        assert!(!prompt.contains("No supporting documents provided"));
    }

    #[test]
    fn custom_field_dollar_decoration_is_preserved() {
        let mut request = base_request();
        request
            .custom_fields
            .insert("Hourly Rate".to_string(), json!("$45.50"));
        let prompt = build_analysis_prompt(&request);
        assert!(prompt.contains("  - Hourly Rate: $45.50\n"));
    }

    #[test]
    fn custom_value_decoration_rules() {
        assert_eq!(render_custom_value("$45.50"), "$45.50");
        assert_eq!(render_custom_value("12.5%"), "12.5%");
        assert_eq!(render_custom_value("1,500"), "1,500");
        // "$" wins over "%", never both
        assert_eq!(render_custom_value("$45%"), "$45");
        // non-numeric values pass through unchanged
        assert_eq!(render_custom_value("two dollars"), "two dollars");
        assert_eq!(render_custom_value("N/A"), "N/A");
    }

    #[test]
    fn numeric_json_custom_values_render_plainly() {
        let mut request = base_request();
        request.custom_fields.insert("Teams".to_string(), json!(4));
        let prompt = build_analysis_prompt(&request);
        assert!(prompt.contains("  - Teams: 4\n"));
    }

    #[test]
    fn document_context_renders_nested_fields_and_excerpt() {
        let mut request = base_request();
        let mut doc = ExtractedDocument {
            filename: "plan.pdf".to_string(),
            model_used: "prebuilt-document".to_string(),
            raw_text: Some("x".repeat(350)),
            ..ExtractedDocument::default()
        };
        doc.financial_data
            .insert("budget".to_string(), "$120,000".to_string());
        doc.dates
            .insert("duration".to_string(), "12 months".to_string());
        request.document_data = vec![doc];

        let prompt = build_analysis_prompt(&request);
        assert!(prompt.contains("Document: plan.pdf (analyzed with prebuilt-document)"));
        assert!(prompt.contains("    budget: $120,000"));
        assert!(prompt.contains("    duration: 12 months"));
        // 300-char cap plus ellipsis marker
        assert!(prompt.contains(&format!("{}...", "x".repeat(300))));
        assert!(!prompt.contains(&"x".repeat(301)));
    }

    #[test]
    fn instruction_block_contains_formatting_contract() {
        let prompt = build_analysis_prompt(&base_request());
        assert!(prompt.contains("Executive summary"));
        assert!(prompt.contains(r"$$\text{ROI} = \frac{\text{Net Benefit}}{\text{Total Cost}} \times 100\%$$"));
        assert!(prompt.contains(r"$$\text{Payback Period} = \frac{\text{Total Cost}}{\text{Monthly Savings}}$$"));
        assert!(prompt.contains("Do not recommend reducing headcount"));
    }
}
