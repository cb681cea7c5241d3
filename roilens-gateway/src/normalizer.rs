//! Normalizes heterogeneous document-analysis output into the canonical
//! [`ExtractedDocument`] shape used as LLM context.
//!
//! Structured key-value pairs are preferred; regex pattern extraction over
//! the raw text only kicks in when the analysis produced no structured
//! financial, metric or date fields at all.

use std::sync::LazyLock;

use regex::Regex;
use roilens_core::types::{DocumentEntity, ExtractedDocument};

use crate::providers::DocumentAnalysisResult;

const FINANCIAL_KEYWORDS: &[&str] = &[
    "cost",
    "budget",
    "expense",
    "price",
    "investment",
    "roi",
    "return",
];

const DATE_KEYWORDS: &[&str] = &[
    "date", "deadline", "timeline", "duration", "period", "start", "end",
];

const METRIC_KEYWORDS: &[&str] = &[
    "rate",
    "percentage",
    "efficiency",
    "productivity",
    "employees",
    "headcount",
];

/// A pattern family: ordered alternatives, first match wins.
struct FallbackPatterns {
    budget: Vec<Regex>,
    roi: Vec<Regex>,
    employees: Vec<Regex>,
    /// (pattern, months-per-unit): year-denominated patterns convert to months.
    duration: Vec<(Regex, u64)>,
    hourly_rate: Vec<Regex>,
    savings: Vec<Regex>,
    efficiency: Vec<Regex>,
}

static FALLBACK: LazyLock<FallbackPatterns> = LazyLock::new(|| {
    let compile = |pattern: &str| Regex::new(pattern).expect("invalid fallback pattern");
    FallbackPatterns {
        budget: vec![
            compile(r"(?i)budget[^$\d]{0,40}\$\s*([\d,]+(?:\.\d+)?)"),
            compile(r"(?i)total\s+(?:cost|investment)[^$\d]{0,40}\$?\s*([\d,]+(?:\.\d+)?)"),
            compile(r"(?i)budget[^$\d]{0,40}([\d,]+(?:\.\d+)?)"),
            compile(r"\$\s*([\d,]+(?:\.\d+)?)"),
        ],
        roi: vec![
            compile(r"(?i)roi[^\d]{0,30}([\d.]+)\s*%"),
            compile(r"(?i)([\d.]+)\s*%\s*(?:roi|return)"),
        ],
        employees: vec![
            compile(r"(?i)(\d[\d,]*)\s*(?:employees|staff|workers|people)"),
            compile(r"(?i)(?:headcount|team\s+size)[^\d]{0,20}(\d[\d,]*)"),
        ],
        duration: vec![
            (compile(r"(?i)(\d+)\s*months?"), 1),
            (compile(r"(?i)(\d+)\s*years?"), 12),
            (compile(r"(?i)duration[^\d]{0,20}(\d+)"), 1),
        ],
        hourly_rate: vec![
            compile(r"(?i)\$\s*([\d.]+)\s*(?:/|per\s+)(?:hour|hr)"),
            compile(r"(?i)hourly\s+rate[^\d]{0,20}\$?\s*([\d.]+)"),
        ],
        savings: vec![
            compile(r"(?i)savings?[^$\d]{0,40}\$\s*([\d,]+(?:\.\d+)?)"),
            compile(r"(?i)save\s+\$?\s*([\d,]+(?:\.\d+)?)"),
        ],
        efficiency: vec![
            compile(r"(?i)([\d.]+)\s*%\s*(?:efficiency|productivity)"),
            compile(r"(?i)(?:efficiency|productivity)[^\d]{0,30}([\d.]+)\s*%"),
        ],
    }
});

/// Convert one analysis result into the canonical extracted-document record.
///
/// Never fails: a result with nothing recognizable yields an
/// `ExtractedDocument` with empty categories.
pub fn normalize(analysis: &DocumentAnalysisResult, filename: &str) -> ExtractedDocument {
    let mut doc = ExtractedDocument {
        filename: filename.to_string(),
        model_used: model_used(analysis),
        ..ExtractedDocument::default()
    };

    classify_key_value_pairs(analysis, &mut doc);
    materialize_tables(analysis, &mut doc);
    copy_entities(analysis, &mut doc);

    doc.raw_text = collect_raw_text(analysis);

    // Regex recovery only when the structured passes found nothing at all.
    if !doc.has_structured_data()
        && let Some(raw_text) = doc.raw_text.clone()
    {
        extract_from_raw_text(&raw_text, &mut doc);
    }

    doc
}

/// Structured-data pass: classify key-value pairs by key keywords.
fn classify_key_value_pairs(analysis: &DocumentAnalysisResult, doc: &mut ExtractedDocument) {
    for pair in &analysis.key_value_pairs {
        let (Some(key), Some(value)) = (&pair.key, &pair.value) else {
            continue;
        };
        let key_text = key.content.trim();
        let value_text = value.content.trim();
        if key_text.is_empty() || value_text.is_empty() {
            continue;
        }

        let key_lower = key_text.to_lowercase();
        let target = classify_key(&key_lower, value_text);
        match target {
            Some(Category::Financial) => {
                doc.financial_data.insert(key_lower, value_text.to_string());
            }
            Some(Category::Dates) => {
                doc.dates.insert(key_lower, value_text.to_string());
            }
            Some(Category::Metrics) => {
                doc.key_metrics.insert(key_lower, value_text.to_string());
            }
            None => {}
        }
    }
}

enum Category {
    Financial,
    Dates,
    Metrics,
}

fn classify_key(key_lower: &str, value: &str) -> Option<Category> {
    if FINANCIAL_KEYWORDS.iter().any(|k| key_lower.contains(k)) {
        return Some(Category::Financial);
    }
    if DATE_KEYWORDS.iter().any(|k| key_lower.contains(k)) {
        return Some(Category::Dates);
    }
    if METRIC_KEYWORDS.iter().any(|k| key_lower.contains(k)) {
        return Some(Category::Metrics);
    }

    // Unclassified but numeric-looking values still carry signal: money goes
    // to financials, percentages to metrics.
    if value.contains(|c: char| c.is_ascii_digit()) || value.contains('$') {
        if value.contains('%') {
            return Some(Category::Metrics);
        }
        return Some(Category::Financial);
    }

    None
}

/// Table pass: materialize each table as a row-major grid of cell text.
fn materialize_tables(analysis: &DocumentAnalysisResult, doc: &mut ExtractedDocument) {
    for table in &analysis.tables {
        let mut grid = vec![vec![String::new(); table.column_count]; table.row_count];
        for cell in &table.cells {
            if cell.row_index < table.row_count && cell.column_index < table.column_count {
                grid[cell.row_index][cell.column_index] = cell.content.clone();
            }
        }
        doc.tables.push(grid);
    }
}

/// Entity pass: copy category/content/confidence verbatim.
fn copy_entities(analysis: &DocumentAnalysisResult, doc: &mut ExtractedDocument) {
    for entity in &analysis.entities {
        doc.entities.push(DocumentEntity {
            category: entity.category.clone(),
            content: entity.content.clone(),
            confidence: entity.confidence,
        });
    }
}

/// Concatenate page contents; pages without direct content contribute their
/// joined line contents instead.
fn collect_raw_text(analysis: &DocumentAnalysisResult) -> Option<String> {
    let mut parts = Vec::new();
    for page in &analysis.pages {
        match page.content.as_deref() {
            Some(content) if !content.trim().is_empty() => parts.push(content.to_string()),
            _ => {
                let joined = page
                    .lines
                    .iter()
                    .map(|line| line.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n");
                if !joined.trim().is_empty() {
                    parts.push(joined);
                }
            }
        }
    }
    (!parts.is_empty()).then(|| parts.join("\n"))
}

/// Raw-text fallback: ordered pattern families over the whole text.
fn extract_from_raw_text(raw_text: &str, doc: &mut ExtractedDocument) {
    let patterns = &*FALLBACK;

    if let Some(amount) = first_capture(&patterns.budget, raw_text) {
        doc.financial_data
            .insert("budget".to_string(), format!("${}", amount));
    }
    if let Some(percent) = first_capture(&patterns.roi, raw_text) {
        doc.financial_data
            .insert("roi".to_string(), format!("{}%", percent));
    }
    if let Some(count) = first_capture(&patterns.employees, raw_text) {
        doc.key_metrics.insert("employees".to_string(), count);
    }
    if let Some(months) = first_duration_months(&patterns.duration, raw_text) {
        doc.dates
            .insert("duration".to_string(), format!("{} months", months));
    }
    if let Some(rate) = first_capture(&patterns.hourly_rate, raw_text) {
        doc.financial_data
            .insert("hourly_rate".to_string(), format!("${}", rate));
    }
    if let Some(amount) = first_capture(&patterns.savings, raw_text) {
        doc.financial_data
            .insert("expected_savings".to_string(), format!("${}", amount));
    }
    if let Some(percent) = first_capture(&patterns.efficiency, raw_text) {
        doc.key_metrics
            .insert("efficiency_gain".to_string(), format!("{}%", percent));
    }
}

/// First capture group of the first matching pattern in a family.
fn first_capture(patterns: &[Regex], text: &str) -> Option<String> {
    patterns.iter().find_map(|pattern| {
        pattern
            .captures(text)
            .and_then(|captures| captures.get(1))
            .map(|group| group.as_str().to_string())
    })
}

/// Duration family with unit conversion: year-denominated matches become months.
fn first_duration_months(patterns: &[(Regex, u64)], text: &str) -> Option<u64> {
    patterns.iter().find_map(|(pattern, months_per_unit)| {
        pattern
            .captures(text)
            .and_then(|captures| captures.get(1))
            .and_then(|group| group.as_str().parse::<u64>().ok())
            .map(|value| value * months_per_unit)
    })
}

/// Determine which analysis model produced this result.
fn model_used(analysis: &DocumentAnalysisResult) -> String {
    if let Some(model_id) = analysis.model_id.as_deref()
        && !model_id.is_empty()
    {
        return model_id.to_string();
    }
    if let Some(doc_type) = analysis.doc_type.as_deref()
        && !doc_type.is_empty()
    {
        return format!("prebuilt-{}", doc_type);
    }
    "unknown".to_string()
}
