//! Hygiene helpers for uploaded document names.

/// Extensions accepted for document analysis.
const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "xls", "xlsx", "csv"];

/// Whether a filename carries an accepted document extension.
pub fn allowed_file(filename: &str) -> bool {
    extension(filename)
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Strip any path components an uploader smuggled into the name.
pub fn sanitize_filename(filename: &str) -> &str {
    filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim()
}

fn extension(filename: &str) -> Option<&str> {
    let name = sanitize_filename(filename);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
        _ => None,
    }
}
