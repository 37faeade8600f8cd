//! Small helpers for file names, sources and console output

use std::path::Path;

/// Lowercased extension of a path or file name
pub fn get_file_extension<P: AsRef<Path>>(path: P) -> Option<String> {
    let ext = path.as_ref().extension()?.to_str()?;
    Some(ext.to_ascii_lowercase())
}

/// Whether a document name denotes plain text rather than a PDF
pub fn is_text_document<P: AsRef<Path>>(path: P) -> bool {
    get_file_extension(path).is_some_and(|ext| matches!(ext.as_str(), "txt" | "md" | "markdown"))
}

/// Whether a document source is an HTTP(S) URL rather than a local path
pub fn is_url(source: &str) -> bool {
    let lower = source.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Document name for a source: the last path segment of a URL, or the file
/// name of a local path
pub fn filename_from_source(source: &str) -> Option<String> {
    let source = source.trim();
    if is_url(source) {
        let url = reqwest::Url::parse(source).ok()?;
        return url
            .path_segments()?
            .filter(|segment| !segment.is_empty())
            .next_back()
            .map(sanitize_filename)
            .filter(|name| !name.is_empty());
    }

    Path::new(source)
        .file_name()
        .and_then(|name| name.to_str())
        .map(sanitize_filename)
        .filter(|name| !name.is_empty())
}

/// Byte count with a binary unit, e.g. `1.5 KB`
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }

    match unit {
        0 => format!("{} B", bytes),
        _ => format!("{:.1} {}", value, UNITS[unit]),
    }
}

/// Replace path separators, reserved punctuation and control characters with
/// `_` so a downloaded name is safe to use as a document key
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') {
                '_'
            } else {
                c
            }
        })
        .collect();
    cleaned.trim().to_string()
}

/// First `max_chars` characters of `text`, with an ellipsis when cut
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_is_lowercased() {
        assert_eq!(get_file_extension("Form1-A.PDF").as_deref(), Some("pdf"));
        assert_eq!(get_file_extension("/tmp/notes.md").as_deref(), Some("md"));
        assert_eq!(get_file_extension("README"), None);
    }

    #[test]
    fn test_text_documents() {
        assert!(is_text_document("notes.TXT"));
        assert!(is_text_document("summary.markdown"));
        assert!(!is_text_document("form-d.pdf"));
        assert!(!is_text_document("archive"));
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(
            filename_from_source("https://www.sec.gov/files/form1-a.pdf"),
            Some("form1-a.pdf".to_string())
        );
        assert_eq!(
            filename_from_source("https://example.com/docs/report.pdf?download=1#page=2"),
            Some("report.pdf".to_string())
        );
        assert_eq!(
            filename_from_source("https://example.com/docs/"),
            Some("docs".to_string())
        );
        assert_eq!(filename_from_source("https://example.com/"), None);
    }

    #[test]
    fn test_filename_from_path() {
        assert_eq!(
            filename_from_source("/data/in/form-d.pdf"),
            Some("form-d.pdf".to_string())
        );
        assert_eq!(filename_from_source(""), None);
    }

    #[test]
    fn test_sizes() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(1023), "1023 B");
        assert_eq!(format_file_size(2048), "2.0 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024 + 512 * 1024), "5.5 MB");
    }

    #[test]
    fn test_unsafe_characters_replaced() {
        assert_eq!(sanitize_filename("form1-a.pdf"), "form1-a.pdf");
        assert_eq!(sanitize_filename("q3<draft>|v2?.pdf"), "q3_draft__v2_.pdf");
        assert_eq!(sanitize_filename(" dir\\form.pdf\t"), "dir_form.pdf_");
    }

    #[test]
    fn test_preview_is_char_safe() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("héllo wörld", 5), "héllo...");
    }
}
