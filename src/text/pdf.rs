//! PDF text and metadata extraction

use crate::error::{PipelineError, Result};
use lopdf::{Document, Object};
use std::path::Path;

/// Text and document-info metadata pulled out of a PDF
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedDocument {
    /// Page text, stripped of leading and trailing whitespace
    pub text: String,
    /// Title from the document info dictionary, or the first non-empty
    /// string entry when there is no title. Empty when neither exists.
    pub metadata: String,
    pub page_count: usize,
}

/// PDF processing entry points
pub struct PdfProcessor;

impl PdfProcessor {
    /// Extract text and metadata from in-memory PDF bytes
    pub fn extract(bytes: &[u8]) -> Result<ExtractedDocument> {
        let document = Document::load_mem(bytes)
            .map_err(|e| PipelineError::Pdf(format!("Failed to parse PDF: {}", e)))?;
        let page_count = document.get_pages().len();
        let metadata = Self::info_metadata(&document).unwrap_or_default();

        let text = pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| PipelineError::Pdf(format!("Failed to extract text: {}", e)))?;

        log::info!(
            "Extracted {} characters from {} pages",
            text.len(),
            page_count
        );

        Ok(ExtractedDocument {
            text: text.trim().to_string(),
            metadata,
            page_count,
        })
    }

    /// Extract text and metadata from a PDF file
    pub fn extract_file<P: AsRef<Path>>(path: P) -> Result<ExtractedDocument> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PipelineError::Pdf(format!(
                "PDF file not found: {}",
                path.display()
            )));
        }
        let bytes = std::fs::read(path)?;
        Self::extract(&bytes)
    }

    fn info_metadata(document: &Document) -> Option<String> {
        let info = match document.trailer.get(b"Info").ok()? {
            Object::Reference(id) => document.get_object(*id).ok()?,
            other => other,
        };
        let dict = info.as_dict().ok()?;

        if let Some(title) = dict.get(b"Title").ok().and_then(text_value) {
            return Some(title);
        }
        dict.iter().find_map(|(_, value)| text_value(value))
    }
}

/// Non-empty, trimmed text of a string object
fn text_value(value: &Object) -> Option<String> {
    if !matches!(value, Object::String(..)) {
        return None;
    }
    let text = lopdf::decode_text_string(value).ok()?;
    let text = text.trim_start_matches('\u{feff}').trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Dictionary, StringFormat};

    fn literal(bytes: &[u8]) -> Object {
        Object::String(bytes.to_vec(), StringFormat::Literal)
    }

    #[test]
    fn test_text_value_encodings() {
        assert_eq!(text_value(&literal(b"Form 1-A")).as_deref(), Some("Form 1-A"));
        assert_eq!(
            text_value(&literal(&[0xFE, 0xFF, 0x00, 0x41, 0x00, 0xE9])).as_deref(),
            Some("Aé")
        );
        assert_eq!(
            text_value(&literal("\u{feff}Résumé".as_bytes())).as_deref(),
            Some("Résumé")
        );
        // PDFDocEncoding maps 0x80 to a bullet, not a C1 control
        assert_eq!(text_value(&literal(&[0x80, b' ', b'A'])).as_deref(), Some("\u{2022} A"));
    }

    #[test]
    fn test_text_value_skips_blank_and_non_strings() {
        assert_eq!(text_value(&literal(b"   ")), None);
        assert_eq!(text_value(&Object::Integer(3)), None);
    }

    #[test]
    fn test_invalid_pdf_rejected() {
        let result = PdfProcessor::extract(b"definitely not a pdf");
        assert!(matches!(result, Err(PipelineError::Pdf(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = PdfProcessor::extract_file("/nonexistent/file.pdf");
        assert!(matches!(result, Err(PipelineError::Pdf(_))));
    }

    #[test]
    fn test_info_metadata_prefers_title() {
        let mut document = Document::with_version("1.5");
        let mut info = Dictionary::new();
        info.set(
            "Producer",
            Object::String(b"Acrobat".to_vec(), StringFormat::Literal),
        );
        info.set(
            "Title",
            Object::String(b"Offering Statement".to_vec(), StringFormat::Literal),
        );
        let info_id = document.add_object(info);
        document.trailer.set("Info", Object::Reference(info_id));

        assert_eq!(
            PdfProcessor::info_metadata(&document).as_deref(),
            Some("Offering Statement")
        );
    }

    #[test]
    fn test_info_metadata_absent() {
        let document = Document::with_version("1.5");
        assert_eq!(PdfProcessor::info_metadata(&document), None);
    }
}
