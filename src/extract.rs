//! # Document Text Extraction Module
//!
//! ## Purpose
//! Converts uploaded document content into the plain text the annotation
//! session works on. Extraction is all-or-nothing: an unsupported media type
//! or a corrupt payload fails the whole load and no partial document is ever
//! accepted as the working document.
//!
//! ## Input/Output Specification
//! - **Input**: Raw bytes, the declared media type, an optional file name
//! - **Output**: Normalized plain text
//! - **Failure**: `Extraction` errors that block the document load entirely

use crate::errors::{AnnotateError, Result};
use unicode_normalization::UnicodeNormalization;

/// One extractor for a family of media types
pub trait DocumentTextExtractor: Send + Sync {
    /// Extractor identifier for logging
    fn name(&self) -> &str;

    /// Whether this extractor handles the given media type or file name
    fn supports(&self, media_type: &str, file_name: Option<&str>) -> bool;

    /// Extract plain text from the raw content
    fn extract(&self, content: &[u8], media_type: &str) -> Result<String>;
}

/// Plain-text extractor for `text/plain` and `.txt` uploads
pub struct PlainTextExtractor;

impl DocumentTextExtractor for PlainTextExtractor {
    fn name(&self) -> &str {
        "plain-text"
    }

    fn supports(&self, media_type: &str, file_name: Option<&str>) -> bool {
        media_type.eq_ignore_ascii_case("text/plain")
            || file_name
                .map(|name| name.to_ascii_lowercase().ends_with(".txt"))
                .unwrap_or(false)
    }

    fn extract(&self, content: &[u8], media_type: &str) -> Result<String> {
        let text = std::str::from_utf8(content).map_err(|e| AnnotateError::Extraction {
            media_type: media_type.to_string(),
            details: format!("content is not valid UTF-8: {}", e),
        })?;

        // NFC so marker matching never splits on combining characters.
        let normalized: String = text.nfc().collect();
        let trimmed = normalized.trim();

        if trimmed.is_empty() {
            return Err(AnnotateError::Extraction {
                media_type: media_type.to_string(),
                details: "document contains no text".to_string(),
            });
        }

        Ok(trimmed.to_string())
    }
}

/// Dispatches uploads to the first extractor that supports them
pub struct TextExtractionService {
    extractors: Vec<Box<dyn DocumentTextExtractor>>,
}

impl Default for TextExtractionService {
    fn default() -> Self {
        Self::new()
    }
}

impl TextExtractionService {
    /// Create a service with the built-in extractors
    pub fn new() -> Self {
        Self {
            extractors: vec![Box::new(PlainTextExtractor)],
        }
    }

    /// Register an additional extractor
    pub fn register(&mut self, extractor: Box<dyn DocumentTextExtractor>) {
        self.extractors.push(extractor);
    }

    /// Extract plain text, failing on unsupported media types
    pub fn extract(
        &self,
        content: &[u8],
        media_type: &str,
        file_name: Option<&str>,
    ) -> Result<String> {
        let Some(extractor) = self
            .extractors
            .iter()
            .find(|e| e.supports(media_type, file_name))
        else {
            return Err(AnnotateError::Extraction {
                media_type: media_type.to_string(),
                details: format!(
                    "unsupported media type (file: {})",
                    file_name.unwrap_or("unnamed")
                ),
            });
        };

        tracing::debug!(
            extractor = extractor.name(),
            media_type,
            bytes = content.len(),
            "extracting document text"
        );
        extractor.extract(content, media_type)
    }
}
