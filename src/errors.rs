//! # Error Handling Module
//!
//! ## Purpose
//! Centralized error handling for the document annotator, providing one error
//! type for every component with conversion utilities and recovery hints.
//!
//! ## Input/Output Specification
//! - **Input**: Error conditions from selection, generation, extraction, export
//! - **Output**: Structured error types with context, ready for HTTP mapping
//! - **Error Categories**: Validation, Session, Provider, Extraction, Config, Network
//!
//! ## Key Features
//! - Struct variants carrying the offending field or external detail
//! - Automatic conversion from common library errors
//! - Recoverability classification for retryable failures
//! - Category labels for structured logging

use thiserror::Error;
use uuid::Uuid;

/// Result type used throughout the application
pub type Result<T> = std::result::Result<T, AnnotateError>;

/// Error types for the document annotator
#[derive(Debug, Error)]
pub enum AnnotateError {
    /// Validation errors (bad selection, read-only state, bad toggle target)
    #[error("Validation failed for field '{field}': {reason}")]
    Validation { field: String, reason: String },

    /// A word id that is not part of the current session
    #[error("Word {word_id} is not part of the current session")]
    WordNotFound { word_id: Uuid },

    /// Definition provider failures (network, malformed or empty payload)
    #[error("Definition provider error: {details}")]
    Provider { details: String },

    /// Document text extraction failures (unsupported or corrupt input)
    #[error("Failed to extract text from '{media_type}' content: {details}")]
    Extraction { media_type: String, details: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Network-related errors
    #[error("Network error: {details}")]
    Network { details: String },

    /// Internal system errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AnnotateError {
    /// Convenience constructor for validation failures
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AnnotateError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Convenience constructor for provider failures
    pub fn provider(details: impl Into<String>) -> Self {
        AnnotateError::Provider {
            details: details.into(),
        }
    }

    /// Check if the error is recoverable (the operation can be retried)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AnnotateError::Provider { .. } | AnnotateError::Network { .. }
        )
    }

    /// Get error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            AnnotateError::Validation { .. } => "validation",
            AnnotateError::WordNotFound { .. } => "session",
            AnnotateError::Provider { .. } => "provider",
            AnnotateError::Extraction { .. } => "extraction",
            AnnotateError::Config { .. } => "configuration",
            AnnotateError::Network { .. } => "network",
            AnnotateError::Internal { .. } => "internal",
        }
    }
}

// Conversion from common error types
impl From<std::io::Error> for AnnotateError {
    fn from(err: std::io::Error) -> Self {
        AnnotateError::Internal {
            message: format!("IO error: {}", err),
        }
    }
}

impl From<reqwest::Error> for AnnotateError {
    fn from(err: reqwest::Error) -> Self {
        AnnotateError::Network {
            details: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for AnnotateError {
    fn from(err: toml::de::Error) -> Self {
        AnnotateError::Config {
            message: format!("TOML parse error: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverability() {
        assert!(AnnotateError::provider("timeout").is_recoverable());
        assert!(!AnnotateError::validation("selection", "too long").is_recoverable());
    }

    #[test]
    fn test_categories() {
        assert_eq!(AnnotateError::validation("a", "b").category(), "validation");
        assert_eq!(
            AnnotateError::WordNotFound {
                word_id: Uuid::new_v4()
            }
            .category(),
            "session"
        );
        assert_eq!(AnnotateError::provider("x").category(), "provider");
    }
}
