//! # Document Footnote Annotator
//!
//! ## Overview
//! This library implements an interactive annotation engine that lets a user
//! select terms in a plain-text document, request AI-generated definitions for
//! each term, and commit the chosen definition lines as numbered footnotes in
//! the document text.
//!
//! ## Architecture
//! The system is composed of several key modules:
//! - `marker`: Selection and reference marker rewriting over the raw text
//! - `context`: Sentence window extraction around a selected occurrence
//! - `footnotes`: Footnote commit/remove/renumber state machine
//! - `session`: The owning aggregate coordinating all annotation state
//! - `provider`: External definition generation service client
//! - `extract`: Uploaded document to plain text conversion
//! - `export`: Final annotated document rendering for the exporter
//! - `api`: REST API endpoints over a single annotation session
//! - `config`: Configuration management and settings
//! - `errors`: Centralized error handling and types
//!
//! ## Input/Output Specification
//! - **Input**: Plain-text documents, user term selections, provider responses
//! - **Output**: Annotated document text with contiguous footnote numbering,
//!   plus a structured export payload for downstream document rendering
//!
//! ## Usage
//! ```rust,no_run
//! use doc_annotator::{AnnotationSession, Config};
//!
//! let config = Config::from_file("config.toml")?;
//! let mut session = AnnotationSession::new(&config);
//! session.load_document("Cats are mammals. Dogs are mammals too.".to_string());
//! let word_id = session.select_word("mammals")?;
//! # Ok::<(), doc_annotator::AnnotateError>(())
//! ```

// Core modules
pub mod api;
pub mod config;
pub mod context;
pub mod errors;
pub mod export;
pub mod extract;
pub mod footnotes;
pub mod marker;
pub mod provider;
pub mod session;

// Utilities
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use errors::{AnnotateError, Result};
pub use session::AnnotationSession;

use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier for a selected word
pub type WordId = Uuid;

/// Unique identifier for a committed footnote
pub type FootnoteId = Uuid;

/// A term the user selected in the visible document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedWord {
    /// Unique selection identifier
    pub id: WordId,
    /// The selected text, exactly as it appears in the document
    pub word: String,
    /// Byte offset of the first occurrence at the time of selection
    pub position: usize,
}

/// A definition returned by the definition provider.
///
/// Immutable once received; regeneration replaces the whole value. A scalar
/// `definition` field in the provider payload is promoted to a one-element
/// list during deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordDefinition {
    /// The defined word as echoed by the provider
    pub word: String,
    /// One or more definition lines
    #[serde(rename = "definition", deserialize_with = "string_or_seq")]
    pub definition_lines: Vec<String>,
    /// A usage example sentence
    pub example: String,
}

fn string_or_seq<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrSeq {
        One(String),
        Many(Vec<String>),
    }

    Ok(match StringOrSeq::deserialize(deserializer)? {
        StringOrSeq::One(line) => vec![line],
        StringOrSeq::Many(lines) => lines,
    })
}

/// Per-word generation and footnote state.
///
/// Created when generation is first requested for a word and mutated in place
/// afterwards. Committing or removing a footnote only touches `footnote_id`;
/// the result itself is never deleted by those operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordDefinitionResult {
    /// The selection this result belongs to
    pub word_id: WordId,
    /// The selected text
    pub word: String,
    /// The generated definition, if generation has succeeded
    pub definition: Option<WordDefinition>,
    /// One flag per definition line plus one trailing flag for the example.
    /// Length is always `definition_lines.len() + 1` while a definition is
    /// present.
    pub selected_lines: Vec<bool>,
    /// Whether a generation request is currently in flight
    pub loading: bool,
    /// Retryable error message from the last failed generation
    pub error: Option<String>,
    /// The committed footnote, if any
    pub footnote_id: Option<FootnoteId>,
}

impl WordDefinitionResult {
    /// Create a fresh result in the loading state
    pub fn new_loading(word_id: WordId, word: impl Into<String>) -> Self {
        Self {
            word_id,
            word: word.into(),
            definition: None,
            selected_lines: Vec::new(),
            loading: true,
            error: None,
            footnote_id: None,
        }
    }

    /// Derive the lifecycle state of this word
    pub fn state(&self) -> WordState {
        if self.footnote_id.is_some() {
            WordState::Footnoted
        } else if self.loading {
            WordState::Defining
        } else if self.error.is_some() {
            WordState::Error
        } else if self.definition.is_some() {
            WordState::Defined
        } else {
            WordState::Selected
        }
    }
}

/// Lifecycle states of a selected word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WordState {
    /// Marked in the document, no definition requested yet
    Selected,
    /// Generation in flight
    Defining,
    /// Last generation failed; retry available
    Error,
    /// Definition available, lines can be toggled
    Defined,
    /// Committed as a numbered footnote
    Footnoted,
}

/// A committed footnote.
///
/// `position` is the footnote's current display number. It is recomputed from
/// document order after every insertion or removal and must never be treated
/// as a stable identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footnote {
    /// Unique footnote identifier
    pub id: FootnoteId,
    /// The footnoted word
    pub word: String,
    /// Rendered footnote body (may contain internal line breaks)
    pub body: String,
    /// Current display number
    pub position: usize,
}

/// Application state shared across API handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub session: Arc<tokio::sync::RwLock<AnnotationSession>>,
    pub provider: Arc<dyn provider::DefinitionProvider>,
    pub extractor: Arc<extract::TextExtractionService>,
}
