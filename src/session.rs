//! # Annotation Session Module
//!
//! ## Purpose
//! The single owning aggregate for all annotation state: the authoritative
//! document string, the selected words, their definition results, and the
//! footnote registry. Every structural mutation goes through a method on this
//! type, applies atomically against the latest state, and leaves the invariant
//! set intact. No intermediate document is ever observable.
//!
//! ## Input/Output Specification
//! - **Input**: Loaded document text, user selections, provider outcomes
//! - **Output**: The live annotated document, per-word states, footnotes,
//!   and the export payload
//!
//! ## Concurrency
//! Structural mutations are synchronous and exclusive. Definition generation
//! is split into three phases so callers holding the session behind a lock can
//! release it while provider calls are in flight: `begin_generation*`
//! snapshots contexts and flips words into the loading state,
//! the provider calls run against those snapshots, and `apply_generation`
//! folds each outcome back in. A result arriving for a word deselected in the
//! meantime is discarded by a presence check instead of resurrecting the
//! entry.

use crate::config::{ClearBehavior, Config, ContextConfig};
use crate::context::ContextExtractor;
use crate::errors::{AnnotateError, Result};
use crate::export::{self, ExportDocument};
use crate::footnotes::{self, FootnoteRegistry};
use crate::marker;
use crate::provider::{DefinitionProvider, DefinitionRequest};
use crate::{Footnote, SelectedWord, WordDefinition, WordDefinitionResult, WordId, WordState};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Everything the session needs from the application configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub max_selection_chars: usize,
    pub clear_behavior: ClearBehavior,
    pub context: ContextConfig,
}

impl From<&Config> for SessionConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_selection_chars: config.annotation.max_selection_chars,
            clear_behavior: config.annotation.clear_behavior,
            context: config.context.clone(),
        }
    }
}

/// A snapshot handed to the definition provider for one word
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub word_id: WordId,
    pub word: String,
    pub context: String,
}

/// Serializable view of the whole session for API responses
#[derive(Debug, Serialize)]
pub struct SessionSnapshot {
    pub has_document: bool,
    pub annotated: String,
    pub selections: Vec<SelectedWord>,
    pub results: Vec<WordDefinitionResult>,
    pub footnotes: Vec<Footnote>,
    pub loaded_at: Option<DateTime<Utc>>,
}

/// The annotation session aggregate
pub struct AnnotationSession {
    config: SessionConfig,
    extractor: ContextExtractor,
    /// The document as loaded, used for sentence context so markers never
    /// corrupt the splitting
    original: String,
    /// The live annotated document carrying selection and reference markers
    annotated: String,
    selections: Vec<SelectedWord>,
    results: Vec<WordDefinitionResult>,
    registry: FootnoteRegistry,
    loaded_at: Option<DateTime<Utc>>,
}

impl AnnotationSession {
    /// Create an empty session
    pub fn new(config: &Config) -> Self {
        Self::with_config(SessionConfig::from(config))
    }

    /// Create an empty session from a session-level configuration
    pub fn with_config(config: SessionConfig) -> Self {
        let extractor = ContextExtractor::new(config.context.clone());
        Self {
            config,
            extractor,
            original: String::new(),
            annotated: String::new(),
            selections: Vec::new(),
            results: Vec::new(),
            registry: FootnoteRegistry::new(),
            loaded_at: None,
        }
    }

    /// Replace the working document, resetting all annotation state
    pub fn load_document(&mut self, text: String) {
        tracing::info!(chars = text.len(), "document loaded");
        self.original = text.clone();
        self.annotated = text;
        self.selections.clear();
        self.results.clear();
        self.registry.reset();
        self.loaded_at = Some(Utc::now());
    }

    /// Whether a document has been loaded
    pub fn has_document(&self) -> bool {
        self.loaded_at.is_some()
    }

    /// The document as originally loaded
    pub fn original(&self) -> &str {
        &self.original
    }

    /// The live annotated document
    pub fn annotated(&self) -> &str {
        &self.annotated
    }

    /// Currently selected words
    pub fn selections(&self) -> &[SelectedWord] {
        &self.selections
    }

    /// Per-word definition results
    pub fn results(&self) -> &[WordDefinitionResult] {
        &self.results
    }

    /// Committed footnotes
    pub fn footnotes(&self) -> &[Footnote] {
        self.registry.footnotes()
    }

    /// Serializable view of the session
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            has_document: self.has_document(),
            annotated: self.annotated.clone(),
            selections: self.selections.clone(),
            results: self.results.clone(),
            footnotes: self.registry.footnotes().to_vec(),
            loaded_at: self.loaded_at,
        }
    }

    /// Derive the lifecycle state of a word
    pub fn word_state(&self, word_id: WordId) -> Option<WordState> {
        if let Some(result) = self.results.iter().find(|r| r.word_id == word_id) {
            return Some(result.state());
        }
        self.selections
            .iter()
            .find(|w| w.id == word_id)
            .map(|_| WordState::Selected)
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Select a span of visible text for annotation.
    ///
    /// Rejects empty or oversized selections and text that is already
    /// selected (case-sensitive exact match). The first occurrence in the
    /// live document is wrapped in the selection marker; `Ok(None)` means the
    /// text could not be found, which leaves all state unchanged.
    pub fn select_word(&mut self, raw_selection: &str) -> Result<Option<WordId>> {
        let selection = raw_selection.trim();

        if selection.is_empty() {
            return Err(AnnotateError::validation(
                "selection",
                "selection is empty",
            ));
        }

        let length = selection.chars().count();
        if length > self.config.max_selection_chars {
            return Err(AnnotateError::validation(
                "selection",
                format!(
                    "selection is {} characters, maximum is {}",
                    length, self.config.max_selection_chars
                ),
            ));
        }

        if self.selections.iter().any(|w| w.word == selection) {
            return Err(AnnotateError::validation(
                "selection",
                format!("'{}' is already selected", selection),
            ));
        }

        let Some(position) = self.annotated.find(selection) else {
            tracing::debug!(word = selection, "selection not present in document");
            return Ok(None);
        };

        self.annotated = marker::mark(&self.annotated, selection);

        let word = SelectedWord {
            id: Uuid::new_v4(),
            word: selection.to_string(),
            position,
        };
        let word_id = word.id;
        self.selections.push(word);

        tracing::debug!(word = selection, %word_id, position, "word selected");
        Ok(Some(word_id))
    }

    /// Drop a selection, restoring the bare word in the document.
    ///
    /// A word that already carries a footnote first has that footnote removed
    /// so no orphaned reference marker survives the deselection. Returns
    /// `false` for an unknown id.
    pub fn deselect_word(&mut self, word_id: WordId) -> bool {
        let Some(index) = self.selections.iter().position(|w| w.id == word_id) else {
            return false;
        };

        if let Some(footnote_id) = self
            .results
            .iter()
            .find(|r| r.word_id == word_id)
            .and_then(|r| r.footnote_id)
        {
            self.registry.remove(&mut self.annotated, footnote_id);
        }

        let word = self.selections.remove(index);
        self.annotated = marker::unmark(&self.annotated, &word.word);
        self.results.retain(|r| r.word_id != word_id);

        tracing::debug!(word = %word.word, %word_id, "word deselected");
        true
    }

    /// Clear every selection and result.
    ///
    /// What happens to words that already carry a footnote depends on the
    /// configured behavior: `KeepFootnotes` leaves their markers and the
    /// footnote list alone (a cleared word may still have a live footnote),
    /// `RestoreFootnotes` removes every footnote first so the document returns
    /// to plain text.
    pub fn clear_all(&mut self) {
        if self.config.clear_behavior == ClearBehavior::RestoreFootnotes {
            let footnote_ids: Vec<_> = self
                .results
                .iter()
                .filter_map(|r| r.footnote_id)
                .collect();
            for footnote_id in footnote_ids {
                self.registry.remove(&mut self.annotated, footnote_id);
            }
        }

        for word in &self.selections {
            self.annotated = marker::unmark(&self.annotated, &word.word);
        }

        let cleared = self.selections.len();
        self.selections.clear();
        self.results.clear();
        tracing::debug!(cleared, behavior = ?self.config.clear_behavior, "selections cleared");
    }

    // ------------------------------------------------------------------
    // Definition line selection
    // ------------------------------------------------------------------

    /// Flip whether definition line `index` is included in the footnote body.
    ///
    /// Index `definition_lines.len()` is the example slot. The toggle is
    /// rejected once the word is footnoted; an out-of-range index is a
    /// programming error and panics.
    pub fn toggle_line(&mut self, word_id: WordId, index: usize) -> Result<()> {
        let result = self
            .results
            .iter_mut()
            .find(|r| r.word_id == word_id)
            .ok_or(AnnotateError::WordNotFound { word_id })?;

        if result.footnote_id.is_some() {
            return Err(AnnotateError::validation(
                "selected_lines",
                "definition is read-only once the word is footnoted",
            ));
        }

        if result.definition.is_none() {
            return Err(AnnotateError::validation(
                "selected_lines",
                "no definition has been generated for this word",
            ));
        }

        result.selected_lines[index] = !result.selected_lines[index];
        Ok(())
    }

    // ------------------------------------------------------------------
    // Definition generation
    // ------------------------------------------------------------------

    /// Put one word into the loading state and snapshot its provider request.
    ///
    /// The sentence context is computed from the original document and the
    /// offset recorded at selection time, so markers already present in the
    /// live document never corrupt the sentence splitting.
    pub fn begin_generation(&mut self, word_id: WordId) -> Result<GenerationRequest> {
        let word = self
            .selections
            .iter()
            .find(|w| w.id == word_id)
            .cloned()
            .ok_or(AnnotateError::WordNotFound { word_id })?;

        if let Some(result) = self.results.iter().find(|r| r.word_id == word_id) {
            if result.footnote_id.is_some() {
                return Err(AnnotateError::validation(
                    "word",
                    "word is already footnoted; remove the footnote to regenerate",
                ));
            }
        }

        match self.results.iter_mut().find(|r| r.word_id == word_id) {
            Some(result) => {
                result.loading = true;
                result.error = None;
            }
            None => self
                .results
                .push(WordDefinitionResult::new_loading(word_id, &word.word)),
        }

        let context = self
            .extractor
            .extract(&self.original, &word.word, word.position);

        Ok(GenerationRequest {
            word_id,
            word: word.word,
            context,
        })
    }

    /// Begin generation for every word that is not already footnoted
    pub fn begin_generation_all(&mut self) -> Vec<GenerationRequest> {
        let word_ids: Vec<WordId> = self
            .selections
            .iter()
            .map(|w| w.id)
            .filter(|id| {
                self.results
                    .iter()
                    .find(|r| r.word_id == *id)
                    .map_or(true, |r| r.footnote_id.is_none())
            })
            .collect();

        word_ids
            .into_iter()
            .filter_map(|word_id| self.begin_generation(word_id).ok())
            .collect()
    }

    /// Fold one provider outcome back into the session.
    ///
    /// Returns `false` when the word was deselected while the call was in
    /// flight; the late result is discarded rather than resurrecting the
    /// entry.
    pub fn apply_generation(
        &mut self,
        word_id: WordId,
        outcome: Result<WordDefinition>,
    ) -> bool {
        let Some(result) = self.results.iter_mut().find(|r| r.word_id == word_id) else {
            tracing::debug!(%word_id, "discarding late definition for deselected word");
            return false;
        };

        result.loading = false;
        match outcome {
            Ok(definition) => {
                result.selected_lines = vec![true; definition.definition_lines.len() + 1];
                result.definition = Some(definition);
                result.error = None;
            }
            Err(error) => {
                tracing::warn!(%word_id, word = %result.word, %error, "definition generation failed");
                result.error = Some(error.to_string());
            }
        }
        true
    }

    /// Generate a definition for one word against the given provider
    pub async fn generate_one(
        &mut self,
        provider: &dyn DefinitionProvider,
        word_id: WordId,
    ) -> Result<()> {
        let request = self.begin_generation(word_id)?;
        let outcome = provider
            .define(DefinitionRequest {
                context_text: request.context,
                word: request.word,
            })
            .await;
        self.apply_generation(word_id, outcome);
        Ok(())
    }

    /// Generate definitions for every eligible word concurrently.
    ///
    /// Each provider call is independent: one failure marks only its own
    /// word, the rest complete normally.
    pub async fn generate_all(&mut self, provider: &dyn DefinitionProvider) -> usize {
        let requests = self.begin_generation_all();
        let total = requests.len();

        let calls = requests.into_iter().map(|request| async move {
            let outcome = provider
                .define(DefinitionRequest {
                    context_text: request.context,
                    word: request.word,
                })
                .await;
            (request.word_id, outcome)
        });

        let outcomes = futures::future::join_all(calls).await;
        for (word_id, outcome) in outcomes {
            self.apply_generation(word_id, outcome);
        }
        total
    }

    // ------------------------------------------------------------------
    // Footnotes
    // ------------------------------------------------------------------

    /// Commit a word's selected definition lines as a numbered footnote.
    ///
    /// Requires a generated definition with at least one line selected.
    /// Returns `Ok(false)` when the word cannot be located in the document,
    /// which changes nothing.
    pub fn commit_footnote(&mut self, word_id: WordId) -> Result<bool> {
        let index = self
            .results
            .iter()
            .position(|r| r.word_id == word_id)
            .ok_or(AnnotateError::WordNotFound { word_id })?;

        let result = &self.results[index];
        if result.footnote_id.is_some() {
            return Err(AnnotateError::validation(
                "word",
                "word already carries a footnote",
            ));
        }

        let definition = result.definition.as_ref().ok_or_else(|| {
            AnnotateError::validation("word", "no definition has been generated for this word")
        })?;

        let body = footnotes::footnote_body(&result.word, definition, &result.selected_lines)
            .ok_or_else(|| {
                AnnotateError::validation(
                    "selected_lines",
                    "at least one definition line must be selected",
                )
            })?;

        let word = result.word.clone();
        match self.registry.commit(&mut self.annotated, &word, body) {
            Some(footnote_id) => {
                self.results[index].footnote_id = Some(footnote_id);
                tracing::info!(word = %word, %footnote_id, "footnote committed");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove a word's footnote, restoring its selection-marked form.
    ///
    /// The word drops back to the defined state with its lines editable
    /// again. Returns `Ok(false)` when the registry no longer knows the
    /// footnote; the dangling reference on the result is cleared either way.
    pub fn remove_footnote(&mut self, word_id: WordId) -> Result<bool> {
        let result = self
            .results
            .iter_mut()
            .find(|r| r.word_id == word_id)
            .ok_or(AnnotateError::WordNotFound { word_id })?;

        let Some(footnote_id) = result.footnote_id.take() else {
            return Err(AnnotateError::validation(
                "word",
                "word does not carry a footnote",
            ));
        };

        let removed = self.registry.remove(&mut self.annotated, footnote_id);
        if removed {
            tracing::info!(%word_id, %footnote_id, "footnote removed");
        }
        Ok(removed)
    }

    /// Recompute footnote numbering by document position.
    ///
    /// Manual counterpart of the renumbering that runs after every commit and
    /// removal; produces no change when numbering is already consistent.
    pub fn renumber_footnotes(&mut self) {
        self.registry.renumber(&mut self.annotated);
    }

    /// Render the export payload for the downstream document exporter
    pub fn export(&self) -> ExportDocument {
        export::render(&self.annotated, self.registry.footnotes())
    }
}
