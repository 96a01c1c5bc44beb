//! # Footnote Registry Module
//!
//! ## Purpose
//! The footnote state machine. Converts selection-marked words into numbered
//! reference markers, removes them back into editable selections, and keeps
//! every footnote number contiguous and sorted by document position.
//!
//! ## Input/Output Specification
//! - **Input**: The live annotated document, footnote bodies, word ids
//! - **Output**: Rewritten document text and a renumbered footnote list
//! - **Invariants**: After every operation the reference numbers read left to
//!   right are exactly `1..=N` for N committed footnotes, and each footnote
//!   has exactly one in-document reference marker
//!
//! ## Key Features
//! - Commit prefers the selection-marked form and falls back to a
//!   boundary-matched bare word
//! - A word that cannot be located is a logged no-op, never a hard failure
//! - Renumbering is idempotent and runs after every commit and removal
//! - A footnote whose marker disappeared (externally edited text) is dropped
//!   from the numbering pass and logged under the `footnote::drop` target

use crate::marker;
use crate::{Footnote, FootnoteId, WordDefinition};
use regex::NoExpand;
use uuid::Uuid;

/// Number written into a reference marker at commit time. It is never shown:
/// renumbering assigns the real number immediately afterwards.
pub const PROVISIONAL_NUMBER: usize = 999;

/// Registry of committed footnotes and their document markers
#[derive(Debug, Default)]
pub struct FootnoteRegistry {
    footnotes: Vec<Footnote>,
}

impl FootnoteRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The committed footnotes in their current numbering order
    pub fn footnotes(&self) -> &[Footnote] {
        &self.footnotes
    }

    /// Number of committed footnotes
    pub fn len(&self) -> usize {
        self.footnotes.len()
    }

    /// Whether no footnote has been committed
    pub fn is_empty(&self) -> bool {
        self.footnotes.is_empty()
    }

    /// Look up a footnote by id
    pub fn get(&self, footnote_id: FootnoteId) -> Option<&Footnote> {
        self.footnotes.iter().find(|f| f.id == footnote_id)
    }

    /// Drop every footnote without touching the document.
    ///
    /// Only used when a new document is loaded and all state restarts.
    pub fn reset(&mut self) {
        self.footnotes.clear();
    }

    /// Commit a footnote for `word`, replacing its in-document form with a
    /// provisional reference marker and renumbering.
    ///
    /// The selection-marked form `[[word]]` is preferred; a boundary-matched
    /// bare occurrence is the fallback. Returns `None` without changing any
    /// state when the word cannot be located (stale position or text already
    /// replaced).
    pub fn commit(&mut self, document: &mut String, word: &str, body: String) -> Option<FootnoteId> {
        let replacement = marker::reference_marker(word, PROVISIONAL_NUMBER);

        let selection = marker::selection_pattern(word);
        let rewritten = if selection.is_match(document) {
            selection.replace(document, NoExpand(&replacement)).into_owned()
        } else {
            let boundary = marker::boundary_pattern(word);
            if !boundary.is_match(document) {
                tracing::warn!(word, "word not locatable in document, commit skipped");
                return None;
            }
            boundary.replace(document, NoExpand(&replacement)).into_owned()
        };
        *document = rewritten;

        let footnote = Footnote {
            id: Uuid::new_v4(),
            word: word.to_string(),
            body,
            position: PROVISIONAL_NUMBER,
        };
        let footnote_id = footnote.id;
        self.footnotes.push(footnote);

        self.renumber(document);
        Some(footnote_id)
    }

    /// Remove a committed footnote, restoring the selection-marked form so the
    /// word can be edited again, and renumber the remainder.
    ///
    /// Returns `false` when the id is unknown. A footnote whose reference
    /// marker is no longer present is still deleted from the list; the
    /// document is left as it is.
    pub fn remove(&mut self, document: &mut String, footnote_id: FootnoteId) -> bool {
        let Some(index) = self.footnotes.iter().position(|f| f.id == footnote_id) else {
            tracing::warn!(%footnote_id, "unknown footnote id, removal skipped");
            return false;
        };
        let footnote = self.footnotes.remove(index);

        let pattern = marker::reference_pattern(&footnote.word);
        if pattern.is_match(document) {
            let restored = format!(
                "{}{}{}",
                marker::SELECTION_OPEN,
                footnote.word,
                marker::SELECTION_CLOSE
            );
            *document = pattern
                .replace_all(document, NoExpand(&restored))
                .into_owned();
        } else {
            tracing::warn!(
                target: "footnote::drop",
                word = %footnote.word,
                id = %footnote.id,
                "no reference marker found for removed footnote"
            );
        }

        self.renumber(document);
        true
    }

    /// Recompute every footnote number from document position.
    ///
    /// Each reference marker is located by word plus any-number pattern and
    /// its byte offset recorded. Footnotes are stable-sorted by offset, then
    /// `position` becomes `index + 1` and each marker is rewritten with its
    /// new number. Idempotent: a consistent document comes back unchanged.
    ///
    /// A footnote whose marker cannot be located is dropped from the list.
    /// This is deliberate: the text was edited out from under the registry and
    /// there is nothing to number. The drop is logged distinctly for
    /// diagnosis.
    pub fn renumber(&mut self, document: &mut String) {
        let mut located: Vec<(Footnote, usize)> = Vec::with_capacity(self.footnotes.len());

        for footnote in self.footnotes.drain(..) {
            let pattern = marker::reference_pattern(&footnote.word);
            match pattern.find(document) {
                Some(found) => located.push((footnote, found.start())),
                None => {
                    tracing::warn!(
                        target: "footnote::drop",
                        word = %footnote.word,
                        id = %footnote.id,
                        "reference marker not locatable, footnote dropped from numbering"
                    );
                }
            }
        }

        located.sort_by_key(|(_, offset)| *offset);

        for (index, (mut footnote, _)) in located.into_iter().enumerate() {
            let number = index + 1;
            let pattern = marker::reference_pattern(&footnote.word);
            let replacement = marker::reference_marker(&footnote.word, number);
            *document = pattern.replace(document, NoExpand(&replacement)).into_owned();
            footnote.position = number;
            self.footnotes.push(footnote);
        }
    }
}

/// Build a footnote body from the definition lines the user kept selected.
///
/// The body is the word followed by one bulleted line per selected definition
/// line and, when the trailing slot is selected, an example line. Returns
/// `None` when nothing is selected: such a result must not be committed.
pub fn footnote_body(
    word: &str,
    definition: &WordDefinition,
    selected_lines: &[bool],
) -> Option<String> {
    let mut chosen: Vec<String> = definition
        .definition_lines
        .iter()
        .enumerate()
        .filter(|(index, _)| selected_lines.get(*index).copied().unwrap_or(false))
        .map(|(_, line)| line.clone())
        .collect();

    let example_slot = definition.definition_lines.len();
    if selected_lines.get(example_slot).copied().unwrap_or(false) {
        chosen.push(format!("example: {}", definition.example));
    }

    if chosen.is_empty() {
        return None;
    }

    let formatted = chosen
        .iter()
        .map(|line| format!("\u{2022} {}", line))
        .collect::<Vec<_>>()
        .join("\n");

    Some(format!("{}\n{}", word, formatted))
}

/// Read the reference numbers out of a document, left to right
pub fn reference_numbers(document: &str) -> Vec<usize> {
    let pattern = regex::Regex::new(r"<sup>(\d+)\)</sup>").unwrap();
    pattern
        .captures_iter(document)
        .filter_map(|captures| captures[1].parse().ok())
        .collect()
}
