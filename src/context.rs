//! # Context Extraction Module
//!
//! ## Purpose
//! Derives a bounded sentence window around a selected word occurrence so the
//! definition provider sees enough surrounding text to pick the right sense.
//!
//! ## Input/Output Specification
//! - **Input**: Original document text, target word, its recorded byte offset
//! - **Output**: A window of sentences with the target occurrence re-marked
//! - **Guarantee**: The output contains at most one selection-marked
//!   occurrence; a failed re-mark returns the window unmarked rather than
//!   failing
//!
//! Sentence splitting is deliberately simple: runs of `.`, `!`, `?` are one
//! delimiter and blank fragments are discarded. This is an approximation, not
//! NLP segmentation.

use crate::config::ContextConfig;
use crate::marker;
use regex::Regex;

/// Sentence window extractor
pub struct ContextExtractor {
    config: ContextConfig,
    sentence_splitter: Regex,
}

impl ContextExtractor {
    /// Create a new extractor
    pub fn new(config: ContextConfig) -> Self {
        Self {
            config,
            sentence_splitter: Regex::new(r"[.!?]+").unwrap(),
        }
    }

    /// Extract a sentence window around the occurrence of `word` at `position`.
    ///
    /// Walks the split sentences accumulating character offsets to find the
    /// sentence containing `position`. A stale position that lands in no
    /// sentence falls back to the leading sentences of the document. The
    /// first boundary-matched occurrence of the word inside the target
    /// sentence (only) is wrapped in the selection marker.
    pub fn extract(&self, document: &str, word: &str, position: usize) -> String {
        let sentences: Vec<&str> = self
            .sentence_splitter
            .split(document)
            .filter(|sentence| !sentence.trim().is_empty())
            .collect();

        let target = self.locate_sentence(&sentences, position);

        let Some(target) = target else {
            tracing::debug!(
                word,
                position,
                "position outside all sentences, using leading fallback window"
            );
            return sentences
                .iter()
                .take(self.config.fallback_sentences)
                .copied()
                .collect::<Vec<_>>()
                .join(". ");
        };

        let start = target.saturating_sub(self.config.window_sentences);
        let end = (target + self.config.window_sentences + 1).min(sentences.len());

        let mut window: Vec<String> = sentences[start..end]
            .iter()
            .map(|s| s.to_string())
            .collect();

        // Only the target sentence gets the marker so the provider knows which
        // occurrence is meant.
        let relative = target - start;
        let boundary = marker::boundary_pattern(word);
        if let Some(matched) = boundary.find(&window[relative]) {
            let mut remarked = String::with_capacity(window[relative].len() + 4);
            remarked.push_str(&window[relative][..matched.start()]);
            remarked.push_str(marker::SELECTION_OPEN);
            remarked.push_str(word);
            remarked.push_str(marker::SELECTION_CLOSE);
            remarked.push_str(&window[relative][matched.end()..]);
            window[relative] = remarked;
        } else {
            tracing::debug!(word, "boundary match failed, returning unmarked context");
        }

        window.join(". ")
    }

    /// Find the index of the sentence whose span contains `position`.
    ///
    /// Offsets assume a single delimiter character between sentences, matching
    /// the splitter's common case. The fallback path absorbs the imprecision.
    fn locate_sentence(&self, sentences: &[&str], position: usize) -> Option<usize> {
        let mut current = 0usize;
        for (index, sentence) in sentences.iter().enumerate() {
            let sentence_end = current + sentence.len();
            if position >= current && position <= sentence_end {
                return Some(index);
            }
            current = sentence_end + 1;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> ContextExtractor {
        ContextExtractor::new(ContextConfig {
            window_sentences: 3,
            fallback_sentences: 7,
        })
    }

    const DOCUMENT: &str = "Cats are mammals. Dogs are mammals too. Birds can fly.";

    #[test]
    fn test_window_includes_surrounding_sentences() {
        let position = DOCUMENT.find("mammals").unwrap();
        let context = extractor().extract(DOCUMENT, "mammals", position);

        assert!(context.starts_with("Cats are [[mammals]]"));
        assert!(context.contains("Dogs are mammals too"));
        assert!(context.contains("Birds can fly"));
    }

    #[test]
    fn test_exactly_one_marked_occurrence() {
        let position = DOCUMENT.find("mammals").unwrap();
        let context = extractor().extract(DOCUMENT, "mammals", position);
        assert_eq!(context.matches("[[").count(), 1);
    }

    #[test]
    fn test_marks_occurrence_in_target_sentence_only() {
        let position = DOCUMENT.find("Dogs").unwrap() + "Dogs are ".len();
        let context = extractor().extract(DOCUMENT, "mammals", position);
        // The second sentence is the target, so its occurrence gets the marker
        // even though the first sentence also contains the word.
        assert!(context.contains("Dogs are [[mammals]] too"));
        assert!(context.contains("Cats are mammals"));
        assert_eq!(context.matches("[[").count(), 1);
    }

    #[test]
    fn test_window_is_clamped_to_document_bounds() {
        let many: String = (1..=10)
            .map(|i| format!("Sentence number {} here.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let position = many.find("number 9").unwrap();
        let context = extractor().extract(&many, "number", position);

        // Three before the target plus the tail of the document.
        assert!(context.contains("Sentence number 6"));
        assert!(context.contains("Sentence number 10"));
        assert!(!context.contains("Sentence number 5 "));
    }

    #[test]
    fn test_stale_position_falls_back_to_leading_sentences() {
        let context = extractor().extract(DOCUMENT, "mammals", 10_000);
        assert!(context.contains("Cats are mammals"));
        assert!(context.contains("Birds can fly"));
        // Fallback never marks an occurrence.
        assert_eq!(context.matches("[[").count(), 0);
    }

    #[test]
    fn test_failed_boundary_match_returns_unmarked_window() {
        let document = "The catalogue lists everything. It is long.";
        // "cat" occurs only inside "catalogue", so the boundary match fails.
        let context = extractor().extract(document, "cat", 4);
        assert!(context.contains("catalogue"));
        assert_eq!(context.matches("[[").count(), 0);
    }

    #[test]
    fn test_delimiter_runs_collapse() {
        let document = "Wait... what happened?! Nothing did.";
        let position = document.find("what").unwrap();
        let context = extractor().extract(document, "what", position);
        assert!(context.contains("[[what]]"));
        assert!(!context.contains("..."));
    }
}
