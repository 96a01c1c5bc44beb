//! # Text Marker Module
//!
//! ## Purpose
//! Rewrites the raw document text to wrap or unwrap selected words, and builds
//! the patterns every other component uses to locate markers again.
//!
//! ## Input/Output Specification
//! - **Input**: Document text, literal user-selected words
//! - **Output**: Rewritten document text, compiled marker patterns
//! - **Matching**: Literal substring for marking; escaped, case-insensitive
//!   patterns for everything else
//!
//! ## Marker Forms
//! - Selection marker: `[[word]]` denotes a word chosen for definition but not
//!   yet footnoted.
//! - Reference marker: `word<sup>N)</sup>` carries a footnote's current
//!   display number.
//!
//! Word-boundary matching is ASCII-approximate by policy: `cat` must not match
//! inside `category`, but no language-aware segmentation is attempted. When a
//! word is already wrapped in a selection marker the brackets themselves act
//! as the boundary.

use regex::Regex;

/// Opening delimiter of the selection marker
pub const SELECTION_OPEN: &str = "[[";
/// Closing delimiter of the selection marker
pub const SELECTION_CLOSE: &str = "]]";

/// Wrap the first occurrence of `word` in a selection marker.
///
/// Matching is literal and case-sensitive, first occurrence only by policy.
/// Returns the document unchanged when the word does not occur.
pub fn mark(document: &str, word: &str) -> String {
    match document.find(word) {
        Some(index) => {
            let mut marked = String::with_capacity(
                document.len() + SELECTION_OPEN.len() + SELECTION_CLOSE.len(),
            );
            marked.push_str(&document[..index]);
            marked.push_str(SELECTION_OPEN);
            marked.push_str(word);
            marked.push_str(SELECTION_CLOSE);
            marked.push_str(&document[index + word.len()..]);
            marked
        }
        None => document.to_string(),
    }
}

/// Replace every selection-marked occurrence of `word` with the bare word.
///
/// Used when a selection is cancelled. Matching is case-insensitive so a
/// marker survives casing drift between the stored word and the document.
pub fn unmark(document: &str, word: &str) -> String {
    selection_pattern(word)
        .replace_all(document, regex::NoExpand(word))
        .into_owned()
}

/// Pattern matching the selection-marked form `[[word]]`, case-insensitively
pub fn selection_pattern(word: &str) -> Regex {
    compile(&format!(r"(?i)\[\[{}\]\]", regex::escape(word)))
}

/// Pattern matching the bare word at ASCII word boundaries, case-insensitively
pub fn boundary_pattern(word: &str) -> Regex {
    compile(&format!(
        r"(?i)(?-u:\b){}(?-u:\b)",
        regex::escape(word)
    ))
}

/// Pattern matching the word's reference marker with any number
pub fn reference_pattern(word: &str) -> Regex {
    compile(&format!(
        r"(?i){}<sup>\d+\)</sup>",
        regex::escape(word)
    ))
}

/// Render a reference marker carrying the given footnote number
pub fn reference_marker(word: &str, number: usize) -> String {
    format!("{}<sup>{})</sup>", word, number)
}

// User text is escaped before compilation, so these patterns are always valid.
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_wraps_first_occurrence_only() {
        let document = "Cats are mammals. Dogs are mammals too.";
        let marked = mark(document, "mammals");
        assert_eq!(marked, "Cats are [[mammals]]. Dogs are mammals too.");
    }

    #[test]
    fn test_mark_is_noop_when_absent() {
        let document = "Nothing to see here.";
        assert_eq!(mark(document, "unicorn"), document);
    }

    #[test]
    fn test_mark_then_unmark_restores_original_bytes() {
        let document = "Cats are mammals. Dogs are mammals too.";
        let marked = mark(document, "mammals");
        assert_eq!(unmark(&marked, "mammals"), document);
    }

    #[test]
    fn test_unmark_removes_all_markers_case_insensitively() {
        let document = "[[Term]] and [[term]] both marked.";
        assert_eq!(unmark(document, "term"), "term and term both marked.");
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let document = "The a+b term repeats: a+b again.";
        let marked = mark(document, "a+b");
        assert_eq!(marked, "The [[a+b]] term repeats: a+b again.");
        assert_eq!(unmark(&marked, "a+b"), document);
    }

    #[test]
    fn test_boundary_pattern_rejects_substrings() {
        let pattern = boundary_pattern("cat");
        assert!(pattern.is_match("a cat sat"));
        assert!(!pattern.is_match("a category error"));
    }

    #[test]
    fn test_reference_pattern_matches_any_number() {
        let pattern = reference_pattern("term");
        assert!(pattern.is_match("term<sup>3)</sup>"));
        assert!(pattern.is_match("term<sup>42)</sup>"));
        assert!(!pattern.is_match("term<sup>)</sup>"));
    }

    #[test]
    fn test_reference_marker_round_trip() {
        let marker = reference_marker("term", 7);
        assert!(reference_pattern("term").is_match(&marker));
    }
}
