//! # Export Rendering Module
//!
//! ## Purpose
//! Deterministic render step from the live annotated document into the typed
//! payload the downstream document exporter consumes. Selection markers are
//! stripped (only committed footnotes survive an export), reference markers
//! become a distinct inline run type the exporter can style as superscript,
//! and the footnote section is sorted by display number.
//!
//! ## Input/Output Specification
//! - **Input**: Annotated document text, committed footnote list
//! - **Output**: Paragraphs of inline runs plus sorted footnote entries
//! - **Guarantee**: A single parse step; the exporter never sees raw marker
//!   syntax

use crate::Footnote;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// One inline fragment of a rendered paragraph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InlineRun {
    /// Plain body text
    Text { text: String },
    /// A footnote reference, rendered as a superscript number
    FootnoteRef { number: usize },
}

/// One footnote entry in the export, already in display order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportFootnote {
    /// Display number
    pub position: usize,
    /// Footnote body; may contain internal line breaks
    pub body: String,
}

/// The complete export payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDocument {
    /// Body paragraphs as sequences of typed inline runs
    pub paragraphs: Vec<Vec<InlineRun>>,
    /// Footnotes sorted by display number
    pub footnotes: Vec<ExportFootnote>,
}

/// Render the annotated document and footnote list into the export payload
pub fn render(annotated: &str, footnotes: &[Footnote]) -> ExportDocument {
    let selection = Regex::new(r"\[\[([^\]]+)\]\]").unwrap();
    let clean = selection.replace_all(annotated, "$1");

    let reference = Regex::new(r"<sup>(\d+)\)</sup>").unwrap();

    let paragraphs = clean
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(|line| split_runs(&reference, line.trim()))
        .collect();

    let mut entries: Vec<ExportFootnote> = footnotes
        .iter()
        .map(|f| ExportFootnote {
            position: f.position,
            body: f.body.clone(),
        })
        .collect();
    entries.sort_by_key(|entry| entry.position);

    ExportDocument {
        paragraphs,
        footnotes: entries,
    }
}

/// Split one paragraph into text and reference runs
fn split_runs(reference: &Regex, line: &str) -> Vec<InlineRun> {
    let mut runs = Vec::new();
    let mut cursor = 0usize;

    for captures in reference.captures_iter(line) {
        let matched = captures.get(0).unwrap();
        let text = &line[cursor..matched.start()];
        if !text.trim().is_empty() {
            runs.push(InlineRun::Text {
                text: text.to_string(),
            });
        }
        if let Ok(number) = captures[1].parse() {
            runs.push(InlineRun::FootnoteRef { number });
        }
        cursor = matched.end();
    }

    let tail = &line[cursor..];
    if !tail.trim().is_empty() {
        runs.push(InlineRun::Text {
            text: tail.to_string(),
        });
    }

    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn footnote(word: &str, position: usize) -> Footnote {
        Footnote {
            id: Uuid::new_v4(),
            word: word.to_string(),
            body: format!("{}\n\u{2022} a sense", word),
            position,
        }
    }

    #[test]
    fn test_reference_markers_become_typed_runs() {
        let export = render("A term<sup>1)</sup> in text.", &[footnote("term", 1)]);

        assert_eq!(export.paragraphs.len(), 1);
        assert_eq!(
            export.paragraphs[0],
            vec![
                InlineRun::Text {
                    text: "A term".to_string()
                },
                InlineRun::FootnoteRef { number: 1 },
                InlineRun::Text {
                    text: " in text.".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_selection_markers_are_stripped() {
        let export = render("Still [[pending]] selection here.", &[]);
        assert_eq!(
            export.paragraphs[0],
            vec![InlineRun::Text {
                text: "Still pending selection here.".to_string()
            }]
        );
    }

    #[test]
    fn test_paragraphs_split_on_line_breaks() {
        let export = render("First paragraph.\n\nSecond paragraph.", &[]);
        assert_eq!(export.paragraphs.len(), 2);
    }

    #[test]
    fn test_footnotes_are_sorted_by_position() {
        let export = render(
            "alpha<sup>1)</sup> beta<sup>2)</sup>",
            &[footnote("beta", 2), footnote("alpha", 1)],
        );
        let positions: Vec<usize> = export.footnotes.iter().map(|f| f.position).collect();
        assert_eq!(positions, vec![1, 2]);
    }

    #[test]
    fn test_body_line_breaks_survive_export() {
        let entry = footnote("term", 1);
        let export = render("term<sup>1)</sup>", std::slice::from_ref(&entry));
        assert!(export.footnotes[0].body.contains('\n'));
    }

    #[test]
    fn test_payload_serializes_with_tagged_runs() {
        let export = render("A term<sup>3)</sup>.", &[footnote("term", 3)]);
        let json = serde_json::to_string(&export).unwrap();
        assert!(json.contains("\"kind\":\"footnote_ref\""));
        assert!(json.contains("\"number\":3"));
    }
}
