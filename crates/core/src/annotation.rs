//! Commit-message annotation codec.
//!
//! Per-card change rationale travels inside free-text commit messages as a
//! delimited block:
//!
//! ```text
//! Tune the burn package
//!
//! --- Card Changes ---
//! + Skewer the Critics: more reach
//! ~ Lightning Bolt (2 → 4)
//! - Shock: strictly worse
//! ```
//!
//! The block format is a wire format shared with every historical commit in a
//! deck repository; the marker line and line shapes must not change. The
//! round-trip law `parse(format(A)) == A` holds for well-formed annotation
//! lists: count transitions only on modifications, and card ids are advisory
//! (they are not encoded, so parsed annotations carry `card_id: None`).

use regex_lite::Regex;
use std::sync::OnceLock;
use tracing::warn;

use crate::diff::DeckDiff;
use crate::errors::CodecError;
use crate::models::{AnnotatedCommit, CardChangeAnnotation, ChangeType, Commit};

/// Marker line separating the human summary from the annotation block.
pub const ANNOTATION_MARKER: &str = "--- Card Changes ---";

/// Message prefix identifying algorithmically generated commits.
pub const AUTOSAVE_PREFIX: &str = "Auto-save: ";

/// A commit message split into its human summary and structured annotations.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMessage {
    pub summary: String,
    pub annotations: Vec<CardChangeAnnotation>,
}

fn symbol(change_type: ChangeType) -> char {
    match change_type {
        ChangeType::Added => '+',
        ChangeType::Removed => '-',
        ChangeType::Modified => '~',
    }
}

fn change_type_for(symbol: &str) -> ChangeType {
    match symbol {
        "+" => ChangeType::Added,
        "-" => ChangeType::Removed,
        _ => ChangeType::Modified,
    }
}

fn line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([+\-~]) (.*?)(?: \((\d+) → (\d+)\))?(?:: (.*))?$")
            .expect("annotation line pattern is valid")
    })
}

/// Encode annotations as the delimited block (marker line included).
pub fn format_annotations(annotations: &[CardChangeAnnotation]) -> String {
    let mut out = String::from(ANNOTATION_MARKER);
    for ann in annotations {
        out.push('\n');
        out.push(symbol(ann.change_type));
        out.push(' ');
        out.push_str(&ann.card_name);
        if ann.change_type == ChangeType::Modified {
            if let (Some(old), Some(new)) = (ann.old_count, ann.new_count) {
                out.push_str(&format!(" ({old} → {new})"));
            }
        }
        if let Some(reason) = &ann.reason {
            out.push_str(": ");
            out.push_str(reason);
        }
    }
    out
}

/// Append an annotation block to a human message. An empty annotation list
/// returns the message unchanged.
pub fn append_annotations(message: &str, annotations: &[CardChangeAnnotation]) -> String {
    if annotations.is_empty() {
        return message.to_string();
    }
    format!(
        "{}\n\n{}",
        message.trim_end(),
        format_annotations(annotations)
    )
}

/// Split a commit message into summary and annotations.
///
/// Messages without the marker parse to an empty annotation list with the
/// whole message as summary. A nonempty line inside the block that matches no
/// known pattern is a [`CodecError::MalformedLine`].
///
/// Card names are not escaped on the wire, so a name containing `": "` is
/// indistinguishable from a reason suffix; the text after the first `": "`
/// parses as the reason.
pub fn parse_message(message: &str) -> Result<ParsedMessage, CodecError> {
    let Some(pos) = message.find(ANNOTATION_MARKER) else {
        return Ok(ParsedMessage {
            summary: message.trim().to_string(),
            annotations: Vec::new(),
        });
    };

    let summary = message[..pos].trim().to_string();
    let block = &message[pos + ANNOTATION_MARKER.len()..];

    let mut annotations = Vec::new();
    for line in block.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let caps = line_pattern()
            .captures(line)
            .ok_or_else(|| CodecError::MalformedLine { line: line.into() })?;

        let change_type = change_type_for(caps.get(1).map_or("", |m| m.as_str()));
        let old_count = caps.get(3).and_then(|m| m.as_str().parse().ok());
        let new_count = caps.get(4).and_then(|m| m.as_str().parse().ok());
        annotations.push(CardChangeAnnotation {
            card_id: None,
            card_name: caps.get(2).map_or("", |m| m.as_str()).to_string(),
            change_type,
            old_count,
            new_count,
            reason: caps.get(5).map(|m| m.as_str().to_string()),
        });
    }

    Ok(ParsedMessage {
        summary,
        annotations,
    })
}

/// Derive annotations (without rationale) from a computed diff. The UI layer
/// attaches per-card reasons on top before committing.
pub fn annotations_from_diff(diff: &DeckDiff) -> Vec<CardChangeAnnotation> {
    let mut annotations = Vec::new();
    for card in &diff.added {
        annotations.push(CardChangeAnnotation::added(&card.name).with_card_id(&card.id));
    }
    for card in &diff.removed {
        annotations.push(CardChangeAnnotation::removed(&card.name).with_card_id(&card.id));
    }
    for change in &diff.modified {
        annotations.push(
            CardChangeAnnotation::modified(&change.card.name, change.old_count, change.new_count)
                .with_card_id(&change.card.id),
        );
    }
    annotations
}

impl AnnotatedCommit {
    /// Split a stored commit into summary and annotations.
    ///
    /// Total over arbitrary history: a malformed annotation block degrades to
    /// a summary-only view rather than failing the caller.
    pub fn from_commit(commit: Commit) -> Self {
        match parse_message(&commit.message) {
            Ok(parsed) => Self {
                summary: parsed.summary,
                card_annotations: parsed.annotations,
                commit,
            },
            Err(e) => {
                warn!(sha = %commit.sha, error = %e, "malformed annotation block, keeping raw message");
                Self {
                    summary: commit.message.clone(),
                    card_annotations: Vec::new(),
                    commit,
                }
            }
        }
    }
}
