//! Structural deck diffing.
//!
//! [`compute_diff`] compares two deck snapshots; [`DiffWorker`] offloads the
//! comparison of large decks to a background task so the caller's execution
//! context never blocks.

pub mod engine;
pub mod offload;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{DeckCard, SlotKind};

pub use engine::compute_diff;
pub use offload::{DiffWorker, OFFLOAD_THRESHOLD};

/// A main-zone count change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountChange {
    pub card: DeckCard,
    pub old_count: u32,
    pub new_count: u32,
}

/// A special-slot occupant change, including transitions to/from empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotChange {
    pub old: Option<DeckCard>,
    pub new: Option<DeckCard>,
}

/// The structural difference between two deck snapshots.
///
/// Applying a diff to the deck it was computed *from* reproduces the deck it
/// was computed *against*, exactly (see [`crate::conflict::apply_diff`]).
/// Cards whose counts are equal on both sides never appear.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckDiff {
    #[serde(default)]
    pub added: Vec<DeckCard>,
    #[serde(default)]
    pub removed: Vec<DeckCard>,
    #[serde(default)]
    pub modified: Vec<CountChange>,
    #[serde(default)]
    pub special_slots: BTreeMap<SlotKind, SlotChange>,
}

impl DeckDiff {
    /// True when the diff records no change at all.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.modified.is_empty()
            && self.special_slots.is_empty()
    }

    /// Number of entries across all sections.
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len() + self.special_slots.len()
    }

    /// Human one-line summary, used for auto-save commit messages.
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no changes".to_string();
        }
        let mut parts = Vec::new();
        if !self.added.is_empty() {
            parts.push(format!("{} added", self.added.len()));
        }
        if !self.removed.is_empty() {
            parts.push(format!("{} removed", self.removed.len()));
        }
        if !self.modified.is_empty() {
            parts.push(format!("{} adjusted", self.modified.len()));
        }
        if !self.special_slots.is_empty() {
            let slots: Vec<String> = self
                .special_slots
                .keys()
                .map(|k| k.to_string())
                .collect();
            parts.push(format!("{} changed", slots.join("/")));
        }
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_diff_summary() {
        assert_eq!(DeckDiff::default().summary(), "no changes");
        assert!(DeckDiff::default().is_empty());
    }

    #[test]
    fn test_summary_sections() {
        let mut diff = DeckDiff::default();
        diff.added.push(DeckCard::new("c1", "Bolt", 4));
        diff.modified.push(CountChange {
            card: DeckCard::new("c2", "Spike", 4),
            old_count: 4,
            new_count: 3,
        });
        diff.special_slots.insert(
            SlotKind::Legend,
            SlotChange {
                old: None,
                new: Some(DeckCard::new("l1", "Legend", 1)),
            },
        );

        let summary = diff.summary();
        assert_eq!(summary, "1 added, 1 adjusted, legend changed");
        assert_eq!(diff.len(), 3);
    }

    #[test]
    fn test_diff_wire_format() {
        let mut diff = DeckDiff::default();
        diff.modified.push(CountChange {
            card: DeckCard::new("c1", "Bolt", 4),
            old_count: 2,
            new_count: 4,
        });
        diff.special_slots.insert(
            SlotKind::Commander,
            SlotChange {
                old: None,
                new: None,
            },
        );

        let json = serde_json::to_value(&diff).unwrap();
        assert!(json["modified"][0].get("oldCount").is_some());
        assert!(json["specialSlots"].get("commander").is_some());
    }
}
