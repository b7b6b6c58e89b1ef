//! Domain model types used throughout DeckVault.
//!
//! These types bridge the diff engine, the store client, and the
//! version-control orchestrator. Deck files are persisted as UTF-8 JSON with
//! camelCase field names; those names are part of the wire format and must
//! stay stable so historical commits keep decoding.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::annotation::AUTOSAVE_PREFIX;

// ---------------------------------------------------------------------------
// Cards and zones
// ---------------------------------------------------------------------------

/// A card entry in a deck zone. Identity (`id`) is unique within each zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckCard {
    /// Card identity from the card database.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Number of copies in the zone.
    pub count: u32,
}

impl DeckCard {
    pub fn new(id: impl Into<String>, name: impl Into<String>, count: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            count,
        }
    }
}

/// The special single-card slots a deck may carry.
///
/// Each slot holds at most one occupant; which slots a game uses is decided
/// by the UI layer, the engine treats them uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
    Commander,
    Legend,
    Battlefield,
}

impl SlotKind {
    /// All slot kinds, in canonical order.
    pub const ALL: [SlotKind; 3] = [Self::Commander, Self::Legend, Self::Battlefield];
}

impl std::fmt::Display for SlotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Commander => write!(f, "commander"),
            Self::Legend => write!(f, "legend"),
            Self::Battlefield => write!(f, "battlefield"),
        }
    }
}

// ---------------------------------------------------------------------------
// Deck
// ---------------------------------------------------------------------------

/// Free-form deck metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckMetadata {
    #[serde(default)]
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// A deck snapshot: main zone, optional special slots, optional auxiliary
/// zones, and metadata.
///
/// Decks are created and mutated client-side; the engine's diff/merge
/// operations are pure transformations that never mutate their inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    pub id: String,
    pub name: String,
    /// Game tag (e.g. `mtg`, `riftbound`).
    pub game: String,
    /// Format tag within the game (e.g. `commander`, `standard`).
    pub format: String,
    /// Main zone, ordered.
    #[serde(default)]
    pub cards: Vec<DeckCard>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commander: Option<DeckCard>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legend: Option<DeckCard>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battlefield: Option<DeckCard>,
    /// Fixed-size auxiliary zone used by some games; carried through
    /// diff/merge untouched.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rune_deck: Vec<DeckCard>,
    /// Auxiliary battlefield zone used by some games.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub battlefields: Vec<DeckCard>,
    pub metadata: DeckMetadata,
}

impl Deck {
    /// Create a new empty deck with a fresh UUID and current timestamps.
    pub fn new(
        name: impl Into<String>,
        game: impl Into<String>,
        format: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            game: game.into(),
            format: format.into(),
            cards: Vec::new(),
            commander: None,
            legend: None,
            battlefield: None,
            rune_deck: Vec::new(),
            battlefields: Vec::new(),
            metadata: DeckMetadata {
                author: author.into(),
                created_at: now,
                updated_at: now,
                tags: Vec::new(),
            },
        }
    }

    /// The occupant of a special slot.
    pub fn slot(&self, kind: SlotKind) -> Option<&DeckCard> {
        match kind {
            SlotKind::Commander => self.commander.as_ref(),
            SlotKind::Legend => self.legend.as_ref(),
            SlotKind::Battlefield => self.battlefield.as_ref(),
        }
    }

    /// Set (or clear) a special slot.
    pub fn set_slot(&mut self, kind: SlotKind, card: Option<DeckCard>) {
        match kind {
            SlotKind::Commander => self.commander = card,
            SlotKind::Legend => self.legend = card,
            SlotKind::Battlefield => self.battlefield = card,
        }
        self.metadata.updated_at = Utc::now();
    }

    /// Look up a main-zone card by identity.
    pub fn card(&self, id: &str) -> Option<&DeckCard> {
        self.cards.iter().find(|c| c.id == id)
    }

    /// Add copies of a card to the main zone, merging with an existing entry.
    pub fn add_card(&mut self, card: DeckCard) {
        match self.cards.iter_mut().find(|c| c.id == card.id) {
            Some(existing) => existing.count += card.count,
            None => self.cards.push(card),
        }
        self.metadata.updated_at = Utc::now();
    }

    /// Remove a card from the main zone entirely, returning the entry.
    pub fn remove_card(&mut self, id: &str) -> Option<DeckCard> {
        let pos = self.cards.iter().position(|c| c.id == id)?;
        self.metadata.updated_at = Utc::now();
        Some(self.cards.remove(pos))
    }

    /// Set the copy count of a main-zone card. Returns false if absent.
    pub fn set_count(&mut self, id: &str, count: u32) -> bool {
        match self.cards.iter_mut().find(|c| c.id == id) {
            Some(card) => {
                card.count = count;
                self.metadata.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Total copy count across the main zone, special slots, and auxiliary
    /// zones. Drives the diff offload threshold.
    pub fn total_cards(&self) -> usize {
        let main: u32 = self.cards.iter().map(|c| c.count).sum();
        let slots: u32 = SlotKind::ALL
            .iter()
            .filter_map(|k| self.slot(*k))
            .map(|c| c.count)
            .sum();
        let aux: u32 = self
            .rune_deck
            .iter()
            .chain(self.battlefields.iter())
            .map(|c| c.count)
            .sum();
        (main + slots + aux) as usize
    }

    /// Identity-keyed view of the main zone.
    pub fn card_index(&self) -> HashMap<&str, &DeckCard> {
        self.cards.iter().map(|c| (c.id.as_str(), c)).collect()
    }
}

// ---------------------------------------------------------------------------
// Commits and branches
// ---------------------------------------------------------------------------

/// Author or committer identity on a commit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitActor {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

/// A commit as reported by the external store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    /// Content-addressed identifier assigned by the store.
    pub sha: String,
    pub message: String,
    pub author: CommitActor,
    pub committer: CommitActor,
    #[serde(default)]
    pub parents: Vec<String>,
    /// Derived from the `Auto-save: ` message prefix convention.
    pub is_auto_save: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes_summary: Option<String>,
}

impl Commit {
    /// Build a commit, deriving `is_auto_save` from the message prefix.
    pub fn new(
        sha: impl Into<String>,
        message: impl Into<String>,
        author: CommitActor,
        committer: CommitActor,
        parents: Vec<String>,
    ) -> Self {
        let message = message.into();
        let is_auto_save = message.starts_with(AUTOSAVE_PREFIX);
        Self {
            sha: sha.into(),
            message,
            author,
            committer,
            parents,
            is_auto_save,
            changes_summary: None,
        }
    }
}

/// A branch head in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub name: String,
    pub head_sha: String,
}

// ---------------------------------------------------------------------------
// Annotations
// ---------------------------------------------------------------------------

/// The kind of change an annotation records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Removed,
    Modified,
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Removed => write!(f, "removed"),
            Self::Modified => write!(f, "modified"),
        }
    }
}

/// Structured per-card rationale carried inside a commit message.
///
/// The encoded line format carries the card name but not the card id, so
/// annotations decoded from historical messages have `card_id: None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardChangeAnnotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_id: Option<String>,
    pub card_name: String,
    pub change_type: ChangeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CardChangeAnnotation {
    pub fn added(card_name: impl Into<String>) -> Self {
        Self {
            card_id: None,
            card_name: card_name.into(),
            change_type: ChangeType::Added,
            old_count: None,
            new_count: None,
            reason: None,
        }
    }

    pub fn removed(card_name: impl Into<String>) -> Self {
        Self {
            change_type: ChangeType::Removed,
            ..Self::added(card_name)
        }
    }

    pub fn modified(card_name: impl Into<String>, old_count: u32, new_count: u32) -> Self {
        Self {
            change_type: ChangeType::Modified,
            old_count: Some(old_count),
            new_count: Some(new_count),
            ..Self::added(card_name)
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_card_id(mut self, id: impl Into<String>) -> Self {
        self.card_id = Some(id.into());
        self
    }
}

/// A commit whose message has been split into a human summary and the
/// structured annotations recovered from the annotation block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedCommit {
    pub commit: Commit,
    pub summary: String,
    #[serde(default)]
    pub card_annotations: Vec<CardChangeAnnotation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor() -> CommitActor {
        CommitActor {
            name: "alice".into(),
            email: "alice@example.com".into(),
            date: None,
        }
    }

    #[test]
    fn test_deck_zone_operations() {
        let mut deck = Deck::new("Burn", "mtg", "modern", "alice");
        deck.add_card(DeckCard::new("c1", "Lightning Bolt", 4));
        deck.add_card(DeckCard::new("c2", "Lava Spike", 4));
        deck.add_card(DeckCard::new("c1", "Lightning Bolt", 2));

        assert_eq!(deck.cards.len(), 2);
        assert_eq!(deck.card("c1").unwrap().count, 6);

        assert!(deck.set_count("c2", 3));
        assert!(!deck.set_count("missing", 1));
        assert_eq!(deck.card("c2").unwrap().count, 3);

        let removed = deck.remove_card("c1").unwrap();
        assert_eq!(removed.name, "Lightning Bolt");
        assert!(deck.card("c1").is_none());
    }

    #[test]
    fn test_special_slots() {
        let mut deck = Deck::new("EDH", "mtg", "commander", "bob");
        assert!(deck.slot(SlotKind::Commander).is_none());

        deck.set_slot(
            SlotKind::Commander,
            Some(DeckCard::new("cmd1", "Atraxa", 1)),
        );
        assert_eq!(deck.slot(SlotKind::Commander).unwrap().name, "Atraxa");

        deck.set_slot(SlotKind::Commander, None);
        assert!(deck.slot(SlotKind::Commander).is_none());
    }

    #[test]
    fn test_total_cards_spans_all_zones() {
        let mut deck = Deck::new("Rift", "riftbound", "standard", "carol");
        deck.add_card(DeckCard::new("c1", "Card A", 3));
        deck.set_slot(SlotKind::Legend, Some(DeckCard::new("l1", "Legend", 1)));
        deck.rune_deck.push(DeckCard::new("r1", "Rune", 2));
        deck.battlefields.push(DeckCard::new("b1", "Field", 1));

        assert_eq!(deck.total_cards(), 7);
    }

    #[test]
    fn test_deck_wire_format_is_camel_case() {
        let mut deck = Deck::new("Rift", "riftbound", "standard", "carol");
        deck.rune_deck.push(DeckCard::new("r1", "Rune", 2));

        let json = serde_json::to_value(&deck).unwrap();
        assert!(json.get("runeDeck").is_some());
        assert!(json["metadata"].get("createdAt").is_some());
        // Empty optional zones are omitted entirely.
        assert!(json.get("commander").is_none());
        assert!(json.get("battlefields").is_none());
    }

    #[test]
    fn test_deck_decodes_without_optional_zones() {
        let json = r#"{
            "id": "d1", "name": "Minimal", "game": "mtg", "format": "modern",
            "cards": [{"id": "c1", "name": "Bolt", "count": 4}],
            "metadata": {
                "author": "dave",
                "createdAt": "2025-01-01T00:00:00Z",
                "updatedAt": "2025-01-01T00:00:00Z"
            }
        }"#;
        let deck: Deck = serde_json::from_str(json).unwrap();
        assert_eq!(deck.cards.len(), 1);
        assert!(deck.legend.is_none());
        assert!(deck.rune_deck.is_empty());
    }

    #[test]
    fn test_commit_auto_save_derivation() {
        let commit = Commit::new(
            "abc123",
            "Auto-save: 2 added, 1 removed",
            actor(),
            actor(),
            vec![],
        );
        assert!(commit.is_auto_save);

        let commit = Commit::new("def456", "Tune the mana base", actor(), actor(), vec![]);
        assert!(!commit.is_auto_save);
    }
}
