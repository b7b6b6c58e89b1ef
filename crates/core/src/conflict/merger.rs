//! Diff application.
//!
//! Applying a diff is the second half of the round-trip law: for any decks
//! `D` and `D'` differing in main-zone counts and special slots,
//! `apply_diff(D, compute_diff(D, D')) == D'`.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::diff::DeckDiff;
use crate::models::Deck;

/// Apply a diff to a deck, producing the merged deck. Pure: neither input is
/// mutated.
///
/// Removed entries are deleted, added entries appended, modified entries
/// updated to their new count. A modified entry whose card is absent from the
/// deck is inserted rather than rejected, since historical diffs must stay
/// applicable to whatever deck shape they meet.
pub fn apply_diff(deck: &Deck, diff: &DeckDiff) -> Deck {
    let removed: HashSet<&str> = diff.removed.iter().map(|c| c.id.as_str()).collect();

    let mut merged = deck.clone();
    merged.cards = deck
        .cards
        .iter()
        .filter(|c| !removed.contains(c.id.as_str()))
        .cloned()
        .collect();

    let mut index: HashMap<String, usize> = merged
        .cards
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id.clone(), i))
        .collect();

    for change in &diff.modified {
        match index.get(&change.card.id) {
            Some(&i) => merged.cards[i].count = change.new_count,
            None => {
                warn!(
                    card = %change.card.name,
                    "modified card absent from deck, inserting"
                );
                let mut card = change.card.clone();
                card.count = change.new_count;
                index.insert(card.id.clone(), merged.cards.len());
                merged.cards.push(card);
            }
        }
    }

    for card in &diff.added {
        match index.get(&card.id) {
            Some(&i) => {
                warn!(card = %card.name, "added card already present, overwriting count");
                merged.cards[i] = card.clone();
            }
            None => {
                index.insert(card.id.clone(), merged.cards.len());
                merged.cards.push(card.clone());
            }
        }
    }

    // Assign slots directly: apply_diff is a pure transformation and must not
    // touch the metadata timestamps the way client-side mutators do.
    for (kind, change) in &diff.special_slots {
        match kind {
            crate::models::SlotKind::Commander => merged.commander = change.new.clone(),
            crate::models::SlotKind::Legend => merged.legend = change.new.clone(),
            crate::models::SlotKind::Battlefield => merged.battlefield = change.new.clone(),
        }
    }

    debug!(cards = merged.cards.len(), "applied diff");
    merged
}
