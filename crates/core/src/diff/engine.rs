//! Synchronous diff computation.
//!
//! Pure structural comparison of two deck snapshots, O(n) in total card
//! count via identity-keyed maps. Output order is deterministic: added and
//! modified entries follow the new deck's order, removed entries follow the
//! old deck's order, slot changes follow the canonical slot order.

use tracing::debug;

use crate::models::{Deck, SlotKind};

use super::{CountChange, DeckDiff, SlotChange};

/// Compare two deck snapshots and return their structural difference.
///
/// Cards present on both sides with equal counts are elided; special slots
/// are compared by occupant identity, not count.
pub fn compute_diff(old: &Deck, new: &Deck) -> DeckDiff {
    let old_index = old.card_index();
    let new_index = new.card_index();

    let mut diff = DeckDiff::default();

    for card in &new.cards {
        match old_index.get(card.id.as_str()) {
            None => diff.added.push(card.clone()),
            Some(old_card) if old_card.count != card.count => diff.modified.push(CountChange {
                card: card.clone(),
                old_count: old_card.count,
                new_count: card.count,
            }),
            Some(_) => {}
        }
    }

    for card in &old.cards {
        if !new_index.contains_key(card.id.as_str()) {
            diff.removed.push(card.clone());
        }
    }

    for kind in SlotKind::ALL {
        let old_slot = old.slot(kind);
        let new_slot = new.slot(kind);
        if old_slot.map(|c| c.id.as_str()) != new_slot.map(|c| c.id.as_str()) {
            diff.special_slots.insert(
                kind,
                SlotChange {
                    old: old_slot.cloned(),
                    new: new_slot.cloned(),
                },
            );
        }
    }

    debug!(
        added = diff.added.len(),
        removed = diff.removed.len(),
        modified = diff.modified.len(),
        slots = diff.special_slots.len(),
        "computed deck diff"
    );
    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeckCard;

    fn deck(cards: &[(&str, &str, u32)]) -> Deck {
        let mut deck = Deck::new("Test", "mtg", "modern", "alice");
        for (id, name, count) in cards {
            deck.cards.push(DeckCard::new(*id, *name, *count));
        }
        deck
    }

    #[test]
    fn test_noop_identity() {
        let d = deck(&[("a", "Card A", 2), ("b", "Card B", 1)]);
        assert!(compute_diff(&d, &d).is_empty());
    }

    #[test]
    fn test_added_removed_modified() {
        // Scenario: old {A:2, B:1}, new {A:3, C:1}.
        let old = deck(&[("a", "Card A", 2), ("b", "Card B", 1)]);
        let new = deck(&[("a", "Card A", 3), ("c", "Card C", 1)]);

        let diff = compute_diff(&old, &new);
        assert_eq!(diff.added, vec![DeckCard::new("c", "Card C", 1)]);
        assert_eq!(diff.removed, vec![DeckCard::new("b", "Card B", 1)]);
        assert_eq!(
            diff.modified,
            vec![CountChange {
                card: DeckCard::new("a", "Card A", 3),
                old_count: 2,
                new_count: 3,
            }]
        );
        assert!(diff.special_slots.is_empty());
    }

    #[test]
    fn test_equal_counts_are_elided() {
        let old = deck(&[("a", "Card A", 4), ("b", "Card B", 2)]);
        let new = deck(&[("a", "Card A", 4), ("b", "Card B", 3)]);

        let diff = compute_diff(&old, &new);
        assert!(diff.added.is_empty());
        assert!(diff.removed.is_empty());
        assert_eq!(diff.modified.len(), 1);
        assert_eq!(diff.modified[0].card.id, "b");
    }

    #[test]
    fn test_slot_identity_change() {
        let mut old = deck(&[]);
        let mut new = deck(&[]);
        old.set_slot(SlotKind::Legend, Some(DeckCard::new("l1", "Old Legend", 1)));
        new.set_slot(SlotKind::Legend, Some(DeckCard::new("l2", "New Legend", 1)));

        let diff = compute_diff(&old, &new);
        let change = &diff.special_slots[&SlotKind::Legend];
        assert_eq!(change.old.as_ref().unwrap().id, "l1");
        assert_eq!(change.new.as_ref().unwrap().id, "l2");
    }

    #[test]
    fn test_slot_transitions_to_and_from_empty() {
        let mut occupied = deck(&[]);
        occupied.set_slot(
            SlotKind::Commander,
            Some(DeckCard::new("cmd", "Atraxa", 1)),
        );
        let empty = deck(&[]);

        let cleared = compute_diff(&occupied, &empty);
        assert!(cleared.special_slots[&SlotKind::Commander].new.is_none());

        let filled = compute_diff(&empty, &occupied);
        assert!(filled.special_slots[&SlotKind::Commander].old.is_none());
        assert_eq!(
            filled.special_slots[&SlotKind::Commander]
                .new
                .as_ref()
                .unwrap()
                .id,
            "cmd"
        );
    }

    #[test]
    fn test_unchanged_slot_occupant_produces_no_entry() {
        let mut old = deck(&[]);
        let mut new = deck(&[]);
        // Same identity, different count: slots compare by identity only.
        old.set_slot(SlotKind::Battlefield, Some(DeckCard::new("b1", "Field", 1)));
        new.set_slot(SlotKind::Battlefield, Some(DeckCard::new("b1", "Field", 2)));

        assert!(compute_diff(&old, &new).special_slots.is_empty());
    }
}
