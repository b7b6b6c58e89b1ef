//! Three-way conflict detection between diverging branches.
//!
//! Given a common ancestor (base) and two diverged snapshots (source,
//! target), the detector identifies card identities touched on both sides
//! and reports the overlapping subset. The result is conflict-shaped: it
//! describes the disagreement, not a change set to apply.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::diff::{compute_diff, CountChange, DeckDiff, SlotChange};
use crate::models::{Deck, SlotKind};

/// Detect conflicting changes between two branches relative to a common base.
///
/// A card identity conflicts when both sides touched it (added, removed, or
/// modified it relative to base) and their resulting states disagree:
/// - differing resulting counts ⇒ `modified` (old = target's count, new =
///   source's count);
/// - source kept it, target removed it ⇒ `added` (source's entry);
/// - target kept it, source removed it ⇒ `removed` (target's entry).
///
/// Both sides converging on an identical resulting count is not a conflict,
/// matching the slot rule below.
///
/// A special slot conflicts only when both sides changed it relative to base
/// *and* the resulting occupants differ from each other; the entry records
/// `{old: target's result, new: source's result}`.
pub fn detect_conflicts(base: &Deck, source: &Deck, target: &Deck) -> DeckDiff {
    let source_diff = compute_diff(base, source);
    let target_diff = compute_diff(base, target);

    let target_touched = touched_ids(&target_diff);

    let source_index = source.card_index();
    let target_index = target.card_index();

    let mut conflicts = DeckDiff::default();

    // Iterate the source diff in its deterministic order so the conflict set
    // has a stable order too.
    for id in touched_order(&source_diff) {
        if !target_touched.contains(id) {
            continue;
        }
        match (source_index.get(id), target_index.get(id)) {
            (Some(s), Some(t)) if s.count != t.count => {
                conflicts.modified.push(CountChange {
                    card: (*s).clone(),
                    old_count: t.count,
                    new_count: s.count,
                });
            }
            // Identical resulting counts: both sides agree, no conflict.
            (Some(_), Some(_)) => {}
            (Some(s), None) => conflicts.added.push((*s).clone()),
            (None, Some(t)) => conflicts.removed.push((*t).clone()),
            // Both sides removed the card: identical outcome.
            (None, None) => {}
        }
    }

    for kind in SlotKind::ALL {
        let (Some(source_change), Some(target_change)) = (
            source_diff.special_slots.get(&kind),
            target_diff.special_slots.get(&kind),
        ) else {
            continue;
        };

        let source_id = source_change.new.as_ref().map(|c| c.id.as_str());
        let target_id = target_change.new.as_ref().map(|c| c.id.as_str());
        if source_id != target_id {
            debug!(slot = %kind, "slot changed divergently on both sides");
            conflicts.special_slots.insert(
                kind,
                SlotChange {
                    old: target_change.new.clone(),
                    new: source_change.new.clone(),
                },
            );
        }
    }

    info!(
        conflicting_cards =
            conflicts.added.len() + conflicts.removed.len() + conflicts.modified.len(),
        conflicting_slots = conflicts.special_slots.len(),
        "conflict detection complete"
    );
    conflicts
}

/// Card identities a diff touches, as a set.
fn touched_ids(diff: &DeckDiff) -> HashSet<&str> {
    touched_order(diff).collect()
}

/// Card identities a diff touches, in the diff's own order.
fn touched_order(diff: &DeckDiff) -> impl Iterator<Item = &str> {
    diff.added
        .iter()
        .map(|c| c.id.as_str())
        .chain(diff.modified.iter().map(|m| m.card.id.as_str()))
        .chain(diff.removed.iter().map(|c| c.id.as_str()))
}
