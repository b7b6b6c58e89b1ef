//! LRU cache for immutable deck snapshots.
//!
//! Snapshots are keyed by revision identifier, and revisions never change
//! content, so cached entries need no invalidation. Branch-head reads must
//! not go through this cache since branch refs move.

use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::models::Deck;

/// Default number of snapshots kept in memory.
pub const DEFAULT_CAPACITY: usize = 10;

/// Identifies one deck snapshot: a path at a fixed revision of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    pub owner: String,
    pub repo: String,
    pub rev: String,
    pub path: String,
}

impl SnapshotKey {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        rev: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            rev: rev.into(),
            path: path.into(),
        }
    }
}

/// Bounded snapshot cache with least-recently-used eviction.
///
/// Reads promote the entry to most-recently-used; inserting into a full cache
/// evicts the entry that has gone unread the longest.
pub struct VersionCache {
    capacity: usize,
    entries: HashMap<SnapshotKey, Deck>,
    // Keys ordered least- to most-recently used.
    order: VecDeque<SnapshotKey>,
}

impl VersionCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Look up a snapshot, promoting it on hit.
    pub fn get(&mut self, key: &SnapshotKey) -> Option<Deck> {
        if !self.entries.contains_key(key) {
            return None;
        }
        self.promote(key);
        self.entries.get(key).cloned()
    }

    /// Insert a snapshot, evicting the least-recently-used entry when full.
    pub fn insert(&mut self, key: SnapshotKey, deck: Deck) {
        if self.entries.insert(key.clone(), deck).is_some() {
            self.promote(&key);
            return;
        }
        self.order.push_back(key);
        if self.entries.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                debug!(rev = %evicted.rev, path = %evicted.path, "evicting cached snapshot");
                self.entries.remove(&evicted);
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn promote(&mut self, key: &SnapshotKey) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(key.clone());
    }
}

impl Default for VersionCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(rev: &str) -> SnapshotKey {
        SnapshotKey::new("alice", "decks", rev, "decks/burn.json")
    }

    fn deck(name: &str) -> Deck {
        Deck::new(name, "mtg", "modern", "alice")
    }

    #[test]
    fn test_get_miss_and_hit() {
        let mut cache = VersionCache::new();
        assert!(cache.get(&key("r1")).is_none());

        cache.insert(key("r1"), deck("Burn"));
        assert_eq!(cache.get(&key("r1")).unwrap().name, "Burn");
    }

    #[test]
    fn test_eviction_is_least_recently_used() {
        let mut cache = VersionCache::with_capacity(2);
        cache.insert(key("r1"), deck("One"));
        cache.insert(key("r2"), deck("Two"));

        // Touch r1 so r2 becomes the eviction candidate.
        cache.get(&key("r1"));
        cache.insert(key("r3"), deck("Three"));

        assert!(cache.get(&key("r1")).is_some());
        assert!(cache.get(&key("r2")).is_none());
        assert!(cache.get(&key("r3")).is_some());
    }

    #[test]
    fn test_default_capacity_bound() {
        let mut cache = VersionCache::new();
        for i in 0..15 {
            cache.insert(key(&format!("r{i}")), deck("D"));
        }
        assert_eq!(cache.len(), DEFAULT_CAPACITY);
        // The five oldest are gone.
        assert!(cache.get(&key("r4")).is_none());
        assert!(cache.get(&key("r5")).is_some());
    }

    #[test]
    fn test_reinsert_updates_value_without_growing() {
        let mut cache = VersionCache::with_capacity(2);
        cache.insert(key("r1"), deck("Old"));
        cache.insert(key("r1"), deck("New"));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&key("r1")).unwrap().name, "New");
    }

    #[test]
    fn test_clear() {
        let mut cache = VersionCache::new();
        cache.insert(key("r1"), deck("D"));
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get(&key("r1")).is_none());
    }
}
