//! Cache Store Module
//!
//! Memoized read results keyed by `CacheKey`, with lazy TTL expiry and
//! explicit eviction by key, by prefix, or wholesale.

use std::collections::HashMap;
use std::time::Duration;

use crate::cache::{CacheEntry, CacheKey, CacheStats};

// == Cache Store ==
/// In-memory map from cache key to the last fresh read result.
///
/// Callers always receive clones; entries are never handed out by reference.
#[derive(Debug)]
pub struct CacheStore<T> {
    /// Key-value storage
    entries: HashMap<CacheKey, CacheEntry<T>>,
    /// Performance statistics
    stats: CacheStats,
}

impl<T: Clone> CacheStore<T> {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::new(),
        }
    }

    // == Put ==
    /// Stores `value` under `key`, fresh for `ttl`.
    ///
    /// An existing entry is overwritten, not merged, and its window restarts.
    pub fn put(&mut self, key: CacheKey, value: T, ttl: Duration) {
        self.entries.insert(key, CacheEntry::new(value, ttl));
    }

    // == Get ==
    /// Returns a clone of the value if the entry exists and is still fresh.
    ///
    /// An expired entry reads as a miss but stays in the map until the next
    /// sweep or eviction.
    pub fn get(&mut self, key: &CacheKey) -> Option<T> {
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => {
                self.stats.record_hit();
                Some(entry.value.clone())
            }
            _ => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Sweep Expired ==
    /// Removes all entries whose window has closed.
    ///
    /// Returns the number of entries removed.
    pub fn sweep_expired(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());

        let count = before - self.entries.len();
        self.stats.record_expirations(count);
        count
    }

    // == Evict ==
    /// Removes a single entry. Returns true if one was present.
    pub fn evict(&mut self, key: &CacheKey) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.stats.record_invalidations(1);
        }
        removed
    }

    /// Removes every entry under `prefix`. Returns the number removed.
    pub fn evict_by_prefix(&mut self, prefix: &CacheKey) -> usize {
        self.evict_where(|key| key.is_under(prefix))
    }

    /// Removes every entry whose key satisfies `covers`.
    pub fn evict_where<F>(&mut self, covers: F) -> usize
    where
        F: Fn(&CacheKey) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|key, _| !covers(key));

        let count = before - self.entries.len();
        self.stats.record_invalidations(count);
        count
    }

    // == Clear ==
    /// Removes every entry. Returns the number removed.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.stats.record_invalidations(count);
        count
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.clone()
    }

    /// Cached keys in sorted order.
    pub fn keys(&self) -> Vec<CacheKey> {
        let mut keys: Vec<CacheKey> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Clone> Default for CacheStore<T> {
    fn default() -> Self {
        Self::new()
    }
}
