//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with insertion-order tracking,
//! TTL expiration and size-bounded eviction.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::cache::{current_timestamp_ms, CacheEntry, CacheLimits, CacheStats, InsertionOrder, Payload};

// == Cache Store ==
/// Main cache storage with TTL expiry and oldest-first capacity eviction.
///
/// Every operation is total: expiry and capacity pressure are resolved
/// internally and never surface as errors.
#[derive(Debug)]
pub struct CacheStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Insertion order for eviction
    order: InsertionOrder,
    /// Performance statistics
    stats: CacheStats,
    /// Capacity ceilings
    limits: CacheLimits,
    /// Running sum of `entry.size` over all entries
    total_size: usize,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a new CacheStore bounded by `limits`.
    pub fn new(limits: CacheLimits) -> Self {
        Self {
            entries: HashMap::new(),
            order: InsertionOrder::new(),
            stats: CacheStats::new(),
            limits,
            total_size: 0,
        }
    }

    // == Set ==
    /// Stores a payload under `key` for `ttl_ms` milliseconds.
    ///
    /// An existing entry for the key is replaced. When the insertion would push
    /// the total size past the sweep threshold (or the item ceiling is reached)
    /// expired entries are swept first; if that is not enough the oldest
    /// insertions are evicted until the new entry fits. A payload larger than
    /// the whole size ceiling is not stored.
    pub fn set(&mut self, key: impl Into<String>, payload: Payload, ttl_ms: u64) {
        self.set_at(key.into(), payload, ttl_ms, current_timestamp_ms());
    }

    pub(crate) fn set_at(&mut self, key: String, payload: Payload, ttl_ms: u64, now: u64) {
        let size = payload.estimated_size();

        // Replacing a key starts by releasing the old entry's size
        self.remove_entry(&key);

        if size > self.limits.max_size_bytes() {
            warn!(
                "Not caching '{}': {} bytes exceeds the {} byte ceiling",
                key,
                size,
                self.limits.max_size_bytes()
            );
            self.sync_totals();
            return;
        }

        if self.total_size + size > self.limits.sweep_threshold()
            || self.entries.len() >= self.limits.max_items()
        {
            let removed = self.sweep_expired_at(now);
            if removed > 0 {
                debug!("Reactive sweep removed {} expired entries", removed);
            }
        }

        while self.total_size + size > self.limits.max_size_bytes()
            || self.entries.len() >= self.limits.max_items()
        {
            let Some(oldest) = self.order.evict_oldest() else {
                break;
            };
            if let Some(evicted) = self.entries.remove(&oldest) {
                self.total_size -= evicted.size;
                self.stats.record_eviction();
                debug!("Evicted '{}' ({} bytes) under capacity pressure", oldest, evicted.size);
            }
        }

        self.entries
            .insert(key.clone(), CacheEntry::new_at(payload, ttl_ms, size, now));
        self.order.push(&key);
        self.total_size += size;
        self.sync_totals();
    }

    // == Get ==
    /// Retrieves a payload by key.
    ///
    /// Returns None if the key is absent or its TTL has elapsed; an expired
    /// entry is removed on the way out.
    pub fn get(&mut self, key: &str) -> Option<Payload> {
        self.get_at(key, current_timestamp_ms())
    }

    pub(crate) fn get_at(&mut self, key: &str, now: u64) -> Option<Payload> {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired_at(now),
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        if expired {
            self.remove_entry(key);
            self.stats.record_expirations(1);
            self.stats.record_miss();
            self.sync_totals();
            return None;
        }

        self.stats.record_hit();
        self.entries.get(key).map(|entry| entry.payload.clone())
    }

    // == Has ==
    /// Returns true if `get` would return a payload for `key`.
    ///
    /// Read-only: an expired entry is reported absent but left for the next
    /// `get` or sweep to remove.
    pub fn has(&self, key: &str) -> bool {
        self.has_at(key, current_timestamp_ms())
    }

    pub(crate) fn has_at(&self, key: &str, now: u64) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired_at(now))
    }

    // == Delete ==
    /// Removes an entry by key. Returns whether an entry was present.
    pub fn delete(&mut self, key: &str) -> bool {
        let removed = self.remove_entry(key).is_some();
        self.sync_totals();
        removed
    }

    // == Clear ==
    /// Drops every entry and resets the running size to zero.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.total_size = 0;
        self.sync_totals();
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the cache.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        self.sweep_expired_at(current_timestamp_ms())
    }

    pub(crate) fn sweep_expired_at(&mut self, now: u64) -> usize {
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            self.remove_entry(key);
        }

        self.stats.record_expirations(expired_keys.len());
        self.sync_totals();
        expired_keys.len()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.clone()
    }

    /// Returns the capacity ceilings this store enforces.
    pub fn limits(&self) -> CacheLimits {
        self.limits
    }

    /// Running total of estimated payload sizes in bytes.
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    // == Length ==
    /// Returns the current number of entries (including not-yet-swept expired ones).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes an entry and releases its size. Does not touch statistics.
    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.order.remove(key);
        self.total_size -= entry.size;
        Some(entry)
    }

    fn sync_totals(&mut self) {
        self.stats.set_totals(self.entries.len(), self.total_size);
    }

    /// Recomputes the size sum from scratch, for checking the running total.
    #[cfg(test)]
    pub(crate) fn recomputed_size(&self) -> usize {
        self.entries.values().map(|entry| entry.size).sum()
    }

    #[cfg(test)]
    pub(crate) fn tracked_order_len(&self) -> usize {
        self.order.len()
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(CacheLimits::default())
    }
}
