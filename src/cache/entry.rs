//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use chrono::Utc;

use crate::cache::Payload;

// == Cache Entry ==
/// Represents a single cache entry with payload and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored payload
    pub payload: Payload,
    /// Insertion timestamp (Unix milliseconds)
    pub stored_at: u64,
    /// Time-to-live in milliseconds
    pub ttl_ms: u64,
    /// Estimated payload size in bytes, fixed at insertion
    pub size: usize,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a cache entry with its estimated size and insertion time.
    pub fn new_at(payload: Payload, ttl_ms: u64, size: usize, stored_at: u64) -> Self {
        Self {
            payload,
            stored_at,
            ttl_ms,
            size,
        }
    }

    /// Timestamp (Unix milliseconds) at which the entry stops being served.
    pub fn expires_at(&self) -> u64 {
        self.stored_at.saturating_add(self.ttl_ms)
    }

    // == Is Expired ==
    /// Checks expiry against a caller-supplied timestamp.
    ///
    /// Boundary condition: an entry is expired once `now` reaches
    /// `stored_at + ttl_ms`, so a zero TTL is expired on creation.
    pub fn is_expired_at(&self, now: u64) -> bool {
        now >= self.expires_at()
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}
