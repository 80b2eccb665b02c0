//! Cache Module
//!
//! Provides an in-memory resource cache with TTL expiration and
//! size-bounded, oldest-first eviction.

mod entry;
mod limits;
mod order;
mod payload;
mod stats;
mod store;


use std::sync::Arc;

use tokio::sync::RwLock;

// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry};
pub use limits::CacheLimits;
pub use order::InsertionOrder;
pub use payload::Payload;
pub use stats::CacheStats;
pub use store::CacheStore;

/// Cache store shared between handlers, the prefetcher and the sweep task.
pub type SharedCache = Arc<RwLock<CacheStore>>;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;
