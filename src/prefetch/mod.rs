//! Prefetch Module
//!
//! Best-effort background fetching of resources into the cache.
//!
//! # Operations
//! - `prefetch(url)` - Fetch one JSON document and cache it under its URL
//! - `prefetch_card(id)` - Fetch a card's insight and audio clip, cancelling
//!   any other card prefetch still in flight
//!
//! Only the configured origin is ever contacted: URLs are resolved against
//! it and card ids must be a single path segment.

mod error;
mod prefetcher;

use serde::{Deserialize, Serialize};

pub use error::PrefetchError;
pub(crate) use prefetcher::parse_base_url;
pub use prefetcher::Prefetcher;

/// Longest accepted card id.
pub const MAX_CARD_ID_LENGTH: usize = 64;

/// Returns true for ids made only of ASCII letters, digits, `-` and `_`.
///
/// Such ids are safe to splice into a URL path as one segment.
pub fn is_valid_card_id(card_id: &str) -> bool {
    !card_id.is_empty()
        && card_id.len() <= MAX_CARD_ID_LENGTH
        && card_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

// == Default TTLs ==
/// TTL for prefetched JSON documents and card insights (24 hours)
pub const DOCUMENT_TTL_MS: u64 = 24 * 60 * 60 * 1000;

/// TTL for prefetched card audio (7 days)
pub const AUDIO_TTL_MS: u64 = 7 * 24 * 60 * 60 * 1000;

/// Scheduling hint forwarded upstream in the `Priority` header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Low => "low",
        }
    }
}

/// Per-call prefetch options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefetchOptions {
    pub priority: Priority,
    /// Overrides the default TTL of every resource stored by the call
    pub expiry_ms: Option<u64>,
}

/// What a prefetch call did. Failures are reported here, never raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefetchOutcome {
    /// Every requested resource was cached
    Stored,
    /// A card prefetch cached only one of its two resources
    Partial,
    /// The card was already being prefetched
    Skipped,
    /// Nothing was cached (network error, timeout, non-2xx, bad body)
    Failed,
    /// Superseded by a newer card prefetch; nothing was cached
    Cancelled,
}
