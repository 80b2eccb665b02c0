//! Cache Payload Module
//!
//! Values the cache can hold and their size estimation.

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

// == Payload ==
/// A cached value: either a structured JSON document or an opaque byte buffer.
///
/// Binary payloads are reference-counted and immutable, so handing a clone to
/// a caller never lets it alter what the cache holds.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Structured data (e.g. a generated insight document)
    Json(Value),
    /// Raw bytes (e.g. an audio clip)
    Binary(Arc<[u8]>),
}

impl Payload {
    /// Wraps raw bytes as a binary payload.
    pub fn binary(bytes: impl Into<Arc<[u8]>>) -> Self {
        Payload::Binary(bytes.into())
    }

    // == Estimated Size ==
    /// Approximate footprint in bytes.
    ///
    /// JSON is measured by its serialized length, binary data by its byte
    /// length. This is a heuristic for eviction, not exact memory accounting.
    /// A serialization failure is logged and counted as zero.
    pub fn estimated_size(&self) -> usize {
        match self {
            Payload::Binary(bytes) => bytes.len(),
            Payload::Json(value) => match serde_json::to_vec(value) {
                Ok(encoded) => encoded.len(),
                Err(err) => {
                    warn!("Failed to estimate cache entry size: {}", err);
                    0
                }
            },
        }
    }

    /// Returns the JSON document, if this is a JSON payload.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::Binary(_) => None,
        }
    }

    /// Returns the raw bytes, if this is a binary payload.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Payload::Binary(bytes) => Some(&bytes[..]),
            Payload::Json(_) => None,
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::binary(bytes)
    }
}
