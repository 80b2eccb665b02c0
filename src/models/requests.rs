//! Request DTOs for the service API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

use crate::cache::MAX_KEY_LENGTH;
use crate::prefetch::{is_valid_card_id, PrefetchOptions, Priority, MAX_CARD_ID_LENGTH};

/// Request body for storing a JSON payload (PUT /api/cache)
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: Any JSON document
/// - `ttl_ms`: Optional TTL in milliseconds (uses the configured default if absent)
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    pub key: String,
    pub value: Value,
    #[serde(default)]
    pub ttl_ms: Option<u64>,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        validate_key(&self.key)
    }
}

/// Request body for prefetching a single document (POST /api/prefetch)
#[derive(Debug, Clone, Deserialize)]
pub struct PrefetchRequest {
    pub url: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub expiry_ms: Option<u64>,
}

impl PrefetchRequest {
    /// Checks the URL as a cache key. Whether it may be fetched is decided
    /// by the prefetcher, which only accepts its configured origin.
    pub fn validate(&self) -> Option<String> {
        validate_key(&self.url)
    }

    pub fn options(&self) -> PrefetchOptions {
        PrefetchOptions {
            priority: self.priority,
            expiry_ms: self.expiry_ms,
        }
    }
}

/// Optional request body for prefetching a card (POST /api/prefetch/card/:id)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CardPrefetchRequest {
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub expiry_ms: Option<u64>,
}

impl CardPrefetchRequest {
    pub fn options(&self) -> PrefetchOptions {
        PrefetchOptions {
            priority: self.priority,
            expiry_ms: self.expiry_ms,
        }
    }
}

/// Shared key check: non-empty and within `MAX_KEY_LENGTH` bytes.
pub fn validate_key(key: &str) -> Option<String> {
    if key.is_empty() {
        return Some("Key cannot be empty".to_string());
    }
    if key.len() > MAX_KEY_LENGTH {
        return Some(format!(
            "Key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        ));
    }
    None
}

/// Card ids become one URL path segment: ASCII letters, digits, `-` and `_`.
pub fn validate_card_id(card_id: &str) -> Option<String> {
    if is_valid_card_id(card_id) {
        None
    } else {
        Some(format!(
            "Card id must be 1-{} characters of letters, digits, '-' or '_'",
            MAX_CARD_ID_LENGTH
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_request_deserialize() {
        let body = r#"{"key": "insight-LI4", "value": {"insight": "text"}}"#;
        let req: SetRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.key, "insight-LI4");
        assert_eq!(req.value, json!({"insight": "text"}));
        assert!(req.ttl_ms.is_none());
    }

    #[test]
    fn test_set_request_with_ttl() {
        let body = r#"{"key": "k", "value": 3, "ttl_ms": 60000}"#;
        let req: SetRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.ttl_ms, Some(60_000));
    }

    #[test]
    fn test_validate_keys() {
        assert!(validate_key("").is_some());
        assert!(validate_key(&"x".repeat(MAX_KEY_LENGTH + 1)).is_some());
        assert!(validate_key("audio-ST36").is_none());
    }

    #[test]
    fn test_prefetch_request_defaults() {
        let req: PrefetchRequest =
            serde_json::from_str(r#"{"url": "http://localhost/api/insight/LI4"}"#).unwrap();
        assert!(req.validate().is_none());
        assert_eq!(req.options(), PrefetchOptions::default());
    }

    #[test]
    fn test_prefetch_request_priority_and_relative_url() {
        let req: PrefetchRequest =
            serde_json::from_str(r#"{"url": "/api/insight/LI4", "priority": "high"}"#).unwrap();
        assert_eq!(req.priority, Priority::High);
        assert!(req.validate().is_none());

        let req: PrefetchRequest = serde_json::from_str(r#"{"url": ""}"#).unwrap();
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_validate_card_ids() {
        assert!(validate_card_id("GB20").is_none());
        assert!(validate_card_id("../../internal/secret").is_some());
        assert!(validate_card_id("LI4#x").is_some());
    }

    #[test]
    fn test_card_request_options() {
        let req: CardPrefetchRequest =
            serde_json::from_str(r#"{"expiry_ms": 1000}"#).unwrap();
        assert_eq!(
            req.options(),
            PrefetchOptions { priority: Priority::Low, expiry_ms: Some(1000) }
        );
    }
}
