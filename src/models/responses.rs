//! Response DTOs for the service API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::cache::CacheStats;
use crate::prefetch::PrefetchOutcome;

/// Response body for reading a JSON entry (GET /api/cache/:key)
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    pub key: String,
    pub value: Value,
}

impl GetResponse {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Response body for the existence check (GET /api/cache/:key/exists)
#[derive(Debug, Clone, Serialize)]
pub struct ExistsResponse {
    pub key: String,
    pub exists: bool,
}

/// Response body for mutations (set, delete, clear)
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    /// Success message
    pub message: String,
    /// The key that was affected, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl MessageResponse {
    pub fn stored(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' stored successfully", key),
            key: Some(key),
        }
    }

    pub fn deleted(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key: Some(key),
        }
    }

    pub fn cleared(removed: usize) -> Self {
        Self {
            message: format!("Cache cleared, {} entries removed", removed),
            key: None,
        }
    }
}

/// Rate limiter counters included in the stats response
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitStats {
    /// Windows currently tracked
    pub tracked_windows: usize,
    /// Requests denied since start
    pub denied_requests: u64,
}

/// Response body for the stats endpoint (GET /api/stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub total_entries: usize,
    pub total_size_bytes: usize,
    pub max_items: usize,
    pub max_size_bytes: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    pub rate_limit: RateLimitStats,
}

impl StatsResponse {
    /// Creates a new StatsResponse from cache and limiter statistics
    pub fn new(
        stats: &CacheStats,
        max_items: usize,
        max_size_bytes: usize,
        rate_limit: RateLimitStats,
    ) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            expirations: stats.expirations,
            total_entries: stats.total_entries,
            total_size_bytes: stats.total_size_bytes,
            max_items,
            max_size_bytes,
            hit_rate: stats.hit_rate(),
            rate_limit,
        }
    }
}

/// Response body for the health endpoint (GET /api/health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
    /// Crate version
    pub version: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Response body for prefetch triggers
#[derive(Debug, Clone, Serialize)]
pub struct PrefetchResponse {
    /// URL or card id that was prefetched
    pub target: String,
    pub outcome: PrefetchOutcome,
}

/// Response body for a request rejected by the rate limiter (429)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitedResponse {
    pub error: String,
    /// Seconds until the window resets
    pub retry_after: u64,
    pub limit: u32,
    pub remaining: u32,
    /// Unix milliseconds at which the window resets
    pub reset: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_response_serialize() {
        let resp = GetResponse::new("insight-LI4", json!({"insight": "text"}));
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value, json!({"key": "insight-LI4", "value": {"insight": "text"}}));
    }

    #[test]
    fn test_message_responses() {
        let json = serde_json::to_string(&MessageResponse::stored("my_key")).unwrap();
        assert!(json.contains("my_key"));
        assert!(json.contains("successfully"));

        let value = serde_json::to_value(MessageResponse::cleared(3)).unwrap();
        assert!(value.get("key").is_none());
        assert!(value["message"].as_str().unwrap().contains('3'));
    }

    #[test]
    fn test_stats_response_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            evictions: 5,
            expirations: 2,
            total_entries: 10,
            total_size_bytes: 2048,
        };
        let resp = StatsResponse::new(
            &stats,
            200,
            4096,
            RateLimitStats { tracked_windows: 1, denied_requests: 0 },
        );
        assert!((resp.hit_rate - 0.8).abs() < 0.001);
        assert_eq!(resp.total_size_bytes, 2048);
    }

    #[test]
    fn test_health_response_serialize() {
        let json = serde_json::to_string(&HealthResponse::healthy()).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
        assert!(json.contains("version"));
    }

    #[test]
    fn test_prefetch_outcome_serializes_snake_case() {
        let resp = PrefetchResponse {
            target: "LI4".to_string(),
            outcome: PrefetchOutcome::Cancelled,
        };
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["outcome"], "cancelled");
    }

    #[test]
    fn test_rate_limited_response_uses_camel_case() {
        let resp = RateLimitedResponse {
            error: "Too many requests".to_string(),
            retry_after: 12,
            limit: 30,
            remaining: 0,
            reset: 1_700_000_000_000,
        };
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["retryAfter"], 12);
        assert_eq!(value["remaining"], 0);
    }
}
