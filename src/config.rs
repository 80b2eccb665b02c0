//! Configuration Module
//!
//! Handles loading and validating service configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::CacheLimits;
use crate::error::{Result, ServiceError};
use crate::prefetch::parse_base_url;
use crate::ratelimit::{RateLimitPolicies, RoutePolicy};

/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Maximum number of entries the cache can hold
    pub cache_max_items: usize,
    /// Maximum total estimated payload size in bytes
    pub cache_max_size_bytes: usize,
    /// Fraction of the size ceiling at which a reactive sweep runs before insertion
    pub cache_cleanup_ratio: f64,
    /// Background cache sweep interval in seconds
    pub cache_cleanup_interval: u64,
    /// TTL in milliseconds for API writes that do not specify one
    pub cache_default_ttl_ms: u64,
    /// Window length of the default rate-limit policy in milliseconds
    pub rate_limit_window_ms: u64,
    /// Request quota of the default rate-limit policy
    pub rate_limit_max_requests: u32,
    /// Background rate-limit window sweep interval in seconds
    pub rate_limit_sweep_interval: u64,
    /// Origin that card prefetches resolve `/api/insight` and `/audio` against
    pub prefetch_base_url: String,
    /// Timeout in seconds applied to every outbound prefetch request
    pub prefetch_timeout: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CACHE_MAX_ITEMS` - Maximum cache entries (default: 200)
    /// - `CACHE_MAX_SIZE_BYTES` - Maximum cache size (default: 50 MiB)
    /// - `CACHE_CLEANUP_RATIO` - Reactive sweep threshold (default: 0.8)
    /// - `CACHE_CLEANUP_INTERVAL` - Cache sweep frequency in seconds (default: 300)
    /// - `CACHE_DEFAULT_TTL_MS` - TTL for writes without one (default: 24 hours)
    /// - `RATE_LIMIT_WINDOW_MS` - Default window length (default: 60000)
    /// - `RATE_LIMIT_MAX_REQUESTS` - Default quota per window (default: 100)
    /// - `RATE_LIMIT_SWEEP_INTERVAL` - Window sweep frequency in seconds (default: 60)
    /// - `PREFETCH_BASE_URL` - Origin for card prefetches (default: http://127.0.0.1:8080)
    /// - `PREFETCH_TIMEOUT` - Outbound request timeout in seconds (default: 10)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: env_or("SERVER_PORT", defaults.server_port),
            cache_max_items: env_or("CACHE_MAX_ITEMS", defaults.cache_max_items),
            cache_max_size_bytes: env_or("CACHE_MAX_SIZE_BYTES", defaults.cache_max_size_bytes),
            cache_cleanup_ratio: env_or("CACHE_CLEANUP_RATIO", defaults.cache_cleanup_ratio),
            cache_cleanup_interval: env_or(
                "CACHE_CLEANUP_INTERVAL",
                defaults.cache_cleanup_interval,
            ),
            cache_default_ttl_ms: env_or("CACHE_DEFAULT_TTL_MS", defaults.cache_default_ttl_ms),
            rate_limit_window_ms: env_or("RATE_LIMIT_WINDOW_MS", defaults.rate_limit_window_ms),
            rate_limit_max_requests: env_or(
                "RATE_LIMIT_MAX_REQUESTS",
                defaults.rate_limit_max_requests,
            ),
            rate_limit_sweep_interval: env_or(
                "RATE_LIMIT_SWEEP_INTERVAL",
                defaults.rate_limit_sweep_interval,
            ),
            prefetch_base_url: env::var("PREFETCH_BASE_URL")
                .unwrap_or(defaults.prefetch_base_url),
            prefetch_timeout: env_or("PREFETCH_TIMEOUT", defaults.prefetch_timeout),
        }
    }

    /// Rejects values the components cannot operate with.
    ///
    /// Called once at startup so misconfiguration fails fast instead of
    /// surfacing at request time.
    pub fn validate(&self) -> Result<()> {
        if self.cache_cleanup_interval == 0 {
            return Err(ServiceError::InvalidConfig(
                "CACHE_CLEANUP_INTERVAL must be greater than zero".to_string(),
            ));
        }
        if self.rate_limit_sweep_interval == 0 {
            return Err(ServiceError::InvalidConfig(
                "RATE_LIMIT_SWEEP_INTERVAL must be greater than zero".to_string(),
            ));
        }
        if self.prefetch_timeout == 0 {
            return Err(ServiceError::InvalidConfig(
                "PREFETCH_TIMEOUT must be greater than zero".to_string(),
            ));
        }
        parse_base_url(&self.prefetch_base_url).map_err(|err| {
            ServiceError::InvalidConfig(format!("PREFETCH_BASE_URL: {}", err))
        })?;
        self.cache_limits()?;
        self.rate_limit_policies()?;
        Ok(())
    }

    /// Builds the validated cache limits.
    pub fn cache_limits(&self) -> Result<CacheLimits> {
        CacheLimits::new(
            self.cache_max_items,
            self.cache_max_size_bytes,
            self.cache_cleanup_ratio,
        )
    }

    /// Builds the rate-limit policy table: the built-in route policies plus a
    /// default policy taken from the environment.
    pub fn rate_limit_policies(&self) -> Result<RateLimitPolicies> {
        let default = RoutePolicy::new(self.rate_limit_window_ms, self.rate_limit_max_requests)?;
        Ok(RateLimitPolicies::with_default(default))
    }

    /// Outbound prefetch timeout.
    pub fn prefetch_timeout(&self) -> Duration {
        Duration::from_secs(self.prefetch_timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            cache_max_items: 200,
            cache_max_size_bytes: 50 * 1024 * 1024,
            cache_cleanup_ratio: 0.8,
            cache_cleanup_interval: 300,
            cache_default_ttl_ms: 24 * 60 * 60 * 1000,
            rate_limit_window_ms: 60_000,
            rate_limit_max_requests: 100,
            rate_limit_sweep_interval: 60,
            prefetch_base_url: "http://127.0.0.1:8080".to_string(),
            prefetch_timeout: 10,
        }
    }
}

/// Reads and parses an environment variable, falling back to `default`
/// when it is unset or unparsable.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
