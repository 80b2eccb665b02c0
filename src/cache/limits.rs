//! Cache Limits Module
//!
//! Capacity ceilings for the cache store, validated at construction.

use crate::error::{Result, ServiceError};

/// Item-count and byte-size ceilings plus the reactive sweep threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheLimits {
    max_items: usize,
    max_size_bytes: usize,
    cleanup_ratio: f64,
}

impl CacheLimits {
    /// Validates and builds a set of limits.
    ///
    /// # Errors
    /// `InvalidConfig` when either ceiling is zero or `cleanup_ratio` is not
    /// in `(0, 1]`.
    pub fn new(max_items: usize, max_size_bytes: usize, cleanup_ratio: f64) -> Result<Self> {
        if max_items == 0 {
            return Err(ServiceError::InvalidConfig(
                "max_items must be greater than zero".to_string(),
            ));
        }
        if max_size_bytes == 0 {
            return Err(ServiceError::InvalidConfig(
                "max_size_bytes must be greater than zero".to_string(),
            ));
        }
        if !(cleanup_ratio > 0.0 && cleanup_ratio <= 1.0) {
            return Err(ServiceError::InvalidConfig(format!(
                "cleanup_ratio must be in (0, 1], got {}",
                cleanup_ratio
            )));
        }

        Ok(Self {
            max_items,
            max_size_bytes,
            cleanup_ratio,
        })
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    pub fn max_size_bytes(&self) -> usize {
        self.max_size_bytes
    }

    /// Total size above which an insertion first sweeps expired entries.
    pub fn sweep_threshold(&self) -> usize {
        (self.max_size_bytes as f64 * self.cleanup_ratio) as usize
    }
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self {
            max_items: 200,
            max_size_bytes: 50 * 1024 * 1024,
            cleanup_ratio: 0.8,
        }
    }
}
