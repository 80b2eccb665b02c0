//! Prefetch failure reasons.
//!
//! These never reach prefetch callers; they are logged and folded into a
//! [`PrefetchOutcome`](super::PrefetchOutcome).

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrefetchError {
    /// Connection failure, timeout or body read error
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Upstream answered with a non-2xx status
    #[error("upstream returned {0}")]
    Status(StatusCode),

    /// Body exceeded the byte ceiling
    #[error("response body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    /// Target is not on the configured origin or is otherwise unusable
    #[error("refusing to fetch {0}")]
    Forbidden(String),

    /// Configured origin is not an absolute URL
    #[error("invalid base URL: {0}")]
    BaseUrl(String),

    /// Body was not valid JSON
    #[error("invalid JSON body: {0}")]
    Decode(#[from] serde_json::Error),
}
