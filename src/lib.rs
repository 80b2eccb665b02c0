//! Meridian Cache - an in-memory content cache with rate limiting and prefetch
//!
//! Stores JSON documents and binary blobs with per-entry TTLs under item and
//! byte ceilings, throttles clients with fixed-window quotas, and warms the
//! cache from an upstream origin.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod prefetch;
pub mod ratelimit;
pub mod tasks;

pub use api::{create_router, AppState};
pub use config::Config;
pub use tasks::{spawn_cache_cleanup_task, spawn_rate_limit_sweep_task};
