//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Cache sweep: Removes expired cache entries at configured intervals
//! - Rate-limit sweep: Drops windows whose reset time has passed

mod cleanup;

pub use cleanup::{spawn_cache_cleanup_task, spawn_rate_limit_sweep_task};
