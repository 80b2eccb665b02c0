//! Periodic Sweep Tasks
//!
//! Background tasks that drop expired cache entries and elapsed rate-limit
//! windows so keys that are never read again do not accumulate.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::SharedCache;
use crate::ratelimit::SharedRateLimiter;

/// Spawns a background task that periodically sweeps expired cache entries.
///
/// The task sleeps for `interval` between runs and takes the cache write lock
/// only for the duration of the sweep.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let handle = spawn_cache_cleanup_task(cache.clone(), Duration::from_secs(300));
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_cache_cleanup_task(cache: SharedCache, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting cache sweep task with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let (removed, remaining) = {
                let mut cache_guard = cache.write().await;
                let removed = cache_guard.cleanup_expired();
                (removed, cache_guard.len())
            };

            if removed > 0 {
                info!(
                    "Cache sweep: removed {} expired entries, {} remain",
                    removed, remaining
                );
            } else {
                debug!("Cache sweep: no expired entries found");
            }
        }
    })
}

/// Spawns a background task that periodically drops elapsed rate-limit windows.
pub fn spawn_rate_limit_sweep_task(
    limiter: SharedRateLimiter,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting rate-limit sweep task with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let removed = limiter.write().await.sweep_expired();

            if removed > 0 {
                debug!("Rate-limit sweep: dropped {} elapsed windows", removed);
            }
        }
    })
}
