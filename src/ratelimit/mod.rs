//! Rate Limit Module
//!
//! Fixed-window request quotas per client identity and route.

mod identity;
mod limiter;
mod policy;

use std::sync::Arc;

use tokio::sync::RwLock;

pub use identity::{client_identity, is_bypassed, HEALTH_CHECK_HEADER, UNKNOWN_CLIENT};
pub use limiter::{Decision, RateLimiter, WindowState};
pub use policy::{RateLimitPolicies, RoutePolicy, DEFAULT_LIMIT_MESSAGE};

/// Rate limiter shared between the middleware and the sweep task.
pub type SharedRateLimiter = Arc<RwLock<RateLimiter>>;
