//! Fixed-window rate limiter
//!
//! One counter and reset time per `(client, route)` key. A window opens on the
//! first request for a key and closes `window_ms` later; requests past the
//! quota keep incrementing the counter so repeated rejections are tracked.

use std::collections::HashMap;

use crate::cache::current_timestamp_ms;
use crate::ratelimit::{RateLimitPolicies, RoutePolicy};

// == Decision ==
/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Request admitted
    Allow {
        /// Requests left in the current window
        remaining: u32,
        /// Quota of the matched policy
        limit: u32,
        /// Unix milliseconds at which the window resets
        reset_at: u64,
    },
    /// Request rejected
    Deny {
        /// Whole seconds until the window resets (rounded up)
        retry_after_secs: u64,
        /// Quota of the matched policy
        limit: u32,
        /// Unix milliseconds at which the window resets
        reset_at: u64,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow { .. })
    }

    pub fn limit(&self) -> u32 {
        match *self {
            Decision::Allow { limit, .. } | Decision::Deny { limit, .. } => limit,
        }
    }

    /// Requests left in the window; always 0 for a denial.
    pub fn remaining(&self) -> u32 {
        match *self {
            Decision::Allow { remaining, .. } => remaining,
            Decision::Deny { .. } => 0,
        }
    }

    pub fn reset_at(&self) -> u64 {
        match *self {
            Decision::Allow { reset_at, .. } | Decision::Deny { reset_at, .. } => reset_at,
        }
    }
}

// == Window State ==
/// Counter for one `(client, route)` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    /// Requests seen in the current window
    pub count: u32,
    /// Unix milliseconds at which the window resets
    pub reset_at: u64,
    /// Unix milliseconds of the request that opened the window
    pub first_request: u64,
}

impl WindowState {
    fn open(policy: &RoutePolicy, now: u64) -> Self {
        Self {
            count: 1,
            reset_at: now.saturating_add(policy.window_ms),
            first_request: now,
        }
    }

    fn is_elapsed(&self, now: u64) -> bool {
        now >= self.reset_at
    }
}

// == Rate Limiter ==
/// Fixed-window request counter keyed by client identity and route.
#[derive(Debug)]
pub struct RateLimiter {
    policies: RateLimitPolicies,
    windows: HashMap<String, WindowState>,
    denied: u64,
}

impl RateLimiter {
    /// Creates a limiter enforcing `policies`.
    pub fn new(policies: RateLimitPolicies) -> Self {
        Self {
            policies,
            windows: HashMap::new(),
            denied: 0,
        }
    }

    // == Check And Consume ==
    /// Counts one request from `client_key` against `route_key` and decides
    /// whether it is admitted.
    pub fn check_and_consume(&mut self, client_key: &str, route_key: &str) -> Decision {
        self.check_and_consume_at(client_key, route_key, current_timestamp_ms())
    }

    /// Same as `check_and_consume` with a caller-supplied clock.
    pub fn check_and_consume_at(&mut self, client_key: &str, route_key: &str, now: u64) -> Decision {
        let policy = self.policies.policy_for(route_key);
        let limit = policy.max_requests;
        let key = window_key(client_key, route_key);

        let window = match self.windows.get_mut(&key) {
            Some(window) if !window.is_elapsed(now) => {
                window.count = window.count.saturating_add(1);
                *window
            }
            _ => {
                let window = WindowState::open(policy, now);
                self.windows.insert(key, window);
                window
            }
        };

        if window.count <= limit {
            Decision::Allow {
                remaining: limit - window.count,
                limit,
                reset_at: window.reset_at,
            }
        } else {
            self.denied += 1;
            Decision::Deny {
                retry_after_secs: (window.reset_at - now).div_ceil(1000),
                limit,
                reset_at: window.reset_at,
            }
        }
    }

    /// Returns the policy governing `route_key`.
    pub fn policy_for(&self, route_key: &str) -> &RoutePolicy {
        self.policies.policy_for(route_key)
    }

    /// Current window for a key, if one is tracked.
    pub fn window(&self, client_key: &str, route_key: &str) -> Option<&WindowState> {
        self.windows.get(&window_key(client_key, route_key))
    }

    // == Sweep ==
    /// Drops windows whose reset time has passed. Returns how many were removed.
    pub fn sweep_expired(&mut self) -> usize {
        self.sweep_expired_at(current_timestamp_ms())
    }

    pub fn sweep_expired_at(&mut self, now: u64) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, window| !window.is_elapsed(now));
        before - self.windows.len()
    }

    /// Number of requests denied since start.
    pub fn denied_total(&self) -> u64 {
        self.denied
    }

    /// Number of tracked windows.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitPolicies::default())
    }
}

fn window_key(client_key: &str, route_key: &str) -> String {
    format!("{}:{}", client_key, route_key)
}
