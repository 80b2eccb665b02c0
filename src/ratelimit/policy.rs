//! Rate-limit policies
//!
//! Per-route quotas matched by path prefix, with a fallback default.

use crate::error::{Result, ServiceError};

/// Message returned to clients that exceed the default policy.
pub const DEFAULT_LIMIT_MESSAGE: &str = "Too many requests. Please try again later.";

// == Route Policy ==
/// Quota applied to one route family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePolicy {
    /// Window length in milliseconds
    pub window_ms: u64,
    /// Requests admitted per window
    pub max_requests: u32,
    /// Message sent with a 429 response
    pub message: String,
    /// Value of the `X-RateLimit-Resource` header, if any
    pub resource: Option<String>,
}

impl RoutePolicy {
    /// Creates a policy with the default message and no resource tag.
    ///
    /// # Errors
    /// `InvalidConfig` when the window or the quota is zero.
    pub fn new(window_ms: u64, max_requests: u32) -> Result<Self> {
        if window_ms == 0 {
            return Err(ServiceError::InvalidConfig(
                "rate-limit window must be greater than zero".to_string(),
            ));
        }
        if max_requests == 0 {
            return Err(ServiceError::InvalidConfig(
                "rate-limit max_requests must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            window_ms,
            max_requests,
            message: DEFAULT_LIMIT_MESSAGE.to_string(),
            resource: None,
        })
    }

    /// Replaces the rejection message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Tags the policy with a resource name.
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Window length in whole seconds, as advertised in headers.
    pub fn window_secs(&self) -> u64 {
        self.window_ms / 1000
    }
}

// == Policy Table ==
/// Ordered route policies plus the default for unmatched paths.
#[derive(Debug, Clone)]
pub struct RateLimitPolicies {
    default: RoutePolicy,
    routes: Vec<(String, RoutePolicy)>,
}

impl RateLimitPolicies {
    /// Creates a table holding only `default`.
    pub fn new(default: RoutePolicy) -> Self {
        Self {
            default,
            routes: Vec::new(),
        }
    }

    /// Creates the built-in table (insight and points API quotas) around
    /// the given default.
    pub fn with_default(default: RoutePolicy) -> Self {
        Self::new(default)
            .route(
                "/api/insight",
                RoutePolicy {
                    window_ms: 60_000,
                    max_requests: 30,
                    message: "Rate limit exceeded for insights API. Please wait before requesting more insights.".to_string(),
                    resource: Some("insights".to_string()),
                },
            )
            .route(
                "/api/points",
                RoutePolicy {
                    window_ms: 60_000,
                    max_requests: 50,
                    message: "Rate limit exceeded for points API. Please wait before requesting more points.".to_string(),
                    resource: Some("points".to_string()),
                },
            )
    }

    /// Appends a policy for paths starting with `prefix`.
    ///
    /// Earlier registrations win when several prefixes match.
    pub fn route(mut self, prefix: impl Into<String>, policy: RoutePolicy) -> Self {
        self.routes.push((prefix.into(), policy));
        self
    }

    /// Returns the policy governing `path`.
    pub fn policy_for(&self, path: &str) -> &RoutePolicy {
        self.routes
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
            .map(|(_, policy)| policy)
            .unwrap_or(&self.default)
    }
}

impl Default for RateLimitPolicies {
    fn default() -> Self {
        Self::with_default(RoutePolicy {
            window_ms: 60_000,
            max_requests: 100,
            message: DEFAULT_LIMIT_MESSAGE.to_string(),
            resource: None,
        })
    }
}
