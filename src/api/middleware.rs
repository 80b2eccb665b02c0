//! Rate-limit middleware
//!
//! Counts every request against the limiter before it reaches a handler and
//! attaches quota headers to the response.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::warn;

use super::handlers::AppState;
use crate::models::RateLimitedResponse;
use crate::ratelimit::{client_identity, is_bypassed, Decision, RoutePolicy};

const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
const X_RATELIMIT_WINDOW: HeaderName = HeaderName::from_static("x-ratelimit-window");
const X_RATELIMIT_RESOURCE: HeaderName = HeaderName::from_static("x-ratelimit-resource");

/// Admits or rejects a request based on its client identity and path.
///
/// Requests carrying `x-health-check: 1` pass through uncounted and without
/// quota headers. Rejected requests get a 429 with `Retry-After`.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if is_bypassed(request.headers()) {
        return next.run(request).await;
    }

    let client = client_identity(request.headers());
    let path = request.uri().path().to_string();

    let (decision, policy) = {
        let mut limiter = state.limiter.write().await;
        let decision = limiter.check_and_consume(&client, &path);
        (decision, limiter.policy_for(&path).clone())
    };

    match decision {
        Decision::Deny {
            retry_after_secs, ..
        } => {
            warn!(
                "Rate limit exceeded for {} on {} (retry in {}s)",
                client, path, retry_after_secs
            );

            let body = RateLimitedResponse {
                error: policy.message.clone(),
                retry_after: retry_after_secs,
                limit: decision.limit(),
                remaining: 0,
                reset: decision.reset_at(),
            };
            let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
            let headers = response.headers_mut();
            insert_quota_headers(headers, &decision, &policy);
            headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
            response
        }
        Decision::Allow { .. } => {
            let mut response = next.run(request).await;
            insert_quota_headers(response.headers_mut(), &decision, &policy);
            response
        }
    }
}

fn insert_quota_headers(headers: &mut HeaderMap, decision: &Decision, policy: &RoutePolicy) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit()));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining()));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_at()));
    headers.insert(X_RATELIMIT_WINDOW, HeaderValue::from(policy.window_secs()));

    if let Some(resource) = &policy.resource {
        if let Ok(value) = HeaderValue::from_str(resource) {
            headers.insert(X_RATELIMIT_RESOURCE, value);
        }
    }
}
