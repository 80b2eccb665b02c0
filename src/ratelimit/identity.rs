//! Client identity and bypass detection from request headers.

use axum::http::HeaderMap;

/// Identity shared by every client whose address cannot be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Header that marks internal health probes.
pub const HEALTH_CHECK_HEADER: &str = "x-health-check";

/// Derives the rate-limit identity of a request.
///
/// Uses `x-forwarded-for`, then `x-real-ip`; requests carrying neither are
/// all counted under [`UNKNOWN_CLIENT`].
pub fn client_identity(headers: &HeaderMap) -> String {
    ["x-forwarded-for", "x-real-ip"]
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

/// Returns true for requests that skip rate limiting (`x-health-check: 1`).
pub fn is_bypassed(headers: &HeaderMap) -> bool {
    headers
        .get(HEALTH_CHECK_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim() == "1")
}
