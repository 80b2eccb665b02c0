//! API Handlers
//!
//! HTTP request handlers for each service endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use tokio::sync::RwLock;
use tracing::info;

use crate::cache::{CacheStore, Payload, SharedCache};
use crate::config::Config;
use crate::error::{Result, ServiceError};
use crate::models::{
    validate_card_id, CardPrefetchRequest, ExistsResponse, GetResponse, HealthResponse,
    MessageResponse, PrefetchRequest, PrefetchResponse, RateLimitStats, SetRequest, StatsResponse,
};
use crate::prefetch::{PrefetchError, Prefetcher};
use crate::ratelimit::{RateLimiter, SharedRateLimiter};

/// Application state shared across all handlers.
///
/// Each component is constructed once by the process root and shared by
/// reference; there is no global instance.
#[derive(Clone)]
pub struct AppState {
    /// Thread-safe cache store
    pub cache: SharedCache,
    /// Thread-safe rate limiter
    pub limiter: SharedRateLimiter,
    /// Background prefetcher writing into `cache`
    pub prefetcher: Arc<Prefetcher>,
    /// TTL for writes that do not specify one
    pub default_ttl_ms: u64,
}

impl AppState {
    /// Creates a new AppState around the given components.
    ///
    /// Prefetched bodies are capped at the cache's byte ceiling.
    pub fn new(
        cache: CacheStore,
        limiter: RateLimiter,
        prefetch_base_url: &str,
        prefetch_timeout: Duration,
        default_ttl_ms: u64,
    ) -> Result<Self> {
        let max_body_bytes = cache.limits().max_size_bytes();
        let cache = Arc::new(RwLock::new(cache));
        let prefetcher = Prefetcher::new(cache.clone(), prefetch_base_url, prefetch_timeout)
            .map_err(|err| match err {
                PrefetchError::BaseUrl(msg) => {
                    ServiceError::InvalidConfig(format!("PREFETCH_BASE_URL: {}", msg))
                }
                other => ServiceError::Internal(format!("HTTP client setup failed: {}", other)),
            })?
            .with_max_body_bytes(max_body_bytes);

        Ok(Self {
            cache,
            limiter: Arc::new(RwLock::new(limiter)),
            prefetcher: Arc::new(prefetcher),
            default_ttl_ms,
        })
    }

    /// Creates a new AppState from validated configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        Self::new(
            CacheStore::new(config.cache_limits()?),
            RateLimiter::new(config.rate_limit_policies()?),
            &config.prefetch_base_url,
            config.prefetch_timeout(),
            config.cache_default_ttl_ms,
        )
    }
}

/// Handler for PUT /api/cache
///
/// Stores a JSON document under a key.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<MessageResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(ServiceError::InvalidRequest(error_msg));
    }

    let ttl_ms = req.ttl_ms.unwrap_or(state.default_ttl_ms);
    state
        .cache
        .write()
        .await
        .set(req.key.clone(), Payload::Json(req.value), ttl_ms);

    Ok(Json(MessageResponse::stored(req.key)))
}

/// Handler for GET /api/cache/:key
///
/// JSON entries are returned wrapped in `{key, value}`; binary entries are
/// returned as raw `application/octet-stream` bodies.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response> {
    // Write lock: an expired entry is removed on read
    let payload = state.cache.write().await.get(&key);

    match payload {
        Some(Payload::Json(value)) => Ok(Json(GetResponse::new(key, value)).into_response()),
        Some(Payload::Binary(bytes)) => Ok((
            [(header::CONTENT_TYPE, "application/octet-stream")],
            bytes.to_vec(),
        )
            .into_response()),
        None => Err(ServiceError::NotFound(key)),
    }
}

/// Handler for GET /api/cache/:key/exists
pub async fn exists_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<ExistsResponse> {
    let exists = state.cache.read().await.has(&key);
    Json(ExistsResponse { key, exists })
}

/// Handler for DELETE /api/cache/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<MessageResponse>> {
    if state.cache.write().await.delete(&key) {
        Ok(Json(MessageResponse::deleted(key)))
    } else {
        Err(ServiceError::NotFound(key))
    }
}

/// Handler for DELETE /api/cache
pub async fn clear_handler(State(state): State<AppState>) -> Json<MessageResponse> {
    let removed = {
        let mut cache = state.cache.write().await;
        let removed = cache.len();
        cache.clear();
        removed
    };
    info!("Cache cleared ({} entries)", removed);

    Json(MessageResponse::cleared(removed))
}

/// Handler for GET /api/stats
///
/// Returns cache statistics together with rate limiter counters.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let (stats, limits) = {
        let cache = state.cache.read().await;
        (cache.stats(), cache.limits())
    };
    let rate_limit = {
        let limiter = state.limiter.read().await;
        RateLimitStats {
            tracked_windows: limiter.len(),
            denied_requests: limiter.denied_total(),
        }
    };

    Json(StatsResponse::new(
        &stats,
        limits.max_items(),
        limits.max_size_bytes(),
        rate_limit,
    ))
}

/// Handler for GET /api/health
pub async fn health_handler() -> impl IntoResponse {
    (
        [(header::CACHE_CONTROL, "no-store, max-age=0")],
        Json(HealthResponse::healthy()),
    )
}

/// Handler for POST /api/prefetch
///
/// Fetches a JSON document into the cache under its URL. The URL must be on
/// the prefetch origin, or a path relative to it. Upstream failures are
/// reported in the outcome, not as an HTTP error.
pub async fn prefetch_handler(
    State(state): State<AppState>,
    Json(req): Json<PrefetchRequest>,
) -> Result<Json<PrefetchResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(ServiceError::InvalidRequest(error_msg));
    }
    if state.prefetcher.resolve(&req.url).is_none() {
        return Err(ServiceError::InvalidRequest(format!(
            "URL '{}' is not on the prefetch origin",
            req.url
        )));
    }

    let outcome = state.prefetcher.prefetch(&req.url, &req.options()).await;

    Ok(Json(PrefetchResponse {
        target: req.url,
        outcome,
    }))
}

/// Handler for POST /api/prefetch/card/:id
///
/// The body is optional; an empty one prefetches at low priority with
/// default TTLs. A body that is not valid JSON is rejected.
pub async fn prefetch_card_handler(
    State(state): State<AppState>,
    Path(card_id): Path<String>,
    body: Bytes,
) -> Result<Json<PrefetchResponse>> {
    if let Some(error_msg) = validate_card_id(&card_id) {
        return Err(ServiceError::InvalidRequest(error_msg));
    }

    let req: CardPrefetchRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CardPrefetchRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|err| ServiceError::InvalidRequest(format!("Invalid JSON body: {}", err)))?
    };
    let options = req.options();
    let outcome = state.prefetcher.prefetch_card(&card_id, &options).await;

    Ok(Json(PrefetchResponse {
        target: card_id,
        outcome,
    }))
}
