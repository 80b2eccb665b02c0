//! API Routes
//!
//! Configures the Axum router with all service endpoints.

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, delete_handler, exists_handler, get_handler, health_handler,
    prefetch_card_handler, prefetch_handler, set_handler, stats_handler, AppState,
};
use super::middleware::rate_limit;

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - Rate limiting: every route, keyed by client identity and path
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/cache", put(set_handler).delete(clear_handler))
        .route("/api/cache/:key", get(get_handler).delete(delete_handler))
        .route("/api/cache/:key/exists", get(exists_handler))
        .route("/api/stats", get(stats_handler))
        .route("/api/health", get(health_handler))
        .route("/api/prefetch", post(prefetch_handler))
        .route("/api/prefetch/card/:id", post(prefetch_card_handler))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
