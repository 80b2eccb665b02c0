//! API Module
//!
//! HTTP handlers, rate-limit middleware and routing for the REST API.
//!
//! # Endpoints
//! - `PUT /api/cache` - Store a JSON document
//! - `DELETE /api/cache` - Remove every entry
//! - `GET /api/cache/:key` - Retrieve an entry
//! - `DELETE /api/cache/:key` - Delete an entry
//! - `GET /api/cache/:key/exists` - Check for a live entry
//! - `GET /api/stats` - Cache and limiter statistics
//! - `GET /api/health` - Health check
//! - `POST /api/prefetch` - Prefetch one document
//! - `POST /api/prefetch/card/:id` - Prefetch a card's insight and audio

pub mod handlers;
pub mod middleware;
pub mod routes;

pub use handlers::*;
pub use middleware::rate_limit;
pub use routes::create_router;
