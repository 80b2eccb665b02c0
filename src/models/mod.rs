//! Request and Response models for the service API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{
    validate_card_id, validate_key, CardPrefetchRequest, PrefetchRequest, SetRequest,
};
pub use responses::{
    ExistsResponse, GetResponse, HealthResponse, MessageResponse, PrefetchResponse,
    RateLimitStats, RateLimitedResponse, StatsResponse,
};
