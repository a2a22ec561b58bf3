//! Error types for the caching engine
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the caching engine.
///
/// A cache miss is never an error; lookups return `Option`. Only construction
/// (`Configuration`) is fatal. Every other variant is absorbed inside the
/// component that raised it and only surfaces through the admin API.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Invalid capacity, TTL or other construction parameter
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A value could not be encoded or decoded
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Body compression or collection failed
    #[error("Codec failure: {0}")]
    Codec(String),

    /// A warmup or precompute operation lost its race against the timer
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// A warmup request failed or returned a non-cacheable status
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) | CacheError::Configuration(_) => {
                StatusCode::BAD_REQUEST
            }
            CacheError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            CacheError::Fetch(_) => StatusCode::BAD_GATEWAY,
            CacheError::Serialization(_) | CacheError::Codec(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the caching engine.
pub type Result<T> = std::result::Result<T, CacheError>;
