//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the cache engine and its HTTP binding.
///
/// `NotFound` and `AlreadyExists` are ordinary outcomes of conditional
/// operations, not faults.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key absent or its entry has logically expired
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Key already holds a live entry
    #[error("Key already exists: {0}")]
    AlreadyExists(String),

    /// Configuration rejected at construction
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Persistent backend could not be opened or recovered
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Memory usage probe failed
    #[error("Memory probe failed: {0}")]
    Probe(String),
}

impl CacheError {
    /// Builds a `NotFound` for a raw byte key.
    pub fn not_found(key: &[u8]) -> Self {
        CacheError::NotFound(String::from_utf8_lossy(key).into_owned())
    }

    /// Builds an `AlreadyExists` for a raw byte key.
    pub fn already_exists(key: &[u8]) -> Self {
        CacheError::AlreadyExists(String::from_utf8_lossy(key).into_owned())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::AlreadyExists(_) => StatusCode::CONFLICT,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::InvalidConfig(_) | CacheError::Storage(_) | CacheError::Probe(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_from_bytes() {
        let err = CacheError::not_found(b"user:1");
        assert_eq!(err.to_string(), "Key not found: user:1");
    }

    #[test]
    fn test_status_codes() {
        let resp = CacheError::not_found(b"k").into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = CacheError::already_exists(b"k").into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = CacheError::InvalidRequest("bad".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = CacheError::Probe("no procfs".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
