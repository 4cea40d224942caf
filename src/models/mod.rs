//! Request and Response models for the cache server API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{WriteRequest, MAX_KEY_LENGTH};
pub use responses::{
    DeleteAllResponse, DeleteResponse, ErrorResponse, GetResponse, HealthResponse, LenResponse,
    PrefixResponse, StatsResponse, WriteResponse,
};
