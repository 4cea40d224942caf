//! API Module
//!
//! HTTP binding over the cache engine. Values are arbitrary JSON; keys are
//! taken from the request as UTF-8 and stored as their bytes.
//!
//! # Endpoints
//! - `PUT /set` - Store a value
//! - `POST /add` - Store a value only if the key is not live
//! - `PUT /replace` - Overwrite a live key
//! - `GET /get/:key` - Retrieve a value by key
//! - `DELETE /del/:key` - Delete a key
//! - `GET /prefix/:prefix` - Live entries under a prefix
//! - `GET /len` - Entry counts
//! - `DELETE /all` - Remove every entry
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
