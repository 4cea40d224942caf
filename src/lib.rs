//! shardkv - An embeddable sharded key-value cache
//!
//! Per-key TTL with lazy expiration on reads, a background reaper that frees
//! expired entries after a grace period, and an eviction controller that
//! sheds live entries once memory usage passes a soft limit. The `api` module
//! exposes the cache over HTTP for hosts that do not link it directly.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{Cache, CacheBuilder, CacheStats, LogBackend, ManualClock, MemoryBackend};
pub use config::{CacheConfig, EvictionOrder, MemorySource, ServerConfig};
pub use error::{CacheError, Result};
pub use tasks::MaintenanceHandle;
