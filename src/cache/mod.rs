//! Cache Module
//!
//! Sharded in-memory key-value engine with lazy TTL expiration, a grace-period
//! reaper and a memory-pressure eviction controller.

mod backend;
mod clock;
mod entry;
mod eviction;
mod log;
mod memory;
mod reaper;
mod router;
mod shard;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use backend::{Backend, DynBackend, MemoryBackend, ScanVisitor};
pub use clock::{current_timestamp_ms, Clock, ManualClock, SystemClock};
pub use entry::{Entry, ENTRY_OVERHEAD};
pub use eviction::{victims_for, EvictionReport, EVICT_BATCH};
pub use log::{LogBackend, COMPACT_MIN_STALE};
pub use memory::{MemoryProbe, ProcessRssProbe};
pub use reaper::{ReapReport, REAP_BATCH};
pub use router::Router;
pub use shard::{Shard, SCAN_BATCH};
pub use stats::CacheStats;
pub use store::{Cache, CacheBuilder, Weigher};
