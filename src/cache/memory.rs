//! Memory Probes
//!
//! Sources of the memory usage figure the eviction controller compares
//! against the soft limit.

use std::fs;

use crate::error::{CacheError, Result};

/// Reports current memory usage in bytes.
pub trait MemoryProbe: Send + Sync + std::fmt::Debug {
    fn usage_bytes(&self) -> Result<u64>;
}

/// Resident set size of the current process, read from `/proc/self/statm`.
///
/// Assumes 4 KiB pages. Fails on platforms without procfs.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRssProbe;

const PAGE_SIZE: u64 = 4096;

impl MemoryProbe for ProcessRssProbe {
    fn usage_bytes(&self) -> Result<u64> {
        let statm = fs::read_to_string("/proc/self/statm")
            .map_err(|e| CacheError::Probe(format!("reading /proc/self/statm: {e}")))?;
        parse_statm_rss(&statm).map(|pages| pages * PAGE_SIZE)
    }
}

/// Resident pages, the second field of statm.
fn parse_statm_rss(statm: &str) -> Result<u64> {
    statm
        .split_whitespace()
        .nth(1)
        .and_then(|field| field.parse().ok())
        .ok_or_else(|| CacheError::Probe(format!("unexpected statm contents: {statm:?}")))
}
