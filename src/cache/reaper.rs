//! Reaper
//!
//! Physical removal of entries that have been logically expired for longer
//! than the configured grace period. Readers never see these entries; the
//! reaper only bounds how long they occupy memory.

use tracing::debug;

use crate::cache::{Backend, Cache};

/// Entries scanned per shard-lock acquisition.
pub const REAP_BATCH: usize = 256;

/// Outcome of one reaper sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    pub shards_scanned: usize,
    pub removed: usize,
}

impl<V, B> Cache<V, B>
where
    V: Clone + Send + 'static,
    B: Backend<V> + 'static,
{
    /// Runs one sweep over every shard.
    ///
    /// Each shard is walked in key order, [`REAP_BATCH`] entries per lock
    /// acquisition; dead entries found in a batch are removed before the lock
    /// is released.
    pub fn reap(&self) -> ReapReport {
        let grace = self.inner.config.grace_period;
        let mut report = ReapReport::default();

        for (index, shard) in self.inner.shards.iter().enumerate() {
            let removed = shard.reap_expired(self.now(), grace, REAP_BATCH);
            report.shards_scanned += 1;
            if removed > 0 {
                debug!(shard = index, removed, "reaped shard");
            }
            report.removed += removed;
        }

        self.inner.stats.record_reaped(report.removed);
        report
    }
}
