//! Maintenance Tasks
//!
//! The reaper and the eviction controller as background tokio tasks. Each runs
//! on its own interval until shutdown is signalled. A cycle is plain
//! synchronous code, so a shutdown never interrupts one in progress; it only
//! prevents the next.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{Backend, Cache};

/// Handle to the running background tasks of one cache.
///
/// Dropping the handle also stops the tasks, after their current cycle.
#[derive(Debug)]
pub struct MaintenanceHandle {
    shutdown_tx: watch::Sender<bool>,
    reaper: JoinHandle<()>,
    evictor: JoinHandle<()>,
}

impl MaintenanceHandle {
    /// Signals both tasks to stop and waits for them to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for (name, task) in [("reaper", self.reaper), ("evictor", self.evictor)] {
            if let Err(e) = task.await {
                warn!(task = name, error = %e, "maintenance task ended abnormally");
            }
        }
        info!("maintenance tasks stopped");
    }

    pub fn is_finished(&self) -> bool {
        self.reaper.is_finished() && self.evictor.is_finished()
    }
}

impl<V, B> Cache<V, B>
where
    V: Clone + Send + 'static,
    B: Backend<V> + 'static,
{
    /// Starts the reaper and the eviction controller on the current tokio
    /// runtime, using the intervals from the cache's configuration.
    ///
    /// # Panics
    /// Panics if called outside of a tokio runtime.
    pub fn spawn_maintenance(&self) -> MaintenanceHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = self.config();
        let reaper = spawn_reaper(self.clone(), config.reaper_interval, shutdown_rx.clone());
        let evictor = spawn_evictor(self.clone(), config.eviction_interval, shutdown_rx);

        MaintenanceHandle {
            shutdown_tx,
            reaper,
            evictor,
        }
    }
}

/// Spawns a task that runs [`Cache::reap`] every `interval`.
pub fn spawn_reaper<V, B>(
    cache: Cache<V, B>,
    interval: Duration,
    shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    V: Clone + Send + 'static,
    B: Backend<V> + 'static,
{
    tokio::spawn(run_every(interval, shutdown_rx, "reaper", move || {
        let report = cache.reap();
        if report.removed > 0 {
            info!(removed = report.removed, "reaper removed expired entries");
        } else {
            debug!("reaper found no expired entries");
        }
    }))
}

/// Spawns a task that runs [`Cache::evict`] every `interval`.
///
/// A failing memory probe is logged and the next cycle runs as usual.
pub fn spawn_evictor<V, B>(
    cache: Cache<V, B>,
    interval: Duration,
    shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    V: Clone + Send + 'static,
    B: Backend<V> + 'static,
{
    tokio::spawn(run_every(interval, shutdown_rx, "evictor", move || {
        if let Err(e) = cache.evict() {
            warn!(error = %e, "eviction cycle skipped");
        }
    }))
}

async fn run_every<F>(
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
    name: &'static str,
    mut cycle: F,
) where
    F: FnMut() + Send + 'static,
{
    info!(task = name, interval_ms = interval.as_millis() as u64, "starting maintenance task");
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately; wait a full interval instead.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => cycle(),
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
    debug!(task = name, "maintenance task exiting");
}
