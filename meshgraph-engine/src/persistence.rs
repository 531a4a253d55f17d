//! Periodic flushing of live models to the store.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::ModelManager;

/// Shortest accepted flush interval.
pub const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(1);

/// Flushes a [`ModelManager`] on a fixed interval.
///
/// A failed flush is logged and not retried; the next tick tries again with
/// whatever the model looks like then.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use meshgraph_engine::{ModelManager, PersistenceScheduler};
/// use meshgraph_store::{ModelStore, SqliteBackend};
/// use meshgraph_types::SystemClock;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let backend = SqliteBackend::open("dependency-model.db")?;
///     let store = Arc::new(ModelStore::new(Arc::new(backend), Arc::new(SystemClock)));
///     let manager = Arc::new(ModelManager::new(store)?);
///
///     let handle = PersistenceScheduler::new(manager.clone())
///         .interval(Duration::from_secs(30))
///         .start();
///
///     // ... feed observations into the manager ...
///
///     handle.stop().await;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct PersistenceScheduler {
    manager: Arc<ModelManager>,
    interval: Duration,
}

impl PersistenceScheduler {
    /// Create a scheduler with a 60 second interval.
    pub fn new(manager: Arc<ModelManager>) -> Self {
        Self {
            manager,
            interval: Duration::from_secs(60),
        }
    }

    /// Set the flush interval.
    ///
    /// Intervals shorter than [`MIN_FLUSH_INTERVAL`] are raised to it.
    pub fn interval(mut self, interval: Duration) -> Self {
        if interval < MIN_FLUSH_INTERVAL {
            tracing::warn!(?interval, "Flush interval too short, using {:?}", MIN_FLUSH_INTERVAL);
        }
        self.interval = interval.max(MIN_FLUSH_INTERVAL);
        self
    }

    /// Start flushing in the background.
    ///
    /// The first flush happens one interval after starting.
    pub fn start(self) -> PersistenceHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let manager = self.manager;
        let interval = self.interval;

        let task = tokio::spawn(async move {
            let mut timer = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = timer.tick() => flush(&manager),
                    _ = stop_rx.changed() => {
                        if *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            flush(&manager);
        });

        PersistenceHandle { stop_tx, task }
    }
}

fn flush(manager: &ModelManager) {
    match manager.flush() {
        Ok(0) => {}
        Ok(written) => tracing::debug!(written, "Flushed dependency models"),
        Err(e) => tracing::error!(error = %e, "Failed to persist current dependency model"),
    }
}

/// Handle for a running [`PersistenceScheduler`].
#[derive(Debug)]
pub struct PersistenceHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PersistenceHandle {
    /// Stop the scheduler after one final flush.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Persistence task failed");
        }
    }
}
