//! Replaying telemetry into a model manager.
//!
//! ```text
//!  reader ──► deduplication window ──► observe_call ──► ModelManager
//!                                                           │
//!                                          PersistenceScheduler (flush)
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use meshgraph_engine::dedup::spawn_window;
use meshgraph_engine::{
    CallObservation, DedupedRecord, DeduplicationWindow, ModelManager, PersistenceScheduler,
};
use tokio::io::AsyncRead;
use tokio::sync::mpsc;

use crate::source::{forward_events, ReadSummary};

const CHANNEL_CAPACITY: usize = 1024;

/// Counts from one replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub read: ReadSummary,
    /// Records leaving the window.
    pub records: usize,
    /// Records that were two observations merged into one.
    pub merged: usize,
    /// Dependencies seen for the first time.
    pub new_edges: usize,
}

/// Everything a replay needs apart from its input.
#[derive(Debug)]
pub struct Pipeline {
    manager: Arc<ModelManager>,
    window: Arc<DeduplicationWindow>,
    flush_interval: Duration,
    runtime: Option<String>,
}

impl Pipeline {
    pub fn new(manager: Arc<ModelManager>, window: DeduplicationWindow) -> Self {
        Self {
            manager,
            window: Arc::new(window),
            flush_interval: Duration::from_secs(60),
            runtime: None,
        }
    }

    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Runtime for records that do not name one.
    pub fn runtime(mut self, runtime: Option<String>) -> Self {
        self.runtime = runtime;
        self
    }

    /// Read `reader` to the end and feed every call into the manager.
    ///
    /// Records still waiting in the window when the input ends are emitted
    /// unmerged, and the live models are flushed once more before returning.
    pub async fn run<R>(self, reader: R) -> Result<RunSummary>
    where
        R: AsyncRead + Unpin,
    {
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (record_tx, record_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let window_task = spawn_window(self.window.clone(), event_rx, record_tx);
        let observer = tokio::spawn(observe(self.manager.clone(), record_rx));
        let persistence = PersistenceScheduler::new(self.manager.clone())
            .interval(self.flush_interval)
            .start();

        let read = forward_events(reader, self.runtime.as_deref(), &event_tx).await;
        drop(event_tx);

        window_task.await.context("Deduplication window failed")?;
        let mut summary = observer.await.context("Observer failed")?;
        persistence.stop().await;

        summary.read = read?;
        Ok(summary)
    }
}

async fn observe(manager: Arc<ModelManager>, mut records: mpsc::Receiver<DedupedRecord>) -> RunSummary {
    let mut summary = RunSummary::default();
    while let Some(record) = records.recv().await {
        summary.records += 1;
        if record.merged {
            summary.merged += 1;
        }
        if manager.observe_call(&CallObservation::from_event(&record.event)) {
            summary.new_edges += 1;
        }
    }
    summary
}
