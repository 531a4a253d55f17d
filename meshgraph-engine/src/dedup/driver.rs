//! Running a window on tokio.

use std::sync::Arc;
use std::time::Duration;

use meshgraph_types::{Clock, SystemClock, TelemetryEvent};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::{DedupedRecord, DeduplicationWindow};

/// A wall clock that advances with tokio's timer.
///
/// Reads the system time once at creation and then counts elapsed tokio
/// time, so paused-time tests see windows expire deterministically.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: Instant,
    origin_ms: u64,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            origin_ms: SystemClock.now_ms(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> u64 {
        self.origin_ms + self.origin.elapsed().as_millis() as u64
    }
}

/// Run a window as a task.
///
/// Records read from `input` go through the window and everything it emits
/// is sent to `output`. The task owns the eviction timer, which always
/// targets the oldest pending record. When `input` closes, the remaining
/// pending records are emitted unmerged and the task ends. It also ends if
/// `output` is dropped.
pub fn spawn_window(
    window: Arc<DeduplicationWindow>,
    mut input: mpsc::Receiver<TelemetryEvent>,
    output: mpsc::Sender<DedupedRecord>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let deadline = window.next_expiry();
            let wait = deadline
                .map(|at| Duration::from_millis(at.saturating_sub(window.now_ms())))
                .unwrap_or_default();

            let emitted = tokio::select! {
                received = input.recv() => match received {
                    Some(event) => window.process(event),
                    None => break,
                },
                _ = tokio::time::sleep(wait), if deadline.is_some() => window.expire(),
            };

            for record in emitted {
                if output.send(record).await.is_err() {
                    tracing::debug!("Deduplication output closed, stopping window");
                    return;
                }
            }
        }

        let remaining = window.drain();
        tracing::debug!(remaining = remaining.len(), "Deduplication input closed");
        for record in remaining {
            if output.send(record).await.is_err() {
                return;
            }
        }
    })
}
