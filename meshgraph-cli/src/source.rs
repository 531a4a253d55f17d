//! Reading telemetry records from newline-delimited JSON.
//!
//! Each line holds one JSON object whose members are record attributes,
//! e.g. `{"traceId":"t1","spanId":"s1","sourceComponent":"gateway",...}`.

use std::path::Path;

use anyhow::{Context, Result};
use meshgraph_types::{attributes, TelemetryEvent};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;

/// Counts from one pass over an input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadSummary {
    /// Records handed to the window.
    pub forwarded: usize,
    /// Lines that did not hold a record.
    pub skipped: usize,
}

/// Open an input path, with `-` meaning standard input.
pub async fn open_input(path: &Path) -> Result<Box<dyn AsyncRead + Unpin + Send>> {
    if path == Path::new("-") {
        return Ok(Box::new(tokio::io::stdin()));
    }
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open input {}", path.display()))?;
    Ok(Box::new(file))
}

/// Parse records from `reader` and send them to `tx`.
///
/// Malformed lines are logged and skipped. When `runtime` is given it is
/// filled into records that carry no runtime of their own. Stops early if
/// the receiver goes away.
pub async fn forward_events<R>(
    reader: R,
    runtime: Option<&str>,
    tx: &mpsc::Sender<TelemetryEvent>,
) -> Result<ReadSummary>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut summary = ReadSummary::default();
    let mut line_number = 0usize;

    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        line_number += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut event = match serde_json::from_str::<TelemetryEvent>(line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(line = line_number, error = %e, "Skipping malformed record");
                summary.skipped += 1;
                continue;
            }
        };
        if let Some(runtime) = runtime {
            if event.get_str(attributes::RUNTIME).map_or(true, str::is_empty) {
                event.set(attributes::RUNTIME, runtime);
            }
        }

        if tx.send(event).await.is_err() {
            tracing::debug!("Record receiver closed, stopping input");
            break;
        }
        summary.forwarded += 1;
    }

    Ok(summary)
}
