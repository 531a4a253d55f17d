//! Collapsing the two observed sides of a call into one record.
//!
//! A call between two components is usually reported twice: once by the
//! caller and once by the callee. Both records share the trace, the source
//! and the destination, and one record's span is the parent of the other's.
//! The [`DeduplicationWindow`] holds each record for a fixed time waiting
//! for its dual. A pair is merged and emitted as soon as the second record
//! arrives; a record that never finds its dual is emitted alone once its
//! window has elapsed.
//!
//! ```text
//!  record ──► matches pending? ──yes──► merge (max of measurements) ──► emit
//!                  │
//!                  no
//!                  ▼
//!               pending ──── arrival + window elapsed ────► emit as-is
//! ```

mod config;
#[cfg(feature = "tokio")]
mod driver;

use std::collections::VecDeque;
use std::sync::Arc;

use meshgraph_types::{Clock, StreamSchema, TelemetryEvent};
use parking_lot::Mutex;

pub use config::{ConfigError, DedupConfig, DedupFields};
#[cfg(feature = "tokio")]
pub use driver::{spawn_window, TokioClock};

/// A record leaving the window.
#[derive(Debug, Clone, PartialEq)]
pub struct DedupedRecord {
    /// When the record was emitted, in clock milliseconds.
    pub timestamp_ms: u64,
    /// The last record received for this call.
    pub event: TelemetryEvent,
    /// Whether two observations were merged into this record.
    pub merged: bool,
    /// Largest request size in bytes across the merged records.
    pub max_request_size: Option<i64>,
    /// Largest response duration across the merged records.
    pub max_response_duration: Option<i64>,
    /// Largest response size in bytes across the merged records.
    pub max_response_size: Option<i64>,
}

#[derive(Debug)]
struct Pending {
    arrival_ms: u64,
    event: TelemetryEvent,
}

/// A sliding time window that merges duplicate call observations.
///
/// All state sits behind one lock: matching an incoming record, removing
/// its dual and expiring old records never interleave.
///
/// The window does not own a timer. Call [`expire`](Self::expire) at
/// [`next_expiry`](Self::next_expiry), or let [`spawn_window`] do it.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use meshgraph_engine::dedup::{DedupConfig, DeduplicationWindow};
/// use meshgraph_types::{ManualClock, StreamSchema, TelemetryEvent};
///
/// let clock = Arc::new(ManualClock::new(0));
/// let window = DeduplicationWindow::new(
///     DedupConfig::new(1_000),
///     &StreamSchema::telemetry(),
///     clock.clone(),
/// ).unwrap();
///
/// let client = TelemetryEvent::new()
///     .with("traceId", "t1")
///     .with("spanId", "s1")
///     .with("requestSizeBytes", 100i64);
/// let server = TelemetryEvent::new()
///     .with("traceId", "t1")
///     .with("spanId", "s2")
///     .with("parentSpanId", "s1")
///     .with("requestSizeBytes", 150i64);
///
/// assert!(window.process(client).is_empty());
/// let merged = window.process(server);
/// assert_eq!(merged.len(), 1);
/// assert_eq!(merged[0].max_request_size, Some(150));
/// ```
#[derive(Debug)]
pub struct DeduplicationWindow {
    window_ms: u64,
    fields: DedupFields,
    clock: Arc<dyn Clock>,
    pending: Mutex<VecDeque<Pending>>,
}

impl DeduplicationWindow {
    /// Create a window, validating the configuration against the stream.
    pub fn new(
        config: DedupConfig,
        schema: &StreamSchema,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let window_ms = config.validate(schema)?;
        Ok(Self {
            window_ms,
            fields: config.fields,
            clock,
            pending: Mutex::new(VecDeque::new()),
        })
    }

    /// Window length in milliseconds.
    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// The window's current time.
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Number of records waiting for a dual.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// When the oldest pending record expires.
    pub fn next_expiry(&self) -> Option<u64> {
        self.pending
            .lock()
            .front()
            .map(|pending| pending.arrival_ms.saturating_add(self.window_ms))
    }

    /// Accept a record.
    ///
    /// Returns the records emitted as a result: any pending records whose
    /// window elapsed, then the merged pair if this record completed one.
    pub fn process(&self, event: TelemetryEvent) -> Vec<DedupedRecord> {
        let mut pending = self.pending.lock();
        let now = self.clock.now_ms();
        let mut emitted = self.expire_due(&mut pending, now);

        let dual = pending
            .iter()
            .position(|candidate| self.is_duplicate(&candidate.event, &event));
        match dual.and_then(|index| pending.remove(index)) {
            Some(dual) => {
                tracing::trace!(
                    waited_ms = now.saturating_sub(dual.arrival_ms),
                    "Merged duplicate call observation"
                );
                emitted.push(self.merge(Some(&dual.event), event, now));
            }
            None => pending.push_back(Pending {
                arrival_ms: now,
                event,
            }),
        }
        emitted
    }

    /// Emit every pending record whose window has elapsed.
    pub fn expire(&self) -> Vec<DedupedRecord> {
        let mut pending = self.pending.lock();
        let now = self.clock.now_ms();
        self.expire_due(&mut pending, now)
    }

    /// Emit every pending record regardless of age.
    pub fn drain(&self) -> Vec<DedupedRecord> {
        let mut pending = self.pending.lock();
        let now = self.clock.now_ms();
        pending
            .drain(..)
            .map(|record| self.merge(None, record.event, now))
            .collect()
    }

    fn expire_due(&self, pending: &mut VecDeque<Pending>, now: u64) -> Vec<DedupedRecord> {
        let mut expired = Vec::new();
        while let Some(oldest) = pending.front() {
            if oldest.arrival_ms.saturating_add(self.window_ms) > now {
                break;
            }
            if let Some(oldest) = pending.pop_front() {
                expired.push(self.merge(None, oldest.event, now));
            }
        }
        expired
    }

    /// Two records describe the same call when they share the trace, the
    /// source and the destination, and one span is the other's parent.
    fn is_duplicate(&self, earlier: &TelemetryEvent, current: &TelemetryEvent) -> bool {
        let f = &self.fields;
        let same = |name: &str| earlier.get_str(name) == current.get_str(name);

        same(&f.source_namespace)
            && same(&f.source_instance)
            && same(&f.source_component)
            && same(&f.destination_namespace)
            && same(&f.destination_instance)
            && same(&f.destination_component)
            && same(&f.trace_id)
            && (current.get_str(&f.parent_span_id) == earlier.get_str(&f.span_id)
                || current.get_str(&f.span_id) == earlier.get_str(&f.parent_span_id))
    }

    fn merge(
        &self,
        earlier: Option<&TelemetryEvent>,
        current: TelemetryEvent,
        now: u64,
    ) -> DedupedRecord {
        let f = &self.fields;
        let max = |name: &str| {
            let value = current.get_long(name);
            match earlier {
                Some(earlier) => value.max(earlier.get_long(name)),
                None => value,
            }
        };

        DedupedRecord {
            timestamp_ms: now,
            merged: earlier.is_some(),
            max_request_size: max(&f.request_size),
            max_response_duration: max(&f.response_duration),
            max_response_size: max(&f.response_size),
            event: current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshgraph_types::{attributes, ManualClock};

    fn window(window_ms: i64) -> (DeduplicationWindow, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(10_000));
        let window = DeduplicationWindow::new(
            DedupConfig::new(window_ms),
            &StreamSchema::telemetry(),
            clock.clone(),
        )
        .unwrap();
        (window, clock)
    }

    fn call(span: &str, parent: Option<&str>, request_size: i64) -> TelemetryEvent {
        TelemetryEvent::new()
            .with(attributes::TRACE_ID, "trace-1")
            .with(attributes::SPAN_ID, span)
            .with(attributes::PARENT_SPAN_ID, parent)
            .with(attributes::SOURCE_NAMESPACE, "ns1")
            .with(attributes::SOURCE_INSTANCE, "hr")
            .with(attributes::SOURCE_COMPONENT, "gateway")
            .with(attributes::DESTINATION_NAMESPACE, "ns1")
            .with(attributes::DESTINATION_INSTANCE, "hr")
            .with(attributes::DESTINATION_COMPONENT, "backend")
            .with(attributes::REQUEST_SIZE_BYTES, request_size)
            .with(attributes::RESPONSE_DURATION, 20i64)
            .with(attributes::RESPONSE_SIZE_BYTES, 300i64)
    }

    #[test]
    fn child_after_parent_is_merged_immediately() {
        let (window, clock) = window(1_000);
        assert!(window.process(call("s1", None, 100)).is_empty());
        clock.advance(10);

        let emitted = window.process(call("s2", Some("s1"), 150));
        assert_eq!(emitted.len(), 1);
        let record = &emitted[0];
        assert!(record.merged);
        assert_eq!(record.timestamp_ms, 10_010);
        assert_eq!(record.max_request_size, Some(150));
        assert_eq!(record.max_response_duration, Some(20));
        assert_eq!(record.max_response_size, Some(300));
        assert_eq!(window.pending_len(), 0);
    }

    #[test]
    fn parent_after_child_is_merged_immediately() {
        let (window, _) = window(1_000);
        assert!(window.process(call("s2", Some("s1"), 150)).is_empty());

        let emitted = window.process(call("s1", None, 100));
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].max_request_size, Some(150));
        assert_eq!(emitted[0].event.get_str(attributes::SPAN_ID), Some("s1"));
    }

    #[test]
    fn merged_pair_is_not_emitted_again_on_expiry() {
        let (window, clock) = window(1_000);
        window.process(call("s1", None, 100));
        window.process(call("s2", Some("s1"), 150));

        clock.advance(5_000);
        assert!(window.expire().is_empty());
    }

    #[test]
    fn unmatched_record_expires_unmerged() {
        let (window, clock) = window(1_000);
        window.process(call("s1", None, 100));
        assert_eq!(window.next_expiry(), Some(11_000));

        clock.advance(999);
        assert!(window.expire().is_empty());

        clock.advance(1);
        let expired = window.expire();
        assert_eq!(expired.len(), 1);
        assert!(!expired[0].merged);
        assert_eq!(expired[0].max_request_size, Some(100));
        assert_eq!(expired[0].event, call("s1", None, 100));
        assert_eq!(window.next_expiry(), None);
    }

    #[test]
    fn dual_arriving_after_expiry_is_not_merged() {
        let (window, clock) = window(1_000);
        window.process(call("s1", None, 100));
        clock.advance(1_500);

        let emitted = window.process(call("s2", Some("s1"), 150));
        assert_eq!(emitted.len(), 1);
        assert!(!emitted[0].merged);
        assert_eq!(emitted[0].max_request_size, Some(100));
        assert_eq!(window.pending_len(), 1);
    }

    #[test]
    fn different_trace_is_not_a_duplicate() {
        let (window, _) = window(1_000);
        window.process(call("s1", None, 100));
        let other = call("s2", Some("s1"), 150).with(attributes::TRACE_ID, "trace-2");

        assert!(window.process(other).is_empty());
        assert_eq!(window.pending_len(), 2);
    }

    #[test]
    fn different_destination_is_not_a_duplicate() {
        let (window, _) = window(1_000);
        window.process(call("s1", None, 100));
        let other = call("s2", Some("s1"), 150).with(attributes::DESTINATION_COMPONENT, "db");

        assert!(window.process(other).is_empty());
    }

    #[test]
    fn unrelated_spans_are_not_duplicates() {
        let (window, _) = window(1_000);
        window.process(call("s1", Some("s0"), 100));
        assert!(window.process(call("s3", Some("s2"), 100)).is_empty());
    }

    #[test]
    fn a_record_pairs_with_one_dual_only() {
        let (window, _) = window(1_000);
        window.process(call("s1", None, 100));
        window.process(call("s2", Some("s1"), 150));

        let third = window.process(call("s3", Some("s1"), 200));
        assert!(third.is_empty());
        assert_eq!(window.pending_len(), 1);
    }

    #[test]
    fn missing_measurements_merge_as_absent() {
        let (window, _) = window(1_000);
        let mut first = call("s1", None, 100);
        first.attributes.remove(attributes::RESPONSE_SIZE_BYTES);
        let mut second = call("s2", Some("s1"), 50);
        second.attributes.remove(attributes::RESPONSE_SIZE_BYTES);

        window.process(first);
        let merged = window.process(second);
        assert_eq!(merged[0].max_request_size, Some(100));
        assert_eq!(merged[0].max_response_size, None);
    }

    #[test]
    fn zero_window_expires_on_next_tick() {
        let (window, _) = window(0);
        assert!(window.process(call("s1", None, 100)).is_empty());
        assert_eq!(window.expire().len(), 1);
    }

    #[test]
    fn expiry_emits_in_arrival_order() {
        let (window, clock) = window(100);
        window.process(call("a", Some("x"), 1));
        clock.advance(10);
        window.process(call("b", Some("y"), 2));

        clock.advance(200);
        let sizes: Vec<_> = window.expire().iter().map(|r| r.max_request_size).collect();
        assert_eq!(sizes, vec![Some(1), Some(2)]);
    }

    #[test]
    fn drain_flushes_everything() {
        let (window, _) = window(60_000);
        window.process(call("a", Some("x"), 1));
        window.process(call("b", Some("y"), 2));

        assert_eq!(window.drain().len(), 2);
        assert_eq!(window.pending_len(), 0);
    }

    #[test]
    fn invalid_config_fails_construction() {
        let err = DeduplicationWindow::new(
            DedupConfig::new(-5),
            &StreamSchema::telemetry(),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::NegativeWindow(-5));
    }
}
