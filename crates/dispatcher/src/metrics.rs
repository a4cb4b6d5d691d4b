//! Sink metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters for a single sink worker
///
/// Kept as atomics for in-process summaries and mirrored to the `metrics`
/// facade labelled by sink name.
#[derive(Debug)]
pub struct SinkMetrics {
    sink: String,
    queue_len: AtomicUsize,
    write_count: AtomicU64,
    failure_count: AtomicU64,
    last_sync_index: AtomicU64,
}

impl SinkMetrics {
    pub fn new(sink: impl Into<String>) -> Self {
        Self {
            sink: sink.into(),
            queue_len: AtomicUsize::new(0),
            write_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            last_sync_index: AtomicU64::new(0),
        }
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
        metrics::gauge!("rigsync_sink_queue_len", "sink" => self.sink.clone()).set(len as f64);
    }

    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    pub fn record_write(&self, sync_index: u64) {
        self.write_count.fetch_add(1, Ordering::Relaxed);
        self.last_sync_index.store(sync_index, Ordering::Relaxed);
        metrics::counter!("rigsync_sink_writes_total", "sink" => self.sink.clone()).increment(1);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn record_failure(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("rigsync_sink_failures_total", "sink" => self.sink.clone()).increment(1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            write_count: self.write_count(),
            failure_count: self.failure_count(),
            last_sync_index: self.last_sync_index.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub write_count: u64,
    pub failure_count: u64,
    pub last_sync_index: u64,
}
