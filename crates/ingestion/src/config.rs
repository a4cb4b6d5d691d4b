//! Stream metrics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use contracts::CameraId;

pub use contracts::{DropPolicy, StreamConfig};

/// Per-stream counters
///
/// Kept as atomics for in-process snapshots and mirrored to the `metrics`
/// facade with a `port` label.
#[derive(Debug)]
pub struct StreamMetrics {
    port: String,

    /// Frames produced by the source (including inactive periods)
    pub frames_captured: AtomicU64,

    /// Frames placed on the delivery point
    pub frames_delivered: AtomicU64,

    /// Frames lost to the drop policy
    pub frames_dropped: AtomicU64,

    /// Frames rejected because the pixel buffer was inconsistent
    pub frames_malformed: AtomicU64,

    /// Current delivery queue length
    pub queue_len: AtomicUsize,

    /// Source failures
    pub source_errors: AtomicU64,
}

impl StreamMetrics {
    /// Create new metrics instance
    pub fn new(port: CameraId) -> Self {
        Self {
            port: port.to_string(),
            frames_captured: AtomicU64::new(0),
            frames_delivered: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            frames_malformed: AtomicU64::new(0),
            queue_len: AtomicUsize::new(0),
            source_errors: AtomicU64::new(0),
        }
    }

    /// Record frame captured
    pub fn record_captured(&self) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("rigsync_frames_captured_total", "port" => self.port.clone()).increment(1);
    }

    /// Record frame delivered
    pub fn record_delivered(&self, queue_len: usize) {
        self.frames_delivered.fetch_add(1, Ordering::Relaxed);
        self.update_queue_len(queue_len);
    }

    /// Record frame dropped
    pub fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("rigsync_frames_dropped_total", "port" => self.port.clone()).increment(1);
    }

    /// Record malformed frame
    pub fn record_malformed(&self) {
        self.frames_malformed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record source error
    pub fn record_source_error(&self) {
        self.source_errors.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("rigsync_source_errors_total", "port" => self.port.clone()).increment(1);
    }

    /// Update queue length
    pub fn update_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
        metrics::gauge!("rigsync_delivery_queue_len", "port" => self.port.clone()).set(len as f64);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            frames_malformed: self.frames_malformed.load(Ordering::Relaxed),
            queue_len: self.queue_len.load(Ordering::Relaxed),
            source_errors: self.source_errors.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub frames_captured: u64,
    pub frames_delivered: u64,
    pub frames_dropped: u64,
    pub frames_malformed: u64,
    pub queue_len: usize,
    pub source_errors: u64,
}
