//! Camera Stream
//!
//! Wraps a [`FrameSource`], numbers its frames and exposes a bounded delivery
//! point the synchronizer pulls from. Frames are only pushed while at least
//! one [`ActivationGuard`] is alive.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_channel::{bounded, Receiver, Sender, TryRecvError};
use contracts::{
    CameraId, CameraProfile, ContractError, FrameCallback, FrameRecord, FrameSource, StreamConfig,
};
use tokio::time::Instant;
use tracing::{debug, info, instrument, trace, warn};

use crate::config::{MetricsSnapshot, StreamMetrics};
use crate::delivery::deliver;

/// Result of polling a stream
#[derive(Debug)]
pub enum FramePoll {
    /// A frame was waiting
    Ready(FrameRecord),
    /// Nothing queued right now
    NotReady,
    /// The source is gone and the queue is drained
    Closed,
}

impl FramePoll {
    /// Frame, if ready
    pub fn into_frame(self) -> Option<FrameRecord> {
        match self {
            FramePoll::Ready(record) => Some(record),
            FramePoll::NotReady | FramePoll::Closed => None,
        }
    }

    /// Whether the stream is permanently closed
    pub fn is_closed(&self) -> bool {
        matches!(self, FramePoll::Closed)
    }
}

struct StreamShared {
    port: CameraId,
    active: AtomicUsize,
    next_index: AtomicU64,
    tx: Sender<FrameRecord>,
    evict: Receiver<FrameRecord>,
    metrics: Arc<StreamMetrics>,
}

impl StreamShared {
    fn on_frame(&self, result: Result<contracts::CapturedFrame, ContractError>, config: StreamConfig) {
        let frame = match result {
            Ok(frame) => frame,
            Err(err) => {
                if !self.tx.is_closed() {
                    warn!(port = %self.port, error = %err, "camera source failed, closing stream");
                    self.metrics.record_source_error();
                    self.tx.close();
                }
                return;
            }
        };

        let frame_index = self.next_index.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_captured();

        if self.active.load(Ordering::Acquire) == 0 {
            trace!(port = %self.port, frame_index, "stream inactive, frame not pushed");
            return;
        }

        if !frame.image.is_well_formed() {
            let err = ContractError::MalformedFrame {
                port: self.port,
                message: format!(
                    "{}x{} {:?} needs {} bytes, got {}",
                    frame.image.width,
                    frame.image.height,
                    frame.image.format,
                    frame.image.expected_len(),
                    frame.image.data.len()
                ),
            };
            warn!(frame_index, error = %err, "discarding frame");
            self.metrics.record_malformed();
            return;
        }

        let record = FrameRecord {
            port: self.port,
            frame: frame.image,
            frame_index,
            capture_timestamp: frame.timestamp,
        };
        deliver(
            &self.tx,
            &self.evict,
            record,
            &self.metrics,
            self.port,
            config.drop_policy,
        );
    }

    fn drain(&self) -> usize {
        let mut drained = 0;
        while self.evict.try_recv().is_ok() {
            drained += 1;
        }
        self.metrics.update_queue_len(0);
        drained
    }
}

/// Keeps a stream pushing frames while alive
///
/// Activation is reference counted: the stream is active iff at least one
/// guard exists. When the last guard is dropped, frames still queued are
/// discarded so a later activation starts fresh.
pub struct ActivationGuard {
    shared: Arc<StreamShared>,
}

impl std::fmt::Debug for ActivationGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivationGuard")
            .field("port", &self.shared.port)
            .finish()
    }
}

impl Drop for ActivationGuard {
    fn drop(&mut self) {
        if self.shared.active.fetch_sub(1, Ordering::AcqRel) == 1 {
            let drained = self.shared.drain();
            debug!(port = %self.shared.port, drained, "stream deactivated");
        }
    }
}

/// Camera stream
pub struct CameraStream {
    profile: CameraProfile,
    config: StreamConfig,
    source: Box<dyn FrameSource>,
    shared: Arc<StreamShared>,
    rx: Receiver<FrameRecord>,
    started: AtomicBool,
}

impl CameraStream {
    /// Wrap a source
    pub fn new(source: Box<dyn FrameSource>, config: StreamConfig) -> Self {
        let profile = source.profile();
        let (tx, rx) = bounded(config.delivery_capacity.max(1));
        let shared = Arc::new(StreamShared {
            port: profile.port,
            active: AtomicUsize::new(0),
            next_index: AtomicU64::new(0),
            tx,
            evict: rx.clone(),
            metrics: Arc::new(StreamMetrics::new(profile.port)),
        });

        Self {
            profile,
            config,
            source,
            shared,
            rx,
            started: AtomicBool::new(false),
        }
    }

    /// Camera port
    pub fn port(&self) -> CameraId {
        self.profile.port
    }

    /// Configured rate and resolution
    pub fn profile(&self) -> CameraProfile {
        self.profile
    }

    /// Begin capture (idempotent)
    #[instrument(name = "camera_stream_start", skip(self), fields(port = %self.port()))]
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.shared.tx.is_closed() {
            warn!("stream already stopped, not restarting");
            return;
        }

        let shared = Arc::clone(&self.shared);
        let config = self.config;
        let callback: FrameCallback = Arc::new(move |result| shared.on_frame(result, config));
        self.source.listen(callback);
        info!(
            fps = self.profile.fps,
            width = self.profile.width,
            height = self.profile.height,
            "camera stream started"
        );
    }

    /// End capture and close the delivery point
    ///
    /// Frames already queued can still be drained; after that every poll
    /// returns [`FramePoll::Closed`].
    #[instrument(name = "camera_stream_stop", skip(self), fields(port = %self.port()))]
    pub fn stop(&self) {
        if self.source.is_listening() {
            self.source.stop();
        }
        if self.shared.tx.close() {
            info!("camera stream stopped");
        }
    }

    /// Take an activation reference
    pub fn activate(&self) -> ActivationGuard {
        if self.shared.active.fetch_add(1, Ordering::AcqRel) == 0 {
            debug!(port = %self.port(), "stream activated");
        }
        ActivationGuard {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Whether at least one activation guard is alive
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire) > 0
    }

    /// Whether the delivery point is closed and drained
    pub fn is_closed(&self) -> bool {
        self.rx.is_closed() && self.rx.is_empty()
    }

    /// Non-blocking poll
    pub fn try_next(&self) -> FramePoll {
        let poll = match self.rx.try_recv() {
            Ok(record) => FramePoll::Ready(record),
            Err(TryRecvError::Empty) => FramePoll::NotReady,
            Err(TryRecvError::Closed) => FramePoll::Closed,
        };
        self.shared.metrics.update_queue_len(self.rx.len());
        poll
    }

    /// Wait up to `timeout` for a frame
    pub async fn next_within(&self, timeout: Duration) -> FramePoll {
        self.next_until(Instant::now() + timeout).await
    }

    /// Wait until `deadline` for a frame
    pub async fn next_until(&self, deadline: Instant) -> FramePoll {
        match tokio::time::timeout_at(deadline, self.rx.recv()).await {
            Ok(Ok(record)) => FramePoll::Ready(record),
            Ok(Err(_)) => FramePoll::Closed,
            Err(_) => FramePoll::NotReady,
        }
    }

    /// Counters
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.stop();
    }
}
