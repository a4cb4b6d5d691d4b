//! Synchronizer
//!
//! Pulls frames from N camera streams once per cycle, applies the alignment
//! policy and publishes one `SyncBundle` per cycle to every subscriber.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    unix_seconds, AlignmentPolicy, CameraId, CameraProfile, FrameRecord, LaneStats, SyncBundle,
    SynchronizerConfig,
};
use ingestion::{CameraStream, FramePoll};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::buffer::FrameBuffer;
use crate::error::SyncError;
use crate::registry::{Subscription, SubscriptionRegistry};

/// Frames kept per camera between cycles
const LANE_CAPACITY: usize = 32;

/// Synchronizer run state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Producing cycles
    Running,
    /// Not producing cycles, subscriptions retained
    Paused,
    /// Terminal
    Stopped,
}

struct Lane {
    port: CameraId,
    buffer: FrameBuffer,
    absent: bool,
    stats: LaneStats,
}

impl Lane {
    fn mark_absent(&mut self) {
        if !self.absent {
            self.absent = true;
            self.stats.disconnected = true;
            warn!(port = %self.port, "camera stream closed, marking permanently absent");
            metrics::counter!("rigsync_camera_disconnects_total", "port" => self.port.to_string())
                .increment(1);
        }
    }

    /// Move everything queued on the stream into the buffer
    fn drain(&mut self, stream: &CameraStream) {
        loop {
            match stream.try_next() {
                FramePoll::Ready(record) => self.buffer.push(record),
                FramePoll::NotReady => break,
                FramePoll::Closed => {
                    self.mark_absent();
                    break;
                }
            }
        }
    }

    fn select(&mut self, policy: AlignmentPolicy, reference: f64) -> Option<FrameRecord> {
        let (frame, discarded) = match policy {
            AlignmentPolicy::LatestAvailable => self.buffer.take_latest(),
            AlignmentPolicy::NearestTimestamp { window_ms } => self
                .buffer
                .take_closest_in_window(reference, window_ms / 1000.0),
        };
        self.stats.discarded += discarded as u64;
        match &frame {
            Some(_) => self.stats.delivered += 1,
            None => {
                self.stats.absent += 1;
                metrics::counter!("rigsync_camera_absent_total", "port" => self.port.to_string())
                    .increment(1);
            }
        }
        frame
    }
}

struct CycleState {
    lanes: Vec<Lane>,
    next_sync_index: u64,
}

/// Multi-camera synchronizer
///
/// Share it behind an `Arc`: one task runs the cycle loop, any other task may
/// subscribe, pause, resume or stop concurrently.
pub struct Synchronizer {
    config: SynchronizerConfig,
    period: Duration,
    streams: Arc<Vec<CameraStream>>,
    registry: Arc<SubscriptionRegistry>,
    cycle: Mutex<CycleState>,
    control: watch::Sender<RunState>,
}

impl Synchronizer {
    /// Create a synchronizer over the given streams
    ///
    /// # Errors
    /// - `target_fps` not positive
    /// - nearest-timestamp window not positive
    /// - two streams with the same port
    pub fn new(streams: Vec<CameraStream>, config: SynchronizerConfig) -> Result<Self, SyncError> {
        if !(config.target_fps > 0.0) || !config.target_fps.is_finite() {
            return Err(SyncError::InvalidRate(config.target_fps));
        }
        if let AlignmentPolicy::NearestTimestamp { window_ms } = config.alignment {
            if !(window_ms > 0.0) {
                return Err(SyncError::InvalidWindow(window_ms));
            }
        }
        let mut seen = HashSet::new();
        for stream in &streams {
            if !seen.insert(stream.port()) {
                return Err(SyncError::DuplicatePort(stream.port()));
            }
        }

        let lanes = streams
            .iter()
            .map(|stream| Lane {
                port: stream.port(),
                buffer: FrameBuffer::new(LANE_CAPACITY),
                absent: false,
                stats: LaneStats::default(),
            })
            .collect();

        let streams = Arc::new(streams);
        let registry = Arc::new(SubscriptionRegistry::new(Arc::clone(&streams)));
        let (control, _) = watch::channel(RunState::Running);

        Ok(Self {
            config,
            period: Duration::from_secs_f64(config.cycle_period_secs()),
            streams,
            registry,
            cycle: Mutex::new(CycleState {
                lanes,
                next_sync_index: 0,
            }),
            control,
        })
    }

    /// Configuration
    pub fn config(&self) -> &SynchronizerConfig {
        &self.config
    }

    /// Start capture on every stream (idempotent)
    pub fn start_streams(&self) {
        for stream in self.streams.iter() {
            stream.start();
        }
    }

    /// Spawn the cycle loop on the current runtime
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run().await })
    }

    /// Cycle loop; returns after [`stop`](Self::stop)
    #[instrument(name = "synchronizer_run", skip(self), fields(cameras = self.streams.len(), target_fps = self.config.target_fps))]
    pub async fn run(&self) {
        self.start_streams();

        let mut control = self.control.subscribe();
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("synchronizer started");

        loop {
            let state = *control.borrow_and_update();
            match state {
                RunState::Stopped => break,
                RunState::Paused => {
                    if control.changed().await.is_err() {
                        break;
                    }
                    ticker.reset();
                    continue;
                }
                RunState::Running => {}
            }

            tokio::select! {
                biased;
                changed = control.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            if *self.control.borrow() != RunState::Running {
                continue;
            }
            let bundle = self.step().await;
            if bundle.sync_index % 100 == 0 {
                debug!(
                    sync_index = bundle.sync_index,
                    present = bundle.present_count(),
                    subscribers = self.registry.subscriber_count(),
                    "synchronizer progress"
                );
            }
        }

        let cycles = self.cycle.lock().await.next_sync_index;
        info!(cycles, "synchronizer stopped");
    }

    /// Produce and publish exactly one bundle
    ///
    /// Used by the cycle loop; callable directly to drive cycles by hand.
    pub async fn step(&self) -> Arc<SyncBundle> {
        let mut cycle = self.cycle.lock().await;
        let started = Instant::now();
        let deadline = started + self.period;
        let cycle_time = unix_seconds();

        let mut entries = BTreeMap::new();
        for (lane, stream) in cycle.lanes.iter_mut().zip(self.streams.iter()) {
            if lane.absent {
                lane.stats.absent += 1;
                entries.insert(lane.port, None);
                continue;
            }

            lane.drain(stream);
            if lane.buffer.is_empty() && !lane.absent {
                match stream.next_until(deadline).await {
                    FramePoll::Ready(record) => {
                        lane.buffer.push(record);
                        lane.drain(stream);
                    }
                    FramePoll::NotReady => {}
                    FramePoll::Closed => lane.mark_absent(),
                }
            }

            let frame = lane.select(self.config.alignment, cycle_time);
            entries.insert(lane.port, frame);
        }

        let bundle = Arc::new(SyncBundle {
            sync_index: cycle.next_sync_index,
            cycle_time,
            entries,
        });
        cycle.next_sync_index += 1;
        // publish before releasing the cycle so queues see indices in order
        let reached = self.registry.publish(&bundle);
        drop(cycle);

        self.record_cycle_metrics(&bundle, started.elapsed(), reached);
        bundle
    }

    fn record_cycle_metrics(&self, bundle: &SyncBundle, elapsed: Duration, reached: usize) {
        metrics::counter!("rigsync_bundles_total").increment(1);
        metrics::histogram!("rigsync_bundle_completeness").record(bundle.completeness());
        metrics::histogram!("rigsync_cycle_duration_ms").record(elapsed.as_secs_f64() * 1000.0);
        metrics::gauge!("rigsync_last_sync_index").set(bundle.sync_index as f64);
        if elapsed > self.period {
            metrics::counter!("rigsync_cycle_overruns_total").increment(1);
            debug!(
                sync_index = bundle.sync_index,
                elapsed_ms = elapsed.as_millis() as u64,
                reached,
                "cycle exceeded its budget"
            );
        }
    }

    /// Register a subscriber; it receives bundles from the next published cycle
    pub fn subscribe(&self) -> Subscription {
        self.registry.register()
    }

    /// Release a subscriber; bundles still queued are discarded
    pub fn unsubscribe(&self, subscription: Subscription) {
        drop(subscription);
    }

    /// Stop producing cycles
    ///
    /// Subscriptions and camera activation are kept: streams keep delivering
    /// frames, reachable through [`stream`](Self::stream).
    #[instrument(name = "synchronizer_pause", skip(self))]
    pub fn pause(&self) {
        let changed = self.control.send_if_modified(|state| {
            if *state == RunState::Running {
                *state = RunState::Paused;
                true
            } else {
                false
            }
        });
        if changed {
            info!("synchronizer paused");
        }
    }

    /// Resume producing cycles; `sync_index` continues where it left off
    #[instrument(name = "synchronizer_resume", skip(self))]
    pub fn resume(&self) {
        let changed = self.control.send_if_modified(|state| {
            if *state == RunState::Paused {
                *state = RunState::Running;
                true
            } else {
                false
            }
        });
        if changed {
            info!("synchronizer resumed");
        }
    }

    /// Terminal stop (idempotent)
    ///
    /// The cycle loop exits, capture ends and every subscriber queue is
    /// closed; consumers see end-of-stream after draining.
    #[instrument(name = "synchronizer_stop", skip(self))]
    pub fn stop(&self) {
        let changed = self.control.send_if_modified(|state| {
            if *state == RunState::Stopped {
                false
            } else {
                *state = RunState::Stopped;
                true
            }
        });
        if changed {
            self.registry.close();
            for stream in self.streams.iter() {
                stream.stop();
            }
            info!("synchronizer stop requested");
        }
    }

    /// Current run state
    pub fn state(&self) -> RunState {
        *self.control.borrow()
    }

    /// Cameras currently known (streams not permanently closed)
    pub fn cameras(&self) -> Vec<CameraProfile> {
        self.streams
            .iter()
            .filter(|stream| !stream.is_closed())
            .map(CameraStream::profile)
            .collect()
    }

    /// Stream of one camera
    ///
    /// Frames taken here bypass alignment; meant for consumers that need the
    /// raw camera while cycles are paused.
    pub fn stream(&self, port: CameraId) -> Option<&CameraStream> {
        self.streams.iter().find(|stream| stream.port() == port)
    }

    /// Registered subscriber count
    pub fn subscriber_count(&self) -> usize {
        self.registry.subscriber_count()
    }

    /// Whether cameras are currently pushing frames
    pub fn cameras_active(&self) -> bool {
        self.registry.is_activated()
    }

    /// Bundles produced so far
    pub async fn cycles(&self) -> u64 {
        self.cycle.lock().await.next_sync_index
    }

    /// Per-camera delivery counters
    pub async fn lane_stats(&self) -> BTreeMap<CameraId, LaneStats> {
        self.cycle
            .lock()
            .await
            .lanes
            .iter()
            .map(|lane| (lane.port, lane.stats.clone()))
            .collect()
    }

    /// Stream counters by port
    pub fn stream_metrics(&self) -> BTreeMap<CameraId, ingestion::MetricsSnapshot> {
        self.streams
            .iter()
            .map(|stream| (stream.port(), stream.metrics()))
            .collect()
    }
}

impl Drop for Synchronizer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ImageData, PixelFormat, StreamConfig};
    use ingestion::{PushHandle, PushSource};

    fn camera(port: u32) -> (CameraStream, PushHandle) {
        let (source, handle) = PushSource::new(CameraProfile {
            port: CameraId::new(port),
            fps: 30.0,
            width: 2,
            height: 2,
            rotation_count: 0,
        });
        (
            CameraStream::new(Box::new(source), StreamConfig::default()),
            handle,
        )
    }

    fn tiny() -> ImageData {
        ImageData::new(2, 2, PixelFormat::Gray8, vec![0u8; 4])
    }

    /// Two pushed cameras behind a fast synchronizer (1 ms cycle budget)
    fn rig() -> (Synchronizer, PushHandle, PushHandle) {
        let (a, handle_a) = camera(0);
        let (b, handle_b) = camera(1);
        let sync = Synchronizer::new(
            vec![a, b],
            SynchronizerConfig {
                target_fps: 1000.0,
                alignment: AlignmentPolicy::LatestAvailable,
            },
        )
        .unwrap();
        sync.start_streams();
        (sync, handle_a, handle_b)
    }

    #[test]
    fn test_rejects_bad_config() {
        let (a, _ha) = camera(0);
        let result = Synchronizer::new(
            vec![a],
            SynchronizerConfig {
                target_fps: 0.0,
                alignment: AlignmentPolicy::LatestAvailable,
            },
        );
        assert!(matches!(result, Err(SyncError::InvalidRate(_))));

        let (a, _ha) = camera(0);
        let (b, _hb) = camera(0);
        let result = Synchronizer::new(vec![a, b], SynchronizerConfig::default());
        assert!(matches!(result, Err(SyncError::DuplicatePort(port)) if port == CameraId::new(0)));

        let (a, _ha) = camera(0);
        let result = Synchronizer::new(
            vec![a],
            SynchronizerConfig {
                target_fps: 30.0,
                alignment: AlignmentPolicy::NearestTimestamp { window_ms: 0.0 },
            },
        );
        assert!(matches!(result, Err(SyncError::InvalidWindow(_))));
    }

    #[tokio::test]
    async fn test_alternating_camera_scenario() {
        let (sync, a, b) = rig();
        let mut sub = sync.subscribe();

        for cycle in 0..6u32 {
            let t = f64::from(cycle) * 0.1;
            assert!(a.push(tiny(), t));
            if cycle % 2 == 0 {
                assert!(b.push(tiny(), t));
            }
            sync.step().await;
        }

        let mut a_frames = 0;
        let mut b_frames = 0;
        for expected in 0..6u64 {
            let bundle = sub.try_recv().unwrap();
            assert_eq!(bundle.sync_index, expected);
            assert_eq!(bundle.entries.len(), 2);
            assert!(bundle.get(CameraId::new(0)).is_some());
            if expected % 2 == 1 {
                assert!(bundle.get(CameraId::new(1)).is_none());
                assert_eq!(bundle.missing_ports(), vec![CameraId::new(1)]);
            } else {
                b_frames += 1;
            }
            a_frames += 1;
        }
        assert_eq!(a_frames, 6);
        assert_eq!(b_frames, 3);

        let stats = sync.lane_stats().await;
        assert_eq!(stats[&CameraId::new(0)].delivered, 6);
        assert_eq!(stats[&CameraId::new(1)].delivered, 3);
        assert_eq!(stats[&CameraId::new(1)].absent, 3);
    }

    #[tokio::test]
    async fn test_latest_available_discards_older() {
        let (sync, a, _b) = rig();
        let mut sub = sync.subscribe();

        a.push(tiny(), 1.0);
        a.push(tiny(), 2.0);
        a.push(tiny(), 3.0);
        sync.step().await;

        let bundle = sub.try_recv().unwrap();
        let frame = bundle.get(CameraId::new(0)).unwrap();
        assert_eq!(frame.capture_timestamp, 3.0);
        assert_eq!(frame.frame_index, 2);
        assert_eq!(sync.lane_stats().await[&CameraId::new(0)].discarded, 2);
    }

    #[tokio::test]
    async fn test_nearest_timestamp_window() {
        let (a, handle) = camera(0);
        let sync = Synchronizer::new(
            vec![a],
            SynchronizerConfig {
                target_fps: 1000.0,
                alignment: AlignmentPolicy::NearestTimestamp { window_ms: 200.0 },
            },
        )
        .unwrap();
        sync.start_streams();
        let mut sub = sync.subscribe();

        // far outside the window
        handle.push(tiny(), unix_seconds() - 10.0);
        sync.step().await;
        assert!(sub.try_recv().unwrap().get(CameraId::new(0)).is_none());

        handle.push(tiny(), unix_seconds());
        sync.step().await;
        assert!(sub.try_recv().unwrap().get(CameraId::new(0)).is_some());
    }

    #[tokio::test]
    async fn test_subscribe_takes_effect_next_cycle() {
        let (sync, _a, _b) = rig();
        let mut first = sync.subscribe();
        sync.step().await;

        let mut second = sync.subscribe();
        sync.step().await;

        assert_eq!(first.try_recv().unwrap().sync_index, 0);
        assert_eq!(first.try_recv().unwrap().sync_index, 1);
        assert_eq!(second.try_recv().unwrap().sync_index, 1);
        assert!(second.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let (sync, _a, _b) = rig();
        let sub = sync.subscribe();
        let mut other = sync.subscribe();
        assert_eq!(sync.subscriber_count(), 2);

        sync.unsubscribe(sub);
        assert_eq!(sync.subscriber_count(), 1);
        sync.step().await;
        assert_eq!(other.try_recv().unwrap().sync_index, 0);

        sync.unsubscribe(other);
        assert!(!sync.cameras_active());
        sync.step().await;
        assert_eq!(sync.cycles().await, 2);
    }

    #[tokio::test]
    async fn test_closed_camera_is_permanently_absent() {
        let (sync, a, b) = rig();
        let mut sub = sync.subscribe();

        b.disconnect("unplugged");
        for _ in 0..3 {
            a.push(tiny(), 0.0);
            sync.step().await;
        }

        for _ in 0..3 {
            let bundle = sub.try_recv().unwrap();
            assert!(bundle.get(CameraId::new(0)).is_some());
            assert!(bundle.get(CameraId::new(1)).is_none());
        }
        assert!(sync.lane_stats().await[&CameraId::new(1)].disconnected);
        let ports: Vec<_> = sync.cameras().iter().map(|p| p.port).collect();
        assert_eq!(ports, vec![CameraId::new(0)]);
    }

    #[tokio::test]
    async fn test_run_pause_resume_stop() {
        let (a, _handle) = camera(0);
        let sync = Arc::new(
            Synchronizer::new(
                vec![a],
                SynchronizerConfig {
                    target_fps: 200.0,
                    alignment: AlignmentPolicy::LatestAvailable,
                },
            )
            .unwrap(),
        );
        let mut sub = sync.subscribe();
        let task = sync.spawn();

        tokio::time::sleep(Duration::from_millis(60)).await;
        sync.pause();
        assert_eq!(sync.state(), RunState::Paused);
        assert!(sync.cameras_active());
        tokio::time::sleep(Duration::from_millis(20)).await;
        let paused_at = sync.cycles().await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(sync.cycles().await, paused_at);

        sync.resume();
        tokio::time::sleep(Duration::from_millis(60)).await;
        sync.stop();
        sync.stop();
        task.await.unwrap();
        assert_eq!(sync.state(), RunState::Stopped);

        let mut expected = 0;
        while let Some(bundle) = sub.recv().await {
            assert_eq!(bundle.sync_index, expected);
            expected += 1;
        }
        assert!(expected > paused_at);
        assert!(expected <= sync.cycles().await);
    }

    #[tokio::test]
    async fn test_frames_flow_while_paused() {
        let (sync, a, _b) = rig();
        let _sub = sync.subscribe();
        sync.step().await;

        sync.pause();
        assert!(sync.cameras_active());
        assert!(a.push(tiny(), 1.0));

        let stream = sync.stream(CameraId::new(0)).unwrap();
        match stream.try_next() {
            FramePoll::Ready(record) => assert_eq!(record.capture_timestamp, 1.0),
            other => panic!("expected a frame while paused, got {other:?}"),
        }
        assert!(sync.stream(CameraId::new(7)).is_none());

        sync.resume();
        assert!(sync.cameras_active());
        assert_eq!(sync.step().await.sync_index, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_steps_publish_in_order() {
        const TASKS: usize = 4;
        const STEPS: usize = 500;

        let (sync, _a, _b) = rig();
        let sync = Arc::new(sync);
        let mut sub = sync.subscribe();

        let workers: Vec<_> = (0..TASKS)
            .map(|_| {
                let sync = Arc::clone(&sync);
                tokio::spawn(async move {
                    for _ in 0..STEPS {
                        sync.step().await;
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.await.unwrap();
        }

        let mut expected = 0u64;
        while let Ok(bundle) = sub.try_recv() {
            assert_eq!(bundle.sync_index, expected);
            expected += 1;
        }
        assert_eq!(expected, (TASKS * STEPS) as u64);
    }

    #[tokio::test]
    async fn test_subscribe_after_stop_is_closed() {
        let (sync, _a, _b) = rig();
        sync.stop();
        let mut sub = sync.subscribe();
        assert!(sub.recv().await.is_none());
        assert!(sync.cameras().is_empty());
    }
}
