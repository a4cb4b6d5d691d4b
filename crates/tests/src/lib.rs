//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置 → 相机流 → 同步器 → 录制器 → 文件回读
//! - 多订阅者的顺序与无间断保证
//! - 录制会话回放

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{AlignmentPolicy, CameraId, StreamConfig, SynchronizerConfig};

    #[test]
    fn test_blueprint_feeds_runtime_configs() {
        let blueprint = ConfigLoader::load_from_str(
            r#"
[sync]
target_fps = 15.0
alignment = { nearest_timestamp = { window_ms = 30.0 } }
delivery_capacity = 8

[[cameras]]
port = 2
fps = 30.0
resolution = [64, 48]

[[cameras]]
port = 5
fps = 30.0
resolution = [64, 48]
rotation_count = 1
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        let sync = SynchronizerConfig::from(&blueprint);
        assert_eq!(sync.target_fps, 15.0);
        assert_eq!(sync.alignment, AlignmentPolicy::NearestTimestamp { window_ms: 30.0 });
        assert_eq!(StreamConfig::from(&blueprint).delivery_capacity, 8);

        let ports: Vec<CameraId> = blueprint.profiles().iter().map(|p| p.port).collect();
        assert_eq!(ports, vec![CameraId::new(2), CameraId::new(5)]);

        // round trip through JSON keeps the semantics
        let json = ConfigLoader::to_json(&blueprint).unwrap();
        let again = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(SynchronizerConfig::from(&again), sync);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        AlignmentPolicy, CameraId, CameraProfile, ImageData, PixelFormat, RecordingConfig,
        StreamConfig, SynchronizerConfig,
    };
    use dispatcher::{LogSink, Recorder, RecorderError, SinkHandle};
    use ingestion::{build_streams, CameraStream, PushHandle, PushSource};
    use observability::BundleMetricsAggregator;
    use session_io::{provenance_path, read_provenance, video_path, AviReader, SessionSummary};
    use sync_engine::Synchronizer;

    const W: u32 = 32;
    const H: u32 = 24;

    fn pushed_camera(port: u32) -> (CameraStream, PushHandle) {
        let (source, handle) = PushSource::new(CameraProfile {
            port: CameraId::new(port),
            fps: 30.0,
            width: W,
            height: H,
            rotation_count: 0,
        });
        (
            CameraStream::new(Box::new(source), StreamConfig::default()),
            handle,
        )
    }

    fn frame(shade: u8) -> ImageData {
        ImageData::new(W, H, PixelFormat::Bgr8, vec![shade; (W * H * 3) as usize])
    }

    fn fast(streams: Vec<CameraStream>) -> Arc<Synchronizer> {
        let sync = Synchronizer::new(
            streams,
            SynchronizerConfig {
                target_fps: 1000.0,
                alignment: AlignmentPolicy::LatestAvailable,
            },
        )
        .unwrap();
        sync.start_streams();
        Arc::new(sync)
    }

    /// Camera A delivers every cycle, camera B every other cycle
    #[tokio::test]
    async fn test_alternating_cameras_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let (a, ha) = pushed_camera(0);
        let (b, hb) = pushed_camera(1);
        let sync = fast(vec![a, b]);

        let mut observer = sync.subscribe();
        let log = SinkHandle::spawn(LogSink::new("log"), sync.subscribe());
        let recorder = Recorder::new(Arc::clone(&sync), &RecordingConfig::default());
        recorder.start_recording(dir.path()).unwrap();

        for cycle in 0..6u8 {
            let t = f64::from(cycle) / 30.0;
            ha.push(frame(cycle * 10), t);
            if cycle % 2 == 0 {
                hb.push(frame(cycle * 10), t);
            }
            sync.step().await;
        }

        let summary = recorder.stop_recording().await.unwrap();
        sync.stop();
        let log_stats = log.shutdown().await.unwrap();
        assert_eq!(log_stats.write_count, 6);

        // subscriber view
        let mut aggregator = BundleMetricsAggregator::new();
        let mut b_missing = Vec::new();
        while let Some(bundle) = observer.recv().await {
            aggregator.update(&bundle);
            if bundle.get(CameraId::new(1)).is_none() {
                b_missing.push(bundle.sync_index);
            }
        }
        assert_eq!(b_missing, vec![1, 3, 5]);
        assert_eq!(aggregator.total_bundles, 6);
        assert_eq!(aggregator.index_gaps, 0);

        // files
        assert_eq!(summary.frames(CameraId::new(0)), 6);
        assert_eq!(summary.frames(CameraId::new(1)), 3);
        let a_video = AviReader::open(video_path(dir.path(), CameraId::new(0))).unwrap();
        let b_video = AviReader::open(video_path(dir.path(), CameraId::new(1))).unwrap();
        assert_eq!(a_video.frame_count(), 6);
        assert_eq!(b_video.frame_count(), 3);
        assert_eq!(b_video.read_frame(0).unwrap().size(), (W, H));

        let rows = read_provenance(&provenance_path(dir.path())).unwrap();
        assert_eq!(rows.len(), 9);
        let b_indices: Vec<u64> = rows
            .iter()
            .filter(|r| r.port == CameraId::new(1))
            .map(|r| r.sync_index)
            .collect();
        assert_eq!(b_indices, vec![0, 2, 4]);
        let b_frames: Vec<u64> = rows
            .iter()
            .filter(|r| r.port == CameraId::new(1))
            .map(|r| r.frame_index)
            .collect();
        assert_eq!(b_frames, vec![0, 1, 2]);

        let session = SessionSummary::load(dir.path()).unwrap();
        assert!(session.is_consistent());
        assert_eq!(session.bundles, 6);
    }

    #[tokio::test]
    async fn test_zero_bundle_stop_and_double_start() {
        let dir = tempfile::tempdir().unwrap();
        let (a, _ha) = pushed_camera(4);
        let sync = fast(vec![a]);
        let recorder = Recorder::new(Arc::clone(&sync), &RecordingConfig::default());

        recorder.start_recording(dir.path().join("first")).unwrap();
        assert!(matches!(
            recorder.start_recording(dir.path().join("second")),
            Err(RecorderError::AlreadyRecording)
        ));
        let summary = recorder.stop_recording().await.unwrap();
        assert_eq!(summary.bundles, 0);

        let session = SessionSummary::load(&dir.path().join("first")).unwrap();
        assert_eq!(session.ports.len(), 1);
        assert_eq!(session.ports[0].video_frames, 0);
        assert_eq!(session.total_rows, 0);
        assert!(!dir.path().join("second").exists());

        // a second session is allowed once idle
        recorder.start_recording(dir.path().join("third")).unwrap();
        recorder.stop_recording().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unsubscribe_under_load() {
        let (a, ha) = pushed_camera(0);
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

        let producer = std::thread::spawn(move || {
            for i in 0..200u32 {
                ha.push_now(frame((i % 255) as u8));
                std::thread::sleep(Duration::from_millis(2));
            }
        });

        let mut keeper = sync.subscribe();
        let leaver = sync.subscribe();
        let task = sync.spawn();

        tokio::time::sleep(Duration::from_millis(100)).await;
        sync.unsubscribe(leaver);
        let mut late = sync.subscribe();
        tokio::time::sleep(Duration::from_millis(100)).await;
        sync.stop();
        task.await.unwrap();
        producer.join().unwrap();

        let mut expected = 0;
        while let Some(bundle) = keeper.recv().await {
            assert_eq!(bundle.sync_index, expected);
            expected += 1;
        }
        assert!(expected > 0);

        let mut previous: Option<u64> = None;
        while let Some(bundle) = late.recv().await {
            if let Some(prev) = previous {
                assert_eq!(bundle.sync_index, prev + 1);
            }
            previous = Some(bundle.sync_index);
        }
    }

    fn mock_rig_toml(fps: f64) -> String {
        format!(
            r#"
[sync]
target_fps = {fps}
delivery_capacity = 8

[[cameras]]
port = 0
fps = {fps}
resolution = [{W}, {H}]

[[cameras]]
port = 1
fps = {fps}
resolution = [{W}, {H}]
rotation_count = 2
[cameras.source]
kind = "mock"
skip_every = 3
"#
        )
    }

    fn playback_rig_toml(session: &Path) -> String {
        let dir = session.display().to_string().replace('\\', "/");
        format!(
            r#"
[sync]
target_fps = 100.0
delivery_capacity = 256

[[cameras]]
port = 0
fps = 30.0
resolution = [{W}, {H}]
[cameras.source]
kind = "playback"
directory = "{dir}"
speed = 0.0

[[cameras]]
port = 1
fps = 30.0
resolution = [{W}, {H}]
[cameras.source]
kind = "playback"
directory = "{dir}"
speed = 0.0
"#
        )
    }

    /// Mock cameras → recorder, then the recording played back through a new rig
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_record_then_playback() {
        let dir = tempfile::tempdir().unwrap();

        // record
        let blueprint = ConfigLoader::load_from_str(&mock_rig_toml(30.0), ConfigFormat::Toml).unwrap();
        let sync = Arc::new(
            Synchronizer::new(build_streams(&blueprint).unwrap(), SynchronizerConfig::from(&blueprint))
                .unwrap(),
        );
        let recorder = Recorder::new(Arc::clone(&sync), &blueprint.recording);
        let folder = recorder.start_recording_in(dir.path()).unwrap();
        let task = sync.spawn();
        tokio::time::sleep(Duration::from_millis(500)).await;
        sync.stop();
        task.await.unwrap();
        let summary = recorder.stop_recording().await.unwrap();

        let recorded = SessionSummary::load(&folder).unwrap();
        assert!(recorded.is_consistent());
        assert!(summary.frames(CameraId::new(0)) > 0);
        assert!(summary.frames(CameraId::new(1)) > 0);
        let lanes = sync.lane_stats().await;
        assert!(lanes[&CameraId::new(0)].delivered >= summary.frames(CameraId::new(0)) as u64);

        // replay
        let blueprint =
            ConfigLoader::load_from_str(&playback_rig_toml(&folder), ConfigFormat::Toml).unwrap();
        let replay = Arc::new(
            Synchronizer::new(build_streams(&blueprint).unwrap(), SynchronizerConfig::from(&blueprint))
                .unwrap(),
        );
        let mut sub = replay.subscribe();
        let task = replay.spawn();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !replay.cameras().is_empty() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(replay.cameras().is_empty(), "playback should end");
        replay.stop();
        task.await.unwrap();

        let mut present = 0;
        while let Some(bundle) = sub.recv().await {
            present += bundle.present_count();
        }
        assert!(present > 0);
        let replayed: u64 = replay
            .stream_metrics()
            .values()
            .map(|m| m.frames_captured)
            .sum();
        assert_eq!(replayed as usize, recorded.total_rows);
    }
}
