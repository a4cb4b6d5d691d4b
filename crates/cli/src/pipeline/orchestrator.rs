//! Session orchestrator - coordinates all components.
//!
//! cameras → synchronizer → {recorder, log sink, stats sink}

use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{RigBlueprint, SynchronizerConfig};
use dispatcher::{LogSink, Recorder, SinkHandle};
use observability::BundleMetricsAggregator;
use sync_engine::Synchronizer;
use tracing::{info, warn};

use super::{RunStats, StatsSink};

/// How often the orchestrator checks whether any camera is left
const CAMERA_POLL: Duration = Duration::from_millis(200);

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// The rig configuration
    pub blueprint: RigBlueprint,

    /// Run length (None = until shutdown or all cameras end)
    pub duration: Option<Duration>,

    /// Parent folder for the timestamped session folder (None = do not record)
    pub output_root: Option<PathBuf>,

    /// Log one bundle summary every n bundles
    pub log_every: u64,
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Duration,
    Shutdown,
    CamerasEnded,
}

/// Main session orchestrator
pub struct Session {
    config: SessionConfig,
}

impl Session {
    /// Create a new session with the given configuration
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Run until the duration elapses, `shutdown` resolves or every camera ends
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<(RunStats, StopReason)> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        // Cameras
        let streams = ingestion::build_streams(blueprint).context("Failed to open cameras")?;
        info!(cameras = streams.len(), "Camera streams configured");

        // Synchronizer
        let sync_config = SynchronizerConfig::from(blueprint);
        let sync = Arc::new(
            Synchronizer::new(streams, sync_config).context("Failed to create synchronizer")?,
        );
        info!(
            target_fps = sync_config.target_fps,
            alignment = ?sync_config.alignment,
            "Synchronizer configured"
        );

        // Consumers
        let aggregator = Arc::new(Mutex::new(BundleMetricsAggregator::new()));
        let sinks = vec![
            SinkHandle::spawn(StatsSink::new(Arc::clone(&aggregator)), sync.subscribe()),
            SinkHandle::spawn(
                LogSink::new("log").every(self.config.log_every),
                sync.subscribe(),
            ),
        ];

        let recorder = Recorder::new(Arc::clone(&sync), &blueprint.recording);
        if let Some(root) = &self.config.output_root {
            let folder = recorder
                .start_recording_in(root)
                .context("Failed to start recording")?;
            info!(folder = %folder.display(), "Recording to session folder");
        }

        // Run
        let sync_task = sync.spawn();
        let reason = wait_for_stop(&sync, self.config.duration, shutdown).await;
        info!(reason = ?reason, "Stopping session");

        // Shutdown: synchronizer first so every consumer sees the final bundle
        sync.stop();
        if let Err(e) = sync_task.await {
            warn!(error = %e, "Synchronizer task failed");
        }

        let recording = if recorder.is_recording() {
            Some(
                recorder
                    .stop_recording()
                    .await
                    .context("Failed to finish recording")?,
            )
        } else {
            None
        };

        let mut sink_stats = Vec::with_capacity(sinks.len());
        for handle in sinks {
            let name = handle.name().to_string();
            match handle.shutdown().await {
                Ok(snapshot) => sink_stats.push((name, snapshot)),
                Err(e) => warn!(sink = %name, error = %e, "Sink shutdown failed"),
            }
        }

        let bundle_metrics = aggregator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let stats = RunStats {
            bundles: sync.cycles().await,
            duration: start_time.elapsed(),
            lanes: sync.lane_stats().await,
            streams: sync.stream_metrics(),
            sinks: sink_stats,
            bundle_metrics,
            recording,
        };

        info!(
            bundles = stats.bundles,
            duration_secs = stats.duration.as_secs_f64(),
            rate = format!("{:.2}", stats.rate()),
            "Session complete"
        );

        Ok((stats, reason))
    }
}

async fn wait_for_stop(
    sync: &Synchronizer,
    duration: Option<Duration>,
    shutdown: impl Future<Output = ()>,
) -> StopReason {
    let deadline = async {
        match duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };
    let cameras_ended = async {
        let mut poll = tokio::time::interval(CAMERA_POLL);
        loop {
            poll.tick().await;
            if sync.cameras().is_empty() {
                break;
            }
        }
    };

    tokio::select! {
        _ = deadline => StopReason::Duration,
        _ = shutdown => StopReason::Shutdown,
        _ = cameras_ended => StopReason::CamerasEnded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{CameraConfig, CameraId, RecordingConfig, SourceConfig, SyncConfig};
    use session_io::SessionSummary;

    fn blueprint(fail_after: Option<u64>) -> RigBlueprint {
        let camera = |port: u32| CameraConfig {
            port: CameraId::new(port),
            fps: 50.0,
            resolution: [16, 12],
            rotation_count: 0,
            source: SourceConfig::Mock {
                skip_every: None,
                fail_after,
                jitter_ms: 0.0,
            },
        };
        RigBlueprint {
            version: Default::default(),
            sync: SyncConfig {
                target_fps: 25.0,
                ..SyncConfig::default()
            },
            recording: RecordingConfig::default(),
            cameras: vec![camera(0), camera(1)],
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_session_records_for_duration() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::new(SessionConfig {
            blueprint: blueprint(None),
            duration: Some(Duration::from_millis(400)),
            output_root: Some(dir.path().to_path_buf()),
            log_every: 10,
        });

        let (stats, reason) = session.run(std::future::pending()).await.unwrap();
        assert_eq!(reason, StopReason::Duration);
        assert!(stats.bundles > 0);
        assert_eq!(stats.bundle_metrics.index_gaps, 0);

        let recording = stats.recording.unwrap();
        let summary = SessionSummary::load(&recording.destination).unwrap();
        assert_eq!(summary.ports.len(), 2);
        assert!(summary.is_consistent());
        assert_eq!(summary.total_rows, recording.rows);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_session_ends_with_cameras() {
        let session = Session::new(SessionConfig {
            blueprint: blueprint(Some(5)),
            duration: Some(Duration::from_secs(10)),
            output_root: None,
            log_every: 1,
        });

        let (stats, reason) = session.run(std::future::pending()).await.unwrap();
        assert_eq!(reason, StopReason::CamerasEnded);
        assert!(stats.recording.is_none());
        assert!(stats.streams.values().all(|stream| stream.source_errors == 1));
    }

    #[tokio::test]
    async fn test_shutdown_signal() {
        let session = Session::new(SessionConfig {
            blueprint: blueprint(None),
            duration: None,
            output_root: None,
            log_every: 100,
        });
        let shutdown = tokio::time::sleep(Duration::from_millis(100));
        let (_, reason) = session.run(shutdown).await.unwrap();
        assert_eq!(reason, StopReason::Shutdown);
    }
}
