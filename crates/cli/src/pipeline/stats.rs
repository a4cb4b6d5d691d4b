//! Run statistics and metrics.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use contracts::{BundleSink, CameraId, ContractError, LaneStats, SyncBundle};
use dispatcher::{MetricsSnapshot, RecordingSummary};
use observability::{record_bundle_metrics, BundleMetricsAggregator};

/// Sink feeding the in-memory aggregator and the derived metrics
pub struct StatsSink {
    aggregator: Arc<Mutex<BundleMetricsAggregator>>,
}

impl StatsSink {
    pub fn new(aggregator: Arc<Mutex<BundleMetricsAggregator>>) -> Self {
        Self { aggregator }
    }
}

impl BundleSink for StatsSink {
    fn name(&self) -> &str {
        "stats"
    }

    async fn write(&mut self, bundle: &SyncBundle) -> Result<(), ContractError> {
        record_bundle_metrics(bundle);
        self.aggregator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .update(bundle);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}

/// Statistics from a session run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Bundles produced by the synchronizer
    pub bundles: u64,

    /// Total duration of the run
    pub duration: Duration,

    /// Per-camera alignment counters
    pub lanes: BTreeMap<CameraId, LaneStats>,

    /// Per-camera stream counters
    pub streams: BTreeMap<CameraId, ingestion::MetricsSnapshot>,

    /// Sink worker counters
    pub sinks: Vec<(String, MetricsSnapshot)>,

    /// Bundle metrics aggregator
    pub bundle_metrics: BundleMetricsAggregator,

    /// Recording outcome (None when not recording)
    pub recording: Option<RecordingSummary>,
}

impl RunStats {
    /// Bundles per second
    pub fn rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.bundles as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Session Statistics ===\n");

        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Bundles: {}", self.bundles);
        println!("   ├─ Rate: {:.2} bundles/s", self.rate());
        println!("   └─ Cameras: {}", self.lanes.len());

        let summary = self.bundle_metrics.summary();
        println!("\nSynchronization");
        println!(
            "   ├─ Complete bundles: {} ({:.2}%)",
            summary.complete_bundles, summary.complete_rate
        );
        println!("   ├─ Index gaps: {}", summary.index_gaps);
        println!("   └─ Time spread (ms): {}", summary.time_spread_ms);

        println!("\nCameras");
        for (port, lane) in &self.lanes {
            let stream = self.streams.get(port).copied().unwrap_or_default();
            println!(
                "   ├─ port {}: delivered={}, absent={}, discarded={}, captured={}, dropped={}{}",
                port,
                lane.delivered,
                lane.absent,
                lane.discarded,
                stream.frames_captured,
                stream.frames_dropped,
                if lane.disconnected { " (disconnected)" } else { "" }
            );
        }

        if !self.sinks.is_empty() {
            println!("\nSinks");
            for (name, snapshot) in &self.sinks {
                println!(
                    "   ├─ {}: writes={}, failures={}",
                    name, snapshot.write_count, snapshot.failure_count
                );
            }
        }

        if let Some(recording) = &self.recording {
            println!("\nRecording");
            println!("   ├─ Folder: {}", recording.destination.display());
            println!("   ├─ Provenance rows: {}", recording.rows);
            for (port, video) in &recording.videos {
                println!(
                    "   ├─ port {}: {} frames ({} failed) -> {}",
                    port,
                    video.frames,
                    video.failed,
                    video.path.display()
                );
            }
            println!("   └─ Ignored frames: {}", recording.ignored_frames);
        }

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stats_sink_updates_aggregator() {
        let aggregator = Arc::new(Mutex::new(BundleMetricsAggregator::new()));
        let mut sink = StatsSink::new(Arc::clone(&aggregator));
        for sync_index in 0..3 {
            let bundle = SyncBundle {
                sync_index,
                cycle_time: 0.0,
                entries: BTreeMap::from([(CameraId::new(0), None)]),
            };
            sink.write(&bundle).await.unwrap();
        }
        let aggregator = aggregator.lock().unwrap();
        assert_eq!(aggregator.total_bundles, 3);
        assert_eq!(aggregator.complete_bundles, 0);
        assert_eq!(aggregator.index_gaps, 0);
    }

    #[test]
    fn test_rate() {
        let stats = RunStats {
            bundles: 30,
            duration: Duration::from_secs(2),
            ..Default::default()
        };
        assert!((stats.rate() - 15.0).abs() < 1e-9);
        assert_eq!(RunStats::default().rate(), 0.0);
    }
}
