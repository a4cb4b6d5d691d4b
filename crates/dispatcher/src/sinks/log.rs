//! LogSink - logs bundle summary via tracing

use contracts::{BundleSink, ContractError, SyncBundle};
use tracing::{debug, info, instrument};

/// Sink that logs one summary line per bundle
pub struct LogSink {
    name: String,
    every: u64,
    seen: u64,
    incomplete: u64,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            every: 1,
            seen: 0,
            incomplete: 0,
        }
    }

    /// Only log every n-th bundle (counting still covers all of them)
    pub fn every(mut self, n: u64) -> Self {
        self.every = n.max(1);
        self
    }

    /// Bundles seen so far
    pub fn seen(&self) -> u64 {
        self.seen
    }

    /// Bundles with at least one missing camera
    pub fn incomplete(&self) -> u64 {
        self.incomplete
    }

    fn log_bundle_summary(&self, bundle: &SyncBundle) {
        let missing = bundle.missing_ports();
        info!(
            sink = %self.name,
            sync_index = bundle.sync_index,
            cycle_time = bundle.cycle_time,
            cameras = bundle.entries.len(),
            present = bundle.present_count(),
            missing = ?missing,
            "SyncBundle received"
        );
    }
}

impl BundleSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, bundle),
        fields(sink = %self.name, sync_index = bundle.sync_index)
    )]
    async fn write(&mut self, bundle: &SyncBundle) -> Result<(), ContractError> {
        if !bundle.is_complete() {
            self.incomplete += 1;
        }
        if self.seen % self.every == 0 {
            self.log_bundle_summary(bundle);
        }
        self.seen += 1;
        Ok(())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        // Nothing to flush for log sink
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(sink = %self.name, bundles = self.seen, incomplete = self.incomplete, "LogSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::CameraId;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_log_sink_write() {
        let mut sink = LogSink::new("test_log").every(2);
        let mut entries = BTreeMap::new();
        entries.insert(CameraId::new(0), None);
        let bundle = SyncBundle {
            sync_index: 1,
            cycle_time: 1.0,
            entries,
        };

        for _ in 0..3 {
            sink.write(&bundle).await.unwrap();
        }
        assert_eq!(sink.seen(), 3);
        assert_eq!(sink.incomplete(), 3);
        assert!(sink.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_log_sink_name() {
        let sink = LogSink::new("my_logger");
        assert_eq!(sink.name(), "my_logger");
    }
}
