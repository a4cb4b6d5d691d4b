//! SinkHandle - runs a sink on its own task, fed by its own subscription

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{BundleSink, ContractError, SyncBundle};
use sync_engine::{SubscriberId, Subscription};

use crate::metrics::{MetricsSnapshot, SinkMetrics};

/// Handle to a running sink worker
pub struct SinkHandle {
    name: String,
    subscriber: SubscriberId,
    metrics: Arc<SinkMetrics>,
    shutdown_tx: oneshot::Sender<()>,
    worker_handle: JoinHandle<Result<(), ContractError>>,
}

impl SinkHandle {
    /// Spawn the worker task
    ///
    /// The sink sees every bundle published to `subscription`, in order.
    pub fn spawn<S: BundleSink + 'static>(sink: S, subscription: Subscription) -> Self {
        let name = sink.name().to_string();
        let subscriber = subscription.id();
        let metrics = Arc::new(SinkMetrics::new(name.clone()));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();
        let worker_handle = tokio::spawn(async move {
            sink_worker(sink, subscription, shutdown_rx, worker_metrics, worker_name).await
        });

        Self {
            name,
            subscriber,
            metrics,
            shutdown_tx,
            worker_handle,
        }
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Subscriber feeding this sink
    pub fn subscriber(&self) -> SubscriberId {
        self.subscriber
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Whether the worker has exited (end-of-stream or shutdown)
    pub fn is_finished(&self) -> bool {
        self.worker_handle.is_finished()
    }

    /// Stop the worker
    ///
    /// Bundles already queued are written, then the sink is flushed and
    /// closed; the subscription is released last. Flush and close errors are
    /// returned.
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) -> Result<MetricsSnapshot, ContractError> {
        // Worker may already be gone after end-of-stream
        let _ = self.shutdown_tx.send(());
        match self.worker_handle.await {
            Ok(result) => result?,
            Err(e) => {
                error!(sink = %self.name, error = ?e, "Worker task panicked");
                return Err(ContractError::Other(format!(
                    "sink '{}' worker panicked: {e}",
                    self.name
                )));
            }
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
        Ok(self.metrics.snapshot())
    }
}

async fn write_one<S: BundleSink>(
    sink: &mut S,
    bundle: &SyncBundle,
    metrics: &SinkMetrics,
    name: &str,
) {
    match sink.write(bundle).await {
        Ok(()) => metrics.record_write(bundle.sync_index),
        Err(e) => {
            metrics.record_failure();
            error!(
                sink = %name,
                sync_index = bundle.sync_index,
                error = %e,
                "Write failed"
            );
            // Continue processing - don't crash on single failure
        }
    }
}

/// Worker task that consumes bundles and writes to sink
#[instrument(
    name = "sink_worker_loop",
    skip(sink, subscription, shutdown_rx, metrics),
    fields(sink = %name, subscriber = %subscription.id())
)]
async fn sink_worker<S: BundleSink>(
    mut sink: S,
    mut subscription: Subscription,
    mut shutdown_rx: oneshot::Receiver<()>,
    metrics: Arc<SinkMetrics>,
    name: String,
) -> Result<(), ContractError> {
    debug!(sink = %name, "Sink worker started");

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => break,
            next = subscription.recv() => match next {
                Some(bundle) => {
                    metrics.set_queue_len(subscription.len());
                    write_one(&mut sink, &bundle, &metrics, &name).await;
                }
                None => {
                    debug!(sink = %name, "Subscription closed");
                    break;
                }
            },
        }
    }

    // Drain whatever was delivered before the stop
    let mut drained = 0usize;
    while let Ok(bundle) = subscription.try_recv() {
        write_one(&mut sink, &bundle, &metrics, &name).await;
        drained += 1;
    }
    metrics.set_queue_len(0);
    if drained > 0 {
        debug!(sink = %name, drained, "Drained queued bundles");
    }

    let flushed = sink.flush().await;
    if let Err(e) = &flushed {
        error!(sink = %name, error = %e, "Flush failed on shutdown");
    }
    let closed = sink.close().await;
    if let Err(e) = &closed {
        error!(sink = %name, error = %e, "Close failed on shutdown");
    }

    subscription.detach();
    let left = subscription.len();
    if left > 0 {
        warn!(sink = %name, left, "Bundles delivered during shutdown were not written");
    }
    debug!(sink = %name, "Sink worker stopped");

    flushed.and(closed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;
    use sync_engine::SubscriptionRegistry;
    use tokio::time::{sleep, Duration};

    /// Mock sink for testing
    struct MockSink {
        name: String,
        seen: Arc<Mutex<Vec<u64>>>,
        closed: Arc<AtomicU64>,
        should_fail: bool,
        fail_close: bool,
        delay_ms: u64,
    }

    impl MockSink {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                seen: Arc::default(),
                closed: Arc::default(),
                should_fail: false,
                fail_close: false,
                delay_ms: 0,
            }
        }
    }

    impl BundleSink for MockSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn write(&mut self, bundle: &SyncBundle) -> Result<(), ContractError> {
            if self.delay_ms > 0 {
                sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.should_fail {
                return Err(ContractError::sink_write(&self.name, "mock failure"));
            }
            self.seen.lock().unwrap().push(bundle.sync_index);
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            self.closed.fetch_add(1, Ordering::Relaxed);
            if self.fail_close {
                return Err(ContractError::sink_close(&self.name, "mock close failure"));
            }
            Ok(())
        }
    }

    fn registry() -> Arc<SubscriptionRegistry> {
        Arc::new(SubscriptionRegistry::new(Arc::new(Vec::new())))
    }

    fn bundle(sync_index: u64) -> Arc<SyncBundle> {
        Arc::new(SyncBundle {
            sync_index,
            cycle_time: sync_index as f64,
            entries: BTreeMap::new(),
        })
    }

    #[tokio::test]
    async fn test_sink_handle_basic() {
        let registry = registry();
        let sink = MockSink::new("test");
        let seen = Arc::clone(&sink.seen);
        let closed = Arc::clone(&sink.closed);

        let handle = SinkHandle::spawn(sink, registry.register());
        for i in 0..5 {
            registry.publish(&bundle(i));
        }

        let snapshot = handle.shutdown().await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(snapshot.write_count, 5);
        assert_eq!(snapshot.last_sync_index, 4);
        assert_eq!(closed.load(Ordering::Relaxed), 1);
        assert_eq!(registry.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_drains_slow_sink() {
        let registry = registry();
        let mut sink = MockSink::new("slow");
        sink.delay_ms = 5;
        let seen = Arc::clone(&sink.seen);

        let handle = SinkHandle::spawn(sink, registry.register());
        for i in 0..10 {
            registry.publish(&bundle(i));
        }
        handle.shutdown().await.unwrap();

        assert_eq!(*seen.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_sink_handle_failure_isolation() {
        let registry = registry();
        let mut sink = MockSink::new("failing");
        sink.should_fail = true;

        let handle = SinkHandle::spawn(sink, registry.register());
        for i in 0..3 {
            registry.publish(&bundle(i));
        }

        // Give worker time to process
        sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.metrics().failure_count(), 3);

        let snapshot = handle.shutdown().await.unwrap();
        assert_eq!(snapshot.write_count, 0);
    }

    #[tokio::test]
    async fn test_close_error_surfaces() {
        let registry = registry();
        let mut sink = MockSink::new("bad_close");
        sink.fail_close = true;

        let handle = SinkHandle::spawn(sink, registry.register());
        let err = handle.shutdown().await.unwrap_err();
        assert!(matches!(err, ContractError::SinkClose { .. }));
    }

    #[tokio::test]
    async fn test_worker_ends_when_registry_closes() {
        let registry = registry();
        let sink = MockSink::new("eos");
        let seen = Arc::clone(&sink.seen);

        let handle = SinkHandle::spawn(sink, registry.register());
        registry.publish(&bundle(0));
        registry.close();

        for _ in 0..50 {
            if handle.is_finished() {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
        assert!(handle.is_finished());
        handle.shutdown().await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0]);
    }
}
