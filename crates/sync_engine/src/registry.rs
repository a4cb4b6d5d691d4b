//! Subscription registry
//!
//! Membership set of subscriber queues, mutated concurrently with delivery.
//! The registry also owns camera activation: it keeps one `ActivationGuard`
//! per stream while there is at least one subscriber. Pausing does not touch
//! activation; only release of the last subscriber or close does.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use contracts::SyncBundle;
use ingestion::{ActivationGuard, CameraStream};
use slab::Slab;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tracing::{debug, trace};

/// Subscriber identifier (unique while registered)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(usize);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct RegistryInner {
    subscribers: Slab<UnboundedSender<Arc<SyncBundle>>>,
    activations: Vec<ActivationGuard>,
    closed: bool,
}

/// Thread-safe subscriber set
pub struct SubscriptionRegistry {
    inner: Mutex<RegistryInner>,
    streams: Arc<Vec<CameraStream>>,
}

impl SubscriptionRegistry {
    /// Registry over the given streams
    pub fn new(streams: Arc<Vec<CameraStream>>) -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                subscribers: Slab::new(),
                activations: Vec::new(),
                closed: false,
            }),
            streams,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take or release activation so it matches the current membership
    fn sync_activation(&self, inner: &mut RegistryInner) {
        let wanted = !inner.closed && !inner.subscribers.is_empty();
        if wanted && inner.activations.is_empty() {
            inner.activations = self.streams.iter().map(CameraStream::activate).collect();
            debug!(streams = inner.activations.len(), "cameras activated");
        } else if !wanted && !inner.activations.is_empty() {
            inner.activations.clear();
            debug!("cameras deactivated");
        }
    }

    /// Register a new queue
    ///
    /// After the registry is closed the returned subscription is already at
    /// end-of-stream.
    pub fn register(self: &Arc<Self>) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        let key = if inner.closed {
            drop(tx);
            None
        } else {
            let key = inner.subscribers.insert(tx);
            self.sync_activation(&mut inner);
            Some(key)
        };
        let count = inner.subscribers.len();
        drop(inner);

        metrics::gauge!("rigsync_subscribers").set(count as f64);
        let id = SubscriberId(key.unwrap_or(usize::MAX));
        debug!(subscriber = %id, count, "subscriber registered");

        Subscription {
            id,
            rx,
            registry: if key.is_some() {
                Arc::downgrade(self)
            } else {
                Weak::new()
            },
        }
    }

    /// Remove a queue (no-op if already gone)
    pub fn release(&self, id: SubscriberId) {
        let mut inner = self.lock();
        if inner.subscribers.try_remove(id.0).is_none() {
            return;
        }
        self.sync_activation(&mut inner);
        let count = inner.subscribers.len();
        drop(inner);

        metrics::gauge!("rigsync_subscribers").set(count as f64);
        debug!(subscriber = %id, count, "subscriber released");
    }

    /// Deliver a bundle to every registered queue
    ///
    /// Queues whose receiver is gone are removed. Returns the number of
    /// queues the bundle reached.
    pub fn publish(&self, bundle: &Arc<SyncBundle>) -> usize {
        let mut inner = self.lock();
        let mut gone = Vec::new();
        for (key, tx) in inner.subscribers.iter() {
            if tx.send(Arc::clone(bundle)).is_err() {
                gone.push(key);
            }
        }
        for key in &gone {
            inner.subscribers.remove(*key);
            trace!(subscriber = %SubscriberId(*key), "dropped subscriber with closed queue");
        }
        if !gone.is_empty() {
            self.sync_activation(&mut inner);
        }
        inner.subscribers.len()
    }

    /// Close every queue; consumers see end-of-stream after draining
    pub fn close(&self) {
        let mut inner = self.lock();
        if inner.closed {
            return;
        }
        inner.closed = true;
        let closed = inner.subscribers.len();
        inner.subscribers.clear();
        self.sync_activation(&mut inner);
        drop(inner);

        metrics::gauge!("rigsync_subscribers").set(0.0);
        debug!(closed, "registry closed");
    }

    /// Registered queue count
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Whether the cameras are currently activated
    pub fn is_activated(&self) -> bool {
        !self.lock().activations.is_empty()
    }
}

/// Consumer side of a subscriber queue
///
/// Dropping it releases the queue.
pub struct Subscription {
    id: SubscriberId,
    rx: UnboundedReceiver<Arc<SyncBundle>>,
    registry: Weak<SubscriptionRegistry>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("queued", &self.rx.len())
            .finish()
    }
}

impl Subscription {
    /// Subscriber identifier
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next bundle; `None` once released/closed and drained
    pub async fn recv(&mut self) -> Option<Arc<SyncBundle>> {
        self.rx.recv().await
    }

    /// Next bundle if one is queued
    pub fn try_recv(&mut self) -> Result<Arc<SyncBundle>, TryRecvError> {
        self.rx.try_recv()
    }

    /// Bundles waiting in the queue
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Check if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Leave the registry but keep what is already queued
    ///
    /// Subsequent `recv` calls drain the queue and then return `None`.
    pub fn detach(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.release(self.id);
        }
        self.registry = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}
