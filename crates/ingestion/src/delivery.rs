//! Delivery point backpressure handling

use async_channel::{Receiver, Sender, TrySendError};
use contracts::{CameraId, DropPolicy, FrameRecord};
use tracing::{trace, warn};

use crate::config::StreamMetrics;

/// Outcome of a delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Queued without loss
    Queued,
    /// Queued after evicting the oldest frame
    EvictedOldest,
    /// New frame discarded
    DroppedNewest,
    /// Delivery point closed
    Closed,
}

/// Push a frame onto the delivery point, applying the drop policy when full
///
/// `evict` is a receiver clone of the same channel, used only to pop the
/// oldest queued frame.
#[inline]
pub fn deliver(
    tx: &Sender<FrameRecord>,
    evict: &Receiver<FrameRecord>,
    record: FrameRecord,
    metrics: &StreamMetrics,
    port: CameraId,
    drop_policy: DropPolicy,
) -> Delivery {
    let record = match tx.try_send(record) {
        Ok(()) => {
            metrics.record_delivered(tx.len());
            trace!(port = %port, "frame queued");
            return Delivery::Queued;
        }
        Err(TrySendError::Closed(_)) => {
            warn!(port = %port, "delivery point closed");
            return Delivery::Closed;
        }
        Err(TrySendError::Full(record)) => record,
    };

    metrics.record_dropped();
    match drop_policy {
        DropPolicy::DropNewest => {
            trace!(port = %port, frame_index = record.frame_index, "frame dropped (newest)");
            Delivery::DroppedNewest
        }
        DropPolicy::DropOldest => {
            if let Ok(oldest) = evict.try_recv() {
                trace!(port = %port, frame_index = oldest.frame_index, "frame dropped (oldest)");
            }
            match tx.try_send(record) {
                Ok(()) => {
                    metrics.record_delivered(tx.len());
                    Delivery::EvictedOldest
                }
                Err(TrySendError::Full(record)) => {
                    // lost the race against another producer
                    metrics.record_dropped();
                    trace!(port = %port, frame_index = record.frame_index, "frame dropped (newest)");
                    Delivery::DroppedNewest
                }
                Err(TrySendError::Closed(_)) => Delivery::Closed,
            }
        }
    }
}
