//! Per-camera alignment buffer.
//!
//! Uses index-based separation:
//! - HeapRb stores lightweight metadata (timestamp + slab key)
//! - Slab stores the actual FrameRecord
//!
//! This avoids moving pixel handles around while selecting frames.

use std::cmp::Ordering;
use std::fmt;

use contracts::FrameRecord;
use ringbuf::{traits::*, HeapRb};
use slab::Slab;

/// Lightweight metadata stored in ring buffer
#[derive(Debug, Clone, Copy)]
struct FrameMeta {
    /// Capture timestamp
    timestamp: f64,
    /// Key into the slab storage
    slab_key: usize,
}

/// Per-camera frame buffer
///
/// Holds the frames drained from a camera stream until the alignment policy
/// picks one. Bounded: when full, the oldest frame is overwritten.
pub struct FrameBuffer {
    index: HeapRb<FrameMeta>,
    storage: Slab<FrameRecord>,
    max_size: usize,
    dropped_count: u64,
    out_of_order_count: u64,
    last_timestamp: Option<f64>,
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("len", &self.index.occupied_len())
            .field("max_size", &self.max_size)
            .field("dropped", &self.dropped_count)
            .finish()
    }
}

fn by_timestamp(a: &FrameMeta, b: &FrameMeta) -> Ordering {
    a.timestamp
        .partial_cmp(&b.timestamp)
        .unwrap_or(Ordering::Equal)
}

impl FrameBuffer {
    /// Create a new frame buffer
    #[inline]
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            index: HeapRb::new(max_size),
            storage: Slab::with_capacity(max_size),
            max_size,
            dropped_count: 0,
            out_of_order_count: 0,
            last_timestamp: None,
        }
    }

    /// Push a frame into the buffer
    ///
    /// If buffer is full, overwrites the oldest frame.
    #[inline]
    pub fn push(&mut self, record: FrameRecord) {
        let timestamp = record.capture_timestamp;

        if let Some(last) = self.last_timestamp {
            if timestamp < last {
                self.out_of_order_count += 1;
            }
        }
        self.last_timestamp = Some(timestamp);

        if self.index.is_full() {
            if let Some(old_meta) = self.index.try_pop() {
                self.storage.remove(old_meta.slab_key);
            }
            self.dropped_count += 1;
        }

        let slab_key = self.storage.insert(record);
        let _ = self.index.try_push(FrameMeta {
            timestamp,
            slab_key,
        });
    }

    /// Number of buffered frames
    #[inline]
    pub fn len(&self) -> usize {
        self.index.occupied_len()
    }

    /// Check if the buffer is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Take the newest frame (by timestamp) and discard the rest
    ///
    /// Returns the frame and how many older frames were discarded.
    pub fn take_latest(&mut self) -> (Option<FrameRecord>, usize) {
        let newest = self.index.iter().copied().max_by(by_timestamp);
        let Some(newest) = newest else {
            return (None, 0);
        };
        let discarded = self.len() - 1;
        let record = self.storage.remove(newest.slab_key);
        self.clear_storage();
        (Some(record), discarded)
    }

    /// Take the frame closest to `target` within `target ± window / 2`
    ///
    /// The chosen frame and every frame not newer than it are consumed;
    /// newer frames stay buffered. Frames older than the window are stale and
    /// discarded too. Returns the frame (if any) and the discard count.
    pub fn take_closest_in_window(&mut self, target: f64, window: f64) -> (Option<FrameRecord>, usize) {
        let half = window / 2.0;
        let (min_t, max_t) = (target - half, target + half);

        let chosen = self
            .index
            .iter()
            .filter(|m| m.timestamp >= min_t && m.timestamp <= max_t)
            .min_by(|a, b| {
                let da = (a.timestamp - target).abs();
                let db = (b.timestamp - target).abs();
                da.partial_cmp(&db).unwrap_or(Ordering::Equal)
            })
            .copied();

        match chosen {
            Some(meta) => {
                let record = self.storage.remove(meta.slab_key);
                let discarded = self.remove_where(|m| m.timestamp <= meta.timestamp);
                (Some(record), discarded)
            }
            None => (None, self.remove_where(|m| m.timestamp < min_t)),
        }
    }

    /// Remove entries matching `pred`, skipping keys already vacated
    fn remove_where(&mut self, pred: impl Fn(&FrameMeta) -> bool) -> usize {
        let mut removed = 0;
        let remaining: Vec<FrameMeta> = self
            .index
            .pop_iter()
            .filter(|m| {
                if !self.storage.contains(m.slab_key) {
                    false
                } else if pred(m) {
                    self.storage.remove(m.slab_key);
                    removed += 1;
                    false
                } else {
                    true
                }
            })
            .collect();

        for m in remaining {
            let _ = self.index.try_push(m);
        }
        removed
    }

    fn clear_storage(&mut self) {
        self.index.clear();
        self.storage.clear();
    }

    /// Discard everything
    pub fn clear(&mut self) -> usize {
        let n = self.len();
        self.clear_storage();
        n
    }

    /// Frames overwritten because the buffer was full
    #[inline]
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count
    }

    /// Frames that arrived with an earlier timestamp than their predecessor
    #[inline]
    pub fn out_of_order_count(&self) -> u64 {
        self.out_of_order_count
    }
}
