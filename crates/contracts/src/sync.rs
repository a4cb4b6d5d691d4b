//! SyncBundle - Synchronizer output
//!
//! One synchronized snapshot across all cameras for a given cycle.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{CameraId, FrameRecord};

/// Synchronized bundle
///
/// Immutable once built. Subscribers receive it behind an `Arc`, so every
/// consumer reads the same bundle without copying pixel data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncBundle {
    /// Cycle sequence number (starts at 0, +1 per cycle, no gaps)
    pub sync_index: u64,

    /// Wall-clock time at which the cycle started (seconds)
    pub cycle_time: f64,

    /// Camera -> frame, `None` when the camera had nothing for this cycle
    pub entries: BTreeMap<CameraId, Option<FrameRecord>>,
}

impl SyncBundle {
    /// Frame for a camera, if that camera contributed one
    pub fn get(&self, port: CameraId) -> Option<&FrameRecord> {
        self.entries.get(&port).and_then(Option::as_ref)
    }

    /// Iterate over the frames that are present, in port order
    pub fn present(&self) -> impl Iterator<Item = &FrameRecord> {
        self.entries.values().filter_map(Option::as_ref)
    }

    /// Ports that contributed nothing this cycle
    pub fn missing_ports(&self) -> Vec<CameraId> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.is_none())
            .map(|(port, _)| *port)
            .collect()
    }

    /// Number of cameras with a frame
    pub fn present_count(&self) -> usize {
        self.entries.values().filter(|entry| entry.is_some()).count()
    }

    /// Whether every camera contributed a frame
    pub fn is_complete(&self) -> bool {
        self.entries.values().all(Option::is_some)
    }

    /// Fraction of cameras that contributed (1.0 for an empty bundle)
    pub fn completeness(&self) -> f64 {
        if self.entries.is_empty() {
            1.0
        } else {
            self.present_count() as f64 / self.entries.len() as f64
        }
    }
}

/// Per-camera delivery counters (for diagnostics)
#[derive(Debug, Clone, Default)]
pub struct LaneStats {
    /// Frames contributed to bundles
    pub delivered: u64,

    /// Cycles in which the camera was absent
    pub absent: u64,

    /// Frames discarded by the alignment policy
    pub discarded: u64,

    /// Whether the camera has been marked permanently absent
    pub disconnected: bool,
}
