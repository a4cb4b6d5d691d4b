//! Runtime configuration contracts shared by ingestion and sync_engine.

use serde::{Deserialize, Serialize};

use crate::{AlignmentPolicy, DropPolicy, RigBlueprint};

/// Synchronizer configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SynchronizerConfig {
    /// Cycles per second
    pub target_fps: f64,

    /// Frame selection rule per cycle
    #[serde(default)]
    pub alignment: AlignmentPolicy,
}

impl SynchronizerConfig {
    /// Cycle budget in seconds
    #[inline]
    pub fn cycle_period_secs(&self) -> f64 {
        1.0 / self.target_fps
    }
}

impl Default for SynchronizerConfig {
    fn default() -> Self {
        Self {
            target_fps: 30.0,
            alignment: AlignmentPolicy::LatestAvailable,
        }
    }
}

impl From<&RigBlueprint> for SynchronizerConfig {
    fn from(blueprint: &RigBlueprint) -> Self {
        Self {
            target_fps: blueprint.sync.target_fps,
            alignment: blueprint.sync.alignment,
        }
    }
}

/// Camera stream delivery configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Delivery point capacity (frames)
    pub delivery_capacity: usize,

    /// What to drop when the delivery point is full
    #[serde(default)]
    pub drop_policy: DropPolicy,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            delivery_capacity: 4,
            drop_policy: DropPolicy::DropOldest,
        }
    }
}

impl From<&RigBlueprint> for StreamConfig {
    fn from(blueprint: &RigBlueprint) -> Self {
        Self {
            delivery_capacity: blueprint.sync.delivery_capacity.max(1),
            drop_policy: blueprint.sync.drop_policy,
        }
    }
}
