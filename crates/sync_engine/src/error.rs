//! Synchronizer construction errors

use contracts::CameraId;
use thiserror::Error;

/// Synchronizer error
#[derive(Debug, Error)]
pub enum SyncError {
    /// Target rate unusable
    #[error("target_fps must be a positive number, got {0}")]
    InvalidRate(f64),

    /// Nearest-timestamp window unusable
    #[error("alignment window must be > 0 ms, got {0}")]
    InvalidWindow(f64),

    /// Two streams claim the same port
    #[error("duplicate camera port {0}")]
    DuplicatePort(CameraId),
}
