//! Wall-clock helper shared by sources and the synchronizer.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in seconds since the UNIX epoch.
#[inline]
pub fn unix_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
