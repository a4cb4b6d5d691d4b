//! CameraId - Copyable camera identifier
//!
//! Cameras are addressed by their port number, the same number that names the
//! per-camera files of a recording session (`port_<id>`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Camera identifier (port number).
///
/// # Examples
/// ```
/// use contracts::CameraId;
///
/// let port = CameraId::new(2);
/// assert_eq!(port.file_stem(), "port_2");
/// assert_eq!(port.to_string(), "2");
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CameraId(u32);

impl CameraId {
    /// Create a new CameraId from a port number.
    #[inline]
    pub const fn new(port: u32) -> Self {
        Self(port)
    }

    /// Get the underlying port number.
    #[inline]
    pub const fn port(self) -> u32 {
        self.0
    }

    /// File stem used for this camera's session files.
    pub fn file_stem(self) -> String {
        format!("port_{}", self.0)
    }
}

impl From<u32> for CameraId {
    #[inline]
    fn from(port: u32) -> Self {
        Self(port)
    }
}

impl From<CameraId> for u32 {
    #[inline]
    fn from(id: CameraId) -> Self {
        id.0
    }
}

impl FromStr for CameraId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u32>().map(Self)
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CameraId({})", self.0)
    }
}

impl PartialEq<u32> for CameraId {
    #[inline]
    fn eq(&self, other: &u32) -> bool {
        self.0 == *other
    }
}
