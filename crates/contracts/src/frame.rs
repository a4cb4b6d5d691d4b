//! FrameRecord - Camera Stream output
//!
//! One camera's contribution at one instant.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::CameraId;

/// Frame record
///
/// Owned by the camera stream until handed to the synchronizer, then owned by
/// the `SyncBundle` that contains it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Camera that produced the frame
    pub port: CameraId,

    /// Pixel data (zero-copy clone)
    pub frame: ImageData,

    /// Per-camera capture counter, starting at 0
    pub frame_index: u64,

    /// Capture time (seconds since UNIX epoch)
    pub capture_timestamp: f64,
}

/// A frame as produced by a `FrameSource`, before the stream numbers it.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Pixel data
    pub image: ImageData,

    /// Capture time (seconds since UNIX epoch)
    pub timestamp: f64,
}

/// Image data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageData {
    /// Image width
    pub width: u32,

    /// Image height
    pub height: u32,

    /// Pixel format
    pub format: PixelFormat,

    /// Raw pixel data, row-major, tightly packed
    pub data: Bytes,
}

impl ImageData {
    /// Create image data, without checking the buffer length
    pub fn new(width: u32, height: u32, format: PixelFormat, data: impl Into<Bytes>) -> Self {
        Self {
            width,
            height,
            format,
            data: data.into(),
        }
    }

    /// Byte length implied by the dimensions and pixel format
    #[inline]
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.channels()
    }

    /// Whether the buffer length matches the dimensions
    #[inline]
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.expected_len()
    }

    /// Frame dimensions as `(width, height)`
    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 8-bit blue, green, red (camera native)
    Bgr8,
    /// 8-bit red, green, blue
    Rgb8,
    /// 8-bit luma
    Gray8,
}

impl PixelFormat {
    /// Bytes per pixel
    #[inline]
    pub const fn channels(self) -> usize {
        match self {
            PixelFormat::Bgr8 | PixelFormat::Rgb8 => 3,
            PixelFormat::Gray8 => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_len() {
        let image = ImageData::new(4, 2, PixelFormat::Bgr8, vec![0u8; 24]);
        assert_eq!(image.expected_len(), 24);
        assert!(image.is_well_formed());

        let gray = ImageData::new(4, 2, PixelFormat::Gray8, vec![0u8; 24]);
        assert_eq!(gray.expected_len(), 8);
        assert!(!gray.is_well_formed());
    }

    #[test]
    fn test_record_clone_shares_pixels() {
        let record = FrameRecord {
            port: CameraId::new(0),
            frame: ImageData::new(2, 2, PixelFormat::Rgb8, vec![1u8; 12]),
            frame_index: 3,
            capture_timestamp: 10.5,
        };
        let copy = record.clone();
        assert_eq!(copy.frame.data.as_ptr(), record.frame.data.as_ptr());
        assert_eq!(copy.frame_index, 3);
    }
}
