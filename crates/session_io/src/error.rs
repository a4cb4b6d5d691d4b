//! Storage errors

use thiserror::Error;

/// Errors raised while writing or reading session files
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Provenance table error
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// JPEG encode / decode error
    #[error("image codec error: {0}")]
    Codec(#[from] image::ImageError),

    /// Muxer / demuxer error
    #[error("ffmpeg error: {0}")]
    Ffmpeg(#[from] ffmpeg_next::Error),

    /// File is not a readable MJPEG AVI
    #[error("invalid AVI container: {0}")]
    InvalidContainer(String),

    /// Frame does not match the writer's resolution
    #[error("frame size mismatch: writer is {expected_width}x{expected_height}, frame is {width}x{height}")]
    FrameSizeMismatch {
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },

    /// Pixel buffer length disagrees with the frame dimensions
    #[error("malformed pixel buffer: expected {expected} bytes, got {actual}")]
    MalformedBuffer { expected: usize, actual: usize },

    /// Frame index past the end of the video
    #[error("frame {index} out of range ({count} frames)")]
    FrameOutOfRange { index: usize, count: usize },

    /// Writer already finalized
    #[error("writer already finalized")]
    Finalized,
}

impl StorageError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidContainer(message.into())
    }
}
