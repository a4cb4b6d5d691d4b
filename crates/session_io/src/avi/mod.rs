//! MJPEG-in-AVI video files
//!
//! Frames are JPEG encoded with `image` and handed to FFmpeg's AVI muxer as
//! ready-made MJPEG packets: `encode → mux → file`. The muxer writes the
//! headers on open and the index plus final sizes in its trailer, so a file
//! is readable once [`AviWriter::finish`] (or drop) has run, even with zero
//! frames. Reading goes the other way through FFmpeg's demuxer, with JPEG
//! decoding back in `image`.

mod reader;
mod writer;

pub use reader::AviReader;
pub use writer::{AviParams, AviWriter};

use std::sync::OnceLock;

use ffmpeg_next as ffmpeg;

use crate::StorageError;

/// Container format name passed to the muxer
pub(crate) const CONTAINER: &str = "avi";

/// Frame rates are stored as `fps * RATE_SCALE / RATE_SCALE`
pub(crate) const RATE_SCALE: i32 = 1000;

/// Video properties
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AviInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frame_count: usize,
}

/// Time base of one frame at `fps`, with millihertz precision
pub(crate) fn frame_time_base(fps: f64) -> ffmpeg::Rational {
    let rate = (fps * f64::from(RATE_SCALE)).round().clamp(1.0, f64::from(i32::MAX)) as i32;
    ffmpeg::Rational::new(RATE_SCALE, rate)
}

/// Frames per second of a time base
pub(crate) fn fps_of(time_base: ffmpeg::Rational) -> Option<f64> {
    (time_base.numerator() > 0 && time_base.denominator() > 0)
        .then(|| f64::from(time_base.denominator()) / f64::from(time_base.numerator()))
}

/// Initialize FFmpeg once per process
pub(crate) fn ensure_ffmpeg() -> Result<(), StorageError> {
    static INIT: OnceLock<Result<(), ffmpeg::Error>> = OnceLock::new();
    INIT.get_or_init(|| {
        ffmpeg::init()?;
        ffmpeg::util::log::set_level(ffmpeg::util::log::Level::Error);
        Ok(())
    })
    .clone()
    .map_err(StorageError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_base_round_trip() {
        let tb = frame_time_base(30.0);
        assert_eq!((tb.numerator(), tb.denominator()), (1000, 30000));
        assert!((fps_of(tb).unwrap() - 30.0).abs() < 1e-9);

        let ntsc = frame_time_base(29.97);
        assert!((fps_of(ntsc).unwrap() - 29.97).abs() < 1e-9);

        // reduced forms read back the same rate
        assert!((fps_of(ffmpeg::Rational::new(1, 15)).unwrap() - 15.0).abs() < 1e-9);
        assert_eq!(fps_of(ffmpeg::Rational::new(0, 1)), None);
    }

    #[test]
    fn test_ffmpeg_init_is_repeatable() {
        ensure_ffmpeg().unwrap();
        ensure_ffmpeg().unwrap();
    }
}
