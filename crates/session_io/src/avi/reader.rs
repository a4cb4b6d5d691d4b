//! MJPEG AVI reader
//!
//! Demuxes every packet of the video stream up front. Packets stay JPEG
//! encoded until [`AviReader::read_frame`] decodes one.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use contracts::{ImageData, PixelFormat};
use ffmpeg_next as ffmpeg;
use ffmpeg_next::{codec, format, media};
use image::{DynamicImage, ImageFormat};
use tracing::debug;

use super::{ensure_ffmpeg, fps_of, AviInfo};
use crate::StorageError;

/// MJPEG AVI reader
pub struct AviReader {
    path: PathBuf,
    info: AviInfo,
    frames: Vec<Bytes>,
}

impl AviReader {
    /// Open a file and load its frames
    ///
    /// # Errors
    /// - IO / demuxer failure (`Io`, `Ffmpeg`)
    /// - `InvalidContainer` when there is no MJPEG video stream
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        // the demuxer reports a missing file as a generic error
        std::fs::metadata(&path)?;
        ensure_ffmpeg()?;

        let mut input = format::input(&path)?;

        let (stream_index, time_base, parameters) = {
            let stream = input
                .streams()
                .best(media::Type::Video)
                .ok_or_else(|| StorageError::invalid("no video stream"))?;
            (stream.index(), stream.time_base(), stream.parameters())
        };
        if parameters.id() != codec::Id::MJPEG {
            return Err(StorageError::invalid(format!(
                "unsupported codec {:?}",
                parameters.id()
            )));
        }
        let fps = fps_of(time_base)
            .ok_or_else(|| StorageError::invalid("video stream has no frame rate"))?;
        let decoder = codec::context::Context::from_parameters(parameters)?
            .decoder()
            .video()?;
        let (width, height) = (decoder.width(), decoder.height());

        let mut frames = Vec::new();
        for (stream, packet) in input.packets() {
            if stream.index() != stream_index {
                continue;
            }
            if let Some(data) = packet.data() {
                frames.push(Bytes::copy_from_slice(data));
            }
        }

        debug!(path = %path.display(), width, height, fps, frames = frames.len(), "AVI reader opened");

        Ok(Self {
            path,
            info: AviInfo {
                width,
                height,
                fps,
                frame_count: frames.len(),
            },
            frames,
        })
    }

    /// File path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Video properties
    pub fn info(&self) -> &AviInfo {
        &self.info
    }

    /// Number of frames
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Raw JPEG bytes of one frame
    pub fn read_encoded(&self, index: usize) -> Result<Bytes, StorageError> {
        self.frames
            .get(index)
            .cloned()
            .ok_or(StorageError::FrameOutOfRange {
                index,
                count: self.frames.len(),
            })
    }

    /// Decode one frame
    ///
    /// Color frames come back as `Rgb8`, grayscale as `Gray8`.
    pub fn read_frame(&self, index: usize) -> Result<ImageData, StorageError> {
        let jpeg = self.read_encoded(index)?;
        let decoded = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg)?;
        let image = match decoded {
            DynamicImage::ImageLuma8(gray) => {
                let (width, height) = gray.dimensions();
                ImageData::new(width, height, PixelFormat::Gray8, gray.into_raw())
            }
            other => {
                let rgb = other.to_rgb8();
                let (width, height) = rgb.dimensions();
                ImageData::new(width, height, PixelFormat::Rgb8, rgb.into_raw())
            }
        };
        Ok(image)
    }
}
