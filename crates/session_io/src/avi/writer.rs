//! Streaming MJPEG AVI writer

use std::path::{Path, PathBuf};

use contracts::{CameraProfile, ImageData, PixelFormat};
use ffmpeg_next as ffmpeg;
use ffmpeg_next::{codec, format, Packet, Rational};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use tracing::{debug, warn};

use super::{ensure_ffmpeg, frame_time_base, AviInfo, CONTAINER};
use crate::{to_rgb_pixels, StorageError};

/// Writer parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AviParams {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// JPEG quality (1..=100)
    pub jpeg_quality: u8,
}

impl AviParams {
    /// Parameters matching a camera's configured rate and resolution
    pub fn from_profile(profile: &CameraProfile, jpeg_quality: u8) -> Self {
        Self {
            width: profile.width,
            height: profile.height,
            fps: profile.fps,
            jpeg_quality,
        }
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.width == 0 || self.height == 0 {
            return Err(StorageError::invalid(format!(
                "frame size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if !(self.fps > 0.0) || !self.fps.is_finite() {
            return Err(StorageError::invalid(format!(
                "fps must be > 0, got {}",
                self.fps
            )));
        }
        Ok(())
    }
}

/// MJPEG AVI writer
///
/// One muxer per file. Frames are appended as they arrive; [`finish`](Self::finish)
/// writes the trailer. Dropping an unfinished writer writes it on a
/// best-effort basis.
pub struct AviWriter {
    path: PathBuf,
    output: Option<format::context::Output>,
    params: AviParams,
    /// Time base packets are stamped in
    frame_base: Rational,
    /// Time base the muxer settled on in `write_header`
    stream_base: Rational,
    frames: usize,
}

impl AviWriter {
    /// Create the file and write the container header
    ///
    /// # Errors
    /// - Invalid parameters (zero size, non-positive fps)
    /// - File creation or muxer setup failure
    pub fn create(path: impl AsRef<Path>, params: AviParams) -> Result<Self, StorageError> {
        params.check()?;
        ensure_ffmpeg()?;

        let path = path.as_ref().to_path_buf();
        // the muxer reports a missing directory as a generic error
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::metadata(parent)?;
        }

        let mut output = format::output_as(&path, CONTAINER)?;
        let frame_base = frame_time_base(params.fps);

        let mjpeg = ffmpeg::encoder::find(codec::Id::MJPEG)
            .ok_or_else(|| StorageError::invalid("MJPEG codec not available"))?;
        let mut video = codec::context::Context::new_with_codec(mjpeg)
            .encoder()
            .video()?;
        video.set_width(params.width);
        video.set_height(params.height);
        video.set_format(format::Pixel::YUVJ420P);
        video.set_time_base(frame_base);
        video.set_frame_rate(Some(Rational::new(frame_base.denominator(), frame_base.numerator())));

        {
            let mut stream = output.add_stream(mjpeg)?;
            stream.set_time_base(frame_base);
            stream.set_parameters(&video);
        }
        output.write_header()?;

        let stream_base = output
            .stream(0)
            .map(|stream| stream.time_base())
            .unwrap_or(frame_base);

        debug!(path = %path.display(), width = params.width, height = params.height, fps = params.fps, "AVI writer opened");

        Ok(Self {
            path,
            output: Some(output),
            params,
            frame_base,
            stream_base,
            frames: 0,
        })
    }

    /// Output path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writer parameters
    pub fn params(&self) -> &AviParams {
        &self.params
    }

    /// Frames appended so far
    pub fn frame_count(&self) -> usize {
        self.frames
    }

    /// Encode and append one frame
    ///
    /// # Errors
    /// - `FrameSizeMismatch` when the frame is not the writer's resolution
    /// - `MalformedBuffer` / `Codec` when the frame cannot be encoded
    /// - muxer failure
    pub fn write_frame(&mut self, image: &ImageData) -> Result<(), StorageError> {
        if image.size() != (self.params.width, self.params.height) {
            return Err(StorageError::FrameSizeMismatch {
                expected_width: self.params.width,
                expected_height: self.params.height,
                width: image.width,
                height: image.height,
            });
        }
        let jpeg = encode_jpeg(image, self.params.jpeg_quality)?;
        self.write_chunk(&jpeg)
    }

    /// Append an already encoded JPEG as the next frame
    pub fn write_chunk(&mut self, data: &[u8]) -> Result<(), StorageError> {
        let output = self.output.as_mut().ok_or(StorageError::Finalized)?;

        let pts = self.frames as i64;
        let mut packet = Packet::copy(data);
        packet.set_stream(0);
        packet.set_pts(Some(pts));
        packet.set_dts(Some(pts));
        packet.set_duration(1);
        packet.set_flags(codec::packet::Flags::KEY);
        packet.rescale_ts(self.frame_base, self.stream_base);
        packet.write_interleaved(output)?;

        self.frames += 1;
        Ok(())
    }

    /// Write the trailer (index and final sizes) and close the file
    pub fn finish(mut self) -> Result<AviInfo, StorageError> {
        self.finalize()
    }

    fn finalize(&mut self) -> Result<AviInfo, StorageError> {
        let mut output = self.output.take().ok_or(StorageError::Finalized)?;
        output.write_trailer()?;
        // closes the file
        drop(output);

        debug!(path = %self.path.display(), frames = self.frames, "AVI writer finalized");

        Ok(AviInfo {
            width: self.params.width,
            height: self.params.height,
            fps: self.params.fps,
            frame_count: self.frames,
        })
    }
}

impl Drop for AviWriter {
    fn drop(&mut self) {
        if self.output.is_some() {
            if let Err(e) = self.finalize() {
                warn!(path = %self.path.display(), error = %e, "Failed to finalize AVI on drop");
            }
        }
    }
}

/// JPEG bytes of one frame
fn encode_jpeg(image: &ImageData, quality: u8) -> Result<Vec<u8>, StorageError> {
    let mut jpeg = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, quality);
    match image.format {
        PixelFormat::Gray8 => {
            if !image.is_well_formed() {
                return Err(StorageError::MalformedBuffer {
                    expected: image.expected_len(),
                    actual: image.data.len(),
                });
            }
            encoder.encode(&image.data, image.width, image.height, ExtendedColorType::L8)?;
        }
        PixelFormat::Bgr8 | PixelFormat::Rgb8 => {
            let rgb = to_rgb_pixels(image)?;
            encoder.encode(&rgb, image.width, image.height, ExtendedColorType::Rgb8)?;
        }
    }
    Ok(jpeg)
}
