//! Pixel format conversion to display / encoder friendly RGB.

use contracts::{ImageData, PixelFormat};
use image::RgbImage;

use crate::StorageError;

/// Convert a frame to tightly packed RGB bytes
///
/// # Errors
/// `MalformedBuffer` when the buffer length disagrees with the dimensions.
pub fn to_rgb_pixels(image: &ImageData) -> Result<Vec<u8>, StorageError> {
    if !image.is_well_formed() {
        return Err(StorageError::MalformedBuffer {
            expected: image.expected_len(),
            actual: image.data.len(),
        });
    }

    let rgb = match image.format {
        PixelFormat::Rgb8 => image.data.to_vec(),
        PixelFormat::Bgr8 => {
            let mut rgb = image.data.to_vec();
            for px in rgb.chunks_exact_mut(3) {
                px.swap(0, 2); // B <-> R
            }
            rgb
        }
        PixelFormat::Gray8 => image.data.iter().flat_map(|&v| [v, v, v]).collect(),
    };
    Ok(rgb)
}

/// Convert a frame to an `RgbImage`
pub fn to_rgb_image(image: &ImageData) -> Result<RgbImage, StorageError> {
    let pixels = to_rgb_pixels(image)?;
    let expected = pixels.len();
    RgbImage::from_raw(image.width, image.height, pixels).ok_or(StorageError::MalformedBuffer {
        expected: image.width as usize * image.height as usize * 3,
        actual: expected,
    })
}
