//! Bytes → single-channel intensity grid.

use std::io::Cursor;

use image::io::Reader;
use image::{DynamicImage, GrayImage, Luma, RgbImage};
use tracing::debug;

use super::format::{detect_image_format, normalize_payload, ImageFormat};
use crate::pipeline::BiometricError;

/// Result of decoding a submitted payload.
#[derive(Debug)]
pub struct DecodedSample {
    pub grid: GrayImage,
    /// Container format sniffed from the (normalized) bytes.
    pub format: ImageFormat,
    /// True when the image was stored as 8-bit grayscale and needed no conversion.
    pub native_gray: bool,
    /// Size of the image bytes after base64/data-URL unwrapping.
    pub byte_len: usize,
}

/// Decode a client payload (raw bytes, base64 text, or data URL) to a grid
/// no wider or taller than `max_side`.
pub fn decode_payload(payload: &[u8], max_side: u32) -> Result<DecodedSample, BiometricError> {
    let bytes = normalize_payload(payload)?;
    let (grid, native_gray) = decode_grid(&bytes, max_side)?;
    Ok(DecodedSample {
        grid,
        format: detect_image_format(&bytes),
        native_gray,
        byte_len: bytes.len(),
    })
}

/// Decode raw image bytes to grayscale.
///
/// The declared size is read from the image header first; anything wider
/// or taller than `max_side` is refused before pixel data is allocated.
/// 8-bit grayscale images are taken as-is. Everything else goes through RGB
/// and [`rgb_to_gray`]. Returns whether the grayscale was native.
pub fn decode_grid(bytes: &[u8], max_side: u32) -> Result<(GrayImage, bool), BiometricError> {
    if bytes.is_empty() {
        return Err(BiometricError::Decode("empty image data".into()));
    }

    let (width, height) = header_dimensions(bytes)?;
    if width > max_side || height > max_side {
        return Err(BiometricError::Dimension {
            stage: "intake",
            width,
            height,
            min: 1,
            max: max_side,
        });
    }

    let img = image::load_from_memory(bytes)
        .map_err(|e| BiometricError::Decode(format!("Could not decode image data: {e}")))?;

    let (grid, native_gray) = match img {
        DynamicImage::ImageLuma8(gray) => (gray, true),
        DynamicImage::ImageRgb8(rgb) => (rgb_to_gray(&rgb), false),
        other => (rgb_to_gray(&other.to_rgb8()), false),
    };

    if grid.width() == 0 || grid.height() == 0 {
        return Err(BiometricError::Decode("decoded image has zero size".into()));
    }

    debug!(
        width = grid.width(),
        height = grid.height(),
        native_gray,
        "Sample decoded"
    );

    Ok((grid, native_gray))
}

/// Width and height as declared by the container header.
pub fn header_dimensions(bytes: &[u8]) -> Result<(u32, u32), BiometricError> {
    Reader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| BiometricError::Decode(format!("Could not read image header: {e}")))?
        .into_dimensions()
        .map_err(|e| BiometricError::Decode(format!("Could not decode image data: {e}")))
}

/// ITU-R BT.601 luma, rounded to nearest.
pub fn rgb_to_gray(rgb: &RgbImage) -> GrayImage {
    let (w, h) = (rgb.width(), rgb.height());
    let mut gray = GrayImage::new(w, h);
    for (x, y, p) in rgb.enumerate_pixels() {
        let luma = 0.299 * p.0[0] as f32 + 0.587 * p.0[1] as f32 + 0.114 * p.0[2] as f32;
        gray.put_pixel(x, y, Luma([luma.round().clamp(0.0, 255.0) as u8]));
    }
    gray
}
