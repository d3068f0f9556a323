//! Decode, normalize, downscale and re-encode uploaded photos.

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, RgbImage};
use jpeg_encoder::{ColorType, Encoder};

use crate::buffer::{ContentType, ImageBuffer};
use crate::error::{Error, Result};

/// Default maximum output width in pixels.
pub const DEFAULT_MAX_WIDTH: u32 = 1200;

/// Default JPEG quality (1-100).
pub const DEFAULT_QUALITY: u8 = 85;

/// Options controlling the compression stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressOptions {
    /// Images wider than this are scaled down to exactly this width.
    pub max_width: u32,
    /// JPEG quality, clamped to 1-100 at encode time.
    pub quality: u8,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            quality: DEFAULT_QUALITY,
        }
    }
}

/// Compress an uploaded photo.
///
/// The buffer is rewound and read in full, decoded, converted to RGB,
/// downscaled with a Lanczos3 filter when wider than `opts.max_width` and
/// re-encoded as JPEG. The input is left positioned at end of stream.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFormat`] if the bytes are not a decodable
/// JPEG, PNG or WebP image, or [`Error::Encode`] if encoding fails.
pub fn compress(img: &mut ImageBuffer, opts: &CompressOptions) -> Result<ImageBuffer> {
    let bytes = img.read_all()?;
    let rgb = normalize(decode(&bytes)?);
    let (width, height) = rgb.dimensions();

    let (new_w, new_h) = target_dimensions(width, height, opts.max_width);
    let resized = if (new_w, new_h) == (width, height) {
        rgb
    } else {
        log::debug!(
            "downscaling {}: {width}x{height} -> {new_w}x{new_h}",
            img.filename()
        );
        imageops::resize(&rgb, new_w, new_h, FilterType::Lanczos3)
    };

    let jpeg = encode_jpeg(&resized, opts.quality)?;
    Ok(ImageBuffer::new(jpeg, img.filename(), ContentType::Jpeg))
}

/// Decode image bytes, accepting only JPEG, PNG and WebP.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFormat`] for unknown, unsupported or corrupt
/// data.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    let format =
        image::guess_format(bytes).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;

    if !matches!(
        format,
        ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP
    ) {
        return Err(Error::UnsupportedFormat(format!("{format:?}")));
    }

    image::load_from_memory_with_format(bytes, format)
        .map_err(|e| Error::UnsupportedFormat(e.to_string()))
}

/// Normalize any decoded image to 3-channel RGB.
///
/// Palette, grayscale and alpha-bearing sources are converted; alpha is
/// dropped. An image already in RGB8 is returned unchanged, so applying this
/// twice is the same as applying it once.
#[must_use]
pub fn normalize(img: DynamicImage) -> RgbImage {
    match img {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => other.to_rgb8(),
    }
}

/// Output dimensions for an image bounded by `max_width`.
///
/// Never upscales. When scaling, the height is truncated rather than
/// rounded and kept at least one pixel.
#[must_use]
pub fn target_dimensions(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width <= max_width {
        return (width, height);
    }
    let scaled = u64::from(height) * u64::from(max_width) / u64::from(width);
    // scaled <= height because max_width < width
    #[allow(clippy::cast_possible_truncation)]
    let new_h = (scaled as u32).max(1);
    (max_width, new_h)
}

/// Encode an RGB image as JPEG with optimized Huffman tables.
///
/// # Errors
///
/// Returns [`Error::TooLarge`] if a side exceeds 65535 pixels, or
/// [`Error::Encode`] if the encoder fails.
pub fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    encode_with(img, quality, true)
}

fn encode_with(img: &RgbImage, quality: u8, optimize: bool) -> Result<Vec<u8>> {
    let (width, height) = img.dimensions();
    let (Ok(w), Ok(h)) = (u16::try_from(width), u16::try_from(height)) else {
        return Err(Error::TooLarge { width, height });
    };

    let mut out = Vec::new();
    let mut encoder = Encoder::new(&mut out, quality.clamp(1, 100));
    encoder.set_optimized_huffman_tables(optimize);
    encoder.encode(img.as_raw(), w, h, ColorType::Rgb)?;
    Ok(out)
}
