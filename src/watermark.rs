//! Translucent text watermark composition.
//!
//! The watermark is anchored to the bottom-right corner: a white panel at
//! alpha 180 is alpha-composited over the photo, then the text is drawn on
//! top in opaque gray.
//!
//! Placement is computed in signed coordinates. For images narrower (or
//! shorter) than the measured text the anchor goes negative and the panel
//! and text are drawn partially off-canvas; drawing clips at the canvas edge.

use image::imageops;
use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

use crate::buffer::{ContentType, ImageBuffer};
use crate::compress::{self, DEFAULT_QUALITY};
use crate::error::Result;
use crate::font::{Face, FontProvider};

/// Default watermark text.
pub const DEFAULT_TEXT: &str = "TMF Marketplace";

/// Watermark appearance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkSpec {
    /// Text drawn in the bottom-right corner.
    pub text: String,
    /// Lower bound for the font size in pixels.
    pub min_font_size: u32,
    /// The font size is `image_width / font_divisor` when that exceeds the minimum.
    pub font_divisor: u32,
    /// Text color.
    pub text_color: Rgb<u8>,
    /// Backing panel color, including alpha.
    pub panel_color: Rgba<u8>,
    /// Horizontal panel padding around the text.
    pub padding_x: i32,
    /// Vertical panel padding around the text.
    pub padding_y: i32,
    /// Distance from the text box to the right and bottom image edges.
    pub margin: i32,
    /// JPEG quality of the watermarked output.
    pub quality: u8,
}

impl Default for WatermarkSpec {
    fn default() -> Self {
        Self {
            text: DEFAULT_TEXT.to_string(),
            min_font_size: 24,
            font_divisor: 20,
            text_color: Rgb([100, 100, 100]),
            panel_color: Rgba([255, 255, 255, 180]),
            padding_x: 10,
            padding_y: 5,
            margin: 20,
            quality: DEFAULT_QUALITY,
        }
    }
}

impl WatermarkSpec {
    /// Default appearance with custom text.
    #[must_use]
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Font size for an image of the given width: `max(min, width / divisor)`.
    #[must_use]
    pub fn font_size(&self, image_width: u32) -> u32 {
        (image_width / self.font_divisor.max(1)).max(self.min_font_size)
    }

    /// Compute text and panel placement for measured text.
    #[must_use]
    pub fn placement(&self, image: (u32, u32), text: (u32, u32)) -> Placement {
        let (img_w, img_h) = (i64::from(image.0), i64::from(image.1));
        let (text_w, text_h) = (i64::from(text.0), i64::from(text.1));
        let margin = i64::from(self.margin);

        let x = saturate(img_w - text_w - margin);
        let y = saturate(img_h - text_h - margin);

        Placement {
            text_x: x,
            text_y: y,
            panel_left: x.saturating_sub(self.padding_x),
            panel_top: y.saturating_sub(self.padding_y),
            panel_right: saturate(i64::from(x) + text_w + i64::from(self.padding_x)),
            panel_bottom: saturate(i64::from(y) + text_h + i64::from(self.padding_y)),
        }
    }
}

/// Where the watermark lands on the image, in signed pixel coordinates.
///
/// Panel bounds are inclusive on all sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Left edge of the text.
    pub text_x: i32,
    /// Top edge of the text.
    pub text_y: i32,
    /// Left edge of the panel.
    pub panel_left: i32,
    /// Top edge of the panel.
    pub panel_top: i32,
    /// Right edge of the panel.
    pub panel_right: i32,
    /// Bottom edge of the panel.
    pub panel_bottom: i32,
}

impl Placement {
    /// Panel as a drawable rectangle.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn panel_rect(&self) -> Rect {
        // right >= left + 2 * padding, so both sizes are positive
        let width = (self.panel_right - self.panel_left + 1).max(1) as u32;
        let height = (self.panel_bottom - self.panel_top + 1).max(1) as u32;
        Rect::at(self.panel_left, self.panel_top).of_size(width, height)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn saturate(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Watermark a compressed photo.
///
/// The buffer is rewound and decoded, then the panel and text from `spec`
/// are composed in the bottom-right corner and the result is re-encoded as
/// JPEG. A missing font is not an error: the built-in face is used.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFormat`](crate::Error::UnsupportedFormat) if
/// the input cannot be decoded, or [`Error::Encode`](crate::Error::Encode) if
/// encoding fails.
pub fn watermark(
    img: &mut ImageBuffer,
    spec: &WatermarkSpec,
    fonts: &dyn FontProvider,
) -> Result<ImageBuffer> {
    let bytes = img.read_all()?;
    let base = compress::normalize(compress::decode(&bytes)?);

    let face = Face::resolve(fonts);
    if face.is_builtin() {
        log::debug!("watermarking {} with built-in face", img.filename());
    }

    let flat = compose(base, spec, face);
    let jpeg = compress::encode_jpeg(&flat, spec.quality)?;
    Ok(ImageBuffer::new(jpeg, img.filename(), ContentType::Jpeg))
}

/// Compose the panel and text onto an RGB image.
///
/// The image is promoted to RGBA, the panel overlay is alpha-blended over it,
/// the result is flattened back to RGB and the text is drawn opaque.
#[must_use]
pub fn compose(base: RgbImage, spec: &WatermarkSpec, face: Face<'_>) -> RgbImage {
    let (width, height) = base.dimensions();
    let size = spec.font_size(width);
    let text_box = face.measure(&spec.text, size);
    let placement = spec.placement((width, height), text_box);

    let mut overlay = RgbaImage::new(width, height);
    draw_filled_rect_mut(&mut overlay, placement.panel_rect(), spec.panel_color);

    let mut composed = DynamicImage::ImageRgb8(base).to_rgba8();
    imageops::overlay(&mut composed, &overlay, 0, 0);
    let mut flat = DynamicImage::ImageRgba8(composed).to_rgb8();

    face.draw(
        &mut flat,
        &spec.text,
        placement.text_x,
        placement.text_y,
        size,
        spec.text_color,
    );
    flat
}
