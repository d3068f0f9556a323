//! Font sources for the watermark text.
//!
//! The watermarker asks a [`FontProvider`] for an outline font. Providers load
//! lazily and may come up empty, in which case text is rendered with a small
//! built-in bitmap face instead. That path is lower fidelity but never fails.

use std::path::PathBuf;

use ab_glyph::{Font, FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use once_cell::sync::OnceCell;

/// Source of the outline font used to draw watermark text.
pub trait FontProvider: Send + Sync {
    /// The outline font to render with, or `None` to use the built-in face.
    fn font(&self) -> Option<&FontArc>;
}

impl FontProvider for FontArc {
    fn font(&self) -> Option<&FontArc> {
        Some(self)
    }
}

/// Always renders with the built-in bitmap face.
///
/// Output is fully deterministic across machines.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinFont;

impl FontProvider for BuiltinFont {
    fn font(&self) -> Option<&FontArc> {
        None
    }
}

/// Loads the first readable font from a list of filesystem paths.
///
/// Loading happens on first use and the outcome, including failure, is
/// cached for the lifetime of the provider.
#[derive(Debug)]
pub struct SystemFonts {
    candidates: Vec<PathBuf>,
    loaded: OnceCell<Option<FontArc>>,
}

impl SystemFonts {
    /// Try the given paths in order.
    #[must_use]
    pub fn new(candidates: Vec<PathBuf>) -> Self {
        Self {
            candidates,
            loaded: OnceCell::new(),
        }
    }

    fn load(&self) -> Option<FontArc> {
        for path in &self.candidates {
            let data = match std::fs::read(path) {
                Ok(data) => data,
                Err(e) => {
                    log::trace!("font {} not readable: {e}", path.display());
                    continue;
                }
            };
            match FontArc::try_from_vec(data) {
                Ok(font) => {
                    log::debug!("loaded watermark font {}", path.display());
                    return Some(font);
                }
                Err(e) => log::warn!("font {} is not usable: {e}", path.display()),
            }
        }
        log::debug!("no watermark font available, using built-in face");
        None
    }
}

impl Default for SystemFonts {
    /// Common sans-serif fonts on macOS, Linux and Windows.
    fn default() -> Self {
        Self::new(
            [
                "/System/Library/Fonts/Helvetica.ttc",
                "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
                "/usr/share/fonts/TTF/DejaVuSans.ttf",
                "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
                "C:\\Windows\\Fonts\\arial.ttf",
            ]
            .into_iter()
            .map(PathBuf::from)
            .collect(),
        )
    }
}

impl FontProvider for SystemFonts {
    fn font(&self) -> Option<&FontArc> {
        self.loaded.get_or_init(|| self.load()).as_ref()
    }
}

/// A resolved face, ready to measure and draw text at a pixel size.
#[derive(Clone, Copy)]
pub enum Face<'a> {
    /// An outline font from a provider.
    Outline(&'a FontArc),
    /// The built-in 5x7 bitmap face.
    Builtin,
}

impl<'a> Face<'a> {
    /// Pick the provider's font, falling back to the built-in face.
    pub fn resolve(provider: &'a dyn FontProvider) -> Self {
        provider.font().map_or(Self::Builtin, Self::Outline)
    }

    /// Whether this is the built-in fallback face.
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        matches!(self, Self::Builtin)
    }

    /// Rendered bounding box `(width, height)` of `text` at `size` pixels per em.
    #[must_use]
    pub fn measure(&self, text: &str, size: u32) -> (u32, u32) {
        match self {
            Self::Outline(font) => text_size(px_scale(font, size), *font, text),
            Self::Builtin => bitmap::measure(text, size),
        }
    }

    /// Draw `text` with its top-left corner at `(x, y)`; off-canvas parts are clipped.
    pub fn draw(&self, canvas: &mut RgbImage, text: &str, x: i32, y: i32, size: u32, color: Rgb<u8>) {
        match self {
            Self::Outline(font) => {
                draw_text_mut(canvas, color, x, y, px_scale(font, size), *font, text);
            }
            Self::Builtin => bitmap::draw(canvas, text, x, y, size, color),
        }
    }
}

/// Scale so that one em spans `size` pixels.
#[allow(clippy::cast_precision_loss)]
fn px_scale(font: &FontArc, size: u32) -> PxScale {
    let em = size as f32;
    match font.units_per_em() {
        Some(upem) if upem > 0.0 => PxScale::from(em * font.height_unscaled() / upem),
        _ => PxScale::from(em),
    }
}

mod bitmap {
    use super::{draw_filled_rect_mut, Rect, Rgb, RgbImage};

    const GLYPH_W: u32 = 5;
    const GLYPH_H: u32 = 7;
    const ADVANCE: u32 = GLYPH_W + 1;
    /// Em height of one unscaled glyph cell, including a blank row.
    const CELL_H: u32 = GLYPH_H + 1;

    /// Integer magnification for a requested pixel size.
    pub(super) fn scale(size: u32) -> u32 {
        (size / CELL_H).max(1)
    }

    #[allow(clippy::cast_possible_truncation)]
    pub(super) fn measure(text: &str, size: u32) -> (u32, u32) {
        let count = text.chars().count() as u32;
        if count == 0 {
            return (0, 0);
        }
        let s = scale(size);
        ((count * ADVANCE - 1) * s, GLYPH_H * s)
    }

    #[allow(clippy::cast_possible_wrap)]
    pub(super) fn draw(canvas: &mut RgbImage, text: &str, x: i32, y: i32, size: u32, color: Rgb<u8>) {
        let s = scale(size);
        let mut pen_x = x;
        for c in text.chars() {
            for (col, bits) in glyph(c).iter().enumerate() {
                for row in 0..GLYPH_H {
                    if (bits >> row) & 1 == 0 {
                        continue;
                    }
                    #[allow(clippy::cast_possible_truncation)]
                    let px = pen_x + (col as u32 * s) as i32;
                    let py = y + (row * s) as i32;
                    draw_filled_rect_mut(canvas, Rect::at(px, py).of_size(s, s), color);
                }
            }
            pen_x += (ADVANCE * s) as i32;
        }
    }

    /// Column-major glyph bits, bit 0 is the top row. Unknown characters render as `?`.
    fn glyph(c: char) -> &'static [u8; 5] {
        let idx = match c {
            ' '..='~' => c as usize - ' ' as usize,
            _ => '?' as usize - ' ' as usize,
        };
        &GLYPHS[idx]
    }

    static GLYPHS: [[u8; 5]; 95] = [
        [0x00, 0x00, 0x00, 0x00, 0x00], // ' '
        [0x00, 0x00, 0x5F, 0x00, 0x00], // !
        [0x00, 0x07, 0x00, 0x07, 0x00], // "
        [0x14, 0x7F, 0x14, 0x7F, 0x14], // #
        [0x24, 0x2A, 0x7F, 0x2A, 0x12], // $
        [0x23, 0x13, 0x08, 0x64, 0x62], // %
        [0x36, 0x49, 0x55, 0x22, 0x50], // &
        [0x00, 0x05, 0x03, 0x00, 0x00], // '
        [0x00, 0x1C, 0x22, 0x41, 0x00], // (
        [0x00, 0x41, 0x22, 0x1C, 0x00], // )
        [0x08, 0x2A, 0x1C, 0x2A, 0x08], // *
        [0x08, 0x08, 0x3E, 0x08, 0x08], // +
        [0x00, 0x50, 0x30, 0x00, 0x00], // ,
        [0x08, 0x08, 0x08, 0x08, 0x08], // -
        [0x00, 0x60, 0x60, 0x00, 0x00], // .
        [0x20, 0x10, 0x08, 0x04, 0x02], // /
        [0x3E, 0x51, 0x49, 0x45, 0x3E], // 0
        [0x00, 0x42, 0x7F, 0x40, 0x00], // 1
        [0x42, 0x61, 0x51, 0x49, 0x46], // 2
        [0x21, 0x41, 0x45, 0x4B, 0x31], // 3
        [0x18, 0x14, 0x12, 0x7F, 0x10], // 4
        [0x27, 0x45, 0x45, 0x45, 0x39], // 5
        [0x3C, 0x4A, 0x49, 0x49, 0x30], // 6
        [0x01, 0x71, 0x09, 0x05, 0x03], // 7
        [0x36, 0x49, 0x49, 0x49, 0x36], // 8
        [0x06, 0x49, 0x49, 0x29, 0x1E], // 9
        [0x00, 0x36, 0x36, 0x00, 0x00], // :
        [0x00, 0x56, 0x36, 0x00, 0x00], // ;
        [0x00, 0x08, 0x14, 0x22, 0x41], // <
        [0x14, 0x14, 0x14, 0x14, 0x14], // =
        [0x41, 0x22, 0x14, 0x08, 0x00], // >
        [0x02, 0x01, 0x51, 0x09, 0x06], // ?
        [0x32, 0x49, 0x79, 0x41, 0x3E], // @
        [0x7E, 0x11, 0x11, 0x11, 0x7E], // A
        [0x7F, 0x49, 0x49, 0x49, 0x36], // B
        [0x3E, 0x41, 0x41, 0x41, 0x22], // C
        [0x7F, 0x41, 0x41, 0x22, 0x1C], // D
        [0x7F, 0x49, 0x49, 0x49, 0x41], // E
        [0x7F, 0x09, 0x09, 0x01, 0x01], // F
        [0x3E, 0x41, 0x41, 0x51, 0x32], // G
        [0x7F, 0x08, 0x08, 0x08, 0x7F], // H
        [0x00, 0x41, 0x7F, 0x41, 0x00], // I
        [0x20, 0x40, 0x41, 0x3F, 0x01], // J
        [0x7F, 0x08, 0x14, 0x22, 0x41], // K
        [0x7F, 0x40, 0x40, 0x40, 0x40], // L
        [0x7F, 0x02, 0x04, 0x02, 0x7F], // M
        [0x7F, 0x04, 0x08, 0x10, 0x7F], // N
        [0x3E, 0x41, 0x41, 0x41, 0x3E], // O
        [0x7F, 0x09, 0x09, 0x09, 0x06], // P
        [0x3E, 0x41, 0x51, 0x21, 0x5E], // Q
        [0x7F, 0x09, 0x19, 0x29, 0x46], // R
        [0x46, 0x49, 0x49, 0x49, 0x31], // S
        [0x01, 0x01, 0x7F, 0x01, 0x01], // T
        [0x3F, 0x40, 0x40, 0x40, 0x3F], // U
        [0x1F, 0x20, 0x40, 0x20, 0x1F], // V
        [0x7F, 0x20, 0x18, 0x20, 0x7F], // W
        [0x63, 0x14, 0x08, 0x14, 0x63], // X
        [0x03, 0x04, 0x78, 0x04, 0x03], // Y
        [0x61, 0x51, 0x49, 0x45, 0x43], // Z
        [0x00, 0x00, 0x7F, 0x41, 0x41], // [
        [0x02, 0x04, 0x08, 0x10, 0x20], // backslash
        [0x41, 0x41, 0x7F, 0x00, 0x00], // ]
        [0x04, 0x02, 0x01, 0x02, 0x04], // ^
        [0x40, 0x40, 0x40, 0x40, 0x40], // _
        [0x00, 0x01, 0x02, 0x04, 0x00], // `
        [0x20, 0x54, 0x54, 0x54, 0x78], // a
        [0x7F, 0x48, 0x44, 0x44, 0x38], // b
        [0x38, 0x44, 0x44, 0x44, 0x20], // c
        [0x38, 0x44, 0x44, 0x48, 0x7F], // d
        [0x38, 0x54, 0x54, 0x54, 0x18], // e
        [0x08, 0x7E, 0x09, 0x01, 0x02], // f
        [0x08, 0x14, 0x54, 0x54, 0x3C], // g
        [0x7F, 0x08, 0x04, 0x04, 0x78], // h
        [0x00, 0x44, 0x7D, 0x40, 0x00], // i
        [0x20, 0x40, 0x44, 0x3D, 0x00], // j
        [0x00, 0x7F, 0x10, 0x28, 0x44], // k
        [0x00, 0x41, 0x7F, 0x40, 0x00], // l
        [0x7C, 0x04, 0x18, 0x04, 0x78], // m
        [0x7C, 0x08, 0x04, 0x04, 0x78], // n
        [0x38, 0x44, 0x44, 0x44, 0x38], // o
        [0x7C, 0x14, 0x14, 0x14, 0x08], // p
        [0x08, 0x14, 0x14, 0x18, 0x7C], // q
        [0x7C, 0x08, 0x04, 0x04, 0x08], // r
        [0x48, 0x54, 0x54, 0x54, 0x20], // s
        [0x04, 0x3F, 0x44, 0x40, 0x20], // t
        [0x3C, 0x40, 0x40, 0x20, 0x7C], // u
        [0x1C, 0x20, 0x40, 0x20, 0x1C], // v
        [0x3C, 0x40, 0x30, 0x40, 0x3C], // w
        [0x44, 0x28, 0x10, 0x28, 0x44], // x
        [0x0C, 0x50, 0x50, 0x50, 0x3C], // y
        [0x44, 0x64, 0x54, 0x4C, 0x44], // z
        [0x00, 0x08, 0x36, 0x41, 0x00], // {
        [0x00, 0x00, 0x7F, 0x00, 0x00], // |
        [0x00, 0x41, 0x36, 0x08, 0x00], // }
        [0x08, 0x04, 0x08, 0x10, 0x08], // ~
    ];

}
