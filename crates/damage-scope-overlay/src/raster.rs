//! RGBA raster surface backed by `image` and `imageproc`.

use std::path::Path;
use std::sync::OnceLock;

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use damage_scope_core::{BoundingBox, Resolution};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::{DrawSurface, OverlayError};

/// Advance width per character when no font could be parsed.
const FALLBACK_ADVANCE_RATIO: f32 = 0.55;

static BUNDLED_FONT_BYTES: &[u8] = include_bytes!("../fonts/DejaVuSans.ttf");

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Shared, immutable label font.
#[derive(Clone)]
pub struct LabelFont(FontArc);

impl LabelFont {
    /// DejaVu Sans, compiled into the binary.
    ///
    /// # Errors
    /// Returns [`OverlayError::InvalidFont`] if the embedded bytes fail to
    /// parse.
    pub fn bundled() -> Result<Self, OverlayError> {
        FontArc::try_from_slice(BUNDLED_FONT_BYTES)
            .map(Self)
            .map_err(|error| OverlayError::InvalidFont(error.to_string()))
    }

    /// Process-wide bundled font, parsed once.
    pub fn default_font() -> Option<Self> {
        static DEFAULT: OnceLock<Option<LabelFont>> = OnceLock::new();
        DEFAULT.get_or_init(|| Self::bundled().ok()).clone()
    }

    /// Loads a TTF/OTF font from disk.
    ///
    /// # Errors
    /// Returns [`OverlayError::FontRead`] when the file cannot be read and
    /// [`OverlayError::InvalidFont`] when the bytes are not a font.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, OverlayError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(bytes)
    }

    /// Parses a font from owned bytes.
    ///
    /// # Errors
    /// Returns [`OverlayError::InvalidFont`] when the bytes are not a font.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, OverlayError> {
        FontArc::try_from_vec(bytes)
            .map(Self)
            .map_err(|error| OverlayError::InvalidFont(error.to_string()))
    }

    fn font(&self) -> &FontArc {
        &self.0
    }
}

impl std::fmt::Debug for LabelFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LabelFont")
    }
}

/// [`DrawSurface`] rasterizing into an owned RGBA image.
///
/// Labels use the given [`LabelFont`] or, when none is passed, the bundled
/// one from [`LabelFont::default_font`].
#[derive(Debug, Clone)]
pub struct RasterSurface {
    image: RgbaImage,
    font: Option<LabelFont>,
}

impl RasterSurface {
    /// Creates a transparent surface.
    pub fn new(resolution: Resolution, font: Option<LabelFont>) -> Self {
        Self::from_image(
            RgbaImage::from_pixel(resolution.width, resolution.height, TRANSPARENT),
            font,
        )
    }

    /// Wraps an existing image; drawing happens on top of its pixels.
    pub fn from_image(image: RgbaImage, font: Option<LabelFont>) -> Self {
        Self {
            image,
            font: font.or_else(LabelFont::default_font),
        }
    }

    /// Borrows the rendered pixels.
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Consumes the surface and returns the rendered pixels.
    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Returns `true` when every pixel is fully transparent.
    pub fn is_blank(&self) -> bool {
        self.image.pixels().all(|pixel| pixel[3] == 0)
    }
}

impl DrawSurface for RasterSurface {
    fn resolution(&self) -> Resolution {
        Resolution::new(self.image.width(), self.image.height())
    }

    fn resize(&mut self, resolution: Resolution) {
        self.image = RgbaImage::from_pixel(resolution.width, resolution.height, TRANSPARENT);
    }

    fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = TRANSPARENT;
        }
    }

    fn stroke_rect(&mut self, rect: BoundingBox, line_width: u32, color: Rgba<u8>) {
        // The stroke straddles the rectangle edge: half inside, half outside.
        let half = (line_width / 2) as i32;
        for step in 0..line_width as i32 {
            let inset = step - half;
            let inset_f = inset as f32;
            if let Some(outline) = pixel_rect(
                rect.x + inset_f,
                rect.y + inset_f,
                rect.w - 2.0 * inset_f,
                rect.h - 2.0 * inset_f,
            ) {
                draw_hollow_rect_mut(&mut self.image, outline, color);
            }
        }
    }

    fn fill_rect(&mut self, rect: BoundingBox, color: Rgba<u8>) {
        if let Some(area) = pixel_rect(rect.x, rect.y, rect.w, rect.h) {
            draw_filled_rect_mut(&mut self.image, area, color);
        }
    }

    fn measure_text(&self, text: &str, font_px: f32) -> f32 {
        match &self.font {
            Some(font) => text_size(PxScale::from(font_px), font.font(), text).0 as f32,
            None => text.chars().count() as f32 * font_px * FALLBACK_ADVANCE_RATIO,
        }
    }

    fn fill_text(&mut self, text: &str, x: f32, baseline: f32, font_px: f32, color: Rgba<u8>) {
        let Some(font) = &self.font else {
            return;
        };
        let scale = PxScale::from(font_px);
        let ascent = font.font().as_scaled(scale).ascent();
        let top = (baseline - ascent).round() as i32;
        draw_text_mut(
            &mut self.image,
            color,
            x.round() as i32,
            top,
            scale,
            font.font(),
            text,
        );
    }
}

fn pixel_rect(x: f32, y: f32, w: f32, h: f32) -> Option<Rect> {
    let width = w.round();
    let height = h.round();
    if width < 1.0 || height < 1.0 {
        return None;
    }
    Some(Rect::at(x.round() as i32, y.round() as i32).of_size(width as u32, height as u32))
}

#[cfg(test)]
mod tests {
    //! Unit tests for raster primitives.

    use super::*;
    use crate::{OVERLAY_GREEN, OverlayStyle, draw_detections};
    use damage_scope_core::DetectionResult;

    #[test]
    fn stroke_covers_box_edges_and_leaves_interior() {
        let mut surface = RasterSurface::new(Resolution::new(100, 100), None);
        surface.stroke_rect(BoundingBox::new(10.0, 20.0, 30.0, 40.0), 5, OVERLAY_GREEN);

        let image = surface.image();
        assert_eq!(*image.get_pixel(10, 20), OVERLAY_GREEN);
        assert_eq!(*image.get_pixel(8, 30), OVERLAY_GREEN);
        assert_eq!(*image.get_pixel(12, 30), OVERLAY_GREEN);
        assert_eq!(image.get_pixel(25, 40)[3], 0);
    }

    #[test]
    fn label_band_is_clipped_at_top_edge() {
        let result = DetectionResult::new(
            vec![BoundingBox::new(0.0, 0.0, 20.0, 20.0)],
            vec!["dent".to_string()],
            vec![50.0],
        )
        .expect("fixture should be valid");
        let mut surface = RasterSurface::new(Resolution::new(50, 50), None);
        assert_eq!(draw_detections(&mut surface, &result, &OverlayStyle::export()), 1);
        assert!(!surface.is_blank());
    }

    #[test]
    fn default_font_draws_label_text_inside_band() {
        let result = DetectionResult::new(
            vec![BoundingBox::new(10.0, 60.0, 30.0, 40.0)],
            vec!["dent".to_string()],
            vec![87.3],
        )
        .expect("fixture should be valid");
        let style = OverlayStyle::export();
        let mut surface = RasterSurface::new(Resolution::new(200, 200), None);
        draw_detections(&mut surface, &result, &style);

        let band_top = (60.0 - style.label_height) as u32;
        let text_width = surface.measure_text("dent 87%", style.font_px);
        let band_right = (10.0 + text_width + style.label_padding) as u32;
        let dark = (band_top..60)
            .flat_map(|y| (12..band_right).map(move |x| (x, y)))
            .filter(|&(x, y)| {
                let pixel = surface.image().get_pixel(x, y);
                pixel[3] == 255 && pixel[1] < 128
            })
            .count();
        assert!(dark > 20, "expected glyph pixels in the label band, found {dark}");
    }

    #[test]
    fn explicit_font_overrides_bundled_one() {
        let font = LabelFont::bundled().expect("bundled font parses");
        let surface = RasterSurface::new(Resolution::new(4, 4), Some(font));
        assert!(surface.measure_text("dent", 24.0) > 0.0);
        assert!(LabelFont::from_bytes(b"not a font".to_vec()).is_err());
    }

    #[test]
    fn clear_and_resize_blank_the_surface() {
        let mut surface = RasterSurface::new(Resolution::new(10, 10), None);
        surface.fill_rect(BoundingBox::new(0.0, 0.0, 5.0, 5.0), OVERLAY_GREEN);
        assert!(!surface.is_blank());
        surface.clear();
        assert!(surface.is_blank());

        surface.fill_rect(BoundingBox::new(0.0, 0.0, 5.0, 5.0), OVERLAY_GREEN);
        surface.resize(Resolution::new(20, 8));
        assert!(surface.is_blank());
        assert_eq!(surface.resolution(), Resolution::new(20, 8));
    }

    #[test]
    fn degenerate_rects_are_skipped() {
        assert!(pixel_rect(0.0, 0.0, 0.2, 10.0).is_none());
        assert!(pixel_rect(0.0, 0.0, 10.0, -3.0).is_none());
    }
}
