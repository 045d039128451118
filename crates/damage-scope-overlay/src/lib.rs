#![warn(missing_docs)]
//! # damage-scope-overlay
//!
//! ## Purpose
//! Draws detection boxes and labels onto a 2D drawing surface.
//!
//! ## Responsibilities
//! - Define the [`DrawSurface`] abstraction the renderer targets.
//! - Provide style presets for slot previews, exported reports and webcam
//!   overlays.
//! - Provide a raster surface backed by `image`/`imageproc` and a recording
//!   surface for assertions.
//!
//! ## Data flow
//! `DetectionResult` + [`OverlayStyle`] -> [`draw_detections`] -> surface
//! primitives (stroke, fill, text).
//!
//! ## Coordinate spaces
//! Boxes are drawn exactly where the producer placed them. The surface must
//! have the resolution of the image the boxes were computed against;
//! [`prepare_surface`] resizes a surface to that resolution before drawing.
//!
//! ## Error model
//! Drawing never fails. Only font loading returns [`OverlayError`].

mod raster;
mod recording;

use damage_scope_core::{BoundingBox, DetectionResult, Resolution};
use image::Rgba;
use thiserror::Error;

pub use raster::{LabelFont, RasterSurface};
pub use recording::{DrawOp, RecordingSurface};

/// Box outline and label background color (`#00FF00`).
pub const OVERLAY_GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);

/// Label text color.
pub const LABEL_TEXT_BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Target of overlay rendering.
///
/// Coordinates are in surface pixels with the origin at the top-left corner.
/// Primitives falling partly outside the surface are clipped by the
/// implementation.
pub trait DrawSurface {
    /// Current surface resolution.
    fn resolution(&self) -> Resolution;

    /// Resizes the surface; all previously drawn content is discarded.
    fn resize(&mut self, resolution: Resolution);

    /// Clears all drawn content, keeping the resolution.
    fn clear(&mut self);

    /// Strokes an unfilled rectangle outline centered on `rect`'s edges.
    fn stroke_rect(&mut self, rect: BoundingBox, line_width: u32, color: Rgba<u8>);

    /// Fills a rectangle.
    fn fill_rect(&mut self, rect: BoundingBox, color: Rgba<u8>);

    /// Returns the advance width of `text` at `font_px` pixels.
    fn measure_text(&self, text: &str, font_px: f32) -> f32;

    /// Draws `text` with its baseline starting at (`x`, `baseline`).
    fn fill_text(&mut self, text: &str, x: f32, baseline: f32, font_px: f32, color: Rgba<u8>);
}

/// Confidence formatting convention for labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelFormat {
    /// `"<class> (<x.x>%)"`, used on slot previews next to report cards.
    OneDecimal,
    /// `"<class> <n>%"`, used on exported images and webcam overlays.
    RoundedPercent,
}

impl LabelFormat {
    /// Formats one label.
    pub fn format(self, class: &str, confidence: f32) -> String {
        match self {
            LabelFormat::OneDecimal => format!("{class} ({confidence:.1}%)"),
            LabelFormat::RoundedPercent => format!("{class} {}%", confidence.round() as i64),
        }
    }
}

/// Visual parameters of one rendering context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    /// Box outline width in pixels.
    pub line_width: u32,
    /// Label font size in pixels.
    pub font_px: f32,
    /// Height of the label band drawn above the box.
    pub label_height: f32,
    /// Extra width added to the measured text width.
    pub label_padding: f32,
    /// Left inset of the text inside the label band.
    pub text_inset: f32,
    /// Distance of the text baseline above the box's top edge.
    pub baseline_offset: f32,
    /// Box outline color.
    pub box_color: Rgba<u8>,
    /// Label band color.
    pub label_color: Rgba<u8>,
    /// Label text color.
    pub text_color: Rgba<u8>,
    /// Confidence formatting.
    pub label_format: LabelFormat,
}

impl OverlayStyle {
    /// Slot preview style: thin strokes, small font, one-decimal labels.
    pub const fn preview() -> Self {
        Self::base(3, 16.0, 25.0, LabelFormat::OneDecimal)
    }

    /// Full-resolution export style: thick strokes, large font.
    pub const fn export() -> Self {
        Self::base(5, 24.0, 35.0, LabelFormat::RoundedPercent)
    }

    /// Live webcam overlay style.
    pub const fn webcam() -> Self {
        Self::base(3, 18.0, 25.0, LabelFormat::RoundedPercent)
    }

    const fn base(line_width: u32, font_px: f32, label_height: f32, label_format: LabelFormat) -> Self {
        Self {
            line_width,
            font_px,
            label_height,
            label_padding: 10.0,
            text_inset: 5.0,
            baseline_offset: 7.0,
            box_color: OVERLAY_GREEN,
            label_color: OVERLAY_GREEN,
            text_color: LABEL_TEXT_BLACK,
            label_format,
        }
    }
}

/// Resizes `surface` to `resolution` when they differ.
///
/// Returns `true` when a resize happened (which also discards content).
pub fn prepare_surface<S: DrawSurface + ?Sized>(surface: &mut S, resolution: Resolution) -> bool {
    if surface.resolution() == resolution {
        return false;
    }
    surface.resize(resolution);
    true
}

/// Draws every detection of `result` onto `surface`.
///
/// The surface is not cleared; callers re-rendering the same surface clear
/// it first (see [`redraw_detections`]). Returns the number of boxes drawn.
pub fn draw_detections<S: DrawSurface + ?Sized>(
    surface: &mut S,
    result: &DetectionResult,
    style: &OverlayStyle,
) -> usize {
    let mut drawn = 0;
    for detection in result.detections() {
        let bbox = detection.bbox;
        surface.stroke_rect(bbox, style.line_width, style.box_color);

        let text = style.label_format.format(detection.class, detection.confidence);
        let text_width = surface.measure_text(&text, style.font_px);
        let band = BoundingBox::new(
            bbox.x,
            bbox.y - style.label_height,
            text_width + style.label_padding,
            style.label_height,
        );
        surface.fill_rect(band, style.label_color);
        surface.fill_text(
            &text,
            bbox.x + style.text_inset,
            bbox.y - style.baseline_offset,
            style.font_px,
            style.text_color,
        );
        drawn += 1;
    }
    drawn
}

/// Matches `surface` to `resolution`, clears it, and draws `result`.
///
/// Used for surfaces redrawn per result, such as the webcam overlay.
pub fn redraw_detections<S: DrawSurface + ?Sized>(
    surface: &mut S,
    result: &DetectionResult,
    resolution: Resolution,
    style: &OverlayStyle,
) -> usize {
    if !prepare_surface(surface, resolution) {
        surface.clear();
    }
    draw_detections(surface, result, style)
}

/// Overlay errors.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// Font file could not be read.
    #[error("font read failure: {0}")]
    FontRead(#[from] std::io::Error),
    /// Font bytes are not a usable TTF/OTF font.
    #[error("invalid font data: {0}")]
    InvalidFont(String),
}

#[cfg(test)]
mod tests {
    //! Unit tests for label formatting and draw ordering.

    use super::*;

    fn dent() -> DetectionResult {
        DetectionResult::new(
            vec![BoundingBox::new(10.0, 20.0, 30.0, 40.0)],
            vec!["dent".to_string()],
            vec![87.3],
        )
        .expect("fixture should be valid")
    }

    #[test]
    fn label_formats_are_distinct() {
        assert_eq!(LabelFormat::OneDecimal.format("dent", 87.3), "dent (87.3%)");
        assert_eq!(LabelFormat::RoundedPercent.format("dent", 87.3), "dent 87%");
        assert_eq!(LabelFormat::RoundedPercent.format("scratch", 12.5), "scratch 13%");
    }

    #[test]
    fn export_style_draws_box_band_and_text() {
        let mut surface = RecordingSurface::new(Resolution::new(200, 200));
        let drawn = draw_detections(&mut surface, &dent(), &OverlayStyle::export());
        assert_eq!(drawn, 1);

        let ops = surface.ops();
        assert_eq!(
            ops[0],
            DrawOp::StrokeRect {
                rect: BoundingBox::new(10.0, 20.0, 30.0, 40.0),
                line_width: 5,
                color: OVERLAY_GREEN,
            }
        );
        let text_width = surface.measure_text("dent 87%", 24.0);
        assert_eq!(
            ops[1],
            DrawOp::FillRect {
                rect: BoundingBox::new(10.0, -15.0, text_width + 10.0, 35.0),
                color: OVERLAY_GREEN,
            }
        );
        assert_eq!(
            ops[2],
            DrawOp::FillText {
                text: "dent 87%".to_string(),
                x: 15.0,
                baseline: 13.0,
                font_px: 24.0,
                color: LABEL_TEXT_BLACK,
            }
        );
    }

    #[test]
    fn empty_result_draws_nothing() {
        let mut surface = RecordingSurface::new(Resolution::new(10, 10));
        let drawn = redraw_detections(
            &mut surface,
            &DetectionResult::default(),
            Resolution::new(10, 10),
            &OverlayStyle::webcam(),
        );
        assert_eq!(drawn, 0);
        assert!(surface.ops().is_empty());
        assert_eq!(surface.clear_count(), 1);
    }

    #[test]
    fn redraw_resizes_to_producer_resolution() {
        let mut surface = RecordingSurface::new(Resolution::new(320, 240));
        redraw_detections(
            &mut surface,
            &dent(),
            Resolution::new(1280, 720),
            &OverlayStyle::webcam(),
        );
        assert_eq!(surface.resolution(), Resolution::new(1280, 720));
        assert_eq!(surface.clear_count(), 0);
        assert_eq!(surface.resize_count(), 1);
    }
}
