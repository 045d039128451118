//! Surface that records primitives instead of rasterizing them.

use damage_scope_core::{BoundingBox, Resolution};
use image::Rgba;

use crate::DrawSurface;

/// Advance width per character, as a fraction of the font size.
const RECORDED_ADVANCE_RATIO: f32 = 0.5;

/// One recorded drawing primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// Rectangle outline.
    StrokeRect {
        /// Outlined rectangle.
        rect: BoundingBox,
        /// Stroke width.
        line_width: u32,
        /// Stroke color.
        color: Rgba<u8>,
    },
    /// Filled rectangle.
    FillRect {
        /// Filled rectangle.
        rect: BoundingBox,
        /// Fill color.
        color: Rgba<u8>,
    },
    /// Text run.
    FillText {
        /// Text content.
        text: String,
        /// Left edge.
        x: f32,
        /// Baseline.
        baseline: f32,
        /// Font size.
        font_px: f32,
        /// Text color.
        color: Rgba<u8>,
    },
}

/// [`DrawSurface`] that keeps the primitives drawn since the last clear.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSurface {
    resolution: Resolution,
    ops: Vec<DrawOp>,
    clears: usize,
    resizes: usize,
}

impl RecordingSurface {
    /// Creates an empty surface.
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            ops: Vec::new(),
            clears: 0,
            resizes: 0,
        }
    }

    /// Primitives drawn since the last clear or resize.
    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// Recorded outlines, in draw order.
    pub fn stroked_rects(&self) -> Vec<BoundingBox> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::StrokeRect { rect, .. } => Some(*rect),
                _ => None,
            })
            .collect()
    }

    /// Recorded text runs, in draw order.
    pub fn texts(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::FillText { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Number of explicit clears.
    pub fn clear_count(&self) -> usize {
        self.clears
    }

    /// Number of resizes.
    pub fn resize_count(&self) -> usize {
        self.resizes
    }
}

impl DrawSurface for RecordingSurface {
    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn resize(&mut self, resolution: Resolution) {
        self.resolution = resolution;
        self.ops.clear();
        self.resizes += 1;
    }

    fn clear(&mut self) {
        self.ops.clear();
        self.clears += 1;
    }

    fn stroke_rect(&mut self, rect: BoundingBox, line_width: u32, color: Rgba<u8>) {
        self.ops.push(DrawOp::StrokeRect {
            rect,
            line_width,
            color,
        });
    }

    fn fill_rect(&mut self, rect: BoundingBox, color: Rgba<u8>) {
        self.ops.push(DrawOp::FillRect { rect, color });
    }

    fn measure_text(&self, text: &str, font_px: f32) -> f32 {
        text.chars().count() as f32 * font_px * RECORDED_ADVANCE_RATIO
    }

    fn fill_text(&mut self, text: &str, x: f32, baseline: f32, font_px: f32, color: Rgba<u8>) {
        self.ops.push(DrawOp::FillText {
            text: text.to_string(),
            x,
            baseline,
            font_px,
            color,
        });
    }
}
