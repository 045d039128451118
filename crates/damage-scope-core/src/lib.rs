#![warn(missing_docs)]
//! # damage-scope-core
//!
//! ## Purpose
//! Defines the pure data model shared across the `damage-scope` workspace.
//!
//! ## Responsibilities
//! - Represent detection results (parallel box/class/confidence arrays).
//! - Represent user-selected media files and captured camera frames.
//! - Represent the multi-image and video responses of the detection service.
//!
//! ## Data flow
//! The detection service returns [`DetectionResult`] values (directly, keyed
//! per slot in a [`MultiImageReport`], or summarized in a [`VideoAnalysis`]).
//! Renderers consume them together with the [`Resolution`] of the image the
//! boxes were computed against.
//!
//! ## Ownership and lifetimes
//! Files and frames own their byte buffers (`Vec<u8>`) so a submission can
//! copy them into an outgoing request without borrowing session state.
//!
//! ## Error model
//! Shape violations (mismatched parallel arrays, wrong RGBA length) return
//! [`CoreError`] variants.
//!
//! ## Example
//! ```rust
//! use damage_scope_core::{BoundingBox, DetectionResult};
//!
//! let result = DetectionResult::new(
//!     vec![BoundingBox::new(10.0, 20.0, 30.0, 40.0)],
//!     vec!["dent".to_string()],
//!     vec![87.3],
//! )
//! .unwrap();
//! assert_eq!(result.len(), 1);
//! assert_eq!(damage_scope_core::slot_key(0), "Image 1");
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest number of image slots a session may request.
pub const MIN_SLOT_COUNT: usize = 1;

/// Largest number of image slots a session may request.
pub const MAX_SLOT_COUNT: usize = 5;

/// Returns the response key used by the service for a zero-based slot index.
pub fn slot_key(index: usize) -> String {
    format!("Image {}", index + 1)
}

/// Pixel dimensions of an image, frame, or drawing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Resolution {
    /// Creates a resolution value.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns `true` when either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Axis-aligned box given as top-left corner plus width/height.
///
/// Coordinates are in the pixel space of the image the box was computed
/// against; the type does not record which space that was.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub w: f32,
    /// Height.
    pub h: f32,
}

impl BoundingBox {
    /// Creates a box from its top-left corner and size.
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from([x, y, w, h]: [f32; 4]) -> Self {
        Self { x, y, w, h }
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(bbox: BoundingBox) -> Self {
        [bbox.x, bbox.y, bbox.w, bbox.h]
    }
}

/// Structured output of one inference call.
///
/// Wire field names (`boxes`, `classes`, `confidences`) are fixed by the
/// detection service. Confidences are percentages in `0..=100`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Detected boxes.
    pub boxes: Vec<BoundingBox>,
    /// Class label per box.
    pub classes: Vec<String>,
    /// Confidence percentage per box.
    pub confidences: Vec<f32>,
}

/// Borrowed view of one detection inside a [`DetectionResult`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection<'a> {
    /// Box in the producer's coordinate space.
    pub bbox: BoundingBox,
    /// Class label.
    pub class: &'a str,
    /// Confidence percentage.
    pub confidence: f32,
}

impl DetectionResult {
    /// Builds a validated result.
    ///
    /// # Errors
    /// Returns [`CoreError::ParallelArrayMismatch`] when the three arrays do
    /// not share one length.
    pub fn new(
        boxes: Vec<BoundingBox>,
        classes: Vec<String>,
        confidences: Vec<f32>,
    ) -> Result<Self, CoreError> {
        let result = Self {
            boxes,
            classes,
            confidences,
        };
        result.validate()?;
        Ok(result)
    }

    /// Checks the parallel-array invariant.
    ///
    /// # Errors
    /// Returns [`CoreError::ParallelArrayMismatch`] on any length mismatch.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.boxes.len() != self.classes.len() || self.boxes.len() != self.confidences.len() {
            return Err(CoreError::ParallelArrayMismatch {
                boxes: self.boxes.len(),
                classes: self.classes.len(),
                confidences: self.confidences.len(),
            });
        }
        Ok(())
    }

    /// Number of detections.
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    /// Returns `true` when no damage was detected.
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Iterates detections in response order.
    ///
    /// Iteration stops at the shortest array, so an unvalidated result never
    /// panics here.
    pub fn detections(&self) -> impl Iterator<Item = Detection<'_>> {
        self.boxes
            .iter()
            .zip(self.classes.iter())
            .zip(self.confidences.iter())
            .map(|((bbox, class), confidence)| Detection {
                bbox: *bbox,
                class: class.as_str(),
                confidence: *confidence,
            })
    }
}

/// One user-selected file held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    /// Original file name, forwarded as the multipart file name.
    pub name: String,
    /// Raw file bytes.
    pub bytes: Vec<u8>,
}

impl MediaFile {
    /// Creates a file value.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Returns file size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` when the file has no content.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// One frame captured from a live video source at native resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Capture time in Unix epoch milliseconds.
    pub captured_at_ms: u64,
    /// Raw RGBA pixel buffer (`width * height * 4` bytes).
    pub rgba: Vec<u8>,
}

impl Frame {
    /// Constructs a validated frame.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidFrameShape`] when the pixel buffer length is
    /// not exactly `width * height * 4`.
    pub fn new(width: u32, height: u32, captured_at_ms: u64, rgba: Vec<u8>) -> Result<Self, CoreError> {
        let expected_len = required_rgba_len(width, height)?;
        if rgba.len() != expected_len {
            return Err(CoreError::InvalidFrameShape {
                expected: expected_len,
                actual: rgba.len(),
            });
        }

        Ok(Self {
            width,
            height,
            captured_at_ms,
            rgba,
        })
    }

    /// Returns the frame's native resolution.
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

/// Multi-image analysis response keyed by `"Image <n>"` (1-based).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MultiImageReport {
    /// Results keyed by slot label.
    pub results: BTreeMap<String, DetectionResult>,
}

impl MultiImageReport {
    /// Returns the result for a zero-based slot index, if the service sent one.
    pub fn for_slot(&self, index: usize) -> Option<&DetectionResult> {
        self.results.get(&slot_key(index))
    }

    /// Number of keyed results.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns `true` when the response carried no results.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Maximum observed confidence for one damage class across a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageScore {
    /// Damage class label.
    pub label: String,
    /// Maximum confidence percentage.
    pub score: f32,
}

/// Video analysis response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoAnalysis {
    /// Locator of the processed, playable video (usually a service path).
    pub video_url: String,
    /// One entry per distinct damage class.
    #[serde(default)]
    pub damage_summary: Vec<DamageScore>,
}

/// Error type for core model validation.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Detection arrays are not parallel.
    #[error(
        "detection arrays are not parallel: boxes={boxes} classes={classes} confidences={confidences}"
    )]
    ParallelArrayMismatch {
        /// Box count.
        boxes: usize,
        /// Class count.
        classes: usize,
        /// Confidence count.
        confidences: usize,
    },
    /// Frame buffer shape does not match declared geometry.
    #[error("invalid frame shape: expected {expected} bytes, got {actual}")]
    InvalidFrameShape {
        /// Expected RGBA byte count.
        expected: usize,
        /// Actual RGBA byte count.
        actual: usize,
    },
    /// Frame dimensions overflow addressable memory.
    #[error("frame dimensions overflow")]
    DimensionOverflow,
}

fn required_rgba_len(width: u32, height: u32) -> Result<usize, CoreError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or(CoreError::DimensionOverflow)
}
