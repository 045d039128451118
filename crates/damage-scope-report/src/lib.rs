#![warn(missing_docs)]
//! # damage-scope-report
//!
//! ## Purpose
//! Turns a source image plus its detection result into a finished,
//! exportable annotated image and a textual damage list.
//!
//! ## Responsibilities
//! - Decode user-selected files into full-resolution [`SourceImage`] values.
//! - Overlay detections at natural resolution in export style and encode
//!   the result as a data URI.
//! - Produce ordered damage-list entries for image reports and summary
//!   lines for video analyses, each with its empty-case sentinel.
//!
//! ## Data flow
//! `MediaFile` -> [`SourceImage::decode`] -> [`ReportComposer::compose`] ->
//! [`ComposedReport`] (data URI + entries).
//!
//! ## Ownership and lifetimes
//! The composer holds only rendering configuration; every call copies the
//! source pixels, so sources can be reused for later runs.
//!
//! ## Error model
//! Undecodable media returns [`ReportError::Decode`]; a source with zero
//! natural dimensions fails fast with [`ReportError::SourceNotLoaded`].

use base64::Engine as _;
use damage_scope_core::{DetectionResult, MediaFile, Resolution, VideoAnalysis};
use damage_scope_overlay::{LabelFont, OverlayStyle, RasterSurface, draw_detections};
use image::{DynamicImage, ImageEncoder, RgbaImage};
use thiserror::Error;

/// Damage-list sentinel for an image without detections.
pub const NO_DAMAGE_SENTINEL: &str = "No damage detected";

/// Summary sentinel for a video without detections.
pub const NO_VIDEO_DAMAGE_SENTINEL: &str = "No significant damage detected.";

/// JPEG quality used for exported reports when none is configured.
pub const DEFAULT_JPEG_QUALITY: u8 = 92;

/// Full-resolution decoded image selected by the user.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceImage {
    name: String,
    pixels: RgbaImage,
}

impl SourceImage {
    /// Decodes a selected file.
    ///
    /// # Errors
    /// Returns [`ReportError::Decode`] when the bytes are not a supported image.
    pub fn decode(file: &MediaFile) -> Result<Self, ReportError> {
        let decoded = image::load_from_memory(&file.bytes).map_err(|error| ReportError::Decode {
            name: file.name.clone(),
            reason: error.to_string(),
        })?;
        Ok(Self {
            name: file.name.clone(),
            pixels: decoded.to_rgba8(),
        })
    }

    /// Wraps already-decoded pixels.
    pub fn from_rgba(name: impl Into<String>, pixels: RgbaImage) -> Self {
        Self {
            name: name.into(),
            pixels,
        }
    }

    /// Original file name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Natural (full) resolution.
    pub fn natural_resolution(&self) -> Resolution {
        Resolution::new(self.pixels.width(), self.pixels.height())
    }

    /// Borrows the decoded pixels.
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

/// Encoding of exported images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Lossy JPEG; alpha is dropped.
    Jpeg {
        /// Quality in `1..=100`.
        quality: u8,
    },
    /// Lossless PNG.
    Png,
}

impl ExportFormat {
    /// MIME type used in the data URI.
    pub fn mime(self) -> &'static str {
        match self {
            ExportFormat::Jpeg { .. } => "image/jpeg",
            ExportFormat::Png => "image/png",
        }
    }

    /// Conventional file extension.
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Jpeg { .. } => "jpg",
            ExportFormat::Png => "png",
        }
    }
}

impl Default for ExportFormat {
    fn default() -> Self {
        ExportFormat::Jpeg {
            quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// One line of an image report's damage list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DamageListEntry {
    /// Damage class, or the no-damage sentinel.
    pub label: String,
    /// One-decimal confidence (`"87.3%"`); `None` for the sentinel.
    pub formatted_confidence: Option<String>,
}

impl DamageListEntry {
    /// Returns `true` for the no-damage sentinel entry.
    pub fn is_sentinel(&self) -> bool {
        self.formatted_confidence.is_none()
    }

    /// Text shown next to the label (`"Confidence: 87.3%"`).
    pub fn detail(&self) -> Option<String> {
        self.formatted_confidence
            .as_ref()
            .map(|value| format!("Confidence: {value}"))
    }
}

/// Builds damage-list entries in response order.
pub fn damage_list(result: &DetectionResult) -> Vec<DamageListEntry> {
    if result.is_empty() {
        return vec![DamageListEntry {
            label: NO_DAMAGE_SENTINEL.to_string(),
            formatted_confidence: None,
        }];
    }

    result
        .detections()
        .map(|detection| DamageListEntry {
            label: detection.class.to_string(),
            formatted_confidence: Some(format!("{:.1}%", detection.confidence)),
        })
        .collect()
}

/// One line of a video damage summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSummaryLine {
    /// Damage class, or the no-damage sentinel.
    pub label: String,
    /// `"Max Confidence: <x.x>%"`; `None` for the sentinel.
    pub detail: Option<String>,
}

/// Builds video summary lines in response order.
pub fn video_summary(analysis: &VideoAnalysis) -> Vec<VideoSummaryLine> {
    if analysis.damage_summary.is_empty() {
        return vec![VideoSummaryLine {
            label: NO_VIDEO_DAMAGE_SENTINEL.to_string(),
            detail: None,
        }];
    }

    analysis
        .damage_summary
        .iter()
        .map(|entry| VideoSummaryLine {
            label: entry.label.clone(),
            detail: Some(format!("Max Confidence: {:.1}%", entry.score)),
        })
        .collect()
}

/// Finished annotated image plus its damage list.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedReport {
    /// Annotated pixels at natural resolution.
    pub annotated: RgbaImage,
    /// Encoded export as `data:<mime>;base64,<payload>`.
    pub image_data_uri: String,
    /// Damage list in response order.
    pub damage_list: Vec<DamageListEntry>,
}

/// Stateless composer of annotated report images.
#[derive(Debug, Clone)]
pub struct ReportComposer {
    font: Option<LabelFont>,
    style: OverlayStyle,
    format: ExportFormat,
}

impl ReportComposer {
    /// Creates a composer using the export style and JPEG output.
    pub fn new(font: Option<LabelFont>) -> Self {
        Self {
            font,
            style: OverlayStyle::export(),
            format: ExportFormat::default(),
        }
    }

    /// Overrides the export encoding.
    pub fn with_format(mut self, format: ExportFormat) -> Self {
        self.format = format;
        self
    }

    /// Overrides the overlay style.
    pub fn with_style(mut self, style: OverlayStyle) -> Self {
        self.style = style;
        self
    }

    /// Configured export encoding.
    pub fn format(&self) -> ExportFormat {
        self.format
    }

    /// Label font shared with other surfaces.
    pub fn font(&self) -> Option<&LabelFont> {
        self.font.as_ref()
    }

    /// Composes the annotated export and damage list.
    ///
    /// Boxes are drawn in the source's natural pixel space.
    ///
    /// # Errors
    /// Returns [`ReportError::SourceNotLoaded`] when the source has zero
    /// natural dimensions and [`ReportError::Encode`] when encoding fails.
    pub fn compose(
        &self,
        source: &SourceImage,
        result: &DetectionResult,
    ) -> Result<ComposedReport, ReportError> {
        let resolution = source.natural_resolution();
        if resolution.is_empty() {
            return Err(ReportError::SourceNotLoaded {
                name: source.name.clone(),
            });
        }

        let mut surface = RasterSurface::from_image(source.pixels.clone(), self.font.clone());
        draw_detections(&mut surface, result, &self.style);
        let annotated = surface.into_image();
        let encoded = encode_image(&annotated, self.format)?;

        Ok(ComposedReport {
            image_data_uri: to_data_uri(self.format.mime(), &encoded),
            annotated,
            damage_list: damage_list(result),
        })
    }
}

/// Encodes RGBA pixels in the requested format.
///
/// # Errors
/// Returns [`ReportError::Encode`] on encoder failure.
pub fn encode_image(pixels: &RgbaImage, format: ExportFormat) -> Result<Vec<u8>, ReportError> {
    let mut bytes = Vec::new();
    match format {
        ExportFormat::Jpeg { quality } => {
            let rgb = DynamicImage::ImageRgba8(pixels.clone()).to_rgb8();
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100))
                .encode(
                    rgb.as_raw(),
                    rgb.width(),
                    rgb.height(),
                    image::ColorType::Rgb8.into(),
                )
                .map_err(|error| ReportError::Encode(error.to_string()))?;
        }
        ExportFormat::Png => {
            image::codecs::png::PngEncoder::new(&mut bytes)
                .write_image(
                    pixels.as_raw(),
                    pixels.width(),
                    pixels.height(),
                    image::ColorType::Rgba8.into(),
                )
                .map_err(|error| ReportError::Encode(error.to_string()))?;
        }
    }
    Ok(bytes)
}

/// Builds a base64 data URI.
pub fn to_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{mime};base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Splits a base64 data URI into its MIME type and decoded bytes.
///
/// # Errors
/// Returns [`ReportError::InvalidDataUri`] for anything that is not a base64
/// data URI.
pub fn decode_data_uri(uri: &str) -> Result<(String, Vec<u8>), ReportError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| ReportError::InvalidDataUri("missing data: prefix".to_string()))?;
    let (mime, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| ReportError::InvalidDataUri("missing ;base64, marker".to_string()))?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|error| ReportError::InvalidDataUri(error.to_string()))?;
    Ok((mime.to_string(), bytes))
}

/// Report composition errors.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Media could not be decoded.
    #[error("failed to decode '{name}': {reason}")]
    Decode {
        /// File name.
        name: String,
        /// Decoder message.
        reason: String,
    },
    /// Source has zero natural dimensions.
    #[error("source image '{name}' has not finished loading")]
    SourceNotLoaded {
        /// File name.
        name: String,
    },
    /// Export encoding failed.
    #[error("export encoding failure: {0}")]
    Encode(String),
    /// Malformed data URI.
    #[error("invalid data uri: {0}")]
    InvalidDataUri(String),
}
