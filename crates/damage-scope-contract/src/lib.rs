#![warn(missing_docs)]
//! # damage-scope-contract
//!
//! ## Purpose
//! Parses and validates the response bodies of the detection service.
//!
//! ## Responsibilities
//! - Decode the single-frame, multi-image and video response shapes.
//! - Enforce the parallel-array invariant on every detection result.
//! - Reject non-finite confidences and scores before they reach renderers.
//!
//! ## Data flow
//! Raw response bytes -> `parse_*` -> owned model values from
//! `damage_scope_core`.
//!
//! ## Ownership and lifetimes
//! Parsed values are owned so they outlive transient network buffers.
//!
//! ## Error model
//! Invalid JSON returns [`ContractError::Decode`]; well-formed JSON that
//! breaks an invariant returns [`ContractError::InvalidContract`].

use damage_scope_core::{DetectionResult, MultiImageReport, VideoAnalysis};
use thiserror::Error;

/// Multipart field carrying every file of a multi-image request.
pub const MULTI_IMAGE_FIELD: &str = "files";

/// Multipart field carrying the single file of video and frame requests.
pub const SINGLE_FILE_FIELD: &str = "file";

/// File name attached to webcam frame uploads.
pub const WEBCAM_FRAME_NAME: &str = "webcam_frame.jpg";

/// Service path of the multi-image endpoint.
pub const ANALYZE_PATH: &str = "analyze";

/// Service path of the video endpoint.
pub const ANALYZE_VIDEO_PATH: &str = "analyze_video";

/// Service path of the single-frame endpoint.
pub const DETECTION_PATH: &str = "detection";

/// Parses a bare single-frame detection response.
///
/// # Errors
/// Returns [`ContractError::Decode`] for invalid JSON and
/// [`ContractError::InvalidContract`] for non-parallel arrays or non-finite
/// confidences.
pub fn parse_detection_result(raw: &[u8]) -> Result<DetectionResult, ContractError> {
    let parsed: DetectionResult = serde_json::from_slice(raw).map_err(ContractError::Decode)?;
    validate_detection_result(&parsed, "detection")?;
    Ok(parsed)
}

/// Parses a multi-image response keyed by `"Image <n>"`.
///
/// # Errors
/// Returns [`ContractError::InvalidContract`] when any keyed result violates
/// detection invariants; the message names the offending key.
pub fn parse_multi_image_report(raw: &[u8]) -> Result<MultiImageReport, ContractError> {
    let parsed: MultiImageReport = serde_json::from_slice(raw).map_err(ContractError::Decode)?;
    for (key, result) in &parsed.results {
        validate_detection_result(result, key)?;
    }
    Ok(parsed)
}

/// Parses a video analysis response.
///
/// A missing `damage_summary` field decodes as an empty summary.
///
/// # Errors
/// Returns [`ContractError::InvalidContract`] for a blank `video_url` or a
/// non-finite summary score.
pub fn parse_video_analysis(raw: &[u8]) -> Result<VideoAnalysis, ContractError> {
    let parsed: VideoAnalysis = serde_json::from_slice(raw).map_err(ContractError::Decode)?;

    if parsed.video_url.trim().is_empty() {
        return Err(ContractError::InvalidContract(
            "video_url is empty".to_string(),
        ));
    }

    if let Some(entry) = parsed
        .damage_summary
        .iter()
        .find(|entry| !entry.score.is_finite())
    {
        return Err(ContractError::InvalidContract(format!(
            "damage_summary score for '{}' is not finite",
            entry.label
        )));
    }

    Ok(parsed)
}

fn validate_detection_result(result: &DetectionResult, context: &str) -> Result<(), ContractError> {
    result
        .validate()
        .map_err(|error| ContractError::InvalidContract(format!("{context}: {error}")))?;

    if result.confidences.iter().any(|value| !value.is_finite()) {
        return Err(ContractError::InvalidContract(format!(
            "{context}: confidence is not finite"
        )));
    }

    Ok(())
}

/// Response contract errors.
#[derive(Debug, Error)]
pub enum ContractError {
    /// JSON decode failure.
    #[error("response decode failure: {0}")]
    Decode(#[from] serde_json::Error),
    /// Parsed payload violates contract invariants.
    #[error("response contract violation: {0}")]
    InvalidContract(String),
}

#[cfg(test)]
mod tests {
    //! Unit tests for response parsing.

    use super::*;

    #[test]
    fn empty_result_means_no_damage() {
        let result = parse_detection_result(br#"{"boxes":[],"classes":[],"confidences":[]}"#)
            .expect("empty result should parse");
        assert!(result.is_empty());
    }

    #[test]
    fn names_offending_slot_key() {
        let raw = br#"{
            "Image 1": {"boxes":[],"classes":[],"confidences":[]},
            "Image 2": {"boxes":[[1,2,3,4]],"classes":[],"confidences":[50.0]}
        }"#;
        let error = parse_multi_image_report(raw).expect_err("mismatch should fail");
        assert!(error.to_string().contains("Image 2"));
    }

    #[test]
    fn missing_summary_defaults_to_empty() {
        let analysis = parse_video_analysis(br#"{"video_url":"/static/videos/output_a.mp4"}"#)
            .expect("analysis should parse");
        assert!(analysis.damage_summary.is_empty());
    }

    #[test]
    fn blank_video_url_is_rejected() {
        assert!(matches!(
            parse_video_analysis(br#"{"video_url":" ","damage_summary":[]}"#),
            Err(ContractError::InvalidContract(_))
        ));
    }
}
