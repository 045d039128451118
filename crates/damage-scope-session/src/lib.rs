#![warn(missing_docs)]
//! # damage-scope-session
//!
//! ## Purpose
//! Owns the three interactive workflows of `damage-scope`: multi-image
//! reports, video analysis and live webcam detection.
//!
//! ## Responsibilities
//! - Drive the image workflow state machine over a [`MediaSlotStore`].
//! - Drive the linear video workflow and its summary rendering.
//! - Run the webcam capture-and-detect loop with cancellation and label
//!   accumulation.
//! - Classify failures so callers can alert, revert or silently drop.
//!
//! ## Data flow
//! User action -> session method -> [`DetectionTransport`] request ->
//! report/overlay rendering -> session state the UI projects.
//!
//! ## Ownership and lifetimes
//! Sessions are explicit values owned by the caller. The live loop shares
//! its mutable state with its scheduler thread through `Arc<Mutex<_>>` and
//! owns the camera stream exclusively between `start` and `stop`.
//!
//! ## Error model
//! Failures surface as [`SessionError`] (or [`LiveError`] for the webcam
//! loop). [`ErrorKind`] maps each onto the propagation policy.
//!
//! [`MediaSlotStore`]: damage_scope_slots::MediaSlotStore
//! [`DetectionTransport`]: damage_scope_client::DetectionTransport

mod images;
mod live;
mod video;

use damage_scope_client::TransportError;
use damage_scope_report::ReportError;
use damage_scope_slots::SlotError;
use thiserror::Error;

pub use images::{ImageSession, ImageSessionState, ReportCard, SlotPreview};
pub use live::{
    DiscardReason, LabelEntry, LiveDetectionLoop, LiveError, LiveState, MAX_IN_FLIGHT_REQUESTS,
    TickOutcome, TickTicket,
};
pub use video::{VideoOutcome, VideoSession, VideoSessionState};

/// Alert shown when the slot count is out of range.
pub const INVALID_COUNT_MESSAGE: &str = "Please choose between 1 and 5 images.";

/// Alert shown when an image submission fails.
pub const IMAGE_FAILURE_MESSAGE: &str = "An error occurred during analysis.";

/// Alert shown when a video submission fails.
pub const VIDEO_FAILURE_MESSAGE: &str = "Failed to process video.";

/// Alert shown when the camera cannot be opened.
pub const WEBCAM_UNAVAILABLE_MESSAGE: &str = "Could not access webcam.";

/// Propagation class of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid configuration such as an out-of-range slot count.
    Configuration,
    /// Action attempted in the wrong workflow state.
    State,
    /// Network failure or non-success status.
    Transport,
    /// Camera unavailable.
    Device,
    /// Media failed to decode before use.
    Decode,
}

/// Image and video workflow errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Slot configuration was rejected.
    #[error("configuration error: {0}")]
    Configuration(SlotError),
    /// Action is not valid in the current state.
    #[error("state error: {0}")]
    State(String),
    /// Detection request failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// Media could not be decoded or rendered.
    #[error("decode error: {0}")]
    Decode(#[from] ReportError),
}

impl SessionError {
    /// Propagation class.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::State(_) => ErrorKind::State,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Decode(_) => ErrorKind::Decode,
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for error classification.

    use super::*;

    #[test]
    fn kinds_follow_variants() {
        let configuration = SessionError::Configuration(SlotError::InvalidCount {
            requested: 0,
            min: 1,
            max: 5,
        });
        assert_eq!(configuration.kind(), ErrorKind::Configuration);
        assert_eq!(
            SessionError::State("busy".to_string()).kind(),
            ErrorKind::State
        );
        assert_eq!(
            SessionError::from(TransportError::Network("down".to_string())).kind(),
            ErrorKind::Transport
        );
        assert_eq!(
            SessionError::from(ReportError::Encode("bad".to_string())).kind(),
            ErrorKind::Decode
        );
    }
}
