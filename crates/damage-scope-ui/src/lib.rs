#![warn(missing_docs)]
//! # damage-scope-ui
//!
//! ## Purpose
//! Defines the UI-facing state model for `damage-scope`.
//!
//! ## Responsibilities
//! - Represent the active workflow tab and per-workflow stage status.
//! - Carry user-visible notices (blocking alerts and informational text).
//! - Represent control enablement and the report zoom view.
//!
//! ## Data flow
//! Session controllers emit notices and control flags; the app projects them
//! into [`UiState`], which drives whatever shell renders the controls.
//!
//! ## Error model
//! This crate favors explicit state over recoverable errors. Invalid actions
//! are prevented by disabled controls rather than reported here.

/// Workflow tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tab {
    /// Multi-image upload and report.
    Images,
    /// Single video upload and summary.
    Video,
    /// Live webcam detection.
    Webcam,
}

/// Generic stage status used per workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    /// Stage has not started.
    Idle,
    /// Stage is currently running.
    Running,
    /// Stage completed successfully.
    Healthy,
    /// Stage encountered a non-fatal error.
    Degraded,
}

/// Severity of a user-visible notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Informational status text.
    Info,
    /// Blocking alert the user must acknowledge.
    Alert,
}

/// User-visible message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Message text.
    pub message: String,
}

impl Notice {
    /// Creates a blocking alert.
    pub fn alert(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Alert,
            message: message.into(),
        }
    }

    /// Creates an informational notice.
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    /// Returns `true` for blocking alerts.
    pub fn is_alert(&self) -> bool {
        self.level == NoticeLevel::Alert
    }
}

/// Full-size view of one annotated report image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoomView {
    /// Card title (`"Image <n>"`).
    pub title: String,
    /// Annotated image as a data URI.
    pub image_data_uri: String,
}

/// Outcome of a tab switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabSwitch {
    /// Tab shown before the switch.
    pub previous: Tab,
    /// `true` when the webcam tab was left; a live session must be stopped.
    pub left_webcam: bool,
}

/// Aggregate UI runtime state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiState {
    /// App version string sourced from root `VERSION`.
    pub version: String,
    /// Visible tab.
    pub active_tab: Tab,
    /// Whether the shared loading indicator is shown.
    pub loading: bool,
    /// Image workflow status.
    pub images: StageStatus,
    /// Video workflow status.
    pub video: StageStatus,
    /// Webcam workflow status.
    pub webcam: StageStatus,
    /// Whether the analyze-images control is enabled.
    pub analyze_images_enabled: bool,
    /// Whether the analyze-video control is enabled.
    pub analyze_video_enabled: bool,
    /// Whether the start-webcam control is enabled.
    pub start_webcam_enabled: bool,
    /// Whether the stop-webcam control is enabled.
    pub stop_webcam_enabled: bool,
    /// Open zoom view, if any.
    pub zoom: Option<ZoomView>,
    notices: Vec<Notice>,
}

impl UiState {
    /// Creates default UI state on the images tab.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            active_tab: Tab::Images,
            loading: false,
            images: StageStatus::Idle,
            video: StageStatus::Idle,
            webcam: StageStatus::Idle,
            analyze_images_enabled: false,
            analyze_video_enabled: false,
            start_webcam_enabled: true,
            stop_webcam_enabled: false,
            zoom: None,
            notices: Vec::new(),
        }
    }

    /// Shows `tab`.
    pub fn switch_tab(&mut self, tab: Tab) -> TabSwitch {
        let previous = self.active_tab;
        self.active_tab = tab;
        TabSwitch {
            previous,
            left_webcam: previous == Tab::Webcam && tab != Tab::Webcam,
        }
    }

    /// Queues a notice for display.
    pub fn push_notice(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    /// Pending notices, oldest first.
    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Removes and returns pending notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Opens the zoom view.
    pub fn open_zoom(&mut self, view: ZoomView) {
        self.zoom = Some(view);
    }

    /// Closes the zoom view; a no-op when none is open.
    pub fn close_zoom(&mut self) {
        self.zoom = None;
    }

    /// Reflects webcam running state in the start/stop controls.
    pub fn set_webcam_running(&mut self, running: bool) {
        self.start_webcam_enabled = !running;
        self.stop_webcam_enabled = running;
        self.webcam = if running {
            StageStatus::Running
        } else {
            StageStatus::Idle
        };
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for UI state transitions.

    use super::*;

    #[test]
    fn leaving_webcam_tab_requests_stop() {
        let mut state = UiState::new("v0.1.0");
        assert!(!state.switch_tab(Tab::Webcam).left_webcam);
        assert!(!state.switch_tab(Tab::Webcam).left_webcam);

        let switch = state.switch_tab(Tab::Video);
        assert!(switch.left_webcam);
        assert_eq!(switch.previous, Tab::Webcam);
        assert_eq!(state.active_tab, Tab::Video);
    }

    #[test]
    fn zoom_opens_and_closes() {
        let mut state = UiState::new("v0.1.0");
        state.open_zoom(ZoomView {
            title: "Image 1".to_string(),
            image_data_uri: "data:image/jpeg;base64,AA==".to_string(),
        });
        assert!(state.zoom.is_some());
        state.close_zoom();
        state.close_zoom();
        assert!(state.zoom.is_none());
    }

    #[test]
    fn notices_drain_in_order() {
        let mut state = UiState::new("v0.1.0");
        state.push_notice(Notice::alert("first"));
        state.push_notice(Notice::info("second"));
        let drained = state.take_notices();
        assert_eq!(drained.len(), 2);
        assert!(drained[0].is_alert());
        assert!(state.notices().is_empty());
    }

    #[test]
    fn webcam_controls_are_mutually_exclusive() {
        let mut state = UiState::new("v0.1.0");
        assert!(state.start_webcam_enabled && !state.stop_webcam_enabled);
        state.set_webcam_running(true);
        assert!(!state.start_webcam_enabled && state.stop_webcam_enabled);
        assert_eq!(state.webcam, StageStatus::Running);
    }
}
