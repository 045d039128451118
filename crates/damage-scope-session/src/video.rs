//! Single-video upload and summary workflow.

use damage_scope_client::{DetectionTransport, ServiceEndpoint, TransportError};
use damage_scope_core::{MediaFile, VideoAnalysis};
use damage_scope_report::{VideoSummaryLine, video_summary};
use damage_scope_ui::Notice;
use tracing::{info, warn};
use url::Url;

use crate::{SessionError, VIDEO_FAILURE_MESSAGE};

/// Video workflow states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoSessionState {
    /// No file selected.
    Idle,
    /// A file is selected and previewable; submission is allowed.
    Ready,
    /// The video request is in flight.
    Submitting,
}

/// Rendered result of a successful video analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoOutcome {
    /// Processed video, resolved against the service base. Also the
    /// download link.
    pub video_url: Url,
    /// Summary lines, or the single no-damage sentinel.
    pub summary: Vec<VideoSummaryLine>,
}

/// Video session controller.
#[derive(Debug)]
pub struct VideoSession {
    endpoint: ServiceEndpoint,
    file: Option<MediaFile>,
    state: VideoSessionState,
    outcome: Option<VideoOutcome>,
    result_visible: bool,
    visible_before_submit: bool,
    notices: Vec<Notice>,
}

impl VideoSession {
    /// Creates an idle session resolving result locators against `endpoint`.
    pub fn new(endpoint: ServiceEndpoint) -> Self {
        Self {
            endpoint,
            file: None,
            state: VideoSessionState::Idle,
            outcome: None,
            result_visible: false,
            visible_before_submit: false,
            notices: Vec::new(),
        }
    }

    /// Current workflow state.
    pub fn state(&self) -> VideoSessionState {
        self.state
    }

    /// File shown in the preview player; selecting needs no network call.
    pub fn preview(&self) -> Option<&MediaFile> {
        self.file.as_ref()
    }

    /// Last successful outcome, kept across failed resubmissions.
    pub fn outcome(&self) -> Option<&VideoOutcome> {
        self.outcome.as_ref()
    }

    /// Whether the result container is shown.
    pub fn result_visible(&self) -> bool {
        self.result_visible
    }

    /// Whether the analyze control is enabled.
    pub fn submit_enabled(&self) -> bool {
        self.state == VideoSessionState::Ready
    }

    /// Whether the loading indicator is shown.
    pub fn is_loading(&self) -> bool {
        self.state == VideoSessionState::Submitting
    }

    /// Removes and returns pending notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Selects `file` for preview.
    ///
    /// # Errors
    /// Returns [`SessionError::State`] while a submission is in flight.
    pub fn select_file(&mut self, file: MediaFile) -> Result<(), SessionError> {
        if self.state == VideoSessionState::Submitting {
            return Err(SessionError::State(
                "cannot change the video while it is being analyzed".to_string(),
            ));
        }
        self.file = Some(file);
        self.state = VideoSessionState::Ready;
        Ok(())
    }

    /// Enters `Submitting`, hides the result container and returns the file
    /// to send.
    ///
    /// # Errors
    /// Returns [`SessionError::State`] when no file is selected or a request
    /// is already in flight.
    pub fn begin_submission(&mut self) -> Result<MediaFile, SessionError> {
        if self.state != VideoSessionState::Ready {
            return Err(SessionError::State(format!(
                "video submission is not allowed in state {:?}",
                self.state
            )));
        }
        let file = self
            .file
            .clone()
            .ok_or_else(|| SessionError::State("no video selected".to_string()))?;

        self.visible_before_submit = self.result_visible;
        self.result_visible = false;
        self.state = VideoSessionState::Submitting;
        info!(file = %file.name, bytes = file.len(), "video analysis submitted");
        Ok(file)
    }

    /// Applies the outcome of the request started by [`Self::begin_submission`].
    ///
    /// Success replaces the summary and shows it. Failure queues an alert,
    /// keeps any earlier summary untouched and restores its visibility.
    /// Either way the analyze control is enabled again.
    ///
    /// # Errors
    /// Returns [`SessionError::State`] when no request is in flight and the
    /// transport error on failure.
    pub fn complete_submission(
        &mut self,
        outcome: Result<VideoAnalysis, TransportError>,
    ) -> Result<&VideoOutcome, SessionError> {
        if self.state != VideoSessionState::Submitting {
            return Err(SessionError::State(
                "no video submission is in flight".to_string(),
            ));
        }
        self.state = VideoSessionState::Ready;

        let resolved = outcome.and_then(|analysis| {
            let video_url = self.endpoint.resolve(&analysis.video_url)?;
            Ok(VideoOutcome {
                video_url,
                summary: video_summary(&analysis),
            })
        });

        match resolved {
            Ok(rendered) => {
                info!(url = %rendered.video_url, lines = rendered.summary.len(), "video summary ready");
                self.result_visible = true;
                Ok(&*self.outcome.insert(rendered))
            }
            Err(error) => {
                warn!(%error, "video analysis failed");
                self.notices.push(Notice::alert(VIDEO_FAILURE_MESSAGE));
                self.result_visible = self.visible_before_submit;
                Err(error.into())
            }
        }
    }

    /// Runs one full submission through `transport`.
    ///
    /// # Errors
    /// See [`Self::begin_submission`] and [`Self::complete_submission`].
    pub fn submit(&mut self, transport: &dyn DetectionTransport) -> Result<&VideoOutcome, SessionError> {
        let file = self.begin_submission()?;
        let outcome = transport.analyze_video(&file);
        self.complete_submission(outcome)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the video workflow.

    use super::*;
    use damage_scope_core::DamageScore;

    fn session() -> VideoSession {
        VideoSession::new(ServiceEndpoint::parse("http://inspect.test:8080/").expect("url is valid"))
    }

    #[test]
    fn selecting_enables_submit_without_request() {
        let mut session = session();
        assert!(!session.submit_enabled());
        session
            .select_file(MediaFile::new("car.mp4", vec![0; 16]))
            .expect("idle session accepts a file");
        assert!(session.submit_enabled());
        assert_eq!(session.preview().map(|file| file.name.as_str()), Some("car.mp4"));
    }

    #[test]
    fn success_resolves_locator_and_renders_summary() {
        let mut session = session();
        session
            .select_file(MediaFile::new("car.mp4", vec![0; 16]))
            .expect("idle session accepts a file");
        session.begin_submission().expect("file is selected");
        assert!(!session.result_visible());
        assert!(session.is_loading());

        let outcome = session
            .complete_submission(Ok(VideoAnalysis {
                video_url: "/static/videos/output_car.mp4".to_string(),
                damage_summary: vec![DamageScore {
                    label: "scratch".to_string(),
                    score: 64.04,
                }],
            }))
            .expect("analysis should render");
        assert_eq!(
            outcome.video_url.as_str(),
            "http://inspect.test:8080/static/videos/output_car.mp4"
        );
        assert_eq!(outcome.summary[0].detail.as_deref(), Some("Max Confidence: 64.0%"));
        assert!(session.result_visible());
        assert!(session.submit_enabled());
    }

    #[test]
    fn begin_without_file_is_a_state_error() {
        let mut session = session();
        let error = session.begin_submission().expect_err("no file selected");
        assert_eq!(error.kind(), crate::ErrorKind::State);
    }
}
