//! Multi-image upload and report workflow.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use damage_scope_client::{DetectionTransport, TransportError};
use damage_scope_core::{MediaFile, MultiImageReport, slot_key};
use damage_scope_overlay::{DrawSurface, LabelFont, OverlayStyle, RasterSurface, redraw_detections};
use damage_scope_report::{ComposedReport, ReportComposer, SourceImage};
use damage_scope_slots::{MediaSlotStore, SlotError};
use damage_scope_ui::{Notice, ZoomView};
use tracing::{debug, info, warn};

use crate::{IMAGE_FAILURE_MESSAGE, INVALID_COUNT_MESSAGE, SessionError};

/// Image workflow states.
///
/// Reconfiguration passes through a transient configuring step inside
/// [`ImageSession::configure`] and always lands in `AwaitingSelection`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSessionState {
    /// No slot count chosen yet.
    Idle,
    /// Some configured slots are still empty.
    AwaitingSelection,
    /// Every slot is filled; submission is allowed.
    Submittable,
    /// One multi-image request is in flight.
    Submitting,
    /// Report cards are displayed.
    Reporting,
}

/// Decoded preview of one slot plus its overlay.
#[derive(Debug, Clone)]
pub struct SlotPreview {
    source: SourceImage,
    overlay: RasterSurface,
}

impl SlotPreview {
    fn new(source: SourceImage, font: Option<LabelFont>) -> Self {
        let overlay = RasterSurface::new(source.natural_resolution(), font);
        Self { source, overlay }
    }

    /// Decoded source image.
    pub fn source(&self) -> &SourceImage {
        &self.source
    }

    /// Preview overlay, sized to the source's natural resolution.
    pub fn overlay(&self) -> &RasterSurface {
        &self.overlay
    }
}

/// One report card; clicking it opens the zoom view.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportCard {
    /// Response key, `"Image <n>"`.
    pub title: String,
    /// Zero-based slot index.
    pub slot_index: usize,
    /// Annotated export and damage list.
    pub report: ComposedReport,
}

/// Multi-image session controller.
#[derive(Debug)]
pub struct ImageSession {
    slots: MediaSlotStore,
    complete: Arc<AtomicBool>,
    previews: Vec<Option<SlotPreview>>,
    state: ImageSessionState,
    font: Option<LabelFont>,
    cards: Vec<ReportCard>,
    zoom: Option<ZoomView>,
    notices: Vec<Notice>,
}

impl ImageSession {
    /// Creates an unconfigured session. `font` is used for preview labels.
    pub fn new(font: Option<LabelFont>) -> Self {
        let complete = Arc::new(AtomicBool::new(false));
        let mut slots = MediaSlotStore::new();
        let flag = Arc::clone(&complete);
        slots.on_completeness_change(move |is_complete| flag.store(is_complete, Ordering::SeqCst));

        Self {
            slots,
            complete,
            previews: Vec::new(),
            state: ImageSessionState::Idle,
            font,
            cards: Vec::new(),
            zoom: None,
            notices: Vec::new(),
        }
    }

    /// Current workflow state.
    pub fn state(&self) -> ImageSessionState {
        self.state
    }

    /// Underlying slot store.
    pub fn slots(&self) -> &MediaSlotStore {
        &self.slots
    }

    /// Whether the analyze control is enabled.
    pub fn submit_enabled(&self) -> bool {
        self.complete.load(Ordering::SeqCst) && self.state != ImageSessionState::Submitting
    }

    /// Whether the loading indicator is shown.
    pub fn is_loading(&self) -> bool {
        self.state == ImageSessionState::Submitting
    }

    /// Preview of slot `index`, when a file has been selected.
    pub fn preview(&self, index: usize) -> Option<&SlotPreview> {
        self.previews.get(index).and_then(Option::as_ref)
    }

    /// Report cards of the last successful submission.
    pub fn cards(&self) -> &[ReportCard] {
        &self.cards
    }

    /// Open zoom view, if any.
    pub fn zoom(&self) -> Option<&ZoomView> {
        self.zoom.as_ref()
    }

    /// Removes and returns pending notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Resets the session to `count` empty slots and drops any report.
    ///
    /// # Errors
    /// Returns [`SessionError::Configuration`] for counts outside `1..=5` and
    /// [`SessionError::State`] while a submission is in flight. Neither
    /// mutates the session beyond queueing an alert.
    pub fn configure(&mut self, count: usize) -> Result<(), SessionError> {
        self.ensure_idle_transport("reconfigure slots")?;

        if let Err(error) = self.slots.configure(count) {
            self.notices.push(Notice::alert(INVALID_COUNT_MESSAGE));
            return Err(SessionError::Configuration(error));
        }

        self.previews = vec![None; count];
        self.cards.clear();
        self.zoom = None;
        self.state = ImageSessionState::AwaitingSelection;
        debug!(slots = count, "image slots configured");
        Ok(())
    }

    /// Decodes `file` for preview and stores it in slot `index`.
    ///
    /// # Errors
    /// Returns [`SessionError::Decode`] when the file is not a readable image
    /// (the slot stays as it was), [`SessionError::Configuration`] for an
    /// unconfigured index, and [`SessionError::State`] during submission.
    pub fn select_file(&mut self, index: usize, file: MediaFile) -> Result<(), SessionError> {
        self.ensure_idle_transport("change selections")?;

        let configured = self.slots.required_count();
        if index >= configured {
            return Err(SessionError::Configuration(SlotError::IndexOutOfRange {
                index,
                configured,
            }));
        }

        let source = SourceImage::decode(&file).inspect_err(|error| {
            warn!(slot = index, %error, "selected file could not be decoded");
        })?;
        let preview = SlotPreview::new(source, self.font.clone());

        let complete = self
            .slots
            .set_file(index, file)
            .map_err(SessionError::Configuration)?;
        self.previews[index] = Some(preview);

        if self.state != ImageSessionState::Reporting {
            self.state = if complete {
                ImageSessionState::Submittable
            } else {
                ImageSessionState::AwaitingSelection
            };
        }
        Ok(())
    }

    /// Enters `Submitting` and returns the files to send.
    ///
    /// Clears every preview overlay and hides earlier report cards so their
    /// annotations cannot bleed into the new run.
    ///
    /// # Errors
    /// Returns [`SessionError::State`] when slots are incomplete or a
    /// submission is already in flight; no request must be sent then.
    pub fn begin_submission(&mut self) -> Result<Vec<MediaFile>, SessionError> {
        self.ensure_idle_transport("submit again")?;

        let files = match self.slots.files_for_submission() {
            Ok(files) => files,
            Err(error) => {
                self.notices.push(Notice::alert(format!(
                    "Please select all {} images before analyzing.",
                    self.slots.required_count().max(1)
                )));
                return Err(SessionError::State(error.to_string()));
            }
        };

        self.clear_overlays();
        self.cards.clear();
        self.zoom = None;
        self.state = ImageSessionState::Submitting;
        info!(files = files.len(), "image analysis submitted");
        Ok(files)
    }

    /// Applies the outcome of the request started by [`Self::begin_submission`].
    ///
    /// On success one card is composed per slot whose key is present in the
    /// response, and the preview-style overlay is drawn on that slot. On
    /// failure an alert is queued, no cards or preview overlays are left
    /// drawn, and the session returns to `Submittable` with selections
    /// intact.
    ///
    /// # Errors
    /// Returns [`SessionError::State`] when no submission is in flight, the
    /// transport error on failure, and [`SessionError::Decode`] when a card
    /// cannot be composed.
    pub fn complete_submission(
        &mut self,
        outcome: Result<MultiImageReport, TransportError>,
        composer: &ReportComposer,
    ) -> Result<&[ReportCard], SessionError> {
        if self.state != ImageSessionState::Submitting {
            return Err(SessionError::State(
                "no image submission is in flight".to_string(),
            ));
        }

        let report = match outcome {
            Ok(report) => report,
            Err(error) => {
                warn!(%error, "image analysis failed");
                self.fail_submission();
                return Err(error.into());
            }
        };

        let mut cards = Vec::new();
        let mut failure = None;
        let preview_style = OverlayStyle::preview();
        for (index, slot) in self.previews.iter_mut().enumerate() {
            let (Some(result), Some(preview)) = (report.for_slot(index), slot.as_mut()) else {
                continue;
            };

            let composed = match composer.compose(&preview.source, result) {
                Ok(composed) => composed,
                Err(error) => {
                    warn!(slot = index, %error, "report card could not be composed");
                    failure = Some(error);
                    break;
                }
            };

            let natural = preview.source.natural_resolution();
            redraw_detections(&mut preview.overlay, result, natural, &preview_style);
            cards.push(ReportCard {
                title: slot_key(index),
                slot_index: index,
                report: composed,
            });
        }

        if let Some(error) = failure {
            self.fail_submission();
            return Err(error.into());
        }

        if cards.len() != report.len() {
            debug!(
                keys = report.len(),
                cards = cards.len(),
                "response keys without a matching slot were ignored"
            );
        }

        info!(cards = cards.len(), "image report ready");
        self.cards = cards;
        self.state = ImageSessionState::Reporting;
        Ok(&self.cards)
    }

    /// Runs one full submission through `transport`.
    ///
    /// # Errors
    /// See [`Self::begin_submission`] and [`Self::complete_submission`].
    pub fn submit(
        &mut self,
        transport: &dyn DetectionTransport,
        composer: &ReportComposer,
    ) -> Result<&[ReportCard], SessionError> {
        let files = self.begin_submission()?;
        let outcome = transport.analyze_images(&files);
        self.complete_submission(outcome, composer)
    }

    /// Opens the zoom view for card `card_index`.
    pub fn open_zoom(&mut self, card_index: usize) -> Option<&ZoomView> {
        let card = self.cards.get(card_index)?;
        self.zoom = Some(ZoomView {
            title: card.title.clone(),
            image_data_uri: card.report.image_data_uri.clone(),
        });
        self.zoom.as_ref()
    }

    /// Closes the zoom view.
    pub fn close_zoom(&mut self) {
        self.zoom = None;
    }

    fn clear_overlays(&mut self) {
        for preview in self.previews.iter_mut().flatten() {
            preview.overlay.clear();
        }
    }

    fn fail_submission(&mut self) {
        self.clear_overlays();
        self.cards.clear();
        self.notices.push(Notice::alert(IMAGE_FAILURE_MESSAGE));
        self.state = if self.slots.is_complete() {
            ImageSessionState::Submittable
        } else {
            ImageSessionState::AwaitingSelection
        };
    }

    fn ensure_idle_transport(&self, action: &str) -> Result<(), SessionError> {
        if self.state == ImageSessionState::Submitting {
            return Err(SessionError::State(format!(
                "cannot {action} while a submission is in flight"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the image workflow state machine.

    use super::*;
    use damage_scope_core::{BoundingBox, DetectionResult};
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::collections::BTreeMap;
    use std::io::Cursor;

    fn png_file(name: &str, width: u32, height: u32) -> MediaFile {
        let image = RgbaImage::from_pixel(width, height, Rgba([200, 10, 10, 255]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("png encode should work");
        MediaFile::new(name, bytes)
    }

    fn dent_report() -> MultiImageReport {
        let mut results = BTreeMap::new();
        results.insert(
            "Image 1".to_string(),
            DetectionResult::new(
                vec![BoundingBox::new(4.0, 30.0, 10.0, 10.0)],
                vec!["dent".to_string()],
                vec![87.3],
            )
            .expect("fixture should be valid"),
        );
        MultiImageReport { results }
    }

    #[test]
    fn selection_drives_state() {
        let mut session = ImageSession::new(None);
        assert_eq!(session.state(), ImageSessionState::Idle);

        session.configure(2).expect("two slots are valid");
        assert_eq!(session.state(), ImageSessionState::AwaitingSelection);
        assert!(!session.submit_enabled());

        session.select_file(0, png_file("a.png", 8, 8)).expect("png decodes");
        assert!(!session.submit_enabled());
        session.select_file(1, png_file("b.png", 8, 8)).expect("png decodes");
        assert_eq!(session.state(), ImageSessionState::Submittable);
        assert!(session.submit_enabled());

        session.configure(3).expect("three slots are valid");
        assert_eq!(session.state(), ImageSessionState::AwaitingSelection);
        assert_eq!(session.slots().selected_count(), 0);
        assert!(!session.submit_enabled());
    }

    #[test]
    fn invalid_count_alerts_without_mutation() {
        let mut session = ImageSession::new(None);
        session.configure(2).expect("two slots are valid");

        let error = session.configure(6).expect_err("six slots are invalid");
        assert_eq!(error.kind(), crate::ErrorKind::Configuration);
        assert_eq!(session.slots().required_count(), 2);
        assert_eq!(session.state(), ImageSessionState::AwaitingSelection);
        assert_eq!(session.take_notices(), vec![Notice::alert(INVALID_COUNT_MESSAGE)]);
    }

    #[test]
    fn undecodable_file_leaves_slot_empty() {
        let mut session = ImageSession::new(None);
        session.configure(1).expect("one slot is valid");

        let error = session
            .select_file(0, MediaFile::new("notes.txt", b"hello".to_vec()))
            .expect_err("text is not an image");
        assert_eq!(error.kind(), crate::ErrorKind::Decode);
        assert_eq!(session.slots().selected_count(), 0);
        assert!(session.preview(0).is_none());
    }

    #[test]
    fn success_composes_cards_and_preview_overlay() {
        let mut session = ImageSession::new(None);
        session.configure(2).expect("two slots are valid");
        session.select_file(0, png_file("a.png", 40, 50)).expect("png decodes");
        session.select_file(1, png_file("b.png", 20, 20)).expect("png decodes");

        session.begin_submission().expect("slots are complete");
        assert!(session.is_loading());
        assert!(!session.submit_enabled());

        let composer = ReportComposer::new(None);
        let cards = session
            .complete_submission(Ok(dent_report()), &composer)
            .expect("report should compose");
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].title, "Image 1");
        assert_eq!(cards[0].report.damage_list[0].label, "dent");

        assert_eq!(session.state(), ImageSessionState::Reporting);
        let overlay = session.preview(0).expect("slot 0 has preview").overlay();
        assert_eq!(overlay.resolution(), damage_scope_core::Resolution::new(40, 50));
        assert!(!overlay.is_blank());
        assert!(session.preview(1).expect("slot 1 has preview").overlay().is_blank());
    }

    #[test]
    fn zoom_opens_on_card_and_closes() {
        let mut session = ImageSession::new(None);
        session.configure(1).expect("one slot is valid");
        session.select_file(0, png_file("a.png", 40, 50)).expect("png decodes");
        session.begin_submission().expect("slots are complete");
        session
            .complete_submission(Ok(dent_report()), &ReportComposer::new(None))
            .expect("report should compose");

        assert!(session.open_zoom(3).is_none());
        let zoom = session.open_zoom(0).expect("card 0 exists");
        assert_eq!(zoom.title, "Image 1");
        assert!(zoom.image_data_uri.starts_with("data:image/jpeg;base64,"));
        session.close_zoom();
        assert!(session.zoom().is_none());
    }

    #[test]
    fn compose_failure_midway_leaves_no_overlay_drawn() {
        let mut session = ImageSession::new(None);
        session.configure(2).expect("two slots are valid");
        session.select_file(0, png_file("a.png", 40, 50)).expect("png decodes");
        session.select_file(1, png_file("b.png", 40, 50)).expect("png decodes");
        session.previews[1] = Some(SlotPreview::new(
            SourceImage::from_rgba("pending.png", RgbaImage::new(0, 0)),
            None,
        ));

        let mut report = dent_report();
        let dent = report.results["Image 1"].clone();
        report.results.insert("Image 2".to_string(), dent);

        session.begin_submission().expect("slots are complete");
        let error = session
            .complete_submission(Ok(report), &ReportComposer::new(None))
            .expect_err("second slot cannot be composed");
        assert_eq!(error.kind(), crate::ErrorKind::Decode);
        assert_eq!(session.state(), ImageSessionState::Submittable);
        assert!(session.cards().is_empty());
        assert!(session.preview(0).expect("slot 0 has preview").overlay().is_blank());
        assert_eq!(session.take_notices(), vec![Notice::alert(IMAGE_FAILURE_MESSAGE)]);
    }

    #[test]
    fn completing_without_submission_is_a_state_error() {
        let mut session = ImageSession::new(None);
        let error = session
            .complete_submission(Ok(dent_report()), &ReportComposer::new(None))
            .expect_err("nothing is in flight");
        assert_eq!(error.kind(), crate::ErrorKind::State);
    }
}
