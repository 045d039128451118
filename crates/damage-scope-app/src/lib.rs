#![warn(missing_docs)]
//! # damage-scope-app
//!
//! ## Purpose
//! Wires configuration, transport, sessions and UI state into one
//! [`Workbench`] and backs the `damage-scope` command-line tool.
//!
//! ## Responsibilities
//! - Resolve [`AppConfig`] from flags layered over environment variables.
//! - Install the `tracing` subscriber.
//! - Route tab switches, submissions and webcam control through the
//!   sessions and project their state into [`UiState`].
//! - Persist report artifacts (annotated images, overlays, videos).
//!
//! ## Data flow
//! CLI/env -> [`AppConfig`] -> [`Workbench`] (sessions + transport) ->
//! [`UiState`] projection -> artifacts written under the output directory.
//!
//! ## Ownership and lifetimes
//! The workbench owns every session. Transport and camera are shared
//! through `Arc` so the webcam scheduler thread can use them.
//!
//! ## Error model
//! Subsystem failures are wrapped in [`AppError`]. Workflow failures also
//! leave a notice in [`UiState`] and never terminate the process.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use damage_scope_capture::{CameraDevice, TickConfig};
use damage_scope_client::{DetectionTransport, ServiceEndpoint, TransportError};
use damage_scope_core::MediaFile;
use damage_scope_overlay::{LabelFont, OverlayError};
use damage_scope_report::{ExportFormat, ReportComposer, ReportError, decode_data_uri, encode_image};
use damage_scope_session::{
    ImageSession, ImageSessionState, LiveDetectionLoop, LiveError, LiveState, ReportCard,
    SessionError, VideoOutcome, VideoSession, WEBCAM_UNAVAILABLE_MESSAGE,
};
use damage_scope_ui::{Notice, StageStatus, Tab, UiState};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

/// Build-time application version loaded from root `VERSION` file.
pub const APP_VERSION: &str = env!("DAMAGE_SCOPE_VERSION");

/// Detection service base URL variable.
pub const SERVICE_URL_ENV: &str = "DAMAGE_SCOPE_SERVICE_URL";

/// Label font path variable.
pub const FONT_ENV: &str = "DAMAGE_SCOPE_FONT";

/// Output directory variable.
pub const OUTPUT_DIR_ENV: &str = "DAMAGE_SCOPE_OUTPUT_DIR";

/// Webcam tick rate variable.
pub const TICKS_PER_SECOND_ENV: &str = "DAMAGE_SCOPE_TICKS_PER_SECOND";

/// Default detection service base URL.
pub const DEFAULT_SERVICE_URL: &str = "http://127.0.0.1:8080/";

/// Default output directory.
pub const DEFAULT_OUTPUT_DIR: &str = "./damage-scope-output";

/// Returns the app version sourced from root `VERSION`.
pub fn app_version() -> &'static str {
    APP_VERSION
}

/// Unvalidated configuration values as read from flags or environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigInput {
    /// Detection service base URL.
    pub service_url: String,
    /// Optional TTF/OTF font for label text.
    pub font: Option<PathBuf>,
    /// Directory receiving artifacts.
    pub output_dir: PathBuf,
    /// Webcam ticks per second.
    pub ticks_per_second: u32,
    /// Export PNG instead of JPEG.
    pub png: bool,
}

/// Validated runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Detection service base URL.
    pub endpoint: ServiceEndpoint,
    /// Optional label font path.
    pub font: Option<PathBuf>,
    /// Directory receiving artifacts.
    pub output_dir: PathBuf,
    /// Webcam tick rate.
    pub tick: TickConfig,
    /// Encoding of exported report images.
    pub export_format: ExportFormat,
}

impl AppConfig {
    /// Validates raw configuration values.
    ///
    /// # Errors
    /// Returns [`AppError::Config`] for a malformed service URL or a zero tick
    /// rate.
    pub fn resolve(input: ConfigInput) -> Result<Self, AppError> {
        let endpoint = ServiceEndpoint::parse(&input.service_url)
            .map_err(|error| AppError::Config(format!("{SERVICE_URL_ENV}: {error}")))?;
        let tick = TickConfig::new(input.ticks_per_second)
            .map_err(|error| AppError::Config(format!("{TICKS_PER_SECOND_ENV}: {error}")))?;
        let export_format = if input.png {
            ExportFormat::Png
        } else {
            ExportFormat::default()
        };

        Ok(Self {
            endpoint,
            font: input.font,
            output_dir: input.output_dir,
            tick,
            export_format,
        })
    }
}

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise the level is `info` with `verbose`
/// and `warn` without.
pub fn init_tracing(verbose: bool) {
    let fallback = if verbose { "info" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback)),
        )
        .with_target(true)
        .with_level(true)
        .try_init();
}

/// Loads the label font when a path is configured.
///
/// # Errors
/// Returns [`AppError::Overlay`] when the file is unreadable or not a font.
pub fn load_font(path: Option<&Path>) -> Result<Option<LabelFont>, AppError> {
    match path {
        Some(path) => {
            let font = LabelFont::load(path)?;
            debug!(path = %path.display(), "label font loaded");
            Ok(Some(font))
        }
        None => Ok(None),
    }
}

/// Reads a media file from disk.
///
/// # Errors
/// Returns [`AppError::Io`] when the file cannot be read.
pub fn read_media_file(path: &Path) -> Result<MediaFile, AppError> {
    let bytes = std::fs::read(path).map_err(|source| AppError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(MediaFile::new(name, bytes))
}

/// Top-level controller owning every workflow and the UI projection.
pub struct Workbench {
    ui: UiState,
    images: ImageSession,
    video: VideoSession,
    webcam: LiveDetectionLoop,
    transport: Arc<dyn DetectionTransport>,
    composer: ReportComposer,
}

impl Workbench {
    /// Builds a workbench on the images tab.
    pub fn new(
        config: &AppConfig,
        transport: Arc<dyn DetectionTransport>,
        camera: Arc<dyn CameraDevice>,
        font: Option<LabelFont>,
    ) -> Self {
        let webcam = LiveDetectionLoop::new(camera, Arc::clone(&transport), config.tick, font.clone());
        Self::with_webcam(config, transport, webcam, font)
    }

    /// Builds a workbench around a prepared webcam loop.
    pub fn with_webcam(
        config: &AppConfig,
        transport: Arc<dyn DetectionTransport>,
        webcam: LiveDetectionLoop,
        font: Option<LabelFont>,
    ) -> Self {
        let mut workbench = Self {
            ui: UiState::new(format!("v{APP_VERSION}")),
            images: ImageSession::new(font.clone()),
            video: VideoSession::new(config.endpoint.clone()),
            webcam,
            transport,
            composer: ReportComposer::new(font).with_format(config.export_format),
        };
        workbench.refresh_ui();
        workbench
    }

    /// Projected UI state.
    pub fn ui(&self) -> &UiState {
        &self.ui
    }

    /// Removes and returns pending notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.ui.take_notices()
    }

    /// Image session.
    pub fn images(&self) -> &ImageSession {
        &self.images
    }

    /// Video session.
    pub fn video(&self) -> &VideoSession {
        &self.video
    }

    /// Webcam loop.
    pub fn webcam(&self) -> &LiveDetectionLoop {
        &self.webcam
    }

    /// Shows `tab`; leaving the webcam tab stops a live session.
    pub fn switch_tab(&mut self, tab: Tab) {
        let switch = self.ui.switch_tab(tab);
        if switch.left_webcam && self.webcam.state() != LiveState::Stopped {
            info!("webcam tab left; stopping live detection");
            self.webcam.stop();
        }
        self.refresh_ui();
    }

    /// Sets the number of image slots.
    ///
    /// # Errors
    /// See [`ImageSession::configure`].
    pub fn configure_images(&mut self, count: usize) -> Result<(), AppError> {
        let result = self.images.configure(count);
        self.refresh_ui();
        Ok(result?)
    }

    /// Selects a file for image slot `index`.
    ///
    /// # Errors
    /// See [`ImageSession::select_file`].
    pub fn select_image(&mut self, index: usize, file: MediaFile) -> Result<(), AppError> {
        let result = self.images.select_file(index, file);
        self.refresh_ui();
        Ok(result?)
    }

    /// Submits every selected image and returns the report cards.
    ///
    /// # Errors
    /// See [`ImageSession::submit`].
    pub fn submit_images(&mut self) -> Result<&[ReportCard], AppError> {
        self.ui.images = StageStatus::Running;
        let error = self
            .images
            .submit(self.transport.as_ref(), &self.composer)
            .err();
        self.ui.images = if error.is_some() {
            StageStatus::Degraded
        } else {
            StageStatus::Healthy
        };
        self.refresh_ui();
        match error {
            Some(error) => Err(error.into()),
            None => Ok(self.images.cards()),
        }
    }

    /// Opens the zoom view for report card `card_index`.
    pub fn open_zoom(&mut self, card_index: usize) -> bool {
        let opened = self.images.open_zoom(card_index).is_some();
        self.refresh_ui();
        opened
    }

    /// Closes the zoom view.
    pub fn close_zoom(&mut self) {
        self.images.close_zoom();
        self.refresh_ui();
    }

    /// Selects the video to analyze.
    ///
    /// # Errors
    /// See [`VideoSession::select_file`].
    pub fn select_video(&mut self, file: MediaFile) -> Result<(), AppError> {
        let result = self.video.select_file(file);
        self.refresh_ui();
        Ok(result?)
    }

    /// Submits the selected video.
    ///
    /// # Errors
    /// See [`VideoSession::submit`].
    pub fn submit_video(&mut self) -> Result<VideoOutcome, AppError> {
        self.ui.video = StageStatus::Running;
        let outcome = self
            .video
            .submit(self.transport.as_ref())
            .map(VideoOutcome::clone);
        self.ui.video = if outcome.is_ok() {
            StageStatus::Healthy
        } else {
            StageStatus::Degraded
        };
        self.refresh_ui();
        Ok(outcome?)
    }

    /// Starts live detection.
    ///
    /// # Errors
    /// Returns [`AppError::Live`] when the camera cannot be opened; an alert
    /// is queued as well.
    pub fn start_webcam(&mut self) -> Result<(), AppError> {
        let result = self.webcam.start();
        if let Err(error) = &result {
            warn!(%error, "live detection did not start");
            if matches!(error, LiveError::Device(_)) {
                self.ui.push_notice(Notice::alert(WEBCAM_UNAVAILABLE_MESSAGE));
            }
        }
        self.refresh_ui();
        Ok(result?)
    }

    /// Stops live detection; safe when already stopped.
    pub fn stop_webcam(&mut self) {
        self.webcam.stop();
        self.refresh_ui();
    }

    fn refresh_ui(&mut self) {
        self.ui.analyze_images_enabled = self.images.submit_enabled();
        self.ui.analyze_video_enabled = self.video.submit_enabled();
        self.ui.loading = self.images.is_loading() || self.video.is_loading();
        self.ui.set_webcam_running(self.webcam.state() != LiveState::Stopped);
        if self.images.state() == ImageSessionState::Idle {
            self.ui.images = StageStatus::Idle;
        }
        match self.images.zoom() {
            Some(view) => self.ui.open_zoom(view.clone()),
            None => self.ui.close_zoom(),
        }
        for notice in self
            .images
            .take_notices()
            .into_iter()
            .chain(self.video.take_notices())
        {
            self.ui.push_notice(notice);
        }
    }
}

impl std::fmt::Debug for Workbench {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workbench")
            .field("ui", &self.ui)
            .field("images", &self.images)
            .field("video", &self.video)
            .field("webcam", &self.webcam)
            .finish_non_exhaustive()
    }
}

/// Writes each card's annotated image to `dir` as `image-<n>.<ext>`.
///
/// # Errors
/// Returns [`AppError::Io`] on write failure and [`AppError::Report`] when a
/// data URI cannot be decoded.
pub fn write_report_images(cards: &[ReportCard], dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    ensure_dir(dir)?;
    let mut written = Vec::with_capacity(cards.len());
    for card in cards {
        let (mime, bytes) = decode_data_uri(&card.report.image_data_uri)?;
        let extension = if mime == "image/png" { "png" } else { "jpg" };
        let path = dir.join(format!("image-{}.{extension}", card.slot_index + 1));
        write_file(&path, &bytes)?;
        written.push(path);
    }
    Ok(written)
}

/// Writes the webcam overlay as a PNG.
///
/// # Errors
/// Returns [`AppError::Io`] on write failure and [`AppError::Report`] when
/// encoding fails.
pub fn write_webcam_overlay(webcam: &LiveDetectionLoop, dir: &Path) -> Result<PathBuf, AppError> {
    ensure_dir(dir)?;
    let bytes = encode_image(&webcam.overlay_snapshot(), ExportFormat::Png)?;
    let path = dir.join("webcam-overlay.png");
    write_file(&path, &bytes)?;
    Ok(path)
}

/// File name for a downloaded processed video.
pub fn download_file_name(video_url: &Url) -> String {
    video_url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "processed-video.mp4".to_string())
}

/// Writes `bytes` to `dir/name`.
///
/// # Errors
/// Returns [`AppError::Io`] on failure.
pub fn write_artifact(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf, AppError> {
    ensure_dir(dir)?;
    let path = dir.join(name);
    write_file(&path, bytes)?;
    Ok(path)
}

fn ensure_dir(dir: &Path) -> Result<(), AppError> {
    std::fs::create_dir_all(dir).map_err(|source| AppError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), AppError> {
    std::fs::write(path, bytes).map_err(|source| AppError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), bytes = bytes.len(), "artifact written");
    Ok(())
}

/// App integration error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),
    /// File system failure.
    #[error("i/o error at {}: {source}", path.display())]
    Io {
        /// Affected path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// Font loading failure.
    #[error("overlay error: {0}")]
    Overlay(#[from] OverlayError),
    /// Detection service failure outside a session.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// Image or video workflow failure.
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    /// Webcam loop failure.
    #[error("live detection error: {0}")]
    Live(#[from] LiveError),
    /// Artifact encoding failure.
    #[error("report error: {0}")]
    Report(#[from] ReportError),
}
