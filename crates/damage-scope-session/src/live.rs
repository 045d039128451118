//! Live webcam capture-and-detect loop.
//!
//! The loop owns the camera stream between [`LiveDetectionLoop::start`] and
//! [`LiveDetectionLoop::stop`]. Each tick captures one frame, encodes it as
//! JPEG and sends it to the detection endpoint on its own request thread, so
//! requests may overlap and finish out of order. At most
//! [`MAX_IN_FLIGHT_REQUESTS`] requests are pending at once; a tick that finds
//! them all busy is skipped. Every request carries a
//! [`TickTicket`] tagged with the session generation and tick sequence; a
//! response is applied only while the same session is running and only if
//! it is newer than the last applied one.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use damage_scope_capture::{CameraDevice, CameraStream, CaptureError, TickConfig};
use damage_scope_client::DetectionTransport;
use damage_scope_core::{DetectionResult, Resolution};
use damage_scope_overlay::{
    DrawSurface, LabelFont, OverlayStyle, RasterSurface, prepare_surface, redraw_detections,
};
use damage_scope_report::{DEFAULT_JPEG_QUALITY, ExportFormat, ReportError, encode_image};
use image::RgbaImage;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ErrorKind;

/// Status text of a label list entry.
pub const DETECTED_STATUS: &str = "Detected";

/// Most scheduled detection requests pending at once.
pub const MAX_IN_FLIGHT_REQUESTS: usize = 2;

/// Live loop states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveState {
    /// No camera held, no ticks scheduled.
    Stopped,
    /// Camera is being acquired.
    Starting,
    /// Ticks are scheduled and responses are applied.
    Running,
}

/// One entry of the webcam damage list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelEntry {
    /// Damage class.
    pub label: String,
    /// Status text, always [`DETECTED_STATUS`].
    pub status: &'static str,
}

/// Encoded frame of one tick plus the tags used to validate its response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickTicket {
    /// Session generation the frame was captured in.
    pub generation: u64,
    /// Tick sequence within the generation.
    pub seq: u64,
    /// Native resolution of the captured frame.
    pub resolution: Resolution,
    /// JPEG-encoded frame.
    pub jpeg: Vec<u8>,
}

/// Why a response was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// The loop is no longer running.
    Stopped,
    /// The response belongs to an earlier session.
    StaleGeneration,
    /// A newer response was already applied.
    OutOfOrder,
}

/// Result of one tick or response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The loop was not running; nothing was captured.
    Idle,
    /// The response was drawn and its labels merged.
    Applied {
        /// Boxes drawn.
        boxes: usize,
        /// Labels seen for the first time this session.
        new_labels: Vec<String>,
    },
    /// The response arrived but was not applied.
    Discarded(DiscardReason),
    /// Capture or detection failed; the frame was logged and dropped.
    Dropped,
}

struct LiveShared {
    state: LiveState,
    generation: u64,
    next_seq: u64,
    last_applied: Option<u64>,
    stream: Option<Box<dyn CameraStream>>,
    overlay: RasterSurface,
    seen: HashSet<String>,
    entries: Vec<LabelEntry>,
    results_visible: bool,
}

impl LiveShared {
    fn reset_session_view(&mut self) {
        self.overlay.clear();
        self.seen.clear();
        self.entries.clear();
        self.results_visible = false;
        self.last_applied = None;
    }
}

struct LiveCore {
    shared: Mutex<LiveShared>,
    transport: Arc<dyn DetectionTransport>,
    style: OverlayStyle,
    in_flight: AtomicUsize,
}

/// Reservation of one request slot, released on drop.
struct RequestSlot(Arc<LiveCore>);

impl RequestSlot {
    fn reserve(core: &Arc<LiveCore>) -> Option<Self> {
        core.in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |pending| {
                (pending < MAX_IN_FLIGHT_REQUESTS).then_some(pending + 1)
            })
            .ok()
            .map(|_| Self(Arc::clone(core)))
    }
}

impl Drop for RequestSlot {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl LiveCore {
    fn lock(&self) -> MutexGuard<'_, LiveShared> {
        self.shared
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn prepare_tick(&self, captured_at_ms: u64) -> Result<Option<TickTicket>, LiveError> {
        let mut shared = self.lock();
        if shared.state != LiveState::Running {
            return Ok(None);
        }
        let Some(stream) = shared.stream.as_mut() else {
            return Ok(None);
        };

        let frame = stream.capture_frame(captured_at_ms)?;
        let resolution = frame.resolution();
        if prepare_surface(&mut shared.overlay, resolution) {
            debug!(
                width = resolution.width,
                height = resolution.height,
                "webcam overlay resized to native resolution"
            );
        }

        let generation = shared.generation;
        let seq = shared.next_seq;
        shared.next_seq += 1;
        drop(shared);

        let pixels = RgbaImage::from_raw(frame.width, frame.height, frame.rgba).ok_or_else(|| {
            LiveError::Frame(format!(
                "frame buffer does not match {}x{}",
                resolution.width, resolution.height
            ))
        })?;
        let jpeg = encode_image(
            &pixels,
            ExportFormat::Jpeg {
                quality: DEFAULT_JPEG_QUALITY,
            },
        )?;

        Ok(Some(TickTicket {
            generation,
            seq,
            resolution,
            jpeg,
        }))
    }

    fn apply_response(&self, ticket: &TickTicket, result: &DetectionResult) -> TickOutcome {
        let mut guard = self.lock();
        let shared = &mut *guard;

        if shared.state != LiveState::Running {
            return TickOutcome::Discarded(DiscardReason::Stopped);
        }
        if ticket.generation != shared.generation {
            return TickOutcome::Discarded(DiscardReason::StaleGeneration);
        }
        if shared.last_applied.is_some_and(|last| ticket.seq <= last) {
            return TickOutcome::Discarded(DiscardReason::OutOfOrder);
        }
        shared.last_applied = Some(ticket.seq);

        let boxes = redraw_detections(&mut shared.overlay, result, ticket.resolution, &self.style);

        let mut new_labels = Vec::new();
        for detection in result.detections() {
            if shared.seen.insert(detection.class.to_string()) {
                shared.entries.push(LabelEntry {
                    label: detection.class.to_string(),
                    status: DETECTED_STATUS,
                });
                new_labels.push(detection.class.to_string());
            }
        }
        if boxes > 0 {
            shared.results_visible = true;
        }

        TickOutcome::Applied { boxes, new_labels }
    }

    fn submit_ticket(&self, ticket: &TickTicket) -> TickOutcome {
        match self.transport.detect_frame(&ticket.jpeg) {
            Ok(result) => self.apply_response(ticket, &result),
            Err(error) => {
                warn!(
                    generation = ticket.generation,
                    seq = ticket.seq,
                    %error,
                    "webcam frame detection failed; frame dropped"
                );
                TickOutcome::Dropped
            }
        }
    }

    fn run_tick(&self, captured_at_ms: u64) -> TickOutcome {
        match self.prepare_tick(captured_at_ms) {
            Ok(Some(ticket)) => self.submit_ticket(&ticket),
            Ok(None) => TickOutcome::Idle,
            Err(error) => {
                warn!(%error, "webcam frame capture failed; tick dropped");
                TickOutcome::Dropped
            }
        }
    }
}

struct TickerRuntime {
    cancel_tx: Sender<()>,
    join: JoinHandle<()>,
}

/// Webcam detection loop.
pub struct LiveDetectionLoop {
    camera: Arc<dyn CameraDevice>,
    core: Arc<LiveCore>,
    tick: TickConfig,
    scheduled: bool,
    ticker: Option<TickerRuntime>,
}

impl LiveDetectionLoop {
    /// Creates a stopped loop that ticks on a background scheduler once
    /// started.
    pub fn new(
        camera: Arc<dyn CameraDevice>,
        transport: Arc<dyn DetectionTransport>,
        tick: TickConfig,
        font: Option<LabelFont>,
    ) -> Self {
        Self {
            camera,
            core: Arc::new(LiveCore {
                shared: Mutex::new(LiveShared {
                    state: LiveState::Stopped,
                    generation: 0,
                    next_seq: 0,
                    last_applied: None,
                    stream: None,
                    overlay: RasterSurface::new(Resolution::new(0, 0), font),
                    seen: HashSet::new(),
                    entries: Vec::new(),
                    results_visible: false,
                }),
                transport,
                style: OverlayStyle::webcam(),
                in_flight: AtomicUsize::new(0),
            }),
            tick,
            scheduled: true,
            ticker: None,
        }
    }

    /// Disables the background scheduler; ticks then run only through
    /// [`Self::run_tick`] or [`Self::prepare_tick`].
    pub fn manual_ticks(mut self) -> Self {
        self.scheduled = false;
        self
    }

    /// Acquires the camera and enters `Running`.
    ///
    /// # Errors
    /// Returns [`LiveError::AlreadyStarted`] unless stopped,
    /// [`LiveError::Device`] when the camera cannot be opened (the loop stays
    /// `Stopped`), and [`LiveError::Scheduler`] when the tick thread cannot
    /// be spawned.
    pub fn start(&mut self) -> Result<(), LiveError> {
        {
            let mut shared = self.core.lock();
            if shared.state != LiveState::Stopped {
                return Err(LiveError::AlreadyStarted);
            }
            shared.state = LiveState::Starting;
        }

        let stream = match self.camera.open() {
            Ok(stream) => stream,
            Err(error) => {
                self.core.lock().state = LiveState::Stopped;
                warn!(device = %self.camera.name(), %error, "webcam could not be opened");
                return Err(error.into());
            }
        };

        let generation = {
            let mut shared = self.core.lock();
            shared.generation += 1;
            shared.next_seq = 0;
            shared.reset_session_view();
            let native = stream.native_resolution();
            prepare_surface(&mut shared.overlay, native);
            shared.stream = Some(stream);
            shared.state = LiveState::Running;
            shared.generation
        };

        if self.scheduled {
            match spawn_ticker(Arc::clone(&self.core), self.tick) {
                Ok(runtime) => self.ticker = Some(runtime),
                Err(error) => {
                    self.stop();
                    return Err(error);
                }
            }
        }

        info!(
            device = %self.camera.name(),
            generation,
            ticks_per_second = self.tick.ticks_per_second,
            "webcam detection started"
        );
        Ok(())
    }

    /// Cancels ticks, releases the camera, clears the overlay and resets the
    /// label list. Safe to call when already stopped.
    pub fn stop(&mut self) {
        let was_running = {
            let mut shared = self.core.lock();
            let was_running = shared.state != LiveState::Stopped;
            shared.state = LiveState::Stopped;
            shared.stream = None;
            shared.reset_session_view();
            was_running
        };

        if let Some(runtime) = self.ticker.take() {
            let _ = runtime.cancel_tx.send(());
            if runtime.join.join().is_err() {
                warn!("webcam ticker thread panicked");
            }
        }

        if was_running {
            info!("webcam detection stopped");
        }
    }

    /// Current state.
    pub fn state(&self) -> LiveState {
        self.core.lock().state
    }

    /// Generation of the current or most recent session.
    pub fn generation(&self) -> u64 {
        self.core.lock().generation
    }

    /// Configured tick rate.
    pub fn tick_config(&self) -> TickConfig {
        self.tick
    }

    /// Labels seen this session, in first-seen order.
    pub fn labels(&self) -> Vec<LabelEntry> {
        self.core.lock().entries.clone()
    }

    /// Whether the results panel is shown.
    pub fn results_visible(&self) -> bool {
        self.core.lock().results_visible
    }

    /// Overlay size; follows the camera's native resolution.
    pub fn overlay_resolution(&self) -> Resolution {
        self.core.lock().overlay.resolution()
    }

    /// Copy of the overlay pixels.
    pub fn overlay_snapshot(&self) -> RgbaImage {
        self.core.lock().overlay.image().clone()
    }

    /// Scheduled detection requests still waiting for a response, including
    /// ones left over from a stopped session.
    pub fn in_flight_requests(&self) -> usize {
        self.core.in_flight.load(Ordering::SeqCst)
    }

    /// Returns `true` when nothing is drawn on the overlay.
    pub fn overlay_is_blank(&self) -> bool {
        self.core.lock().overlay.is_blank()
    }

    /// Captures and encodes one frame without sending it.
    ///
    /// Returns `Ok(None)` when the loop is not running.
    ///
    /// # Errors
    /// Returns [`LiveError`] when capture or encoding fails.
    pub fn prepare_tick(&self, captured_at_ms: u64) -> Result<Option<TickTicket>, LiveError> {
        self.core.prepare_tick(captured_at_ms)
    }

    /// Applies a detection response for `ticket` if it is still current.
    pub fn apply_response(&self, ticket: &TickTicket, result: &DetectionResult) -> TickOutcome {
        self.core.apply_response(ticket, result)
    }

    /// Runs one capture, request and apply cycle on the calling thread.
    pub fn run_tick(&self, captured_at_ms: u64) -> TickOutcome {
        self.core.run_tick(captured_at_ms)
    }
}

impl Drop for LiveDetectionLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for LiveDetectionLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveDetectionLoop")
            .field("camera", &self.camera.name())
            .field("tick", &self.tick)
            .field("scheduled", &self.scheduled)
            .field("state", &self.state())
            .finish()
    }
}

fn spawn_ticker(core: Arc<LiveCore>, tick: TickConfig) -> Result<TickerRuntime, LiveError> {
    let (cancel_tx, cancel_rx) = mpsc::channel::<()>();
    let interval = Duration::from_millis(tick.interval_ms());

    let join = std::thread::Builder::new()
        .name("damage-scope-live-ticker".to_string())
        .spawn(move || {
            loop {
                match cancel_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }

                let Some(slot) = RequestSlot::reserve(&core) else {
                    debug!("detection requests still pending; tick skipped");
                    continue;
                };

                let ticket = match core.prepare_tick(unix_millis()) {
                    Ok(Some(ticket)) => ticket,
                    Ok(None) => break,
                    Err(error) => {
                        warn!(%error, "webcam frame capture failed; tick dropped");
                        continue;
                    }
                };

                let spawned = std::thread::Builder::new()
                    .name("damage-scope-live-request".to_string())
                    .spawn(move || {
                        let slot = slot;
                        slot.0.submit_ticket(&ticket);
                    });
                if let Err(error) = spawned {
                    warn!(%error, "webcam request thread could not be spawned");
                }
            }
        })
        .map_err(|error| LiveError::Scheduler(error.to_string()))?;

    Ok(TickerRuntime { cancel_tx, join })
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Live loop errors.
#[derive(Debug, Error)]
pub enum LiveError {
    /// `start` called while not stopped.
    #[error("webcam detection is already running")]
    AlreadyStarted,
    /// Camera could not be acquired or failed mid-capture.
    #[error("device error: {0}")]
    Device(#[from] CaptureError),
    /// Frame buffer did not match its declared size.
    #[error("invalid frame: {0}")]
    Frame(String),
    /// Frame could not be encoded.
    #[error("frame encoding failed: {0}")]
    Encode(#[from] ReportError),
    /// Tick scheduler thread could not be spawned.
    #[error("tick scheduler failure: {0}")]
    Scheduler(String),
}

impl LiveError {
    /// Propagation class.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyStarted | Self::Scheduler(_) => ErrorKind::State,
            Self::Device(_) => ErrorKind::Device,
            Self::Frame(_) | Self::Encode(_) => ErrorKind::Decode,
        }
    }
}
