#![warn(missing_docs)]
//! # damage-scope-capture
//!
//! ## Purpose
//! Provides camera abstractions and tick scheduling for live detection.
//!
//! ## Responsibilities
//! - Define a backend-agnostic camera device/stream pair.
//! - Expose a deterministic synthetic camera for CI and unit tests.
//! - Expose an image-sequence camera that replays a directory of stills.
//! - Validate the fixed tick rate of the live loop.
//!
//! ## Data flow
//! Live loop opens a [`CameraDevice`] -> [`CameraStream::capture_frame`] at
//! tick cadence -> frames are encoded and submitted for detection.
//!
//! ## Ownership and lifetimes
//! An open [`CameraStream`] is the exclusive device handle; dropping it
//! releases the device.
//!
//! ## Error model
//! Unavailable devices, invalid rates, and backend failures are reported as
//! [`CaptureError`] values.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use damage_scope_core::{Frame, Resolution};
use image::RgbaImage;
use thiserror::Error;

/// Default live detection rate.
pub const DEFAULT_TICKS_PER_SECOND: u32 = 2;

/// Highest accepted live detection rate.
pub const MAX_TICKS_PER_SECOND: u32 = 30;

/// Tick configuration used by the live loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickConfig {
    /// Capture-and-detect ticks per second.
    pub ticks_per_second: u32,
}

impl TickConfig {
    /// Creates validated tick configuration.
    ///
    /// # Errors
    /// Returns [`CaptureError::InvalidRate`] unless
    /// `1 <= ticks_per_second <= MAX_TICKS_PER_SECOND`.
    pub fn new(ticks_per_second: u32) -> Result<Self, CaptureError> {
        if !(1..=MAX_TICKS_PER_SECOND).contains(&ticks_per_second) {
            return Err(CaptureError::InvalidRate(ticks_per_second));
        }
        Ok(Self { ticks_per_second })
    }

    /// Returns tick interval in milliseconds.
    pub fn interval_ms(&self) -> u64 {
        1_000 / self.ticks_per_second as u64
    }
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
        }
    }
}

/// Camera that can be opened for exclusive use.
pub trait CameraDevice: Send + Sync {
    /// Human-readable device name.
    fn name(&self) -> String;

    /// Acquires the device.
    ///
    /// # Errors
    /// Returns [`CaptureError::DeviceUnavailable`] when access is denied or the
    /// device does not exist.
    fn open(&self) -> Result<Box<dyn CameraStream>, CaptureError>;
}

/// Open camera stream; dropping it releases the device.
pub trait CameraStream: Send {
    /// Current native resolution; may change between frames.
    fn native_resolution(&self) -> Resolution;

    /// Captures one frame at native resolution.
    ///
    /// # Errors
    /// Returns [`CaptureError::Backend`] on device failure.
    fn capture_frame(&mut self, captured_at_ms: u64) -> Result<Frame, CaptureError>;
}

/// Deterministic camera for tests and CI.
///
/// Frames are solid gray with a brightness that advances per capture. The
/// resolution can be changed at runtime to simulate device reconfiguration.
#[derive(Debug, Clone)]
pub struct SyntheticCamera {
    resolution: Arc<Mutex<Resolution>>,
    available: bool,
    opened: Arc<Mutex<usize>>,
}

impl SyntheticCamera {
    /// Creates an available camera at `resolution`.
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution: Arc::new(Mutex::new(resolution)),
            available: true,
            opened: Arc::new(Mutex::new(0)),
        }
    }

    /// Creates a camera whose `open` always fails.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(Resolution::new(0, 0))
        }
    }

    /// Changes the resolution reported to every open stream.
    pub fn reconfigure(&self, resolution: Resolution) {
        let mut current = self
            .resolution
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = resolution;
    }

    /// Number of streams currently open.
    pub fn open_streams(&self) -> usize {
        *self
            .opened
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        Self::new(Resolution::new(64, 48))
    }
}

impl CameraDevice for SyntheticCamera {
    fn name(&self) -> String {
        "Synthetic Camera".to_string()
    }

    fn open(&self) -> Result<Box<dyn CameraStream>, CaptureError> {
        if !self.available {
            return Err(CaptureError::DeviceUnavailable(
                "synthetic camera is configured as unavailable".to_string(),
            ));
        }

        let mut opened = self
            .opened
            .lock()
            .map_err(|_| CaptureError::Backend("synthetic open counter poisoned".to_string()))?;
        *opened += 1;

        Ok(Box::new(SyntheticStream {
            resolution: Arc::clone(&self.resolution),
            opened: Arc::clone(&self.opened),
            sequence: 0,
        }))
    }
}

struct SyntheticStream {
    resolution: Arc<Mutex<Resolution>>,
    opened: Arc<Mutex<usize>>,
    sequence: u64,
}

impl CameraStream for SyntheticStream {
    fn native_resolution(&self) -> Resolution {
        *self
            .resolution
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn capture_frame(&mut self, captured_at_ms: u64) -> Result<Frame, CaptureError> {
        let resolution = self.native_resolution();
        if resolution.is_empty() {
            return Err(CaptureError::Backend(
                "synthetic camera has zero resolution".to_string(),
            ));
        }

        self.sequence += 1;
        let shade = (self.sequence % 200) as u8 + 32;
        let rgba = RgbaImage::from_pixel(
            resolution.width,
            resolution.height,
            image::Rgba([shade, shade, shade, 255]),
        )
        .into_raw();

        Frame::new(resolution.width, resolution.height, captured_at_ms, rgba)
            .map_err(|error| CaptureError::Backend(error.to_string()))
    }
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        let mut opened = self
            .opened
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *opened = opened.saturating_sub(1);
    }
}

/// Camera replaying the still images of a directory in file-name order.
///
/// Each image is a frame; the sequence loops. Resolution follows the
/// current image, so mixed sizes exercise overlay resizing.
#[derive(Debug, Clone)]
pub struct ImageSequenceCamera {
    directory: PathBuf,
}

impl ImageSequenceCamera {
    /// Creates a camera over `directory`; nothing is read until `open`.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn frame_paths(&self) -> Result<Vec<PathBuf>, CaptureError> {
        let entries = std::fs::read_dir(&self.directory).map_err(|error| {
            CaptureError::DeviceUnavailable(format!(
                "cannot read '{}': {error}",
                self.directory.display()
            ))
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| is_supported_still(path))
            .collect();
        paths.sort();
        Ok(paths)
    }
}

impl CameraDevice for ImageSequenceCamera {
    fn name(&self) -> String {
        format!("Image sequence ({})", self.directory.display())
    }

    fn open(&self) -> Result<Box<dyn CameraStream>, CaptureError> {
        let paths = self.frame_paths()?;
        let first = paths.first().ok_or_else(|| {
            CaptureError::DeviceUnavailable(format!(
                "'{}' contains no jpg/png frames",
                self.directory.display()
            ))
        })?;
        let current = load_still(first)?;

        Ok(Box::new(ImageSequenceStream {
            paths,
            next: 0,
            current,
        }))
    }
}

struct ImageSequenceStream {
    paths: Vec<PathBuf>,
    next: usize,
    current: RgbaImage,
}

impl CameraStream for ImageSequenceStream {
    fn native_resolution(&self) -> Resolution {
        Resolution::new(self.current.width(), self.current.height())
    }

    fn capture_frame(&mut self, captured_at_ms: u64) -> Result<Frame, CaptureError> {
        let path = &self.paths[self.next % self.paths.len()];
        self.current = load_still(path)?;
        self.next = (self.next + 1) % self.paths.len();

        Frame::new(
            self.current.width(),
            self.current.height(),
            captured_at_ms,
            self.current.as_raw().clone(),
        )
        .map_err(|error| CaptureError::Backend(error.to_string()))
    }
}

fn is_supported_still(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| {
            matches!(
                extension.to_ascii_lowercase().as_str(),
                "jpg" | "jpeg" | "png"
            )
        })
        .unwrap_or(false)
}

fn load_still(path: &Path) -> Result<RgbaImage, CaptureError> {
    image::open(path)
        .map(|decoded| decoded.to_rgba8())
        .map_err(|error| CaptureError::Backend(format!("cannot decode '{}': {error}", path.display())))
}

/// Capture layer error type.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Tick rate is zero or above [`MAX_TICKS_PER_SECOND`].
    #[error("invalid tick rate {0}: must be between 1 and {MAX_TICKS_PER_SECOND}")]
    InvalidRate(u32),
    /// Camera access could not be acquired.
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),
    /// Backend runtime failure.
    #[error("camera backend failure: {0}")]
    Backend(String),
}
