//! Shared fixtures for session integration tests.

use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use damage_scope_client::{DetectionTransport, TransportError};
use damage_scope_core::{BoundingBox, DetectionResult, MediaFile, MultiImageReport, VideoAnalysis};
use image::{ImageFormat, Rgba, RgbaImage};

/// In-process detection service with scripted answers and call counters.
///
/// `Err(status)` answers simulate a non-success HTTP status.
pub struct FakeTransport {
    images: Mutex<Result<MultiImageReport, u16>>,
    video: Mutex<Result<VideoAnalysis, u16>>,
    frame: Mutex<Result<DetectionResult, u16>>,
    image_calls: AtomicUsize,
    video_calls: AtomicUsize,
    frame_calls: AtomicUsize,
}

#[allow(dead_code)]
impl FakeTransport {
    /// Answers every request with an empty success.
    pub fn new() -> Self {
        Self {
            images: Mutex::new(Ok(MultiImageReport::default())),
            video: Mutex::new(Ok(VideoAnalysis {
                video_url: "/static/videos/output.mp4".to_string(),
                damage_summary: Vec::new(),
            })),
            frame: Mutex::new(Ok(DetectionResult::default())),
            image_calls: AtomicUsize::new(0),
            video_calls: AtomicUsize::new(0),
            frame_calls: AtomicUsize::new(0),
        }
    }

    pub fn answer_images(&self, answer: Result<MultiImageReport, u16>) {
        *self.images.lock().expect("fixture lock") = answer;
    }

    pub fn answer_video(&self, answer: Result<VideoAnalysis, u16>) {
        *self.video.lock().expect("fixture lock") = answer;
    }

    pub fn answer_frames(&self, answer: Result<DetectionResult, u16>) {
        *self.frame.lock().expect("fixture lock") = answer;
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }

    pub fn video_calls(&self) -> usize {
        self.video_calls.load(Ordering::SeqCst)
    }

    pub fn frame_calls(&self) -> usize {
        self.frame_calls.load(Ordering::SeqCst)
    }
}

fn scripted<T: Clone>(answer: &Mutex<Result<T, u16>>, endpoint: &str) -> Result<T, TransportError> {
    answer
        .lock()
        .expect("fixture lock")
        .clone()
        .map_err(|status| TransportError::Status {
            endpoint: endpoint.to_string(),
            status,
        })
}

impl DetectionTransport for FakeTransport {
    fn analyze_images(&self, _files: &[MediaFile]) -> Result<MultiImageReport, TransportError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        scripted(&self.images, "analyze")
    }

    fn analyze_video(&self, _file: &MediaFile) -> Result<VideoAnalysis, TransportError> {
        self.video_calls.fetch_add(1, Ordering::SeqCst);
        scripted(&self.video, "analyze_video")
    }

    fn detect_frame(&self, _jpeg: &[u8]) -> Result<DetectionResult, TransportError> {
        self.frame_calls.fetch_add(1, Ordering::SeqCst);
        scripted(&self.frame, "detection")
    }
}

/// Encodes a solid-color PNG as a selectable file.
#[allow(dead_code)]
pub fn png_file(name: &str, width: u32, height: u32) -> MediaFile {
    let image = RgbaImage::from_pixel(width, height, Rgba([90, 90, 160, 255]));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("png fixture should encode");
    MediaFile::new(name, bytes)
}

/// One-box detection result.
#[allow(dead_code)]
pub fn single_detection(class: &str, confidence: f32, bbox: [f32; 4]) -> DetectionResult {
    DetectionResult::new(
        vec![BoundingBox::from(bbox)],
        vec![class.to_string()],
        vec![confidence],
    )
    .expect("fixture should be valid")
}
