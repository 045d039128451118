//! Shared fixtures for app integration tests.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use damage_scope_app::{AppConfig, ConfigInput, Workbench};
use damage_scope_capture::{SyntheticCamera, TickConfig};
use damage_scope_client::{DetectionTransport, TransportError};
use damage_scope_core::{BoundingBox, DetectionResult, MediaFile, MultiImageReport, VideoAnalysis};
use damage_scope_session::LiveDetectionLoop;
use image::{ImageFormat, Rgba, RgbaImage};

/// Service answering every endpoint with one `dent` detection.
pub struct DentService;

pub fn dent() -> DetectionResult {
    DetectionResult::new(
        vec![BoundingBox::new(10.0, 40.0, 30.0, 20.0)],
        vec!["dent".to_string()],
        vec![87.3],
    )
    .expect("fixture should be valid")
}

impl DetectionTransport for DentService {
    fn analyze_images(&self, files: &[MediaFile]) -> Result<MultiImageReport, TransportError> {
        let results = (0..files.len())
            .map(|index| (damage_scope_core::slot_key(index), dent()))
            .collect::<BTreeMap<_, _>>();
        Ok(MultiImageReport { results })
    }

    fn analyze_video(&self, _file: &MediaFile) -> Result<VideoAnalysis, TransportError> {
        Err(TransportError::Status {
            endpoint: "analyze_video".to_string(),
            status: 503,
        })
    }

    fn detect_frame(&self, _jpeg: &[u8]) -> Result<DetectionResult, TransportError> {
        Ok(dent())
    }
}

/// Default configuration writing under `output_dir`.
#[allow(dead_code)]
pub fn config(output_dir: PathBuf) -> AppConfig {
    AppConfig::resolve(ConfigInput {
        service_url: "http://inspect.test:8080/".to_string(),
        font: None,
        output_dir,
        ticks_per_second: 2,
        png: false,
    })
    .expect("fixture config should resolve")
}

/// Workbench over [`DentService`] with a manually ticked synthetic camera.
#[allow(dead_code)]
pub fn workbench(camera: &SyntheticCamera) -> Workbench {
    let config = config(std::env::temp_dir().join("damage-scope-app-tests"));
    let transport: Arc<dyn DetectionTransport> = Arc::new(DentService);
    let webcam = LiveDetectionLoop::new(
        Arc::new(camera.clone()),
        Arc::clone(&transport),
        TickConfig::default(),
        None,
    )
    .manual_ticks();
    Workbench::with_webcam(&config, transport, webcam, None)
}

/// Encodes a solid PNG as a selectable file.
#[allow(dead_code)]
pub fn png_file(name: &str, width: u32, height: u32) -> MediaFile {
    let image = RgbaImage::from_pixel(width, height, Rgba([120, 120, 120, 255]));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("png fixture should encode");
    MediaFile::new(name, bytes)
}
