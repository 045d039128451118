//! Tests decoding of detection service payloads.

use damage_scope_core::{BoundingBox, DetectionResult, MultiImageReport, VideoAnalysis};

#[test]
fn wire_format_tests_decodes_multi_image_report() {
    let body = r#"{
        "Image 1": {"boxes": [[10, 20, 30, 40]], "classes": ["dent"], "confidences": [88.5]},
        "Image 2": {"boxes": [], "classes": [], "confidences": []}
    }"#;
    let report: MultiImageReport = serde_json::from_str(body).expect("report should decode");

    let first = report.for_slot(0).expect("slot 0 is present");
    assert_eq!(first.boxes, vec![BoundingBox::new(10.0, 20.0, 30.0, 40.0)]);
    assert!(report.for_slot(1).is_some_and(DetectionResult::is_empty));
    assert!(report.for_slot(2).is_none());
}

#[test]
fn wire_format_tests_decodes_video_analysis() {
    let body = r#"{"video_url": "/static/out.mp4", "damage_summary": [{"label": "dent", "score": 72.25}]}"#;
    let analysis: VideoAnalysis = serde_json::from_str(body).expect("analysis should decode");
    assert_eq!(analysis.video_url, "/static/out.mp4");
    assert_eq!(analysis.damage_summary[0].label, "dent");
}
