//! Integration tests for VERSION propagation into runtime display.

mod common;

use std::fs;

use damage_scope_app::app_version;
use damage_scope_capture::SyntheticCamera;

#[test]
fn version_display_tests_matches_root_version_file() {
    let root_version_path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../VERSION");
    let root_version = fs::read_to_string(root_version_path).expect("VERSION should be readable");
    assert_eq!(app_version(), root_version.trim());

    let workbench = common::workbench(&SyntheticCamera::default());
    assert_eq!(workbench.ui().version, format!("v{}", root_version.trim()));
}
