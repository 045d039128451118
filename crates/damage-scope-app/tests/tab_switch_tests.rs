//! Integration tests for tab switching and webcam lifetime.

mod common;

use damage_scope_capture::SyntheticCamera;
use damage_scope_session::{LiveState, WEBCAM_UNAVAILABLE_MESSAGE};
use damage_scope_ui::{Notice, Tab};

#[test]
fn tab_switch_tests_leaving_webcam_stops_live_session() {
    let camera = SyntheticCamera::default();
    let mut workbench = common::workbench(&camera);

    workbench.switch_tab(Tab::Webcam);
    workbench.start_webcam().expect("synthetic camera opens");
    workbench.webcam().run_tick(1);
    assert_eq!(workbench.webcam().labels().len(), 1);
    assert!(workbench.ui().stop_webcam_enabled);

    workbench.switch_tab(Tab::Images);
    assert_eq!(workbench.webcam().state(), LiveState::Stopped);
    assert!(workbench.webcam().labels().is_empty());
    assert_eq!(camera.open_streams(), 0);
    assert!(workbench.ui().start_webcam_enabled);
}

#[test]
fn tab_switch_tests_unavailable_camera_raises_alert() {
    let mut workbench = common::workbench(&SyntheticCamera::unavailable());
    workbench.switch_tab(Tab::Webcam);

    assert!(workbench.start_webcam().is_err());
    assert_eq!(workbench.webcam().state(), LiveState::Stopped);
    assert_eq!(
        workbench.take_notices(),
        vec![Notice::alert(WEBCAM_UNAVAILABLE_MESSAGE)]
    );
}
