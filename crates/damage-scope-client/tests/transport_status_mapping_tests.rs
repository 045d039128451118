//! Tests how HTTP outcomes map onto transport errors.

mod common;

use common::OneShotServer;
use damage_scope_client::{DetectionTransport, HttpDetectionTransport, ServiceEndpoint, TransportError};
use std::net::TcpListener;

#[test]
fn transport_status_mapping_tests_server_error_becomes_status() {
    let server = OneShotServer::start("500 Internal Server Error", r#"{"error":"boom"}"#);
    let error = server
        .transport()
        .detect_frame(&[0xFF, 0xD8, 0xFF, 0xD9])
        .expect_err("500 is a failure");
    server.request();

    match error {
        TransportError::Status { endpoint, status } => {
            assert_eq!(status, 500);
            assert!(endpoint.ends_with("/detection"), "unexpected endpoint {endpoint}");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[test]
fn transport_status_mapping_tests_broken_body_is_contract_failure() {
    let server = OneShotServer::start(
        "200 OK",
        r#"{"boxes":[[1,2,3,4]],"classes":[],"confidences":[50.0]}"#,
    );
    let error = server
        .transport()
        .detect_frame(&[0xFF, 0xD8, 0xFF, 0xD9])
        .expect_err("arrays are not parallel");
    server.request();
    assert!(matches!(error, TransportError::Contract(_)));
}

#[test]
fn transport_status_mapping_tests_refused_connection_is_network() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("loopback bind");
    let base = format!("http://{}/", listener.local_addr().expect("local addr"));
    drop(listener);

    let transport = HttpDetectionTransport::new(ServiceEndpoint::parse(&base).expect("url is valid"))
        .expect("client builds");
    assert!(matches!(
        transport.detect_frame(&[0xFF, 0xD8]),
        Err(TransportError::Network(_))
    ));
}
