#![warn(missing_docs)]
//! # damage-scope-client
//!
//! ## Purpose
//! Talks to the remote detection service.
//!
//! ## Responsibilities
//! - Validate and normalize the service base URL.
//! - Define the [`DetectionTransport`] seam used by every workflow.
//! - Implement it over HTTP with multipart uploads.
//!
//! ## Data flow
//! Workflow -> [`DetectionTransport`] method -> multipart POST ->
//! status check -> `damage_scope_contract` parser -> model value.
//!
//! ## Ownership and lifetimes
//! Requests borrow the caller's files; each request copies the bytes it
//! sends, so callers keep their selections after a failure.
//!
//! ## Error model
//! Network failures, non-success statuses and contract violations all map
//! to [`TransportError`]. No request timeout is applied.

use damage_scope_contract::{
    ANALYZE_PATH, ANALYZE_VIDEO_PATH, ContractError, DETECTION_PATH, MULTI_IMAGE_FIELD,
    SINGLE_FILE_FIELD, WEBCAM_FRAME_NAME, parse_detection_result, parse_multi_image_report,
    parse_video_analysis,
};
use damage_scope_core::{DetectionResult, MediaFile, MultiImageReport, VideoAnalysis};
use reqwest::blocking::multipart::{Form, Part};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Base URL of the detection service, normalized to end with `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    base: Url,
}

impl ServiceEndpoint {
    /// Parses and validates a base URL.
    ///
    /// # Errors
    /// Returns [`TransportError::InvalidUrl`] for unparsable URLs or schemes
    /// other than `http`/`https`.
    pub fn parse(raw: &str) -> Result<Self, TransportError> {
        let mut base = Url::parse(raw)
            .map_err(|error| TransportError::InvalidUrl(format!("invalid service url: {error}")))?;

        if !matches!(base.scheme(), "http" | "https") {
            return Err(TransportError::InvalidUrl(format!(
                "service url must use http or https, got {}",
                base.scheme()
            )));
        }

        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self { base })
    }

    /// Base URL.
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolves an endpoint path or a service-provided locator
    /// (`/static/videos/...`, or an absolute URL) against the base.
    ///
    /// # Errors
    /// Returns [`TransportError::InvalidUrl`] when the locator cannot be joined.
    pub fn resolve(&self, locator: &str) -> Result<Url, TransportError> {
        self.base
            .join(locator)
            .map_err(|error| TransportError::InvalidUrl(format!("cannot resolve '{locator}': {error}")))
    }
}

/// Request shapes of the detection service.
pub trait DetectionTransport: Send + Sync {
    /// Submits every selected file as one multi-image request.
    ///
    /// # Errors
    /// Returns [`TransportError`] on network failure, non-success status or
    /// contract violation.
    fn analyze_images(&self, files: &[MediaFile]) -> Result<MultiImageReport, TransportError>;

    /// Submits one video file.
    ///
    /// # Errors
    /// See [`DetectionTransport::analyze_images`].
    fn analyze_video(&self, file: &MediaFile) -> Result<VideoAnalysis, TransportError>;

    /// Submits one JPEG-encoded frame.
    ///
    /// # Errors
    /// See [`DetectionTransport::analyze_images`].
    fn detect_frame(&self, jpeg: &[u8]) -> Result<DetectionResult, TransportError>;
}

/// HTTP implementation of [`DetectionTransport`].
#[derive(Debug, Clone)]
pub struct HttpDetectionTransport {
    endpoint: ServiceEndpoint,
    client: reqwest::blocking::Client,
}

impl HttpDetectionTransport {
    /// Builds a client without request timeouts.
    ///
    /// # Errors
    /// Returns [`TransportError::Network`] when the HTTP client cannot be built.
    pub fn new(endpoint: ServiceEndpoint) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(None::<std::time::Duration>)
            .build()
            .map_err(|error| TransportError::Network(format!("http client init failed: {error}")))?;
        Ok(Self { endpoint, client })
    }

    /// Service endpoint in use.
    pub fn endpoint(&self) -> &ServiceEndpoint {
        &self.endpoint
    }

    /// Downloads a service-hosted asset such as a processed video.
    ///
    /// # Errors
    /// Returns [`TransportError`] on network failure or non-success status.
    pub fn fetch_asset(&self, locator: &str) -> Result<Vec<u8>, TransportError> {
        let url = self.endpoint.resolve(locator)?;
        debug!(%url, "fetching service asset");
        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|error| TransportError::Network(error.to_string()))?;
        read_success_body(url.as_str(), response)
    }

    fn post_form(&self, path: &str, form: Form) -> Result<Vec<u8>, TransportError> {
        let url = self.endpoint.resolve(path)?;
        debug!(%url, "submitting detection request");
        let response = self
            .client
            .post(url.clone())
            .multipart(form)
            .send()
            .map_err(|error| TransportError::Network(error.to_string()))?;
        read_success_body(url.as_str(), response)
    }
}

impl DetectionTransport for HttpDetectionTransport {
    fn analyze_images(&self, files: &[MediaFile]) -> Result<MultiImageReport, TransportError> {
        let mut form = Form::new();
        for file in files {
            form = form.part(MULTI_IMAGE_FIELD, file_part(file));
        }
        let body = self.post_form(ANALYZE_PATH, form)?;
        Ok(parse_multi_image_report(&body)?)
    }

    fn analyze_video(&self, file: &MediaFile) -> Result<VideoAnalysis, TransportError> {
        let form = Form::new().part(SINGLE_FILE_FIELD, file_part(file));
        let body = self.post_form(ANALYZE_VIDEO_PATH, form)?;
        Ok(parse_video_analysis(&body)?)
    }

    fn detect_frame(&self, jpeg: &[u8]) -> Result<DetectionResult, TransportError> {
        let part = Part::bytes(jpeg.to_vec())
            .file_name(WEBCAM_FRAME_NAME)
            .mime_str("image/jpeg")
            .map_err(|error| TransportError::Network(error.to_string()))?;
        let form = Form::new().part(SINGLE_FILE_FIELD, part);
        let body = self.post_form(DETECTION_PATH, form)?;
        Ok(parse_detection_result(&body)?)
    }
}

fn file_part(file: &MediaFile) -> Part {
    Part::bytes(file.bytes.clone()).file_name(file.name.clone())
}

fn read_success_body(
    endpoint: &str,
    response: reqwest::blocking::Response,
) -> Result<Vec<u8>, TransportError> {
    let status = response.status();
    if !status.is_success() {
        warn!(endpoint, status = status.as_u16(), "detection service returned failure status");
        return Err(TransportError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        });
    }

    response
        .bytes()
        .map(|bytes| bytes.to_vec())
        .map_err(|error| TransportError::Network(error.to_string()))
}

/// Detection service transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Service URL is malformed or uses an unsupported scheme.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// Connection or I/O failure.
    #[error("network failure: {0}")]
    Network(String),
    /// Service answered with a non-success status.
    #[error("{endpoint} returned HTTP {status}")]
    Status {
        /// Requested URL.
        endpoint: String,
        /// HTTP status code.
        status: u16,
    },
    /// Response body violated the wire contract.
    #[error("contract failure: {0}")]
    Contract(#[from] ContractError),
}

#[cfg(test)]
mod tests {
    //! Unit tests for endpoint normalization.

    use super::*;

    #[test]
    fn endpoint_paths_resolve_under_base() {
        let endpoint = ServiceEndpoint::parse("http://inspect.test:8080/api").expect("url is valid");
        assert_eq!(endpoint.base().as_str(), "http://inspect.test:8080/api/");
        assert_eq!(
            endpoint.resolve(ANALYZE_PATH).expect("join").as_str(),
            "http://inspect.test:8080/api/analyze"
        );
    }

    #[test]
    fn absolute_locators_resolve_from_host_root() {
        let endpoint = ServiceEndpoint::parse("http://inspect.test:8080/").expect("url is valid");
        assert_eq!(
            endpoint
                .resolve("/static/videos/output_car.mp4")
                .expect("join")
                .as_str(),
            "http://inspect.test:8080/static/videos/output_car.mp4"
        );
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(matches!(
            ServiceEndpoint::parse("ftp://inspect.test/"),
            Err(TransportError::InvalidUrl(_))
        ));
        assert!(ServiceEndpoint::parse("not a url").is_err());
    }
}
