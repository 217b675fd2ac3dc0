//! HTTP client for the field-extraction service.
//!
//! The service takes a multipart `POST` with the scan under the `file` field
//! and answers `{"data": {...fields...}}` on success, or a non-2xx status with
//! an optional `{"detail": "..."}` body on failure.

use std::time::Duration;

use async_trait::async_trait;
use letterbox_core::{ExtractedFields, ImageUpload};
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::{ExtractionError, Extractor};

/// Where the extraction service listens when run locally.
pub const DEFAULT_SERVICE_URL: &str = "http://localhost:8000/extract";

/// Upper bound on a single extraction call, connect to last byte.
pub const DEFAULT_EXTRACTION_TIMEOUT: Duration = Duration::from_secs(120);

/// Multipart field name the service reads the scan from.
const FILE_FIELD: &str = "file";

/// Client for the extraction service's `/extract` endpoint.
pub struct ExtractionClient {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    data: Option<ExtractedFields>,
}

impl ExtractionClient {
    /// Create a client for the given endpoint with [`DEFAULT_EXTRACTION_TIMEOUT`].
    ///
    /// `url` is the full endpoint, e.g. `http://localhost:8000/extract`.
    pub fn new(url: impl Into<String>) -> Result<Self, ExtractionError> {
        Self::with_timeout(url, DEFAULT_EXTRACTION_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, ExtractionError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn classify(&self, e: reqwest::Error) -> ExtractionError {
        if e.is_timeout() {
            ExtractionError::Timeout(self.timeout)
        } else if e.is_connect() {
            ExtractionError::NetworkUnreachable {
                url: self.url.clone(),
            }
        } else {
            ExtractionError::Http(e)
        }
    }
}

#[async_trait]
impl Extractor for ExtractionClient {
    async fn extract(&self, image: &ImageUpload) -> Result<ExtractedFields, ExtractionError> {
        let part = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.mime)?;
        let form = Form::new().part(FILE_FIELD, part);

        info!(url = %self.url, file = %image.file_name, bytes = image.bytes.len(), "requesting extraction");
        let resp = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            let err = ExtractionError::Service {
                status: status.as_u16(),
                status_text: status_text(status),
                detail: error_detail(&body),
            };
            warn!(status = status.as_u16(), error = %err, "extraction failed");
            return Err(err);
        }

        let parsed: ExtractResponse =
            serde_json::from_str(&body).map_err(|e| ExtractionError::InvalidResponse(e.to_string()))?;
        let fields = parsed.data.unwrap_or_default();
        info!(status = status.as_u16(), fields = fields.len(), "extraction complete");
        Ok(fields)
    }
}

/// Reason phrase for `status`, or the bare code when it has none.
fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_str().to_string())
}

/// Pull `detail` out of an error body. Non-string details (validation error
/// lists) are kept as compact JSON.
fn error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
