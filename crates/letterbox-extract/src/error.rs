use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    /// No connection could be opened at all (refused, DNS failure, ...).
    #[error("extraction service unreachable at {url}")]
    NetworkUnreachable { url: String },

    /// The service answered with a non-success status.
    #[error("extraction service returned {status} {status_text}")]
    Service {
        status: u16,
        status_text: String,
        /// `detail` string from the JSON error body, when there is one.
        detail: Option<String>,
    },

    #[error("extraction timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid extraction response: {0}")]
    InvalidResponse(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl ExtractionError {
    /// The most specific explanation the service gave for a failure: its
    /// `detail` if present, otherwise the status text.
    pub fn service_message(&self) -> Option<&str> {
        match self {
            Self::Service {
                detail: Some(detail),
                ..
            } => Some(detail),
            Self::Service { status_text, .. } => Some(status_text),
            _ => None,
        }
    }
}
