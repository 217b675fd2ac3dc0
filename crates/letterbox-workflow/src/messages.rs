//! Operator-facing notifications.
//!
//! The controller never blocks on presentation: it pushes [`Notification`]s
//! onto a channel and moves on. All wording for extraction failures lives
//! here.

use letterbox_extract::ExtractionError;

use crate::state::Phase;

/// Broad class of an extraction failure, for presentation styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The service could not be reached at all.
    NetworkUnreachable,
    /// The service answered with an error status.
    Service,
    Timeout,
    /// The caller stopped waiting before the service answered.
    Abandoned,
    Other,
}

impl FailureKind {
    pub fn of(err: &ExtractionError) -> Self {
        match err {
            ExtractionError::NetworkUnreachable { .. } => Self::NetworkUnreachable,
            ExtractionError::Service { .. } => Self::Service,
            ExtractionError::Timeout(_) => Self::Timeout,
            ExtractionError::InvalidResponse(_) | ExtractionError::Http(_) => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The workflow moved between phases. Drives progress indicators.
    PhaseChanged { from: Phase, to: Phase },
    /// Extraction finished; the draft is ready for review.
    ReviewReady { file_name: String },
    ExtractionFailed { kind: FailureKind, message: String },
    Saved { id: String, subject: String },
    SaveFailed { message: String },
    /// An operator action was refused in the current phase.
    Rejected { reason: String },
}

/// Message shown to the operator when extraction fails.
///
/// Service errors show the service's own explanation verbatim; an unreachable
/// service gets instructions to start it.
pub fn failure_message(err: &ExtractionError) -> String {
    match err {
        ExtractionError::NetworkUnreachable { url } => format!(
            "Cannot contact the extraction service at {url}. \
             Make sure the backend service is running, then try again."
        ),
        ExtractionError::Service { .. } => err.service_message().unwrap_or_default().to_string(),
        ExtractionError::Timeout(limit) => format!(
            "The extraction service did not answer within {} seconds.",
            limit.as_secs()
        ),
        ExtractionError::InvalidResponse(reason) => {
            format!("The extraction service sent an unreadable response: {reason}")
        }
        ExtractionError::Http(e) => format!("Extraction request failed: {e}"),
    }
}
