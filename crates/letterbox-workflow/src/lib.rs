//! Per-upload workflow: image → extraction → review → archive.
//!
//! [`transition`] is the whole state machine as a pure function;
//! [`WorkflowController`] owns the archive and the extractor and carries out
//! the effects each transition asks for.

mod controller;
mod error;
pub mod messages;
pub mod state;

pub use controller::{UploadOutcome, WorkflowController};
pub use error::WorkflowError;
pub use messages::{FailureKind, Notification};
pub use state::{Effect, Event, Phase, Transition, View, WorkflowState, transition};
