//! The upload workflow as an explicit state machine.
//!
//! ```text
//! Idle ──ImageSelected──▶ Uploading ──ExtractionStarted──▶ Processing
//! Processing ──ExtractionSucceeded──▶ Reviewing ──Submitted/DraftSaved──▶ Saved ──Reset──▶ Idle
//! Processing ──ExtractionFailed──▶ Error ──Reset──▶ Idle
//! Uploading/Processing ──ExtractionAbandoned──▶ Idle
//! ```
//!
//! [`transition`] maps `(state, event)` to the next state plus the effects the
//! controller must carry out. It performs no I/O. Events that make no sense
//! in the current phase are refused with
//! [`WorkflowError::InvalidTransition`] and leave the state untouched.

use std::fmt;

use letterbox_core::{ExtractedFields, ImageUpload, LetterDraft, LetterField, LetterRecord};
use letterbox_extract::ExtractionError;

use crate::WorkflowError;
use crate::messages::{FailureKind, Notification, failure_message};

/// Screen the operator is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Scan,
    Archive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowState {
    /// No file selected.
    Idle,
    /// A scan was handed over; its preview is already available.
    Uploading { image: ImageUpload, preview: String },
    /// The scan is with the extraction service.
    Processing { file_name: String, preview: String },
    /// The operator is editing the pre-filled draft. The draft carries the
    /// preview as its image payload.
    Reviewing { draft: LetterDraft },
    /// The draft was archived under `letter_id`.
    Saved { letter_id: String },
    /// Extraction failed with `message`.
    Error { message: String },
}

/// Payload-free view of [`WorkflowState`], for logging and guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Uploading,
    Processing,
    Reviewing,
    Saved,
    Error,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Uploading => "uploading",
            Self::Processing => "processing",
            Self::Reviewing => "reviewing",
            Self::Saved => "saved",
            Self::Error => "error",
        }
    }

    /// Whether the operator may search, open, edit, or delete archived
    /// letters in this phase.
    pub fn allows_navigation(&self) -> bool {
        matches!(self, Self::Idle | Self::Reviewing)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl WorkflowState {
    pub fn phase(&self) -> Phase {
        match self {
            Self::Idle => Phase::Idle,
            Self::Uploading { .. } => Phase::Uploading,
            Self::Processing { .. } => Phase::Processing,
            Self::Reviewing { .. } => Phase::Reviewing,
            Self::Saved { .. } => Phase::Saved,
            Self::Error { .. } => Phase::Error,
        }
    }

    /// Preview reference of the scan in flight, if any.
    pub fn preview(&self) -> Option<&str> {
        match self {
            Self::Uploading { preview, .. } | Self::Processing { preview, .. } => Some(preview),
            Self::Reviewing { draft } => Some(&draft.image_data),
            _ => None,
        }
    }

    pub fn draft(&self) -> Option<&LetterDraft> {
        match self {
            Self::Reviewing { draft } => Some(draft),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum Event {
    /// The operator picked or dropped a file.
    ImageSelected(ImageUpload),
    /// The scan was handed to the extractor.
    ExtractionStarted,
    ExtractionSucceeded(ExtractedFields),
    ExtractionFailed(ExtractionError),
    /// Nobody is waiting for the extraction any more.
    ExtractionAbandoned,
    FieldEdited { field: LetterField, value: String },
    /// The operator confirmed the draft.
    Submitted,
    DraftSaved(LetterRecord),
    SaveFailed(String),
    /// Leave a terminal phase.
    Reset,
}

impl Event {
    /// Verb phrase used when the event is refused.
    fn action(&self) -> &'static str {
        match self {
            Self::ImageSelected(_) => "upload an image",
            Self::ExtractionStarted => "start extraction",
            Self::ExtractionSucceeded(_) | Self::ExtractionFailed(_) => "accept an extraction result",
            Self::ExtractionAbandoned => "abandon an extraction",
            Self::FieldEdited { .. } => "edit the draft",
            Self::Submitted => "submit the draft",
            Self::DraftSaved(_) | Self::SaveFailed(_) => "record a save result",
            Self::Reset => "reset",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send the scan to the extractor, then feed back
    /// [`Event::ExtractionSucceeded`] or [`Event::ExtractionFailed`].
    StartExtraction(ImageUpload),
    /// Save the draft, then feed back [`Event::DraftSaved`] or [`Event::SaveFailed`].
    PersistDraft(LetterDraft),
    /// Feed back [`Event::ExtractionStarted`].
    BeginExtraction,
    /// Feed back [`Event::Reset`].
    ReturnToIdle,
    SwitchView(View),
    Notify(Notification),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: WorkflowState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(next: WorkflowState) -> Self {
        Self {
            next,
            effects: Vec::new(),
        }
    }

    fn with(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Compute the next state and effects for `event` arriving in `state`.
pub fn transition(state: &WorkflowState, event: Event) -> Result<Transition, WorkflowError> {
    use WorkflowState as S;

    let t = match (state, event) {
        (S::Idle, Event::ImageSelected(image)) => {
            if !image.is_image() {
                return Err(WorkflowError::NotAnImage {
                    file_name: image.file_name,
                    mime: image.mime,
                });
            }
            let preview = image.data_url();
            Transition::to(S::Uploading { image, preview }).with(Effect::BeginExtraction)
        }

        (S::Uploading { image, preview }, Event::ExtractionStarted) => Transition::to(S::Processing {
            file_name: image.file_name.clone(),
            preview: preview.clone(),
        })
        .with(Effect::StartExtraction(image.clone())),

        (S::Processing { file_name, preview }, Event::ExtractionSucceeded(fields)) => {
            let draft = LetterDraft::from_extracted(&fields, preview.clone());
            Transition::to(S::Reviewing { draft }).with(Effect::Notify(Notification::ReviewReady {
                file_name: file_name.clone(),
            }))
        }

        (S::Processing { .. }, Event::ExtractionFailed(err)) => {
            let message = failure_message(&err);
            Transition::to(S::Error {
                message: message.clone(),
            })
            .with(Effect::Notify(Notification::ExtractionFailed {
                kind: FailureKind::of(&err),
                message,
            }))
            .with(Effect::ReturnToIdle)
        }

        (S::Uploading { image, .. }, Event::ExtractionAbandoned) => abandoned(&image.file_name),
        (S::Processing { file_name, .. }, Event::ExtractionAbandoned) => abandoned(file_name),

        (S::Reviewing { draft }, Event::FieldEdited { field, value }) => {
            let mut draft = draft.clone();
            draft
                .set(field, &value)
                .map_err(|source| WorkflowError::InvalidValue { field, source })?;
            Transition::to(S::Reviewing { draft })
        }

        (S::Reviewing { draft }, Event::Submitted) => {
            Transition::to(state.clone()).with(Effect::PersistDraft(draft.clone()))
        }

        (S::Reviewing { .. }, Event::DraftSaved(record)) => Transition::to(S::Saved {
            letter_id: record.id.clone(),
        })
        .with(Effect::Notify(Notification::Saved {
            id: record.id,
            subject: record.subject,
        }))
        .with(Effect::SwitchView(View::Archive))
        .with(Effect::ReturnToIdle),

        (S::Reviewing { .. }, Event::SaveFailed(message)) => {
            Transition::to(state.clone()).with(Effect::Notify(Notification::SaveFailed { message }))
        }

        (S::Saved { .. } | S::Error { .. }, Event::Reset) => Transition::to(S::Idle),

        (state, event) => {
            return Err(WorkflowError::InvalidTransition {
                phase: state.phase(),
                action: event.action(),
            });
        }
    };
    Ok(t)
}

fn abandoned(file_name: &str) -> Transition {
    Transition::to(WorkflowState::Idle).with(Effect::Notify(Notification::ExtractionFailed {
        kind: FailureKind::Abandoned,
        message: format!("Extraction of {file_name} was abandoned before the service answered."),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use letterbox_core::Importance;

    fn png() -> ImageUpload {
        ImageUpload::new("courrier.png", vec![1, 2, 3])
    }

    fn processing() -> WorkflowState {
        let t = transition(&WorkflowState::Idle, Event::ImageSelected(png())).unwrap();
        transition(&t.next, Event::ExtractionStarted).unwrap().next
    }

    fn reviewing() -> WorkflowState {
        let fields = ExtractedFields::new().with(LetterField::Subject, "Objet");
        transition(&processing(), Event::ExtractionSucceeded(fields))
            .unwrap()
            .next
    }

    #[test]
    fn image_selection_captures_preview_immediately() {
        let t = transition(&WorkflowState::Idle, Event::ImageSelected(png())).unwrap();
        assert_eq!(t.next.phase(), Phase::Uploading);
        assert_eq!(t.next.preview(), Some("data:image/png;base64,AQID"));
        assert_eq!(t.effects, vec![Effect::BeginExtraction]);
    }

    #[test]
    fn non_image_upload_is_refused() {
        let pdf = ImageUpload::new("courrier.pdf", vec![1]);
        let err = transition(&WorkflowState::Idle, Event::ImageSelected(pdf)).unwrap_err();
        assert!(matches!(err, WorkflowError::NotAnImage { .. }));
    }

    #[test]
    fn extraction_start_hands_over_the_scan() {
        let t = transition(&WorkflowState::Idle, Event::ImageSelected(png())).unwrap();
        let t = transition(&t.next, Event::ExtractionStarted).unwrap();
        assert_eq!(t.next.phase(), Phase::Processing);
        assert_eq!(t.effects, vec![Effect::StartExtraction(png())]);
        assert!(t.next.preview().is_some());
    }

    #[test]
    fn second_upload_while_processing_is_refused() {
        let err = transition(&processing(), Event::ImageSelected(png())).unwrap_err();
        match err {
            WorkflowError::InvalidTransition { phase, .. } => assert_eq!(phase, Phase::Processing),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn upload_while_reviewing_is_refused() {
        let err = transition(&reviewing(), Event::ImageSelected(png())).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::InvalidTransition {
                phase: Phase::Reviewing,
                ..
            }
        ));
    }

    #[test]
    fn success_fills_draft_with_defaults() {
        let state = reviewing();
        let draft = state.draft().unwrap();
        assert_eq!(draft.subject, "Objet");
        assert_eq!(draft.sender_service, "");
        assert_eq!(draft.importance, Importance::Normal);
        assert_eq!(draft.image_data, "data:image/png;base64,AQID");
    }

    #[test]
    fn failure_goes_to_error_then_idle() {
        let err = ExtractionError::Service {
            status: 500,
            status_text: "Internal Server Error".into(),
            detail: None,
        };
        let t = transition(&processing(), Event::ExtractionFailed(err)).unwrap();
        assert_eq!(
            t.next,
            WorkflowState::Error {
                message: "Internal Server Error".into()
            }
        );
        assert_eq!(t.effects.last(), Some(&Effect::ReturnToIdle));

        let t = transition(&t.next, Event::Reset).unwrap();
        assert_eq!(t.next, WorkflowState::Idle);
        assert!(t.next.draft().is_none());
        assert!(t.next.preview().is_none());
    }

    #[test]
    fn edits_only_touch_the_named_field() {
        let t = transition(
            &reviewing(),
            Event::FieldEdited {
                field: LetterField::LetterNumber,
                value: "N° 17".into(),
            },
        )
        .unwrap();
        let draft = t.next.draft().unwrap();
        assert_eq!(draft.letter_number, "N° 17");
        assert_eq!(draft.subject, "Objet");
        assert!(t.effects.is_empty());
    }

    #[test]
    fn unknown_importance_edit_is_refused() {
        let state = reviewing();
        let err = transition(
            &state,
            Event::FieldEdited {
                field: LetterField::Importance,
                value: "non urgent".into(),
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::InvalidValue {
                field: LetterField::Importance,
                ..
            }
        ));
        assert_eq!(state.draft().unwrap().importance, Importance::Normal);
    }

    #[test]
    fn abandoned_extraction_returns_to_idle() {
        let t = transition(&processing(), Event::ExtractionAbandoned).unwrap();
        assert_eq!(t.next, WorkflowState::Idle);
        assert!(matches!(
            t.effects.as_slice(),
            [Effect::Notify(Notification::ExtractionFailed {
                kind: FailureKind::Abandoned,
                ..
            })]
        ));
        assert!(transition(&WorkflowState::Idle, Event::ExtractionAbandoned).is_err());
        assert!(transition(&reviewing(), Event::ExtractionAbandoned).is_err());
    }

    #[test]
    fn submit_asks_to_persist_the_draft() {
        let state = reviewing();
        let t = transition(&state, Event::Submitted).unwrap();
        assert_eq!(t.next, state);
        assert_eq!(t.effects, vec![Effect::PersistDraft(state.draft().unwrap().clone())]);
    }

    #[test]
    fn save_switches_to_archive_and_returns_to_idle() {
        let state = reviewing();
        let record = LetterRecord::from_draft(
            "1700000000000".into(),
            chrono::Utc::now(),
            state.draft().unwrap().clone(),
        );
        let t = transition(&state, Event::DraftSaved(record)).unwrap();
        assert_eq!(t.next.phase(), Phase::Saved);
        assert!(t.effects.contains(&Effect::SwitchView(View::Archive)));
        assert_eq!(t.effects.last(), Some(&Effect::ReturnToIdle));
        assert_eq!(transition(&t.next, Event::Reset).unwrap().next, WorkflowState::Idle);
    }

    #[test]
    fn save_failure_keeps_the_draft() {
        let state = reviewing();
        let t = transition(&state, Event::SaveFailed("disk full".into())).unwrap();
        assert_eq!(t.next, state);
    }

    #[test]
    fn submit_outside_review_is_refused() {
        assert!(transition(&WorkflowState::Idle, Event::Submitted).is_err());
        assert!(transition(&processing(), Event::Submitted).is_err());
    }

    #[test]
    fn reset_from_idle_is_refused() {
        assert!(transition(&WorkflowState::Idle, Event::Reset).is_err());
    }

    #[test]
    fn navigation_phases() {
        assert!(Phase::Idle.allows_navigation());
        assert!(Phase::Reviewing.allows_navigation());
        assert!(!Phase::Uploading.allows_navigation());
        assert!(!Phase::Processing.allows_navigation());
    }
}
