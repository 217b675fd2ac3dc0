use std::collections::VecDeque;

use letterbox_core::{ExtractedFields, ImageUpload, LetterField, LetterPatch, LetterRecord};
use letterbox_extract::{ExtractionError, Extractor};
use letterbox_store::{ArchiveStore, StoreError};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::messages::Notification;
use crate::state::{Effect, Event, Phase, View, WorkflowState, transition};
use crate::WorkflowError;

/// How an upload ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// A draft is waiting for review.
    ReadyForReview,
    /// Extraction failed; the workflow is back to idle.
    Failed { message: String },
}

/// What running one event (and everything it triggered) produced.
#[derive(Default)]
struct Outcome {
    extraction: Option<ImageUpload>,
    saved: Option<Result<LetterRecord, StoreError>>,
    failure: Option<String>,
}

/// Puts the workflow back to idle if an upload's future is dropped while the
/// extractor is still working.
struct PendingExtraction<'a> {
    state: &'a mut WorkflowState,
    notifications: &'a mpsc::UnboundedSender<Notification>,
    armed: bool,
}

impl Drop for PendingExtraction<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(t) = transition(&*self.state, Event::ExtractionAbandoned) else {
            return;
        };
        let from = self.state.phase();
        *self.state = t.next;
        warn!(from = %from, "upload dropped before extraction finished");
        let _ = self.notifications.send(Notification::PhaseChanged {
            from,
            to: self.state.phase(),
        });
        for effect in t.effects {
            if let Effect::Notify(n) = effect {
                let _ = self.notifications.send(n);
            }
        }
    }
}

/// Drives one operator's upload workflow against an archive and an extractor.
///
/// Every operator action becomes an [`Event`] fed through [`transition`];
/// the controller then performs the resulting effects: calling the
/// extractor, saving to the archive, switching views, and pushing
/// [`Notification`]s to the receiver returned by [`new`](Self::new).
///
/// Only one upload can be in flight: uploads are refused unless the workflow
/// is idle. Archive navigation (search, detail, edit, delete) is refused
/// unless the workflow is idle or reviewing.
pub struct WorkflowController<E> {
    store: ArchiveStore,
    extractor: E,
    state: WorkflowState,
    view: View,
    query: String,
    notifications: mpsc::UnboundedSender<Notification>,
}

impl<E: Extractor> WorkflowController<E> {
    pub fn new(store: ArchiveStore, extractor: E) -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = Self {
            store,
            extractor,
            state: WorkflowState::Idle,
            view: View::default(),
            query: String::new(),
            notifications: tx,
        };
        (controller, rx)
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn store(&self) -> &ArchiveStore {
        &self.store
    }

    // ── Upload workflow ──

    /// Run a full upload: capture the preview, extract, and either open the
    /// draft for review or report the failure and return to idle.
    ///
    /// Dropping the returned future before it completes abandons the upload
    /// and returns the workflow to idle.
    pub async fn upload(&mut self, image: ImageUpload) -> Result<UploadOutcome, WorkflowError> {
        let image = self.begin_upload(image)?;
        let mut pending = PendingExtraction {
            state: &mut self.state,
            notifications: &self.notifications,
            armed: true,
        };
        let result = self.extractor.extract(&image).await;
        pending.armed = false;
        drop(pending);
        self.finish_extraction(result)
    }

    /// First half of [`upload`](Self::upload): move from idle to processing and
    /// hand back the scan to extract.
    pub fn begin_upload(&mut self, image: ImageUpload) -> Result<ImageUpload, WorkflowError> {
        let outcome = self.run(Event::ImageSelected(image))?;
        outcome.extraction.ok_or(WorkflowError::InvalidTransition {
            phase: self.phase(),
            action: "start extraction",
        })
    }

    /// Second half of [`upload`](Self::upload): feed the extractor's answer back in.
    pub fn finish_extraction(
        &mut self,
        result: Result<ExtractedFields, ExtractionError>,
    ) -> Result<UploadOutcome, WorkflowError> {
        let event = match result {
            Ok(fields) => Event::ExtractionSucceeded(fields),
            Err(e) => Event::ExtractionFailed(e),
        };
        let outcome = self.run(event)?;
        Ok(match outcome.failure {
            Some(message) => UploadOutcome::Failed { message },
            None => UploadOutcome::ReadyForReview,
        })
    }

    /// Give up on an upload started with [`begin_upload`](Self::begin_upload)
    /// whose result will never arrive.
    pub fn abandon_upload(&mut self) -> Result<(), WorkflowError> {
        self.run(Event::ExtractionAbandoned)?;
        Ok(())
    }

    /// Change one field of the draft under review.
    ///
    /// Importance accepts only `Normal` or `Urgent`; other values are refused
    /// and the draft is left as it was.
    pub fn edit(&mut self, field: LetterField, value: impl Into<String>) -> Result<(), WorkflowError> {
        self.run(Event::FieldEdited {
            field,
            value: value.into(),
        })?;
        Ok(())
    }

    /// Archive the reviewed draft. On success the workflow is idle again and
    /// the archive view is active; on a storage failure the draft stays open.
    pub fn submit(&mut self) -> Result<LetterRecord, WorkflowError> {
        let outcome = self.run(Event::Submitted)?;
        let saved = outcome.saved.ok_or(WorkflowError::InvalidTransition {
            phase: self.phase(),
            action: "submit the draft",
        })?;
        Ok(saved?)
    }

    // ── Archive navigation ──

    pub fn show_scan(&mut self) {
        self.view = View::Scan;
    }

    pub fn show_archive(&mut self) -> Result<(), WorkflowError> {
        self.ensure_navigable("open the archive")?;
        self.view = View::Archive;
        Ok(())
    }

    pub fn set_query(&mut self, query: impl Into<String>) -> Result<(), WorkflowError> {
        self.ensure_navigable("search the archive")?;
        self.query = query.into();
        Ok(())
    }

    /// The archive list as it should be rendered now: the store's current
    /// contents filtered by the active query. Recomputed on every call.
    pub fn archive_view(&self) -> Result<Vec<&LetterRecord>, WorkflowError> {
        self.ensure_navigable("search the archive")?;
        Ok(self.store.search(&self.query))
    }

    pub fn letter(&self, id: &str) -> Result<Option<&LetterRecord>, WorkflowError> {
        self.ensure_navigable("open a letter")?;
        Ok(self.store.get(id))
    }

    /// Amend an archived letter. `Ok(false)` when no letter has `id`.
    pub fn update_letter(&mut self, id: &str, patch: &LetterPatch) -> Result<bool, WorkflowError> {
        self.ensure_navigable("edit a letter")?;
        Ok(self.store.update(id, patch)?)
    }

    /// Delete an archived letter. `Ok(false)` when no letter has `id`.
    pub fn delete_letter(&mut self, id: &str) -> Result<bool, WorkflowError> {
        self.ensure_navigable("delete a letter")?;
        Ok(self.store.delete(id)?)
    }

    fn ensure_navigable(&self, action: &'static str) -> Result<(), WorkflowError> {
        let phase = self.phase();
        if phase.allows_navigation() {
            return Ok(());
        }
        let err = WorkflowError::InvalidTransition { phase, action };
        self.reject(&err);
        Err(err)
    }

    // ── Event loop ──

    /// Feed `event` through the state machine, then carry out its effects,
    /// including any follow-up events they produce.
    fn run(&mut self, event: Event) -> Result<Outcome, WorkflowError> {
        let mut outcome = Outcome::default();
        let mut queue = VecDeque::from([event]);

        while let Some(event) = queue.pop_front() {
            let t = match transition(&self.state, event) {
                Ok(t) => t,
                Err(e) => {
                    self.reject(&e);
                    return Err(e);
                }
            };

            let (from, to) = (self.state.phase(), t.next.phase());
            self.state = t.next;
            if from != to {
                debug!(from = %from, to = %to, "workflow transition");
                self.notify(Notification::PhaseChanged { from, to });
            }

            for effect in t.effects {
                match effect {
                    Effect::BeginExtraction => queue.push_back(Event::ExtractionStarted),
                    Effect::StartExtraction(image) => outcome.extraction = Some(image),
                    Effect::PersistDraft(draft) => match self.store.save(draft) {
                        Ok(record) => {
                            queue.push_back(Event::DraftSaved(record.clone()));
                            outcome.saved = Some(Ok(record));
                        }
                        Err(e) => {
                            error!(error = %e, "saving draft failed");
                            queue.push_back(Event::SaveFailed(e.to_string()));
                            outcome.saved = Some(Err(e));
                        }
                    },
                    Effect::ReturnToIdle => queue.push_back(Event::Reset),
                    Effect::SwitchView(view) => self.view = view,
                    Effect::Notify(n) => {
                        if let Notification::ExtractionFailed { message, .. } = &n {
                            warn!(message = %message, "extraction failed");
                            outcome.failure = Some(message.clone());
                        }
                        self.notify(n);
                    }
                }
            }
        }
        Ok(outcome)
    }

    fn reject(&self, err: &WorkflowError) {
        warn!(error = %err, "operator action refused");
        self.notify(Notification::Rejected {
            reason: err.to_string(),
        });
    }

    fn notify(&self, notification: Notification) {
        // A dropped receiver just means nobody is listening.
        let _ = self.notifications.send(notification);
    }
}
