//! The letter archive: ordered, keyed, and persisted in full on every change.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use letterbox_core::{LetterDraft, LetterPatch, LetterRecord};
use tracing::{debug, info};

use crate::{ArchiveBackend, JsonFileBackend, MemoryBackend, StoreError};

/// Durable, ordered collection of [`LetterRecord`]s.
///
/// The canonical order is newest first: [`save`](Self::save) inserts at the
/// front and every read returns records in that order. Each mutating call
/// builds the next collection, hands it to the backend, and only adopts it
/// once the backend accepted it, so a failed write leaves the store as it was.
///
/// Ids are decimal millisecond timestamps. When two saves land in the same
/// millisecond (or the clock goes backwards) the next id is bumped past the
/// highest one seen, keeping ids unique and ordered with creation.
pub struct ArchiveStore {
    backend: Box<dyn ArchiveBackend>,
    letters: Vec<LetterRecord>,
    last_id: u64,
}

impl ArchiveStore {
    /// Open a store over `backend`, reading the persisted collection.
    pub fn open(backend: impl ArchiveBackend + 'static) -> Result<Self, StoreError> {
        let letters = backend.load()?;

        let mut seen = HashSet::with_capacity(letters.len());
        for letter in &letters {
            if !seen.insert(letter.id.as_str()) {
                return Err(StoreError::DuplicateId(letter.id.clone()));
            }
        }
        let last_id = letters
            .iter()
            .filter_map(|l| l.id.parse::<u64>().ok())
            .max()
            .unwrap_or(0);

        info!(backend = %backend.describe(), count = letters.len(), "opened letter archive");
        Ok(Self {
            backend: Box::new(backend),
            letters,
            last_id,
        })
    }

    /// An empty, non-durable store.
    pub fn in_memory() -> Self {
        Self {
            backend: Box::new(MemoryBackend::new()),
            letters: Vec::new(),
            last_id: 0,
        }
    }

    /// Open (or start) a JSON archive file.
    pub fn open_json(path: &Path) -> Result<Self, StoreError> {
        Self::open(JsonFileBackend::new(path))
    }

    /// Open (or create) a DuckDB archive database.
    #[cfg(feature = "duckdb")]
    pub fn open_duckdb(path: &Path) -> Result<Self, StoreError> {
        Self::open(crate::DuckBackend::open_persistent(path)?)
    }

    // ── Reads ──

    /// Every letter, newest first.
    pub fn list_all(&self) -> &[LetterRecord] {
        &self.letters
    }

    pub fn get(&self, id: &str) -> Option<&LetterRecord> {
        self.letters.iter().find(|l| l.id == id)
    }

    /// Letters matching `query`, in canonical order. See [`letterbox_core::search`].
    pub fn search(&self, query: &str) -> Vec<&LetterRecord> {
        letterbox_core::search(query, &self.letters)
    }

    pub fn len(&self) -> usize {
        self.letters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.letters.is_empty()
    }

    // ── Writes ──

    /// Persist a reviewed draft as a new letter and return it.
    pub fn save(&mut self, draft: LetterDraft) -> Result<LetterRecord, StoreError> {
        self.save_at(draft, Utc::now())
    }

    fn save_at(&mut self, draft: LetterDraft, now: DateTime<Utc>) -> Result<LetterRecord, StoreError> {
        let id = self.next_id(now)?;
        let record = LetterRecord::from_draft(id.to_string(), now, draft);

        let mut next = Vec::with_capacity(self.letters.len() + 1);
        next.push(record.clone());
        next.extend(self.letters.iter().cloned());
        self.commit(next)?;
        self.last_id = id;

        info!(id = %record.id, count = self.letters.len(), "saved letter");
        Ok(record)
    }

    /// Merge `patch` into the letter with `id`.
    ///
    /// Returns `Ok(false)` without touching anything when no such letter exists.
    pub fn update(&mut self, id: &str, patch: &LetterPatch) -> Result<bool, StoreError> {
        let Some(index) = self.position(id) else {
            debug!(id, "update skipped, no such letter");
            return Ok(false);
        };

        let mut next = self.letters.clone();
        patch.apply_to(&mut next[index]);
        self.commit(next)?;

        info!(id, "updated letter");
        Ok(true)
    }

    /// Remove the letter with `id` for good.
    ///
    /// Returns whether a letter was removed. Deleting an unknown id is a no-op.
    pub fn delete(&mut self, id: &str) -> Result<bool, StoreError> {
        if self.position(id).is_none() {
            debug!(id, "delete skipped, no such letter");
            return Ok(false);
        }

        let next: Vec<LetterRecord> = self.letters.iter().filter(|l| l.id != id).cloned().collect();
        self.commit(next)?;

        info!(id, count = self.letters.len(), "deleted letter");
        Ok(true)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.letters.iter().position(|l| l.id == id)
    }

    fn next_id(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        let after_last = self.last_id.checked_add(1).ok_or_else(|| {
            StoreError::Corrupt(format!("id {} leaves no room for another letter", self.last_id))
        })?;
        Ok(millis.max(after_last))
    }

    fn commit(&mut self, next: Vec<LetterRecord>) -> Result<(), StoreError> {
        self.backend.replace(&next)?;
        self.letters = next;
        Ok(())
    }
}
