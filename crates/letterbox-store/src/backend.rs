use letterbox_core::LetterRecord;

use crate::StoreError;

/// Durable home of the letter collection.
///
/// Backends deal in whole collections: [`load`](Self::load) returns every
/// record in canonical order and [`replace`](Self::replace) rewrites all of
/// them. `replace` must be all-or-nothing: on error the previously persisted
/// collection is still the one a later `load` sees.
pub trait ArchiveBackend: Send {
    fn load(&self) -> Result<Vec<LetterRecord>, StoreError>;

    fn replace(&mut self, letters: &[LetterRecord]) -> Result<(), StoreError>;

    /// Short human-readable location, used in logs.
    fn describe(&self) -> String;
}

/// Process-local backend. Nothing survives the process; meant for tests and
/// dry runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    letters: Vec<LetterRecord>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing collection (canonical order, newest first).
    pub fn with_letters(letters: Vec<LetterRecord>) -> Self {
        Self { letters }
    }
}

impl ArchiveBackend for MemoryBackend {
    fn load(&self) -> Result<Vec<LetterRecord>, StoreError> {
        Ok(self.letters.clone())
    }

    fn replace(&mut self, letters: &[LetterRecord]) -> Result<(), StoreError> {
        self.letters = letters.to_vec();
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
