//! JSON file backend: the whole archive as one pretty-printed array.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use letterbox_core::LetterRecord;
use tracing::debug;

use crate::{ArchiveBackend, StoreError};

/// Stores the archive as a JSON array in a single file.
///
/// Every write goes to a temporary file in the same directory which is then
/// renamed over the target, so readers only ever see a complete archive.
/// A missing or blank file reads as an empty archive.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

impl ArchiveBackend for JsonFileBackend {
    fn load(&self) -> Result<Vec<LetterRecord>, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "archive file absent, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn replace(&mut self, letters: &[LetterRecord]) -> Result<(), StoreError> {
        let dir = self.parent_dir();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| StoreError::io(&dir, e))?;
        serde_json::to_writer_pretty(&mut tmp, letters)?;
        tmp.write_all(b"\n")
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| StoreError::io(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| StoreError::io(&self.path, e.error))?;

        debug!(path = %self.path.display(), count = letters.len(), "archive file rewritten");
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use letterbox_core::Importance;

    fn record(id: &str, subject: &str) -> LetterRecord {
        LetterRecord {
            id: id.into(),
            created_at: chrono::Utc::now(),
            sender_service: "Mairie".into(),
            receiver_service: "Préfecture".into(),
            date: "2024-03-01".into(),
            letter_number: format!("N-{id}"),
            subject: subject.into(),
            body: String::new(),
            importance: Importance::Urgent,
            image_data: String::new(),
        }
    }

    #[test]
    fn missing_file_loads_empty() {
        let tmp = tempfile::TempDir::new().unwrap();
        let backend = JsonFileBackend::new(tmp.path().join("letter_archive.json"));
        assert!(backend.load().unwrap().is_empty());
    }

    #[test]
    fn blank_file_loads_empty() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("letter_archive.json");
        fs::write(&path, "  \n").unwrap();
        assert!(JsonFileBackend::new(path).load().unwrap().is_empty());
    }

    #[test]
    fn replace_then_load_keeps_order() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("letter_archive.json");
        let mut backend = JsonFileBackend::new(&path);
        let letters = vec![record("2", "second"), record("1", "first")];
        backend.replace(&letters).unwrap();
        assert!(path.exists());

        let reopened = JsonFileBackend::new(&path);
        assert_eq!(reopened.load().unwrap(), letters);
    }

    #[test]
    fn file_is_a_camel_case_json_array() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("letter_archive.json");
        let mut backend = JsonFileBackend::new(&path);
        backend.replace(&[record("7", "Objet")]).unwrap();

        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let first = &raw.as_array().unwrap()[0];
        assert_eq!(first["id"], "7");
        assert_eq!(first["letterNumber"], "N-7");
        assert_eq!(first["importance"], "Urgent");
    }

    #[test]
    fn garbage_file_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("letter_archive.json");
        fs::write(&path, "{not json").unwrap();
        let result = JsonFileBackend::new(path).load();
        assert!(matches!(result, Err(StoreError::Json(_))));
    }

    #[test]
    fn failed_rewrite_leaves_target_untouched() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("letter_archive.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep.txt"), "keep").unwrap();

        let mut backend = JsonFileBackend::new(&path);
        let err = backend.replace(&[record("1", "a")]).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }), "{err:?}");

        assert_eq!(fs::read_to_string(path.join("keep.txt")).unwrap(), "keep");
        let entries: Vec<_> = fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn rewrite_leaves_no_temp_files() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("letter_archive.json");
        let mut backend = JsonFileBackend::new(&path);
        backend.replace(&[record("1", "a")]).unwrap();
        backend.replace(&[]).unwrap();
        let entries: Vec<_> = fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert!(backend.load().unwrap().is_empty());
    }
}
