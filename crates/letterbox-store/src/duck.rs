//! DuckDB backend for the letter archive.

use std::path::Path;

use chrono::{DateTime, Utc};
use duckdb::{Connection, params};
use letterbox_core::{Importance, LetterRecord};
use tracing::info;

use crate::{ARCHIVE_NAMESPACE, ArchiveBackend, StoreError};

/// Stores the archive in a single DuckDB table named after
/// [`ARCHIVE_NAMESPACE`].
///
/// `position` carries the canonical order (0 = newest). Every rewrite runs in
/// one transaction, so a failed write rolls back to the previous collection.
///
/// Supports both in-memory (ephemeral) and persistent (file-backed) modes.
pub struct DuckBackend {
    conn: Connection,
    location: String,
}

impl DuckBackend {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, ":memory:".to_string())
    }

    /// Open or create a persistent DuckDB database at the given path.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn, path.display().to_string())
    }

    fn init(conn: Connection, location: String) -> Result<Self, StoreError> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {ARCHIVE_NAMESPACE} (
                position BIGINT NOT NULL,
                id VARCHAR NOT NULL,
                created_at VARCHAR NOT NULL,
                sender_service VARCHAR NOT NULL,
                receiver_service VARCHAR NOT NULL,
                date VARCHAR NOT NULL,
                letter_number VARCHAR NOT NULL,
                subject VARCHAR NOT NULL,
                body VARCHAR NOT NULL,
                importance VARCHAR NOT NULL,
                image_data VARCHAR NOT NULL
            )"
        );
        conn.execute_batch(&sql)?;
        info!(location = %location, table = ARCHIVE_NAMESPACE, "duckdb archive ready");
        Ok(Self { conn, location })
    }
}

/// Raw row before the timestamp and importance are validated.
struct LetterRow {
    id: String,
    created_at: String,
    sender_service: String,
    receiver_service: String,
    date: String,
    letter_number: String,
    subject: String,
    body: String,
    importance: String,
    image_data: String,
}

impl LetterRow {
    fn into_record(self) -> Result<LetterRecord, StoreError> {
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| {
                StoreError::Corrupt(format!("letter {}: bad created_at '{}': {e}", self.id, self.created_at))
            })?
            .with_timezone(&Utc);
        let importance: Importance = self
            .importance
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("letter {}: {e}", self.id)))?;
        Ok(LetterRecord {
            id: self.id,
            created_at,
            sender_service: self.sender_service,
            receiver_service: self.receiver_service,
            date: self.date,
            letter_number: self.letter_number,
            subject: self.subject,
            body: self.body,
            importance,
            image_data: self.image_data,
        })
    }
}

impl ArchiveBackend for DuckBackend {
    fn load(&self) -> Result<Vec<LetterRecord>, StoreError> {
        let sql = format!(
            "SELECT id, created_at, sender_service, receiver_service, date, letter_number,
                    subject, body, importance, image_data
             FROM {ARCHIVE_NAMESPACE}
             ORDER BY position"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok(LetterRow {
                id: row.get(0)?,
                created_at: row.get(1)?,
                sender_service: row.get(2)?,
                receiver_service: row.get(3)?,
                date: row.get(4)?,
                letter_number: row.get(5)?,
                subject: row.get(6)?,
                body: row.get(7)?,
                importance: row.get(8)?,
                image_data: row.get(9)?,
            })
        })?;

        let mut letters = Vec::new();
        for row in rows {
            letters.push(row?.into_record()?);
        }
        Ok(letters)
    }

    fn replace(&mut self, letters: &[LetterRecord]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute(&format!("DELETE FROM {ARCHIVE_NAMESPACE}"), [])?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {ARCHIVE_NAMESPACE} VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ))?;
            for (position, l) in letters.iter().enumerate() {
                stmt.execute(params![
                    position as i64,
                    l.id,
                    l.created_at.to_rfc3339(),
                    l.sender_service,
                    l.receiver_service,
                    l.date,
                    l.letter_number,
                    l.subject,
                    l.body,
                    l.importance.as_str(),
                    l.image_data,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("duckdb:{}", self.location)
    }
}
