//! Archive storage: the ordered letter collection and its durable backends.

mod archive;
mod backend;
mod error;
mod json_file;

pub use archive::ArchiveStore;
pub use backend::{ArchiveBackend, MemoryBackend};
pub use error::StoreError;
pub use json_file::JsonFileBackend;

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::DuckBackend;

/// Name of the persisted collection: the JSON file stem and the DuckDB table.
pub const ARCHIVE_NAMESPACE: &str = "letter_archive";
