//! Extraction layer: turns a scanned letter into a field mapping by calling
//! the external extraction service.

mod error;
pub mod http;

pub use error::ExtractionError;
pub use http::{DEFAULT_EXTRACTION_TIMEOUT, DEFAULT_SERVICE_URL, ExtractionClient};

use async_trait::async_trait;
use letterbox_core::{ExtractedFields, ImageUpload};

/// Something that can read the fields of a letter from its scan.
///
/// Implementations make exactly one attempt per call: no retries, no caching.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, image: &ImageUpload) -> Result<ExtractedFields, ExtractionError>;
}
