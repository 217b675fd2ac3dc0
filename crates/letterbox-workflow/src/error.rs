use letterbox_core::{LetterField, UnknownImportance};
use letterbox_store::StoreError;
use thiserror::Error;

use crate::Phase;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("cannot {action} while {phase}")]
    InvalidTransition { phase: Phase, action: &'static str },

    #[error("'{file_name}' is not an image ({mime})")]
    NotAnImage { file_name: String, mime: String },

    #[error("invalid {field}: {source}")]
    InvalidValue {
        field: LetterField,
        #[source]
        source: UnknownImportance,
    },

    #[error("archive error: {0}")]
    Store(#[from] StoreError),
}
