pub mod image;
pub mod letter;
pub mod search;

pub use image::ImageUpload;
pub use letter::{
    ExtractedFields, Importance, LetterDraft, LetterField, LetterPatch, LetterRecord,
    UnknownField, UnknownImportance,
};
pub use search::search;
