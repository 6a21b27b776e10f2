//! Internal domain modules for the Driftnotes core library.
//!
//! All public types from these modules are re-exported at the crate root
//! with `#[doc(inline)]`; import from there in preference to this module.

pub mod attachment_store;
pub mod error;
pub mod export;
pub mod import;
pub mod note;
pub mod note_store;
pub mod stats;
pub mod storage;

#[doc(inline)]
pub use attachment_store::{kind_for_extension, mime_for_extension, AttachmentStore};
#[doc(inline)]
pub use error::{DriftnotesError, Result};
#[doc(inline)]
pub use export::{
    export_single_note, export_to_archive, summarize_export, ArchiveNoteRecord, ExportSummary,
};
#[doc(inline)]
pub use import::{
    import_from_archive, import_from_json, validate_archive, ArchiveKind, ImportOptions,
    ImportResult, MergeStrategy, ValidationReport,
};
#[doc(inline)]
pub use note::{normalize_tags, Attachment, AttachmentKind, Note};
#[doc(inline)]
pub use note_store::NoteStore;
#[doc(inline)]
pub use stats::StorageStats;
#[doc(inline)]
pub use storage::{Storage, SCHEMA_VERSION};
