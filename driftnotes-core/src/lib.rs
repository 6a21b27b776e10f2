//! Core library for Driftnotes — a mobile note-taking application.
//!
//! This crate owns the local persistence layer: the [`Note`]/[`Attachment`]
//! data model, the SQLite-backed [`NoteStore`], physical attachment custody
//! in [`AttachmentStore`], and the backup engine (archive export in
//! [`core::export`], conflict-resolving import in [`core::import`]).
//!
//! The primary entry point is [`NoteStore`], opened once per store directory
//! and shared by reference. Callers are responsible for serialising
//! concurrent writers against the same store instance; operations run to
//! completion on the calling thread.
//!
//! Types are re-exported from their respective sub-modules for convenience;
//! consumers should import from the crate root rather than the `core` module.

pub mod core;

// Re-export commonly used types.
#[doc(inline)]
pub use crate::core::{
    attachment_store::{kind_for_extension, mime_for_extension, AttachmentStore},
    error::{DriftnotesError, Result},
    export::{
        export_single_note, export_to_archive, summarize_export, ArchiveNoteRecord, ExportSummary,
    },
    import::{
        import_from_archive, import_from_json, validate_archive, ArchiveKind, ImportOptions,
        ImportResult, MergeStrategy, ValidationReport,
    },
    note::{normalize_tags, Attachment, AttachmentKind, Note},
    note_store::NoteStore,
    stats::StorageStats,
    storage::{Storage, SCHEMA_VERSION},
};
