//! Backup import: archive/JSON ingestion with a conflict-resolving merge.
//!
//! Candidate notes are decoded into a tolerant raw record, validated in one
//! place, and then merged one at a time; every candidate ends in exactly one
//! of three terminal states (created / updated / skipped). A failure
//! affecting a single note or a single media file is recovered locally and
//! aggregated into the returned [`ImportResult`]; only container-level
//! problems (no notes document, unreadable archive) abort the whole
//! operation, in which case nothing has been applied.

use crate::core::attachment_store::{extension_of, kind_for_extension, mime_for_extension};
use crate::core::note::normalize_tags;
use crate::{Attachment, AttachmentKind, Note, NoteStore, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use uuid::Uuid;
use zip::ZipArchive;

/// Conflict policy applied when an imported note's id already exists locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MergeStrategy {
    /// Overwrite the local note only when the imported `updatedAt` is
    /// strictly newer. A candidate without a timestamp never wins.
    LastWriteWins,
    /// Never overwrite an existing note.
    SkipOlder,
}

/// Caller-selected import behavior.
#[derive(Debug, Clone, Copy)]
pub struct ImportOptions {
    /// Import every note under a freshly generated id, bypassing the merge
    /// strategy entirely.
    pub as_copies: bool,
    pub strategy: MergeStrategy,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            as_copies: false,
            strategy: MergeStrategy::LastWriteWins,
        }
    }
}

/// The structured outcome of an import operation.
///
/// Expected failure modes travel in `errors` and `warnings`; callers branch
/// on these lists rather than on a `Result`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub media_imported: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// What kind of backup file a path turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArchiveKind {
    /// A zip container with a notes document and media files.
    Archive,
    /// A bare JSON note list (or single shared note record).
    NoteList,
}

/// Read-only preview of what an import would ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub valid: bool,
    pub kind: Option<ArchiveKind>,
    pub note_count: usize,
    pub media_file_count: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

// Tolerant decode target for one notes-document element. Every field is
// optional here; requiredness is enforced by validate_record in one place.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNoteRecord {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    folder: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    images: Option<Vec<String>>,
    #[serde(default)]
    voice_notes: Option<Vec<String>>,
    #[serde(default)]
    pinned: Option<bool>,
}

// A structurally valid candidate, ready for the merge state machine.
struct CandidateNote {
    id: String,
    title: String,
    content: String,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    folder: Option<String>,
    tags: Vec<String>,
    images: Vec<String>,
    voice_notes: Vec<String>,
    pinned: bool,
}

enum Outcome {
    Created,
    Updated,
    Skipped,
}

impl CandidateNote {
    fn to_note(&self, id: String) -> Note {
        let created_at = self.created_at.unwrap_or_else(Utc::now);
        let updated_at = self.updated_at.unwrap_or(created_at).max(created_at);

        let mut attachments = Vec::new();
        for path in &self.images {
            attachments.push(attachment_for_import(path, false, created_at));
        }
        for path in &self.voice_notes {
            attachments.push(attachment_for_import(path, true, created_at));
        }

        Note {
            id,
            title: self.title.clone(),
            content: self.content.clone(),
            created_at,
            updated_at,
            folder: self.folder.clone(),
            tags: normalize_tags(self.tags.clone()),
            pinned: self.pinned,
            attachments,
        }
    }
}

/// Merges a backup archive into `store` according to `options`.
///
/// Media extraction runs once per archive, independent of the per-note merge
/// loop; a failure extracting one file is recorded as a warning and does not
/// stop the rest. An archive without a `notes.json` document is rejected
/// outright: the result carries the error and nothing has been applied.
pub fn import_from_archive(
    store: &mut NoteStore,
    path: &Path,
    options: &ImportOptions,
) -> ImportResult {
    let mut result = ImportResult::default();

    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) => {
            result
                .errors
                .push(format!("Cannot open archive '{}': {e}", path.display()));
            return result;
        }
    };
    let mut archive = match ZipArchive::new(file) {
        Ok(archive) => archive,
        Err(e) => {
            result.errors.push(format!("Not a valid backup archive: {e}"));
            return result;
        }
    };

    // Read and parse the notes document before touching anything, so a
    // structurally broken archive is rejected with nothing applied.
    let raws = match read_notes_document(&mut archive) {
        Ok(raws) => raws,
        Err(message) => {
            result.errors.push(message);
            return result;
        }
    };

    extract_media(store, &mut archive, &mut result);
    merge_candidates(store, &raws, options, false, &mut result);
    result
}

/// Merges a bare JSON note list (or single shared note record) into `store`.
///
/// Same merge semantics as [`import_from_archive`], no media bundle; a note
/// referencing media paths that do not resolve produces a warning.
pub fn import_from_json(
    store: &mut NoteStore,
    path: &Path,
    options: &ImportOptions,
) -> ImportResult {
    let mut result = ImportResult::default();

    let json = match fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) => {
            result
                .errors
                .push(format!("Cannot open file '{}': {e}", path.display()));
            return result;
        }
    };
    let raws = match parse_note_list(&json) {
        Ok(raws) => raws,
        Err(message) => {
            result.errors.push(message);
            return result;
        }
    };

    merge_candidates(store, &raws, options, true, &mut result);
    result
}

/// Read-only dry run over a backup file: detects the container kind, counts
/// importable notes and media entries, and reports structural problems.
/// Never mutates any store and never extracts a file.
pub fn validate_archive(path: &Path) -> ValidationReport {
    let mut report = ValidationReport {
        valid: false,
        kind: None,
        note_count: 0,
        media_file_count: 0,
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            report
                .errors
                .push(format!("Cannot open file '{}': {e}", path.display()));
            return report;
        }
    };

    if bytes.starts_with(b"PK") {
        report.kind = Some(ArchiveKind::Archive);
        let mut archive = match ZipArchive::new(Cursor::new(&bytes)) {
            Ok(archive) => archive,
            Err(e) => {
                report.errors.push(format!("Not a valid backup archive: {e}"));
                return report;
            }
        };

        for i in 0..archive.len() {
            if let Ok(entry) = archive.by_index(i) {
                if !entry.is_dir() && entry.name().starts_with("media/") {
                    report.media_file_count += 1;
                }
            }
        }

        match read_notes_document(&mut archive) {
            Ok(raws) => tally_records(&raws, &mut report),
            Err(message) => {
                report.errors.push(message);
                return report;
            }
        }
    } else {
        match parse_note_list(&String::from_utf8_lossy(&bytes)) {
            Ok(raws) => {
                report.kind = Some(ArchiveKind::NoteList);
                tally_records(&raws, &mut report);
            }
            Err(_) => {
                report
                    .errors
                    .push("Not a recognized backup format".to_string());
                return report;
            }
        }
    }

    report.valid = report.errors.is_empty();
    report
}

fn read_notes_document<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> std::result::Result<Vec<RawNoteRecord>, String> {
    let mut entry = archive
        .by_name("notes.json")
        .map_err(|_| "Archive is missing its notes.json document".to_string())?;
    let mut json = String::new();
    entry
        .read_to_string(&mut json)
        .map_err(|e| format!("Failed to read notes.json: {e}"))?;
    serde_json::from_str(&json).map_err(|e| format!("notes.json is not a valid note list: {e}"))
}

// A note list is normally a JSON array; a single shared note record is
// accepted as a one-element list.
fn parse_note_list(json: &str) -> std::result::Result<Vec<RawNoteRecord>, String> {
    match serde_json::from_str::<Vec<RawNoteRecord>>(json) {
        Ok(raws) => Ok(raws),
        Err(array_error) => serde_json::from_str::<RawNoteRecord>(json)
            .map(|raw| vec![raw])
            .map_err(|_| format!("Not a valid note list: {array_error}")),
    }
}

fn extract_media<R: Read + Seek>(
    store: &NoteStore,
    archive: &mut ZipArchive<R>,
    result: &mut ImportResult,
) {
    for i in 0..archive.len() {
        let mut entry = match archive.by_index(i) {
            Ok(entry) => entry,
            Err(e) => {
                result.warnings.push(format!("Unreadable archive entry: {e}"));
                continue;
            }
        };
        let entry_name = entry.name().to_string();
        if entry.is_dir() || !entry_name.starts_with("media/") {
            continue;
        }

        // Final path component only: an entry name can never escape the
        // attachment store root.
        let Some(file_name) = entry_name
            .rsplit(['/', '\\'])
            .next()
            .filter(|name| !name.is_empty() && *name != "..")
        else {
            continue;
        };

        let mut bytes = Vec::new();
        if let Err(e) = entry.read_to_end(&mut bytes) {
            result
                .warnings
                .push(format!("Failed to extract media file '{file_name}': {e}"));
            continue;
        }
        match store.attachments().store_bytes(file_name, &bytes) {
            Ok(_) => result.media_imported += 1,
            Err(e) => result
                .warnings
                .push(format!("Failed to extract media file '{file_name}': {e}")),
        }
    }
}

fn merge_candidates(
    store: &mut NoteStore,
    raws: &[RawNoteRecord],
    options: &ImportOptions,
    warn_missing_media: bool,
    result: &mut ImportResult,
) {
    for (index, raw) in raws.iter().enumerate() {
        let candidate = match validate_record(raw, index) {
            Ok(candidate) => candidate,
            Err(warning) => {
                result.skipped += 1;
                result.warnings.push(warning);
                continue;
            }
        };

        if warn_missing_media {
            for path in candidate.images.iter().chain(candidate.voice_notes.iter()) {
                if store.attachments().resolve_relative(path).is_none() {
                    result.warnings.push(format!(
                        "Note '{}' references missing media file '{}'",
                        candidate.title, path
                    ));
                }
            }
        }

        // One bad record never aborts the whole import.
        match merge_one(store, &candidate, options) {
            Ok(Outcome::Created) => result.created += 1,
            Ok(Outcome::Updated) => result.updated += 1,
            Ok(Outcome::Skipped) => result.skipped += 1,
            Err(e) => result
                .errors
                .push(format!("Failed to import note '{}': {e}", candidate.title)),
        }
    }
}

fn merge_one(
    store: &mut NoteStore,
    candidate: &CandidateNote,
    options: &ImportOptions,
) -> Result<Outcome> {
    if options.as_copies {
        let note = candidate.to_note(fresh_copy_id(store)?);
        store.save(&note)?;
        return Ok(Outcome::Created);
    }

    match store.get_by_id(&candidate.id)? {
        None => {
            store.save(&candidate.to_note(candidate.id.clone()))?;
            Ok(Outcome::Created)
        }
        Some(existing) => match options.strategy {
            MergeStrategy::SkipOlder => Ok(Outcome::Skipped),
            MergeStrategy::LastWriteWins => match candidate.updated_at {
                // A missing imported timestamp is treated as older: malformed
                // input never overwrites local data.
                Some(imported) if imported > existing.updated_at => {
                    store.save(&candidate.to_note(candidate.id.clone()))?;
                    Ok(Outcome::Updated)
                }
                _ => Ok(Outcome::Skipped),
            },
        },
    }
}

fn validate_record(
    raw: &RawNoteRecord,
    index: usize,
) -> std::result::Result<CandidateNote, String> {
    let label = raw
        .title
        .as_deref()
        .filter(|t| !t.is_empty())
        .or_else(|| raw.id.as_deref().filter(|i| !i.is_empty()))
        .map(str::to_string)
        .unwrap_or_else(|| format!("#{}", index + 1));

    let id = raw
        .id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| format!("Skipped note '{label}': missing id"))?;
    let title = raw
        .title
        .clone()
        .ok_or_else(|| format!("Skipped note '{label}': missing title"))?;
    let content = raw
        .content
        .clone()
        .ok_or_else(|| format!("Skipped note '{label}': missing content"))?;
    let created_at = parse_timestamp(raw.created_at.as_deref(), "createdAt", &label)?;
    let updated_at = parse_timestamp(raw.updated_at.as_deref(), "updatedAt", &label)?;

    Ok(CandidateNote {
        id,
        title,
        content,
        created_at,
        updated_at,
        folder: raw.folder.clone(),
        tags: raw.tags.clone().unwrap_or_default(),
        images: raw.images.clone().unwrap_or_default(),
        voice_notes: raw.voice_notes.clone().unwrap_or_default(),
        pinned: raw.pinned.unwrap_or(false),
    })
}

// A timestamp may be absent, but when present it must parse.
fn parse_timestamp(
    value: Option<&str>,
    field: &str,
    label: &str,
) -> std::result::Result<Option<DateTime<Utc>>, String> {
    match value {
        None => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|parsed| Some(parsed.with_timezone(&Utc)))
            .map_err(|_| format!("Skipped note '{label}': unparsable {field} '{s}'")),
    }
}

fn attachment_for_import(relative_path: &str, voice: bool, created_at: DateTime<Utc>) -> Attachment {
    let name = relative_path
        .rsplit('/')
        .next()
        .unwrap_or(relative_path)
        .to_string();
    let ext = extension_of(&name).unwrap_or_default();
    let kind = if voice {
        AttachmentKind::Voice
    } else {
        match kind_for_extension(&ext) {
            AttachmentKind::Image => AttachmentKind::Image,
            _ => AttachmentKind::File,
        }
    };

    Attachment {
        id: Uuid::new_v4().to_string(),
        name,
        relative_path: relative_path.to_string(),
        mime_type: mime_for_extension(&ext).map(str::to_string),
        size_bytes: None,
        kind,
        created_at,
        duration_seconds: None,
    }
}

// Copy mode assigns ids guaranteed not to collide with any existing id.
fn fresh_copy_id(store: &NoteStore) -> Result<String> {
    loop {
        let id = Uuid::new_v4().to_string();
        if store.get_by_id(&id)?.is_none() {
            return Ok(id);
        }
    }
}

fn tally_records(raws: &[RawNoteRecord], report: &mut ValidationReport) {
    for (index, raw) in raws.iter().enumerate() {
        match validate_record(raw, index) {
            Ok(_) => report.note_count += 1,
            Err(warning) => report.warnings.push(warning),
        }
    }
}
