//! Backup export: portable archives of the full note set.
//!
//! An export archive is a zip container with exactly two logical parts:
//! a `notes.json` document (JSON array of [`ArchiveNoteRecord`]) and a
//! `media/` directory holding the attachment payload files. The same record
//! shape is consumed by the importer, so archives round-trip between
//! devices and app versions.

use crate::{AttachmentKind, Note, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Size charged per attachment file that no longer exists on disk when
/// estimating an export (256 KiB).
const MISSING_FILE_SIZE_ESTIMATE: u64 = 256 * 1024;

/// One element of the `notes.json` array.
///
/// This shape is the portable interchange format and must stay stable:
/// camelCase keys, RFC 3339 timestamps, attachment references flattened to
/// relative-path lists (`images` for image and file kinds, `voiceNotes` for
/// voice recordings).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveNoteRecord {
    pub id: String,
    pub title: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
    pub folder: Option<String>,
    pub tags: Vec<String>,
    pub images: Vec<String>,
    pub voice_notes: Vec<String>,
    pub pinned: bool,
}

impl ArchiveNoteRecord {
    /// Flattens a [`Note`] into its portable record.
    pub fn from_note(note: &Note) -> Self {
        let mut images = Vec::new();
        let mut voice_notes = Vec::new();
        for attachment in &note.attachments {
            match attachment.kind {
                AttachmentKind::Voice => voice_notes.push(attachment.relative_path.clone()),
                AttachmentKind::Image | AttachmentKind::File => {
                    images.push(attachment.relative_path.clone())
                }
            }
        }
        Self {
            id: note.id.clone(),
            title: note.title.clone(),
            content: note.content.clone(),
            created_at: note.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            updated_at: note.updated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            folder: note.folder.clone(),
            tags: note.tags.clone(),
            images,
            voice_notes,
            pinned: note.pinned,
        }
    }
}

/// Dry-run content and size estimate shown before committing to an export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub note_count: usize,
    pub media_file_count: usize,
    pub estimated_size_bytes: u64,
}

/// Writes the full note set plus its attachment files into a fresh archive
/// in the OS temp directory and returns its path.
///
/// Attachment files that no longer exist on disk are skipped silently.
/// Persisting or sharing the returned file is the caller's responsibility;
/// the store is not mutated.
///
/// # Errors
///
/// Returns [`crate::DriftnotesError::Io`] or
/// [`crate::DriftnotesError::Zip`] if the archive cannot be written.
pub fn export_to_archive(
    notes: &[Note],
    attachment_paths: &[PathBuf],
    file_name: Option<&str>,
) -> Result<PathBuf> {
    let name = match file_name {
        Some(name) => name.to_string(),
        None => format!("driftnotes-export-{}.zip", Utc::now().timestamp_millis()),
    };
    let destination = std::env::temp_dir().join(name);

    let records: Vec<ArchiveNoteRecord> = notes.iter().map(ArchiveNoteRecord::from_note).collect();
    let json = serde_json::to_vec_pretty(&records)?;

    let file = fs::File::create(&destination)?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    writer.start_file("notes.json", options)?;
    writer.write_all(&json)?;

    let mut written: HashSet<String> = HashSet::new();
    for path in attachment_paths {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if !written.insert(name.clone()) {
            continue;
        }
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::debug!("Skipping missing attachment '{}': {e}", path.display());
                continue;
            }
        };
        writer.start_file(format!("media/{name}"), options)?;
        writer.write_all(&bytes)?;
    }

    writer.finish()?;
    Ok(destination)
}

/// Writes a single note's record (no media bundle) to a fresh temporary
/// `.json` file for sharing, and returns its path.
pub fn export_single_note(note: &Note) -> Result<PathBuf> {
    let destination = std::env::temp_dir().join(format!("driftnotes-note-{}.json", note.id));
    let record = ArchiveNoteRecord::from_note(note);
    fs::write(&destination, serde_json::to_vec_pretty(&record)?)?;
    Ok(destination)
}

/// Estimates an export's content and size without building the archive.
///
/// The notes document contributes its serialized byte length; each
/// attachment contributes its actual on-disk size, or a fixed per-file
/// fallback when the file is missing.
pub fn summarize_export(notes: &[Note], attachment_paths: &[PathBuf]) -> ExportSummary {
    let records: Vec<ArchiveNoteRecord> = notes.iter().map(ArchiveNoteRecord::from_note).collect();
    let notes_bytes = serde_json::to_vec(&records).map(|v| v.len() as u64).unwrap_or(0);

    let media_bytes: u64 = attachment_paths
        .iter()
        .map(|path| {
            fs::metadata(path)
                .map(|m| m.len())
                .unwrap_or(MISSING_FILE_SIZE_ESTIMATE)
        })
        .sum();

    ExportSummary {
        note_count: notes.len(),
        media_file_count: attachment_paths.len(),
        estimated_size_bytes: notes_bytes + media_bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn sample_note(title: &str) -> Note {
        Note::new(title, "body")
    }

    #[test]
    fn test_record_flattens_attachments_by_kind() {
        let mut note = Note::new("t", "c");
        note.attachments = vec![
            crate::Attachment {
                id: "a1".into(),
                name: "pic.png".into(),
                relative_path: "n_1.png".into(),
                mime_type: None,
                size_bytes: None,
                kind: AttachmentKind::Image,
                created_at: note.created_at,
                duration_seconds: None,
            },
            crate::Attachment {
                id: "a2".into(),
                name: "memo.m4a".into(),
                relative_path: "n_2.m4a".into(),
                mime_type: None,
                size_bytes: None,
                kind: AttachmentKind::Voice,
                created_at: note.created_at,
                duration_seconds: Some(4.5),
            },
        ];

        let record = ArchiveNoteRecord::from_note(&note);
        assert_eq!(record.images, vec!["n_1.png"]);
        assert_eq!(record.voice_notes, vec!["n_2.m4a"]);
    }

    #[test]
    fn test_record_uses_camel_case_wire_names() {
        let record = ArchiveNoteRecord::from_note(&sample_note("t"));
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"createdAt\""));
        assert!(json.contains("\"voiceNotes\""));
        assert!(json.contains("\"pinned\""));
    }

    #[test]
    fn test_export_writes_notes_and_media_entries() {
        let temp = TempDir::new().unwrap();
        let media = temp.path().join("photo.png");
        fs::write(&media, b"png bytes").unwrap();

        let notes = vec![sample_note("One"), sample_note("Two")];
        let archive_path = export_to_archive(
            &notes,
            &[media],
            Some("test-export-writes-entries.zip"),
        )
        .unwrap();

        let mut archive = ZipArchive::new(fs::File::open(&archive_path).unwrap()).unwrap();

        let mut json = String::new();
        archive
            .by_name("notes.json")
            .unwrap()
            .read_to_string(&mut json)
            .unwrap();
        let records: Vec<ArchiveNoteRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(records.len(), 2);

        let mut payload = Vec::new();
        archive
            .by_name("media/photo.png")
            .unwrap()
            .read_to_end(&mut payload)
            .unwrap();
        assert_eq!(payload, b"png bytes");

        fs::remove_file(archive_path).unwrap();
    }

    #[test]
    fn test_export_silently_skips_missing_media() {
        let notes = vec![sample_note("One")];
        let archive_path = export_to_archive(
            &notes,
            &[PathBuf::from("/nonexistent/gone.png")],
            Some("test-export-skips-missing.zip"),
        )
        .unwrap();

        let mut archive = ZipArchive::new(fs::File::open(&archive_path).unwrap()).unwrap();
        let media_entries = (0..archive.len())
            .filter(|&i| archive.by_index(i).unwrap().name().starts_with("media/"))
            .count();
        assert_eq!(media_entries, 0);

        fs::remove_file(archive_path).unwrap();
    }

    #[test]
    fn test_export_single_note_round_trips() {
        let note = sample_note("Single");
        let path = export_single_note(&note).unwrap();

        let record: ArchiveNoteRecord =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(record.id, note.id);
        assert_eq!(record.title, "Single");

        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_summary_uses_actual_size_and_fallback() {
        let temp = TempDir::new().unwrap();
        let media = temp.path().join("a.png");
        fs::write(&media, vec![0u8; 1_000]).unwrap();

        let notes = vec![sample_note("One")];
        let paths = vec![media, PathBuf::from("/nonexistent/b.png")];
        let summary = summarize_export(&notes, &paths);

        assert_eq!(summary.note_count, 1);
        assert_eq!(summary.media_file_count, 2);
        // 1000 actual + 256 KiB fallback + the notes document itself.
        assert!(summary.estimated_size_bytes > 1_000 + MISSING_FILE_SIZE_ESTIMATE);
    }
}
