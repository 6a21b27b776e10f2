//! Physical file custody for attachment payloads.
//!
//! The store owns one directory of binary files. Notes reference files by
//! relative path; nothing in here knows about any specific note's in-memory
//! representation beyond the owning note id used to derive file names.

use crate::{Attachment, AttachmentKind, DriftnotesError, Result};
use chrono::Utc;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Extensions classified as images.
const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "heic", "heif", "svg",
];

/// Extensions classified as voice recordings.
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "m4a", "aac", "flac", "opus"];

/// Static extension → MIME table used when the caller supplies no MIME type.
const MIME_TYPES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("bmp", "image/bmp"),
    ("webp", "image/webp"),
    ("heic", "image/heic"),
    ("heif", "image/heif"),
    ("svg", "image/svg+xml"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("ogg", "audio/ogg"),
    ("m4a", "audio/mp4"),
    ("aac", "audio/aac"),
    ("flac", "audio/flac"),
    ("opus", "audio/opus"),
    ("pdf", "application/pdf"),
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("json", "application/json"),
    ("zip", "application/zip"),
];

/// Classifies an attachment from its file extension.
pub fn kind_for_extension(extension: &str) -> AttachmentKind {
    let ext = extension.to_lowercase();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        AttachmentKind::Image
    } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        AttachmentKind::Voice
    } else {
        AttachmentKind::File
    }
}

/// Looks up the MIME type for an extension; `None` for unknown extensions.
pub fn mime_for_extension(extension: &str) -> Option<&'static str> {
    let ext = extension.to_lowercase();
    MIME_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
}

pub(crate) fn extension_of(file_name: &str) -> Option<String> {
    let ext = file_name.rsplit('.').next()?.trim().to_lowercase();
    if ext.is_empty() || ext == file_name.to_lowercase() || ext.len() >= 10 {
        return None;
    }
    Some(ext)
}

/// Owns the attachment directory and the lifecycle of the files in it.
pub struct AttachmentStore {
    root: PathBuf,
}

impl AttachmentStore {
    /// Binds the store to `root`, creating the directory if absent.
    pub fn new<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copies `source` into the store and returns the populated [`Attachment`].
    ///
    /// The on-disk name is unique by construction: `{note_id}_{millis}.{ext}`
    /// with a numeric suffix appended until the name is free. The kind is
    /// inferred from the extension unless `kind_hint` is given; the MIME type
    /// is inferred unless `mime_type` is given.
    ///
    /// # Errors
    ///
    /// Returns [`DriftnotesError::SourceNotFound`] if `source` does not exist,
    /// or [`DriftnotesError::Io`] if the copy fails.
    pub fn store(
        &self,
        source: &Path,
        note_id: &str,
        kind_hint: Option<AttachmentKind>,
        mime_type: Option<String>,
    ) -> Result<Attachment> {
        if !source.is_file() {
            return Err(DriftnotesError::SourceNotFound(
                source.display().to_string(),
            ));
        }

        let original_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());
        let extension = extension_of(&original_name);

        let relative_path = self.unique_name(note_id, extension.as_deref());
        let destination = self.root.join(&relative_path);
        fs::copy(source, &destination)?;
        let size_bytes = fs::metadata(&destination)?.len();

        let ext = extension.as_deref().unwrap_or("");
        let kind = kind_hint.unwrap_or_else(|| kind_for_extension(ext));
        let mime_type = mime_type.or_else(|| mime_for_extension(ext).map(str::to_string));

        Ok(Attachment {
            id: Uuid::new_v4().to_string(),
            name: original_name,
            relative_path,
            mime_type,
            size_bytes: Some(size_bytes),
            kind,
            created_at: Utc::now(),
            duration_seconds: None,
        })
    }

    /// Writes raw bytes under `file_name` in the store root, overwriting any
    /// previous payload of the same name. Returns the relative path.
    ///
    /// Used by the archive importer; re-extraction of the same archive is
    /// therefore idempotent.
    pub fn store_bytes(&self, file_name: &str, bytes: &[u8]) -> Result<String> {
        fs::write(self.root.join(file_name), bytes)?;
        Ok(file_name.to_string())
    }

    /// Removes the attachment's file if present. Already-absent files are
    /// not an error.
    pub fn delete(&self, attachment: &Attachment) -> Result<()> {
        let path = self.root.join(&attachment.relative_path);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the absolute path of the attachment's file, or `None` if the
    /// file does not exist. Callers must treat this as the existence check.
    pub fn resolve_absolute_path(&self, attachment: &Attachment) -> Option<PathBuf> {
        self.resolve_relative(&attachment.relative_path)
    }

    /// Like [`resolve_absolute_path`](Self::resolve_absolute_path), keyed by
    /// a bare relative path.
    pub fn resolve_relative(&self, relative_path: &str) -> Option<PathBuf> {
        let path = self.root.join(relative_path);
        path.is_file().then_some(path)
    }

    /// Deletes every file under the store root whose relative path is not in
    /// `referenced`, returning the relative paths that were deleted.
    ///
    /// A delete failure for one file is logged and skipped; it does not
    /// abort the scan.
    pub fn collect_orphans(&self, referenced: &HashSet<String>) -> Result<Vec<String>> {
        let mut deleted = Vec::new();
        self.collect_orphans_in(&self.root, referenced, &mut deleted)?;
        Ok(deleted)
    }

    fn collect_orphans_in(
        &self,
        dir: &Path,
        referenced: &HashSet<String>,
        deleted: &mut Vec<String>,
    ) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                self.collect_orphans_in(&path, referenced, deleted)?;
                continue;
            }
            let relative = match path.strip_prefix(&self.root) {
                Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
                Err(_) => continue,
            };
            if referenced.contains(&relative) {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => deleted.push(relative),
                Err(e) => {
                    log::warn!("Failed to delete orphaned attachment '{relative}': {e}");
                }
            }
        }
        Ok(())
    }

    // First name that is free on disk. The timestamp makes collisions rare;
    // the suffix loop makes them impossible.
    fn unique_name(&self, note_id: &str, extension: Option<&str>) -> String {
        let millis = Utc::now().timestamp_millis();
        let mut counter = 0u32;
        loop {
            let stem = if counter == 0 {
                format!("{note_id}_{millis}")
            } else {
                format!("{note_id}_{millis}_{counter}")
            };
            let name = match extension {
                Some(ext) => format!("{stem}.{ext}"),
                None => stem,
            };
            if !self.root.join(&name).exists() {
                return name;
            }
            counter += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_with_source(file_name: &str, contents: &[u8]) -> (TempDir, AttachmentStore, PathBuf) {
        let temp = TempDir::new().unwrap();
        let store = AttachmentStore::new(temp.path().join("attachments")).unwrap();
        let source = temp.path().join(file_name);
        fs::write(&source, contents).unwrap();
        (temp, store, source)
    }

    #[test]
    fn test_store_copies_file_and_classifies_image() {
        let (_temp, store, source) = store_with_source("photo.JPG", b"jpeg bytes");

        let attachment = store.store(&source, "note-1", None, None).unwrap();

        assert_eq!(attachment.name, "photo.JPG");
        assert_eq!(attachment.kind, AttachmentKind::Image);
        assert_eq!(attachment.mime_type.as_deref(), Some("image/jpeg"));
        assert_eq!(attachment.size_bytes, Some(10));
        assert!(attachment.relative_path.starts_with("note-1_"));
        assert!(store.resolve_absolute_path(&attachment).is_some());
    }

    #[test]
    fn test_store_classifies_audio_as_voice() {
        let (_temp, store, source) = store_with_source("memo.m4a", b"audio");
        let attachment = store.store(&source, "n", None, None).unwrap();
        assert_eq!(attachment.kind, AttachmentKind::Voice);
        assert_eq!(attachment.mime_type.as_deref(), Some("audio/mp4"));
    }

    #[test]
    fn test_store_kind_hint_wins_over_inference() {
        let (_temp, store, source) = store_with_source("scan.png", b"png");
        let attachment = store
            .store(&source, "n", Some(AttachmentKind::File), None)
            .unwrap();
        assert_eq!(attachment.kind, AttachmentKind::File);
    }

    #[test]
    fn test_store_unknown_extension_is_generic_file() {
        let (_temp, store, source) = store_with_source("data.xyzzy", b"?");
        let attachment = store.store(&source, "n", None, None).unwrap();
        assert_eq!(attachment.kind, AttachmentKind::File);
        assert_eq!(attachment.mime_type, None);
    }

    #[test]
    fn test_store_missing_source_fails() {
        let temp = TempDir::new().unwrap();
        let store = AttachmentStore::new(temp.path().join("attachments")).unwrap();

        let result = store.store(Path::new("/nonexistent/file.png"), "n", None, None);
        assert!(matches!(
            result,
            Err(crate::DriftnotesError::SourceNotFound(_))
        ));
    }

    #[test]
    fn test_consecutive_stores_get_unique_names() {
        let (_temp, store, source) = store_with_source("a.png", b"x");
        let first = store.store(&source, "same-note", None, None).unwrap();
        let second = store.store(&source, "same-note", None, None).unwrap();
        let third = store.store(&source, "same-note", None, None).unwrap();

        assert_ne!(first.relative_path, second.relative_path);
        assert_ne!(second.relative_path, third.relative_path);
        assert_ne!(first.relative_path, third.relative_path);
    }

    #[test]
    fn test_delete_is_noop_for_absent_file() {
        let (_temp, store, source) = store_with_source("a.png", b"x");
        let attachment = store.store(&source, "n", None, None).unwrap();

        store.delete(&attachment).unwrap();
        assert!(store.resolve_absolute_path(&attachment).is_none());
        // Second delete must not error.
        store.delete(&attachment).unwrap();
    }

    #[test]
    fn test_collect_orphans_keeps_referenced_files() {
        let (_temp, store, source) = store_with_source("a.png", b"x");
        let kept = store.store(&source, "kept", None, None).unwrap();
        let orphan = store.store(&source, "orphan", None, None).unwrap();

        let referenced: HashSet<String> = [kept.relative_path.clone()].into();
        let deleted = store.collect_orphans(&referenced).unwrap();

        assert_eq!(deleted, vec![orphan.relative_path.clone()]);
        assert!(store.resolve_absolute_path(&kept).is_some());
        assert!(store.resolve_absolute_path(&orphan).is_none());
    }

    #[test]
    fn test_store_bytes_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = AttachmentStore::new(temp.path().join("attachments")).unwrap();

        let rel = store.store_bytes("imported.png", b"one").unwrap();
        store.store_bytes("imported.png", b"two").unwrap();

        let path = store.resolve_relative(&rel).unwrap();
        assert_eq!(fs::read(path).unwrap(), b"two");
    }

    #[test]
    fn test_kind_for_extension_table() {
        assert_eq!(kind_for_extension("webp"), AttachmentKind::Image);
        assert_eq!(kind_for_extension("OGG"), AttachmentKind::Voice);
        assert_eq!(kind_for_extension("pdf"), AttachmentKind::File);
        assert_eq!(kind_for_extension(""), AttachmentKind::File);
    }
}
