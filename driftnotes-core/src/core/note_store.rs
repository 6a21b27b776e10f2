//! The authoritative, queryable collection of notes.
//!
//! `NoteStore` combines a [`Storage`] connection with an [`AttachmentStore`]
//! and owns all note semantics: upsert/read/delete with self-healing reads,
//! search, derived folder/tag listings, aggregate statistics, snapshot
//! export, and bulk merge. Each instance is bound to one store directory and
//! expected to be protected by a mutex in the application shell; operations
//! run to completion on the caller's thread.

use crate::core::note::normalize_tags;
use crate::{
    AttachmentKind, AttachmentStore, DriftnotesError, Note, Result, Storage, StorageStats,
};
use rusqlite::Connection;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::mpsc;

/// Database file name under the store directory.
const DB_FILE_NAME: &str = "notes.db";

/// Attachment payload directory under the store directory.
const ATTACHMENTS_DIR: &str = "attachments";

/// An open Driftnotes store backed by a SQLite database and an attachment
/// directory.
pub struct NoteStore {
    storage: Storage,
    attachments: AttachmentStore,
    subscribers: Vec<mpsc::Sender<Vec<Note>>>,
}

impl NoteStore {
    /// Creates (or re-opens) a store rooted at `dir`, initialising the
    /// database schema and the attachment directory.
    ///
    /// # Errors
    ///
    /// Returns [`DriftnotesError::Io`] if the directory cannot be created,
    /// or [`DriftnotesError::Database`] for any SQLite failure.
    pub fn create<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let storage = Storage::create(dir.join(DB_FILE_NAME))?;
        let attachments = AttachmentStore::new(dir.join(ATTACHMENTS_DIR))?;
        Ok(Self {
            storage,
            attachments,
            subscribers: Vec::new(),
        })
    }

    /// Opens an existing store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`DriftnotesError::InvalidStore`] if the database is not a
    /// Driftnotes store, or [`DriftnotesError::Database`] for any SQLite
    /// failure.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let storage = Storage::open(dir.join(DB_FILE_NAME))?;
        let attachments = AttachmentStore::new(dir.join(ATTACHMENTS_DIR))?;
        Ok(Self {
            storage,
            attachments,
            subscribers: Vec::new(),
        })
    }

    /// Returns the attachment store for this note store.
    pub fn attachments(&self) -> &AttachmentStore {
        &self.attachments
    }

    /// Returns the underlying SQLite connection.
    pub fn connection(&self) -> &Connection {
        self.storage.connection()
    }

    /// Inserts or replaces `note` (upsert keyed by id).
    ///
    /// Re-saving an existing id overwrites the record wholesale while
    /// preserving its insertion order; a new id is appended. Tags are
    /// normalised before storage.
    ///
    /// # Errors
    ///
    /// Returns [`DriftnotesError::ValidationFailed`] if the id is empty or
    /// `updated_at` precedes `created_at`, [`DriftnotesError::Json`] if the
    /// note cannot be serialised, or [`DriftnotesError::Database`] for any
    /// SQLite failure.
    pub fn save(&mut self, note: &Note) -> Result<()> {
        self.put(note)?;
        self.notify();
        Ok(())
    }

    // Upsert without notifying subscribers; shared by the save/merge paths.
    fn put(&self, note: &Note) -> Result<()> {
        if note.id.trim().is_empty() {
            return Err(DriftnotesError::ValidationFailed(
                "Note id must not be empty".to_string(),
            ));
        }
        if note.updated_at < note.created_at {
            return Err(DriftnotesError::ValidationFailed(format!(
                "Note '{}' has updated_at before created_at",
                note.title
            )));
        }

        let mut note = note.clone();
        note.tags = normalize_tags(note.tags);
        let payload = serde_json::to_string(&note)?;

        self.storage.connection().execute(
            "INSERT INTO notes (id, updated_at, payload) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                 updated_at = excluded.updated_at,
                 payload = excluded.payload",
            rusqlite::params![note.id, note.updated_at.timestamp_millis(), payload],
        )?;
        Ok(())
    }

    /// Fetches a single note by id, or `None` if absent.
    ///
    /// A persisted record that fails to deserialise is treated as absent and
    /// purged from the index; corruption is never surfaced to read callers.
    /// Attachments whose file no longer exists are dropped from the returned
    /// snapshot.
    pub fn get_by_id(&self, id: &str) -> Result<Option<Note>> {
        let payload: Option<String> = match self.storage.connection().query_row(
            "SELECT payload FROM notes WHERE id = ?1",
            [id],
            |row| row.get(0),
        ) {
            Ok(p) => Some(p),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(e.into()),
        };

        let Some(payload) = payload else {
            return Ok(None);
        };

        match serde_json::from_str::<Note>(&payload) {
            Ok(note) => Ok(Some(self.heal_attachments(note))),
            Err(e) => {
                log::warn!("Purging corrupt note record '{id}': {e}");
                self.storage
                    .connection()
                    .execute("DELETE FROM notes WHERE id = ?1", [id])?;
                Ok(None)
            }
        }
    }

    /// Returns all notes, most recently touched first; ties broken by
    /// insertion order. Corrupt records are purged and skipped.
    pub fn get_all(&self) -> Result<Vec<Note>> {
        let rows: Vec<(String, String)> = {
            let mut stmt = self.storage.connection().prepare(
                "SELECT id, payload FROM notes ORDER BY updated_at DESC, rowid ASC",
            )?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        let mut notes = Vec::with_capacity(rows.len());
        let mut corrupt = Vec::new();
        for (id, payload) in rows {
            match serde_json::from_str::<Note>(&payload) {
                Ok(note) => notes.push(self.heal_attachments(note)),
                Err(e) => {
                    log::warn!("Purging corrupt note record '{id}': {e}");
                    corrupt.push(id);
                }
            }
        }
        for id in &corrupt {
            self.storage
                .connection()
                .execute("DELETE FROM notes WHERE id = ?1", [id])?;
        }

        Ok(notes)
    }

    /// Deletes the note with `id`, then garbage-collects attachment files no
    /// longer referenced by any remaining note.
    ///
    /// The cascade is best-effort: a failure to delete one attachment file
    /// is logged and does not abort deletion of the note or of other files.
    ///
    /// # Errors
    ///
    /// Returns [`DriftnotesError::NoteNotFound`] if no note with `id` exists.
    pub fn delete(&mut self, id: &str) -> Result<()> {
        let changes = self
            .storage
            .connection()
            .execute("DELETE FROM notes WHERE id = ?1", [id])?;
        if changes == 0 {
            return Err(DriftnotesError::NoteNotFound(id.to_string()));
        }

        // Collect against the full remaining reference set, not a per-note
        // blind delete: a file shared by path with another note survives.
        match self.referenced_paths() {
            Ok(referenced) => match self.attachments.collect_orphans(&referenced) {
                Ok(deleted) if !deleted.is_empty() => {
                    log::debug!("Cascade removed {} attachment file(s)", deleted.len());
                }
                Ok(_) => {}
                Err(e) => log::warn!("Attachment cascade after deleting '{id}' failed: {e}"),
            },
            Err(e) => log::warn!("Could not compute attachment references: {e}"),
        }

        self.notify();
        Ok(())
    }

    /// Case-insensitive substring search across title, content, and tags.
    /// An empty term returns all notes.
    pub fn search(&self, term: &str) -> Result<Vec<Note>> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return self.get_all();
        }
        let notes = self
            .get_all()?
            .into_iter()
            .filter(|note| {
                note.title.to_lowercase().contains(&term)
                    || note.content.to_lowercase().contains(&term)
                    || note.tags.iter().any(|t| t.to_lowercase().contains(&term))
            })
            .collect();
        Ok(notes)
    }

    /// Returns all folder labels currently in use, derived by a full scan.
    pub fn folders_in_use(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .get_all()?
            .into_iter()
            .filter_map(|note| note.folder)
            .collect())
    }

    /// Returns all tags currently in use, derived by a full scan.
    pub fn tags_in_use(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .get_all()?
            .into_iter()
            .flat_map(|note| note.tags)
            .collect())
    }

    /// Computes aggregate statistics over the full note set in one scan.
    pub fn stats(&self) -> Result<StorageStats> {
        let notes = self.get_all()?;
        let mut stats = StorageStats {
            note_count: notes.len(),
            ..Default::default()
        };
        let mut folders = BTreeSet::new();
        let mut tags = BTreeSet::new();
        for note in &notes {
            if let Some(folder) = &note.folder {
                folders.insert(folder.clone());
            }
            for tag in &note.tags {
                tags.insert(tag.clone());
            }
            for attachment in &note.attachments {
                match attachment.kind {
                    AttachmentKind::Image => stats.image_count += 1,
                    AttachmentKind::File => stats.file_count += 1,
                    AttachmentKind::Voice => stats.voice_count += 1,
                }
            }
            stats.total_characters += note.content.chars().count();
        }
        stats.folder_count = folders.len();
        stats.tag_count = tags.len();
        Ok(stats)
    }

    /// Returns a consistent-at-a-point-in-time list of all notes, suitable
    /// for handing to the archive exporter.
    pub fn export_snapshot(&self) -> Result<Vec<Note>> {
        self.get_all()
    }

    /// Bulk upsert with no conflict logic (overwrite-always). Returns the
    /// number of notes written. Used for the trivial restore-own-backup
    /// path; the conflict-aware path is the archive importer.
    pub fn merge_snapshot(&mut self, notes: &[Note]) -> Result<usize> {
        for note in notes {
            self.put(note)?;
        }
        self.notify();
        Ok(notes.len())
    }

    /// Subscribes to change notifications. After every successful mutation
    /// the current note set (in [`get_all`](Self::get_all) order) is sent to
    /// every live subscriber; disconnected receivers are pruned.
    pub fn subscribe(&mut self) -> mpsc::Receiver<Vec<Note>> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Resolves the absolute paths of every attachment file referenced by
    /// `notes` that exists on disk.
    pub fn attachment_paths(&self, notes: &[Note]) -> Vec<PathBuf> {
        notes
            .iter()
            .flat_map(|note| note.attachments.iter())
            .filter_map(|attachment| self.attachments.resolve_absolute_path(attachment))
            .collect()
    }

    // Relative paths referenced by any note in the store.
    fn referenced_paths(&self) -> Result<HashSet<String>> {
        Ok(self
            .get_all()?
            .into_iter()
            .flat_map(|note| note.attachments)
            .map(|attachment| attachment.relative_path)
            .collect())
    }

    // Drop attachments whose file no longer resolves (stale references).
    fn heal_attachments(&self, mut note: Note) -> Note {
        note.attachments.retain(|attachment| {
            let present = self.attachments.resolve_absolute_path(attachment).is_some();
            if !present {
                log::debug!(
                    "Dropping stale attachment '{}' from note '{}'",
                    attachment.relative_path,
                    note.id
                );
            }
            present
        });
        note
    }

    fn notify(&mut self) {
        if self.subscribers.is_empty() {
            return;
        }
        match self.get_all() {
            Ok(snapshot) => {
                self.subscribers
                    .retain(|subscriber| subscriber.send(snapshot.clone()).is_ok());
            }
            Err(e) => log::warn!("Skipping change notification: {e}"),
        }
    }
}
