use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of payload an attachment file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    File,
    Voice,
}

/// A reference to a physical file owned by a [`Note`].
///
/// The `relative_path` is the join key to the file under the attachment
/// store root; the file itself is managed by
/// [`AttachmentStore`](crate::AttachmentStore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Unique within the owning note.
    pub id: String,
    /// Original file name at the time the attachment was stored.
    pub name: String,
    /// Location under the attachment store root.
    pub relative_path: String,
    /// Inferred from the extension when not supplied.
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Refreshed lazily from the file system; `None` until known.
    #[serde(default)]
    pub size_bytes: Option<u64>,
    pub kind: AttachmentKind,
    pub created_at: DateTime<Utc>,
    /// Playback length for voice attachments; `None` for other kinds.
    #[serde(default)]
    pub duration_seconds: Option<f64>,
}

/// A titled text record with optional folder, tags, and attachments.
///
/// Notes are immutable snapshots: every mutation goes through a `with_*`
/// method that returns a fresh copy with `updated_at` refreshed. The `id`
/// is assigned at creation and never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Always `>= created_at`; refreshed on every content-changing copy.
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub folder: Option<String>,
    /// Normalized: trimmed, lowercased, deduplicated, sorted.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub pinned: bool,
    /// Insertion order is significant for display.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Note {
    /// Creates a note with a fresh UUID id and both timestamps set to now.
    pub fn new(title: &str, content: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            content: content.to_string(),
            created_at: now,
            updated_at: now,
            folder: None,
            tags: Vec::new(),
            pinned: false,
            attachments: Vec::new(),
        }
    }

    /// Creates an empty untitled note.
    pub fn blank() -> Self {
        Self::new("", "")
    }

    pub fn with_title(&self, title: &str) -> Self {
        let mut note = self.touched();
        note.title = title.to_string();
        note
    }

    pub fn with_content(&self, content: &str) -> Self {
        let mut note = self.touched();
        note.content = content.to_string();
        note
    }

    pub fn with_folder(&self, folder: Option<String>) -> Self {
        let mut note = self.touched();
        note.folder = folder;
        note
    }

    /// Replaces the tag set. Tags are normalized before storage.
    pub fn with_tags(&self, tags: Vec<String>) -> Self {
        let mut note = self.touched();
        note.tags = normalize_tags(tags);
        note
    }

    pub fn with_pinned(&self, pinned: bool) -> Self {
        let mut note = self.touched();
        note.pinned = pinned;
        note
    }

    /// Replaces the attachment list, preserving the given display order.
    pub fn with_attachments(&self, attachments: Vec<Attachment>) -> Self {
        let mut note = self.touched();
        note.attachments = attachments;
        note
    }

    /// Appends one attachment at the end of the display order.
    pub fn push_attachment(&self, attachment: Attachment) -> Self {
        let mut note = self.touched();
        note.attachments.push(attachment);
        note
    }

    // Fresh snapshot with updated_at refreshed, never moving before created_at.
    fn touched(&self) -> Self {
        let mut note = self.clone();
        note.updated_at = Utc::now().max(note.created_at);
        note
    }
}

/// Normalizes a tag list: trimmed, lowercased, empty entries removed,
/// deduplicated, sorted.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = tags
        .into_iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    normalized.sort();
    normalized.dedup();
    normalized
}
