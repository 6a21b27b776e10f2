//! Aggregate storage statistics for the settings screen.
//!
//! [`StorageStats`] is computed by a single full scan in
//! [`NoteStore::stats`](crate::NoteStore::stats); nothing here is cached or
//! persisted, so the numbers are always consistent with the live note set.
//!
//! ## Serialization
//!
//! Fields serialize in camelCase (`noteCount`, `imageCount`, …), consistent
//! with all other return types crossing the mobile bridge:
//!
//! ```rust
//! use driftnotes_core::StorageStats;
//!
//! let stats = StorageStats::default();
//! let json = serde_json::to_string(&stats).unwrap();
//! assert!(json.contains("noteCount"));
//! assert!(json.contains("totalCharacters"));
//! ```

use serde::{Deserialize, Serialize};

/// Aggregate counts over the full note set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    /// Total number of notes in the store.
    pub note_count: usize,

    /// Number of distinct folder labels in use.
    pub folder_count: usize,

    /// Number of distinct tags in use.
    pub tag_count: usize,

    /// Number of image attachments across all notes.
    pub image_count: usize,

    /// Number of generic file attachments across all notes.
    pub file_count: usize,

    /// Number of voice attachments across all notes.
    pub voice_count: usize,

    /// Total character count of all note content.
    pub total_characters: usize,
}

impl StorageStats {
    /// Total attachment count across all kinds.
    #[must_use]
    pub fn attachment_count(&self) -> usize {
        self.image_count + self.file_count + self.voice_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_count_sums_kinds() {
        let stats = StorageStats {
            image_count: 2,
            file_count: 1,
            voice_count: 3,
            ..Default::default()
        };
        assert_eq!(stats.attachment_count(), 6);
    }

    #[test]
    fn test_serialization_round_trip() {
        let stats = StorageStats {
            note_count: 5,
            folder_count: 2,
            tag_count: 4,
            image_count: 1,
            file_count: 0,
            voice_count: 1,
            total_characters: 120,
        };
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"folderCount\":2"));
        let parsed: StorageStats = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, stats);
    }
}
