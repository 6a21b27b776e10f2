//! Error types for the Driftnotes core library.

use thiserror::Error;

/// All errors that can occur within the Driftnotes core library.
#[derive(Debug, Error)]
pub enum DriftnotesError {
    /// A SQLite operation failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// An I/O operation on the filesystem failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored or imported note data could not be (de)serialized from JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading or writing a backup archive failed at the container level.
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The source file handed to the attachment store does not exist.
    #[error("Source file not found: {0}")]
    SourceNotFound(String),

    /// A note ID was requested that does not exist in the store.
    #[error("Note not found: {0}")]
    NoteNotFound(String),

    /// A note failed an invariant check when trying to save it.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// The opened database is not a valid Driftnotes note store.
    #[error("Invalid note store: {0}")]
    InvalidStore(String),

    /// The file is not a recognized backup archive, or lacks its notes document.
    #[error("Invalid backup archive: {0}")]
    ArchiveFormat(String),
}

/// Convenience alias that pins the error type to [`DriftnotesError`].
pub type Result<T> = std::result::Result<T, DriftnotesError>;

impl DriftnotesError {
    /// Returns a short, human-readable message suitable for display to the end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Database(e) => format!("Failed to save: {e}"),
            Self::Io(e) => format!("File error: {e}"),
            Self::Json(e) => format!("Data format error: {e}"),
            Self::Zip(e) => format!("Archive error: {e}"),
            Self::SourceNotFound(_) => "The selected file no longer exists".to_string(),
            Self::NoteNotFound(_) => "Note no longer exists".to_string(),
            Self::ValidationFailed(msg) => msg.clone(),
            Self::InvalidStore(_) => "Could not open the note store".to_string(),
            Self::ArchiveFormat(msg) => format!("Not a valid backup file: {msg}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_not_found_display() {
        let e = DriftnotesError::SourceNotFound("/tmp/gone.jpg".to_string());
        assert!(e.to_string().contains("/tmp/gone.jpg"));
    }

    #[test]
    fn test_archive_format_user_message() {
        let e = DriftnotesError::ArchiveFormat("missing notes.json".to_string());
        assert!(e.user_message().contains("missing notes.json"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let e: DriftnotesError = io.into();
        assert!(matches!(e, DriftnotesError::Io(_)));
    }
}
