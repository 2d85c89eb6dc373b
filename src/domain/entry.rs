//! Journal entry records.
//!
//! An `Entry` is one committed journal recording: capture metadata, the
//! artifact paths, the transcript, and its tag associations. The store
//! assigns ids on insert; everything else is supplied by the pipeline.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// A committed journal entry, as read back from the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    /// Store-assigned identifier
    pub id: i64,

    /// Optional user title (defaulted from the capture date on commit)
    pub title: Option<String>,

    /// Capture date, `YYYY-MM-DD`
    pub date: String,

    /// Capture time, `HH:MM:SS`
    pub time: String,

    /// Path of the raw captured artifact
    pub original_path: String,

    /// Path of the compressed copy, if compression succeeded
    pub compressed_path: Option<String>,

    /// Transcript text (real or fallback placeholder)
    pub transcription: Option<String>,

    /// Recording length in whole seconds
    pub duration: Option<i64>,

    /// Size of the raw artifact in bytes
    pub file_size: Option<i64>,

    /// Size of the compressed artifact in bytes
    pub compressed_size: Option<i64>,

    /// Server-assigned creation timestamp (set once on insert)
    pub created_at: String,

    /// Linked tag names
    pub tags: Vec<String>,
}

/// The fields the pipeline supplies when committing a new entry.
///
/// Identity and `created_at` are assigned by the store; tags travel
/// separately so the store can link them transactionally.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryDraft {
    pub title: Option<String>,
    pub date: String,
    pub time: String,
    pub original_path: String,
    pub compressed_path: Option<String>,
    pub transcription: Option<String>,
    pub duration: Option<i64>,
    pub file_size: Option<i64>,
    pub compressed_size: Option<i64>,
}

impl EntryDraft {
    /// Start a draft from a capture timestamp and the persisted raw path.
    pub fn new(captured_at: DateTime<Local>, original_path: String) -> Self {
        Self {
            date: captured_at.format("%Y-%m-%d").to_string(),
            time: captured_at.format("%H:%M:%S").to_string(),
            original_path,
            ..Default::default()
        }
    }

    /// Title used when the capture source supplied none.
    pub fn default_title(&self) -> String {
        format!("Entry {}", self.date)
    }
}

/// A partial update to an entry.
///
/// One optional slot per mutable field; the store applies only the slots
/// that are present. A present `tags` slot replaces the entry's whole tag
/// set. `id` and `created_at` are immutable and have no slot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryPatch {
    pub title: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub compressed_path: Option<String>,
    pub transcription: Option<String>,
    pub duration: Option<i64>,
    pub file_size: Option<i64>,
    pub compressed_size: Option<i64>,
    pub tags: Option<Vec<String>>,
}

impl EntryPatch {
    /// True when no slot is present (the store rejects such a patch).
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.date.is_none()
            && self.time.is_none()
            && self.compressed_path.is_none()
            && self.transcription.is_none()
            && self.duration.is_none()
            && self.file_size.is_none()
            && self.compressed_size.is_none()
            && self.tags.is_none()
    }
}

/// A tag row: a short label, unique by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// What `delete_entry` hands back so the caller can reclaim disk space.
///
/// The store itself never touches the filesystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedEntry {
    /// Number of entry rows removed (always 1 on success)
    pub changed: usize,

    /// Raw artifact path at delete time
    pub original_path: String,

    /// Compressed artifact path at delete time, if any
    pub compressed_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_draft_splits_capture_timestamp() {
        let captured = Local.with_ymd_and_hms(2025, 3, 9, 21, 4, 5).unwrap();
        let draft = EntryDraft::new(captured, "/tmp/raw.webm".to_string());

        assert_eq!(draft.date, "2025-03-09");
        assert_eq!(draft.time, "21:04:05");
        assert_eq!(draft.original_path, "/tmp/raw.webm");
        assert!(draft.title.is_none());
    }

    #[test]
    fn test_default_title_comes_from_date() {
        let captured = Local.with_ymd_and_hms(2025, 3, 9, 21, 4, 5).unwrap();
        let draft = EntryDraft::new(captured, "/tmp/raw.webm".to_string());

        assert_eq!(draft.default_title(), "Entry 2025-03-09");
    }

    #[test]
    fn test_patch_emptiness() {
        assert!(EntryPatch::default().is_empty());

        let patch = EntryPatch {
            tags: Some(vec!["work".to_string()]),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
