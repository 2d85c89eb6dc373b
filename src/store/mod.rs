//! Persistent relational store for entries, tags, and their relation.
//!
//! The store exclusively owns the `entries`, `tags` and `entry_tags`
//! tables. All writes go through one connection guarded by an async
//! mutex, so multi-row writes (entry + tag links) are atomic and reads
//! never observe a half-committed tag set. The store never touches media
//! files; `delete_entry` returns their paths so the caller can.

pub mod artifacts;

use std::path::Path;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, ToSql, Transaction};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::domain::{DeletedEntry, Entry, EntryDraft, EntryPatch, Tag};

pub use artifacts::ArtifactStore;

/// Errors from store operations.
///
/// Callers branch on the variant, never on message text: "entity does
/// not exist" and "nothing to update" and "engine error" are distinct.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Entry not found: {0}")]
    NotFound(i64),

    #[error("No valid fields to update")]
    EmptyPatch,

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT,
    date TEXT NOT NULL,
    time TEXT NOT NULL,
    original_path TEXT NOT NULL,
    compressed_path TEXT,
    transcription TEXT,
    duration INTEGER,
    file_size INTEGER,
    compressed_size INTEGER,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS entry_tags (
    entry_id INTEGER,
    tag_id INTEGER,
    PRIMARY KEY (entry_id, tag_id),
    FOREIGN KEY (entry_id) REFERENCES entries (id) ON DELETE CASCADE,
    FOREIGN KEY (tag_id) REFERENCES tags (id) ON DELETE CASCADE
);
"#;

const ENTRY_COLUMNS: &str = "id, title, date, time, original_path, compressed_path, \
     transcription, duration, file_size, compressed_size, created_at";

/// SQLite-backed entry store.
///
/// Constructed explicitly at startup and shared (via `Arc`) with the
/// orchestrator; there is no ambient global handle.
pub struct EntryStore {
    conn: Mutex<Connection>,
}

impl EntryStore {
    /// Open (or create) the store at `path`.
    ///
    /// Schema creation happens inside this call; on any failure no handle
    /// is returned and nothing is left half-initialized.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        // Cascade deletes depend on foreign-key enforcement
        conn.pragma_update(None, "foreign_keys", &true)?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert an entry and link its tags, atomically.
    ///
    /// Either the entry row and every tag link exist afterwards, or none
    /// do. Tags are created on first use.
    pub async fn create_entry(
        &self,
        draft: &EntryDraft,
        tags: &[String],
    ) -> Result<i64, StoreError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO entries (
                title, date, time, original_path, compressed_path,
                transcription, duration, file_size, compressed_size
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                draft.title,
                draft.date,
                draft.time,
                draft.original_path,
                draft.compressed_path,
                draft.transcription,
                draft.duration,
                draft.file_size,
                draft.compressed_size,
            ],
        )?;
        let entry_id = tx.last_insert_rowid();

        link_tags(&tx, entry_id, tags)?;

        tx.commit()?;
        Ok(entry_id)
    }

    /// Apply a partial update.
    ///
    /// Only present slots are written. A present `tags` slot replaces the
    /// entry's whole tag set (delete-all-then-reinsert) in the same
    /// transaction. An empty patch is an error distinct from not-found.
    /// Returns the number of entry rows the field update changed (0 for a
    /// tags-only patch).
    pub async fn update_entry(&self, id: i64, patch: &EntryPatch) -> Result<usize, StoreError> {
        if patch.is_empty() {
            return Err(StoreError::EmptyPatch);
        }

        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let exists: Option<i64> = tx
            .query_row("SELECT id FROM entries WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        if exists.is_none() {
            return Err(StoreError::NotFound(id));
        }

        let mut sets: Vec<&'static str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        macro_rules! slot {
            ($field:ident, $column:literal) => {
                if let Some(ref value) = patch.$field {
                    sets.push(concat!($column, " = ?"));
                    values.push(Box::new(value.clone()));
                }
            };
        }

        slot!(title, "title");
        slot!(date, "date");
        slot!(time, "time");
        slot!(compressed_path, "compressed_path");
        slot!(transcription, "transcription");
        slot!(duration, "duration");
        slot!(file_size, "file_size");
        slot!(compressed_size, "compressed_size");

        let changed = if sets.is_empty() {
            0
        } else {
            values.push(Box::new(id));
            let sql = format!("UPDATE entries SET {} WHERE id = ?", sets.join(", "));
            tx.execute(&sql, params_from_iter(values.iter().map(|v| &**v)))?
        };

        if let Some(ref tags) = patch.tags {
            tx.execute("DELETE FROM entry_tags WHERE entry_id = ?1", params![id])?;
            link_tags(&tx, id, tags)?;
        }

        tx.commit()?;
        Ok(changed)
    }

    /// Fetch one entry with its joined tag names.
    pub async fn get_entry(&self, id: i64) -> Result<Entry, StoreError> {
        let conn = self.conn.lock().await;

        let entry = conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?1"),
                params![id],
                entry_from_row,
            )
            .optional()?;

        match entry {
            Some(mut entry) => {
                entry.tags = tags_for_entry(&conn, id)?;
                Ok(entry)
            }
            None => Err(StoreError::NotFound(id)),
        }
    }

    /// List entries, most recent capture first (date desc, then time desc).
    pub async fn list_entries(&self, limit: i64, offset: i64) -> Result<Vec<Entry>, StoreError> {
        let conn = self.conn.lock().await;

        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries
             ORDER BY date DESC, time DESC
             LIMIT ?1 OFFSET ?2"
        ))?;
        let entries: Vec<Entry> = stmt
            .query_map(params![limit, offset], entry_from_row)?
            .collect::<rusqlite::Result<_>>()?;

        attach_tags(&conn, entries)
    }

    /// Remove an entry; cascades to its tag links.
    ///
    /// Returns the artifact paths that existed at delete time so the
    /// caller can reclaim disk space. A second delete reports not-found.
    pub async fn delete_entry(&self, id: i64) -> Result<DeletedEntry, StoreError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let paths: Option<(String, Option<String>)> = tx
            .query_row(
                "SELECT original_path, compressed_path FROM entries WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (original_path, compressed_path) = match paths {
            Some(paths) => paths,
            None => return Err(StoreError::NotFound(id)),
        };

        let changed = tx.execute("DELETE FROM entries WHERE id = ?1", params![id])?;
        tx.commit()?;

        Ok(DeletedEntry {
            changed,
            original_path,
            compressed_path,
        })
    }

    /// Case-insensitive substring search over title, transcript, and
    /// linked tag names. Same ordering as `list_entries`.
    pub async fn search_entries(&self, term: &str) -> Result<Vec<Entry>, StoreError> {
        let conn = self.conn.lock().await;
        let pattern = format!("%{term}%");

        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries e
             WHERE e.title LIKE ?1
                OR e.transcription LIKE ?1
                OR EXISTS (
                    SELECT 1 FROM tags t
                    JOIN entry_tags et ON t.id = et.tag_id
                    WHERE et.entry_id = e.id AND t.name LIKE ?1
                )
             ORDER BY e.date DESC, e.time DESC"
        ))?;
        let entries: Vec<Entry> = stmt
            .query_map(params![pattern], entry_from_row)?
            .collect::<rusqlite::Result<_>>()?;

        attach_tags(&conn, entries)
    }

    /// All tags, alphabetical by name.
    pub async fn list_tags(&self) -> Result<Vec<Tag>, StoreError> {
        let conn = self.conn.lock().await;

        let mut stmt = conn.prepare("SELECT id, name FROM tags ORDER BY name")?;
        let tags = stmt
            .query_map([], |row| {
                Ok(Tag {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<_>>()?;

        Ok(tags)
    }

    /// Number of entry rows.
    pub async fn count_entries(&self) -> Result<i64, StoreError> {
        let conn = self.conn.lock().await;
        let count = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count)
    }
}

/// Insert-if-absent each tag, resolve its id, insert-if-absent the link.
/// Runs inside the caller's transaction.
fn link_tags(tx: &Transaction<'_>, entry_id: i64, tags: &[String]) -> Result<(), StoreError> {
    for name in tags {
        tx.execute("INSERT OR IGNORE INTO tags (name) VALUES (?1)", params![name])?;
        let tag_id: i64 = tx.query_row(
            "SELECT id FROM tags WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT OR IGNORE INTO entry_tags (entry_id, tag_id) VALUES (?1, ?2)",
            params![entry_id, tag_id],
        )?;
    }
    Ok(())
}

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Entry> {
    Ok(Entry {
        id: row.get(0)?,
        title: row.get(1)?,
        date: row.get(2)?,
        time: row.get(3)?,
        original_path: row.get(4)?,
        compressed_path: row.get(5)?,
        transcription: row.get(6)?,
        duration: row.get(7)?,
        file_size: row.get(8)?,
        compressed_size: row.get(9)?,
        created_at: row.get(10)?,
        tags: Vec::new(),
    })
}

fn tags_for_entry(conn: &Connection, entry_id: i64) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT t.name FROM tags t
         JOIN entry_tags et ON t.id = et.tag_id
         WHERE et.entry_id = ?1",
    )?;
    let names = stmt
        .query_map(params![entry_id], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;
    Ok(names)
}

fn attach_tags(conn: &Connection, mut entries: Vec<Entry>) -> Result<Vec<Entry>, StoreError> {
    for entry in &mut entries {
        entry.tags = tags_for_entry(conn, entry.id)?;
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn draft(date: &str, time: &str) -> EntryDraft {
        EntryDraft {
            date: date.to_string(),
            time: time.to_string(),
            original_path: format!("/tmp/{date}_{time}.webm"),
            ..Default::default()
        }
    }

    async fn open_store(temp: &TempDir) -> EntryStore {
        EntryStore::open(&temp.path().join("haven.db")).unwrap()
    }

    #[tokio::test]
    async fn test_tag_rows_created_on_first_use_only() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp).await;

        store
            .create_entry(&draft("2025-01-01", "08:00:00"), &["calm".to_string()])
            .await
            .unwrap();
        store
            .create_entry(
                &draft("2025-01-02", "08:00:00"),
                &["calm".to_string(), "work".to_string()],
            )
            .await
            .unwrap();

        let tags = store.list_tags().await.unwrap();
        let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["calm", "work"]);
    }

    #[tokio::test]
    async fn test_tag_names_are_case_sensitive() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp).await;

        store
            .create_entry(
                &draft("2025-01-01", "08:00:00"),
                &["Work".to_string(), "work".to_string()],
            )
            .await
            .unwrap();

        let tags = store.list_tags().await.unwrap();
        assert_eq!(tags.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_patch_is_distinct_from_not_found() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp).await;

        let id = store
            .create_entry(&draft("2025-01-01", "08:00:00"), &[])
            .await
            .unwrap();

        let err = store.update_entry(id, &EntryPatch::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::EmptyPatch));

        let err = store
            .update_entry(
                9999,
                &EntryPatch {
                    title: Some("x".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(9999)));
    }

    #[tokio::test]
    async fn test_count_entries() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp).await;

        assert_eq!(store.count_entries().await.unwrap(), 0);
        store
            .create_entry(&draft("2025-01-01", "08:00:00"), &[])
            .await
            .unwrap();
        assert_eq!(store.count_entries().await.unwrap(), 1);
    }
}
