//! Artifact store: raw and derived media files on disk.
//!
//! Owns three independent roots (raw captures, compressed outputs,
//! intermediate audio scratch); none nests inside another. Raw captures
//! are named from the capture timestamp; an identical timestamp
//! overwrites: last write wins, no deduplication. The artifact store
//! never deletes files; cleanup after an entry deletion is the caller's
//! job.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tokio::fs;

/// Filesystem layout for journal artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    /// Root for raw captures
    recordings_dir: PathBuf,

    /// Root for compressed outputs
    compressed_dir: PathBuf,

    /// Root for intermediate audio
    scratch_dir: PathBuf,

    /// Container extension raw captures are stored under
    capture_format: String,
}

impl ArtifactStore {
    /// Create the store, ensuring all three roots exist.
    pub async fn open(
        recordings_dir: PathBuf,
        compressed_dir: PathBuf,
        scratch_dir: PathBuf,
        capture_format: String,
    ) -> Result<Self> {
        for dir in [&recordings_dir, &compressed_dir, &scratch_dir] {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create artifact root: {}", dir.display()))?;
        }

        Ok(Self {
            recordings_dir,
            compressed_dir,
            scratch_dir,
            capture_format,
        })
    }

    pub fn recordings_dir(&self) -> &Path {
        &self.recordings_dir
    }

    pub fn compressed_dir(&self) -> &Path {
        &self.compressed_dir
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// File name a capture taken at `captured_at` is stored under.
    pub fn raw_file_name(&self, captured_at: DateTime<Local>) -> String {
        format!(
            "{}.{}",
            captured_at.format("%Y-%m-%d_%H-%M-%S"),
            self.capture_format
        )
    }

    /// Persist raw capture bytes under a timestamp-derived name.
    pub async fn save_raw(&self, bytes: &[u8], captured_at: DateTime<Local>) -> Result<PathBuf> {
        let path = self.recordings_dir.join(self.raw_file_name(captured_at));

        fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write raw capture: {}", path.display()))?;

        Ok(path)
    }
}
