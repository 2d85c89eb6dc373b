//! Main orchestrator for entry processing.
//!
//! Sequences the stages for one captured artifact: persist raw,
//! transcribe, compress, tag, commit. Stages are strictly sequential per
//! entry and never re-entered; different entries may be processed
//! concurrently against the same store. A pipeline that has persisted
//! its raw bytes always ends in either a committed entry or a reported
//! fatal failure; there is no mid-pipeline abort.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{probe_duration, Compressor, EncodingProfile, Transcriber};
use crate::domain::{EntryDraft, PipelineReport, Stage, StageOutcome, FALLBACK_TRANSCRIPT};
use crate::store::{ArtifactStore, EntryStore, StoreError};

/// Fatal pipeline failures.
///
/// Transcription and compression failures are *not* here: they degrade
/// and the entry still commits.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Raw artifact persistence failed; nothing was stored anywhere.
    #[error("Failed to persist raw capture: {0:#}")]
    PersistRaw(anyhow::Error),

    /// The store commit failed; the artifact files remain on disk but are
    /// not indexed.
    #[error("Failed to commit entry for {original_path}: {source}")]
    Commit {
        original_path: String,
        #[source]
        source: StoreError,
    },
}

/// Main entry-processing orchestrator.
pub struct Orchestrator {
    artifacts: ArtifactStore,
    transcriber: Arc<dyn Transcriber>,
    compressor: Arc<dyn Compressor>,
    store: Arc<EntryStore>,

    /// Default encoding profile for the compression stage
    profile: EncodingProfile,

    /// ffprobe location for the best-effort duration probe
    ffprobe: PathBuf,
}

impl Orchestrator {
    pub fn new(
        artifacts: ArtifactStore,
        transcriber: Arc<dyn Transcriber>,
        compressor: Arc<dyn Compressor>,
        store: Arc<EntryStore>,
        profile: EncodingProfile,
        ffprobe: PathBuf,
    ) -> Self {
        Self {
            artifacts,
            transcriber,
            compressor,
            store,
            profile,
            ffprobe,
        }
    }

    /// Process one capture end to end.
    ///
    /// Raw persistence failure and commit failure are fatal; everything
    /// in between degrades to a documented fallback and the entry still
    /// commits.
    #[instrument(skip(self, raw_bytes), fields(bytes = raw_bytes.len()))]
    pub async fn process(
        &self,
        raw_bytes: &[u8],
        captured_at: DateTime<Local>,
    ) -> Result<PipelineReport, PipelineError> {
        let run_id = Uuid::new_v4();
        info!(%run_id, "Starting entry pipeline");

        // Step 1: persist raw bytes. Fatal on failure; no store row.
        let original_path = self
            .artifacts
            .save_raw(raw_bytes, captured_at)
            .await
            .map_err(PipelineError::PersistRaw)?;
        info!(stage = Stage::PersistRaw.name(), path = %original_path.display(), "Raw capture persisted");

        let mut draft = EntryDraft::new(captured_at, original_path.display().to_string());
        draft.file_size = Some(raw_bytes.len() as i64);

        // Step 2: transcribe. Never fatal; falls back to the placeholder.
        let transcription_outcome = match self.transcriber.transcribe(&original_path).await {
            Ok(text) => {
                draft.transcription = Some(text);
                StageOutcome::Succeeded
            }
            Err(e) => {
                warn!(stage = Stage::Transcribe.name(), error = %e, "Transcription failed, using placeholder");
                draft.transcription = Some(FALLBACK_TRANSCRIPT.to_string());
                StageOutcome::from_error(&e)
            }
        };

        // Step 3: compress. Never fatal; the entry proceeds with only the
        // original artifact.
        let compression_outcome = match self
            .compressor
            .compress(&original_path, &self.profile)
            .await
        {
            Ok(compressed) => {
                draft.compressed_path = Some(compressed.path.display().to_string());
                draft.compressed_size = Some(compressed.size as i64);
                StageOutcome::Succeeded
            }
            Err(e) => {
                warn!(stage = Stage::Compress.name(), error = %e, "Compression failed, keeping original only");
                StageOutcome::from_error(&e)
            }
        };

        // Step 4: tag extraction over the (real or placeholder) transcript.
        let tags = crate::core::tags::extract_tags(draft.transcription.as_deref().unwrap_or(""));

        // Best-effort duration probe; unknown is fine.
        draft.duration = probe_duration(&self.ffprobe, &original_path).await;

        if draft.title.is_none() {
            draft.title = Some(draft.default_title());
        }

        // Step 5: commit. The only fatal failure after bytes are durable.
        let entry_id = match self.store.create_entry(&draft, &tags).await {
            Ok(id) => id,
            Err(e) => {
                error!(stage = Stage::Commit.name(), error = %e, "Entry commit failed");
                return Err(PipelineError::Commit {
                    original_path: draft.original_path,
                    source: e,
                });
            }
        };

        info!(
            entry_id,
            degraded_transcription = transcription_outcome.is_degraded(),
            degraded_compression = compression_outcome.is_degraded(),
            "Entry committed"
        );

        Ok(PipelineReport {
            run_id,
            entry_id,
            original_path: draft.original_path,
            transcription: transcription_outcome,
            compression: compression_outcome,
            compressed_path: draft.compressed_path,
            tags,
        })
    }

    /// The store this orchestrator commits into.
    pub fn store(&self) -> &Arc<EntryStore> {
        &self.store
    }
}
