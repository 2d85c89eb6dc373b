//! Pipeline Integration Tests
//!
//! Drives the orchestrator end to end with in-test adapters so no
//! external tool is needed: per-stage degradation, the fatal persist
//! path, and concurrent pipelines against one store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, TimeZone};
use haven::adapters::{
    CompressedArtifact, CompressionError, Compressor, EncodingProfile, Transcriber,
    TranscriptionError,
};
use haven::core::{Orchestrator, PipelineError};
use haven::domain::FALLBACK_TRANSCRIPT;
use haven::store::{ArtifactStore, EntryStore};
use tempfile::TempDir;

/// Transcriber that returns fixed text, or fails when given none.
struct FakeTranscriber {
    text: Option<String>,
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _artifact: &Path) -> Result<String, TranscriptionError> {
        match &self.text {
            Some(text) => Ok(text.clone()),
            None => Err(TranscriptionError::Engine("model file missing".to_string())),
        }
    }
}

/// Compressor that writes a small file next to the configured root, or
/// fails on demand.
struct FakeCompressor {
    output_dir: PathBuf,
    fail: bool,
}

#[async_trait]
impl Compressor for FakeCompressor {
    async fn compress(
        &self,
        artifact: &Path,
        profile: &EncodingProfile,
    ) -> Result<CompressedArtifact, CompressionError> {
        if self.fail {
            return Err(CompressionError::Engine("disk full".to_string()));
        }

        let stem = artifact.file_stem().unwrap().to_string_lossy();
        let path = self
            .output_dir
            .join(format!("{}_compressed.{}", stem, profile.format));
        tokio::fs::create_dir_all(&self.output_dir).await?;
        tokio::fs::write(&path, b"compressed bytes").await?;

        Ok(CompressedArtifact { path, size: 16 })
    }
}

struct Fixture {
    orchestrator: Orchestrator,
    store: Arc<EntryStore>,
    _temp: TempDir,
}

async fn fixture(transcript: Option<&str>, compression_fails: bool) -> Fixture {
    let temp = TempDir::new().unwrap();

    let artifacts = ArtifactStore::open(
        temp.path().join("recordings"),
        temp.path().join("compressed"),
        temp.path().join("scratch"),
        "webm".to_string(),
    )
    .await
    .unwrap();

    let store = Arc::new(EntryStore::open(&temp.path().join("haven.db")).unwrap());

    let orchestrator = Orchestrator::new(
        artifacts,
        Arc::new(FakeTranscriber {
            text: transcript.map(str::to_string),
        }),
        Arc::new(FakeCompressor {
            output_dir: temp.path().join("compressed"),
            fail: compression_fails,
        }),
        Arc::clone(&store),
        EncodingProfile::default(),
        PathBuf::from("/nonexistent/ffprobe"),
    );

    Fixture {
        orchestrator,
        store,
        _temp: temp,
    }
}

#[tokio::test]
async fn test_clean_run_commits_full_entry() {
    let fx = fixture(Some("Planning the week, feeling #focused"), false).await;
    let captured = Local.with_ymd_and_hms(2025, 3, 9, 21, 4, 5).unwrap();

    let report = fx
        .orchestrator
        .process(b"raw capture bytes", captured)
        .await
        .unwrap();

    assert!(report.is_clean());
    assert_eq!(report.tags, vec!["focused"]);

    let entry = fx.store.get_entry(report.entry_id).await.unwrap();
    assert_eq!(entry.date, "2025-03-09");
    assert_eq!(entry.time, "21:04:05");
    assert_eq!(entry.title.as_deref(), Some("Entry 2025-03-09"));
    assert_eq!(
        entry.transcription.as_deref(),
        Some("Planning the week, feeling #focused")
    );
    assert_eq!(entry.file_size, Some(17));
    assert_eq!(entry.tags, vec!["focused"]);

    // Raw bytes are durable under the timestamp-derived name
    let raw = tokio::fs::read(&entry.original_path).await.unwrap();
    assert_eq!(raw, b"raw capture bytes");
    assert!(entry.original_path.ends_with("2025-03-09_21-04-05.webm"));
}

#[tokio::test]
async fn test_transcription_failure_degrades_to_placeholder() {
    let fx = fixture(None, false).await;
    let captured = Local.with_ymd_and_hms(2025, 3, 9, 21, 4, 5).unwrap();

    let report = fx
        .orchestrator
        .process(b"raw capture bytes", captured)
        .await
        .unwrap();

    assert!(report.transcription.is_degraded());
    assert!(!report.compression.is_degraded());

    let entry = fx.store.get_entry(report.entry_id).await.unwrap();
    assert_eq!(entry.transcription.as_deref(), Some(FALLBACK_TRANSCRIPT));

    // Compression still ran: path set and distinct from the original
    let compressed = entry.compressed_path.expect("compressed path set");
    assert_ne!(compressed, entry.original_path);
    assert!(PathBuf::from(&compressed).exists());

    // The placeholder has no hashtags
    assert!(entry.tags.is_empty());
}

#[tokio::test]
async fn test_compression_failure_keeps_original_only() {
    let fx = fixture(Some("short note about #work"), true).await;
    let captured = Local.with_ymd_and_hms(2025, 3, 9, 21, 4, 5).unwrap();

    let report = fx
        .orchestrator
        .process(b"raw capture bytes", captured)
        .await
        .unwrap();

    assert!(!report.transcription.is_degraded());
    assert!(report.compression.is_degraded());
    assert!(report.compressed_path.is_none());

    let entry = fx.store.get_entry(report.entry_id).await.unwrap();
    assert!(entry.compressed_path.is_none());
    assert!(entry.compressed_size.is_none());
    assert_eq!(entry.tags, vec!["work"]);
}

#[tokio::test]
async fn test_both_stages_degraded_still_commits() {
    let fx = fixture(None, true).await;
    let captured = Local.with_ymd_and_hms(2025, 3, 9, 21, 4, 5).unwrap();

    let report = fx
        .orchestrator
        .process(b"raw capture bytes", captured)
        .await
        .unwrap();

    assert!(report.transcription.is_degraded());
    assert!(report.compression.is_degraded());

    let entry = fx.store.get_entry(report.entry_id).await.unwrap();
    assert_eq!(entry.transcription.as_deref(), Some(FALLBACK_TRANSCRIPT));
    assert!(entry.compressed_path.is_none());
}

#[tokio::test]
async fn test_persist_failure_is_fatal_and_leaves_no_row() {
    let fx = fixture(Some("never reached"), false).await;
    let captured = Local.with_ymd_and_hms(2025, 3, 9, 21, 4, 5).unwrap();

    let before = fx.store.count_entries().await.unwrap();

    // Make the recordings root unwritable: replace the directory with a file
    let recordings = fx._temp.path().join("recordings");
    tokio::fs::remove_dir_all(&recordings).await.unwrap();
    tokio::fs::write(&recordings, b"not a directory").await.unwrap();

    let err = fx
        .orchestrator
        .process(b"raw capture bytes", captured)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::PersistRaw(_)));

    // No partial index entry
    assert_eq!(fx.store.count_entries().await.unwrap(), before);
    assert!(fx.store.list_entries(100, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_pipelines_share_one_store() {
    let fx = fixture(Some("two at once #pair"), false).await;

    let first = Local.with_ymd_and_hms(2025, 3, 9, 21, 4, 5).unwrap();
    let second = Local.with_ymd_and_hms(2025, 3, 9, 21, 4, 6).unwrap();

    let (a, b) = tokio::join!(
        fx.orchestrator.process(b"capture one", first),
        fx.orchestrator.process(b"capture two", second),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_ne!(a.entry_id, b.entry_id);
    assert_eq!(fx.store.count_entries().await.unwrap(), 2);

    // Both entries carry their full tag links
    for id in [a.entry_id, b.entry_id] {
        let entry = fx.store.get_entry(id).await.unwrap();
        assert_eq!(entry.tags, vec!["pair"]);
    }
}
