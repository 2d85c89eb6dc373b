//! Adapter interfaces for the external media tools.
//!
//! Adapters wrap the transcription engine (whisper.cpp) and the
//! compression engine (ffmpeg) behind traits so the orchestrator can be
//! exercised without either binary installed. Adapters never retry; every
//! failure is reported as a typed error with a diagnostic string.

pub mod compressor;
pub mod transcriber;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;

// Re-export the concrete adapters
pub use compressor::FfmpegCompressor;
pub use transcriber::WhisperTranscriber;

/// Errors from the transcription adapter.
#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("Audio extraction failed: {0}")]
    AudioExtract(String),

    #[error("Whisper model not found at {0}")]
    ModelMissing(PathBuf),

    #[error("Transcription engine failed: {0}")]
    Engine(String),

    #[error("Transcription timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the compression adapter.
#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("Compression engine failed: {0}")]
    Engine(String),

    #[error("Compression timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Encoding parameters passed to the compression engine.
///
/// All fields are required by the adapter; the crate-level defaults are
/// the orchestrator's concern, not the adapter's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingProfile {
    /// Target video bitrate, ffmpeg syntax (e.g. "1000k")
    pub video_bitrate: String,

    /// Target audio bitrate (e.g. "128k")
    pub audio_bitrate: String,

    /// Output width in pixels
    pub width: u32,

    /// Output height in pixels
    pub height: u32,

    /// Output frame rate
    pub frame_rate: u32,

    /// Output container format (e.g. "mp4")
    pub format: String,
}

impl Default for EncodingProfile {
    fn default() -> Self {
        Self {
            video_bitrate: "1000k".to_string(),
            audio_bitrate: "128k".to_string(),
            width: 1280,
            height: 720,
            frame_rate: 30,
            format: "mp4".to_string(),
        }
    }
}

/// A freshly encoded compressed artifact.
#[derive(Debug, Clone)]
pub struct CompressedArtifact {
    /// Where the compressed file was written
    pub path: PathBuf,

    /// Its size in bytes
    pub size: u64,
}

/// Transcription engine seam.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Extract audio from the artifact and return its transcript text.
    async fn transcribe(&self, artifact: &Path) -> Result<String, TranscriptionError>;
}

/// Compression engine seam.
#[async_trait]
pub trait Compressor: Send + Sync {
    /// Re-encode the artifact with the given profile into a new file.
    async fn compress(
        &self,
        artifact: &Path,
        profile: &EncodingProfile,
    ) -> Result<CompressedArtifact, CompressionError>;
}

/// Best-effort media duration probe via ffprobe.
///
/// Returns whole seconds, or `None` when ffprobe is unavailable or the
/// artifact cannot be parsed. Entry duration is optional, so callers
/// treat `None` as "unknown" rather than an error.
pub async fn probe_duration(ffprobe: &Path, artifact: &Path) -> Option<i64> {
    let output = Command::new(ffprobe)
        .args(["-v", "error", "-show_entries", "format=duration"])
        .args(["-of", "default=noprint_wrappers=1:nokey=1"])
        .arg(artifact)
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        tracing::debug!(
            artifact = %artifact.display(),
            "ffprobe exited non-zero, duration unknown"
        );
        return None;
    }

    let seconds: f64 = String::from_utf8_lossy(&output.stdout).trim().parse().ok()?;
    if seconds.is_sign_negative() {
        return None;
    }

    Some(seconds.round() as i64)
}
