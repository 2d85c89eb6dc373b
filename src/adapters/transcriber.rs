//! Whisper transcription adapter.
//!
//! Shells out to ffmpeg to pull a mono 16 kHz WAV from the artifact, then
//! to the local whisper.cpp binary for the actual transcription. The
//! intermediate audio file lives in the scratch root and is removed on
//! success and failure alike.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;
use tokio::process::Command;
use tokio::time::timeout;
use uuid::Uuid;

use super::{TranscriptionError, Transcriber};

/// Sample rate the transcription engine expects.
const AUDIO_SAMPLE_RATE: u32 = 16_000;

/// Transcriber backed by ffmpeg + whisper.cpp subprocesses.
pub struct WhisperTranscriber {
    /// Path to the ffmpeg binary
    ffmpeg: PathBuf,

    /// Path to the whisper-cli binary
    whisper: PathBuf,

    /// Path to the ggml model file
    model: PathBuf,

    /// Root for intermediate audio files
    scratch_dir: PathBuf,

    /// Timeout for the whole extract-and-transcribe sequence
    timeout: Duration,
}

impl WhisperTranscriber {
    pub fn new(
        ffmpeg: PathBuf,
        whisper: PathBuf,
        model: PathBuf,
        scratch_dir: PathBuf,
        timeout: Duration,
    ) -> Self {
        Self {
            ffmpeg,
            whisper,
            model,
            scratch_dir,
            timeout,
        }
    }

    /// Extract a mono 16 kHz PCM WAV into the scratch root.
    ///
    /// UUID names keep concurrent pipelines from clobbering each other.
    async fn extract_audio(&self, artifact: &Path) -> Result<PathBuf, TranscriptionError> {
        fs::create_dir_all(&self.scratch_dir).await?;
        let audio_path = self.scratch_dir.join(format!("{}.wav", Uuid::new_v4()));

        let output = Command::new(&self.ffmpeg)
            .arg("-i")
            .arg(artifact)
            .args(["-vn", "-acodec", "pcm_s16le", "-ac", "1"])
            .args(["-ar", &AUDIO_SAMPLE_RATE.to_string()])
            .arg("-y")
            .arg(&audio_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| TranscriptionError::AudioExtract(format!("failed to run ffmpeg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // ffmpeg may have left a truncated wav behind
            let _ = fs::remove_file(&audio_path).await;
            return Err(TranscriptionError::AudioExtract(format!(
                "ffmpeg exited with {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        Ok(audio_path)
    }

    /// Run whisper.cpp over the extracted audio and read its text output.
    async fn run_whisper(&self, audio_path: &Path) -> Result<String, TranscriptionError> {
        if !self.model.exists() {
            return Err(TranscriptionError::ModelMissing(self.model.clone()));
        }

        // Whisper writes `<prefix>.txt`; keep the prefix inside a temp dir
        // so a crashed run leaves nothing in the scratch root.
        let out_dir = tempfile::tempdir_in(&self.scratch_dir)?;
        let out_prefix = out_dir.path().join("transcript");

        let output = Command::new(&self.whisper)
            .arg("-m")
            .arg(&self.model)
            .arg("-f")
            .arg(audio_path)
            .arg("-otxt")
            .arg("-of")
            .arg(&out_prefix)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| TranscriptionError::Engine(format!("failed to run whisper: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranscriptionError::Engine(format!(
                "whisper exited with {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        let text_path = out_prefix.with_extension("txt");
        let text = fs::read_to_string(&text_path).await.map_err(|e| {
            TranscriptionError::Engine(format!(
                "whisper produced no output at {}: {e}",
                text_path.display()
            ))
        })?;

        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, artifact: &Path) -> Result<String, TranscriptionError> {
        let audio_path = self.extract_audio(artifact).await?;

        // No retries; one shot within the adapter's timeout. The audio
        // file is removed whatever happens.
        let result = match timeout(self.timeout, self.run_whisper(&audio_path)).await {
            Ok(result) => result,
            Err(_) => Err(TranscriptionError::Timeout(self.timeout)),
        };

        if let Err(e) = fs::remove_file(&audio_path).await {
            tracing::warn!(
                audio = %audio_path.display(),
                error = %e,
                "Failed to remove intermediate audio file"
            );
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_transcriber(scratch: &Path) -> WhisperTranscriber {
        WhisperTranscriber::new(
            PathBuf::from("/nonexistent/ffmpeg"),
            PathBuf::from("/nonexistent/whisper-cli"),
            PathBuf::from("/nonexistent/model.bin"),
            scratch.to_path_buf(),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_is_audio_extract_error() {
        let temp = TempDir::new().unwrap();
        let transcriber = test_transcriber(temp.path());

        let err = transcriber
            .transcribe(Path::new("/tmp/nope.webm"))
            .await
            .unwrap_err();

        assert!(matches!(err, TranscriptionError::AudioExtract(_)));
    }

    #[tokio::test]
    async fn test_missing_model_detected_before_engine_run() {
        let temp = TempDir::new().unwrap();
        let transcriber = test_transcriber(temp.path());

        // Bypass extraction; run_whisper checks the model first
        let wav = temp.path().join("audio.wav");
        tokio::fs::write(&wav, b"RIFF").await.unwrap();

        let err = transcriber.run_whisper(&wav).await.unwrap_err();
        assert!(matches!(err, TranscriptionError::ModelMissing(_)));
    }

    #[tokio::test]
    async fn test_no_audio_leaked_on_failure() {
        let temp = TempDir::new().unwrap();
        let transcriber = test_transcriber(temp.path());

        let _ = transcriber.transcribe(Path::new("/tmp/nope.webm")).await;

        // Extraction failed before producing a wav; scratch stays empty
        let mut entries = tokio::fs::read_dir(temp.path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name());
        }
        assert!(names.is_empty(), "scratch not empty: {names:?}");
    }
}
