//! ffmpeg compression adapter.
//!
//! Re-encodes a raw capture into a smaller playback copy using an
//! explicit encoding profile. The input is never touched; a failed encode
//! removes whatever partial output ffmpeg left behind.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;
use tokio::process::Command;
use tokio::time::timeout;

use super::{CompressedArtifact, CompressionError, Compressor, EncodingProfile};

/// Compressor backed by an ffmpeg subprocess.
pub struct FfmpegCompressor {
    /// Path to the ffmpeg binary
    ffmpeg: PathBuf,

    /// Root for compressed outputs
    output_dir: PathBuf,

    /// Timeout for one encode
    timeout: Duration,
}

impl FfmpegCompressor {
    pub fn new(ffmpeg: PathBuf, output_dir: PathBuf, timeout: Duration) -> Self {
        Self {
            ffmpeg,
            output_dir,
            timeout,
        }
    }

    /// Output path for a given input: `<stem>_compressed.<format>` under
    /// the compressed root.
    fn output_path(&self, input: &Path, profile: &EncodingProfile) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "capture".to_string());
        self.output_dir
            .join(format!("{}_compressed.{}", stem, profile.format))
    }

    async fn run_ffmpeg(
        &self,
        input: &Path,
        output: &Path,
        profile: &EncodingProfile,
    ) -> Result<(), CompressionError> {
        let child = Command::new(&self.ffmpeg)
            .arg("-i")
            .arg(input)
            .args(["-c:v", "libx264"])
            .args(["-b:v", &profile.video_bitrate])
            .args(["-s", &format!("{}x{}", profile.width, profile.height)])
            .args(["-r", &profile.frame_rate.to_string()])
            .args(["-c:a", "aac"])
            .args(["-b:a", &profile.audio_bitrate])
            .args(["-f", &profile.format])
            .arg("-y")
            .arg(output)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CompressionError::Engine(format!("failed to run ffmpeg: {e}")))?;

        // Progress is an internal signal only; surface it at debug level
        tracing::debug!(
            input = %input.display(),
            output = %output.display(),
            bitrate = %profile.video_bitrate,
            "Compression started"
        );

        let result = timeout(self.timeout, child.wait_with_output()).await;

        let output_result = match result {
            Ok(r) => r.map_err(|e| CompressionError::Engine(format!("ffmpeg wait failed: {e}"))),
            Err(_) => Err(CompressionError::Timeout(self.timeout)),
        }?;

        if !output_result.status.success() {
            let stderr = String::from_utf8_lossy(&output_result.stderr);
            return Err(CompressionError::Engine(format!(
                "ffmpeg exited with {}: {}",
                output_result.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        tracing::debug!(output = %output.display(), "Compression finished");
        Ok(())
    }
}

#[async_trait]
impl Compressor for FfmpegCompressor {
    async fn compress(
        &self,
        artifact: &Path,
        profile: &EncodingProfile,
    ) -> Result<CompressedArtifact, CompressionError> {
        fs::create_dir_all(&self.output_dir).await?;
        let output = self.output_path(artifact, profile);

        if let Err(e) = self.run_ffmpeg(artifact, &output, profile).await {
            // Never leave a truncated output behind
            let _ = fs::remove_file(&output).await;
            return Err(e);
        }

        let size = fs::metadata(&output).await?.len();

        Ok(CompressedArtifact { path: output, size })
    }
}
