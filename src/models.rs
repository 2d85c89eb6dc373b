//! Whisper model management.
//!
//! The transcription engine needs a local ggml model file. Known model
//! names map to files in the upstream whisper.cpp repository; downloads
//! stream straight to disk under the models directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;

/// Upstream location of the ggml model files.
const MODEL_BASE_URL: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

/// Model names whisper.cpp ships ggml weights for.
pub const KNOWN_MODELS: &[&str] = &[
    "tiny",
    "tiny.en",
    "base",
    "base.en",
    "small",
    "small.en",
    "medium",
    "medium.en",
    "large-v3",
];

/// File name for a model (`ggml-<name>.bin`).
pub fn model_file_name(name: &str) -> String {
    format!("ggml-{name}.bin")
}

/// Download URL for a model.
pub fn model_url(name: &str) -> String {
    format!("{MODEL_BASE_URL}/{}", model_file_name(name))
}

/// Download a model into `models_dir`, returning the file path.
///
/// The download streams into a `.part` file that is renamed on
/// completion, so an interrupted download never masquerades as a model.
pub async fn download_model(name: &str, models_dir: &Path) -> Result<PathBuf> {
    if !KNOWN_MODELS.contains(&name) {
        anyhow::bail!(
            "Unknown model '{}'. Known models: {}",
            name,
            KNOWN_MODELS.join(", ")
        );
    }

    tokio::fs::create_dir_all(models_dir)
        .await
        .with_context(|| format!("Failed to create models dir: {}", models_dir.display()))?;

    let dest = models_dir.join(model_file_name(name));
    if dest.exists() {
        tracing::info!(model = name, path = %dest.display(), "Model already present");
        return Ok(dest);
    }

    let url = model_url(name);
    tracing::info!(model = name, %url, "Downloading model");

    let mut response = reqwest::get(&url)
        .await
        .with_context(|| format!("Failed to fetch {url}"))?
        .error_for_status()
        .with_context(|| format!("Model download rejected: {url}"))?;

    let part = dest.with_extension("bin.part");
    let mut file = tokio::fs::File::create(&part)
        .await
        .with_context(|| format!("Failed to create {}", part.display()))?;

    let mut downloaded: u64 = 0;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
    }
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&part, &dest)
        .await
        .with_context(|| format!("Failed to move model into place: {}", dest.display()))?;

    tracing::info!(model = name, bytes = downloaded, path = %dest.display(), "Model downloaded");
    Ok(dest)
}
