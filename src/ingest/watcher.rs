//! Capture drop-directory watcher.
//!
//! Watches a directory for new video files and emits events once they are
//! stable (the producer finished writing). Files already seen in this
//! session are skipped by content hash; the durable record of what was
//! ingested is the entry store itself.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Utc};
use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur with the watcher
#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("Watch directory does not exist: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for the watcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Directory to watch for finished captures
    pub watch_path: PathBuf,

    /// How long a file must be stable before processing (seconds)
    pub stability_delay_secs: u64,

    /// File extensions to watch
    pub extensions: Vec<String>,
}

impl WatcherConfig {
    pub fn new(watch_path: PathBuf) -> Self {
        Self {
            watch_path,
            stability_delay_secs: 5,
            extensions: vec![
                "webm".to_string(),
                "mp4".to_string(),
                "mov".to_string(),
                "mkv".to_string(),
            ],
        }
    }

    /// Check that the watch path exists
    pub fn validate(&self) -> Result<(), WatcherError> {
        if !self.watch_path.exists() {
            return Err(WatcherError::DirectoryNotFound(self.watch_path.clone()));
        }
        Ok(())
    }
}

/// Event emitted when a capture file is detected and stable
#[derive(Debug, Clone)]
pub struct CaptureEvent {
    /// Path to the capture file
    pub path: PathBuf,

    /// Content hash (12 hex chars), session dedup key
    pub hash: String,

    /// File size in bytes
    pub size: u64,

    /// When the file was detected
    pub detected_at: DateTime<Utc>,
}

/// Capture directory watcher with stability checking
pub struct CaptureWatcher {
    config: WatcherConfig,
}

impl CaptureWatcher {
    pub fn new(config: WatcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Watch the directory and emit events for new stable files.
    /// Runs until stopped via the returned handle.
    pub async fn watch(&self) -> Result<(mpsc::Receiver<CaptureEvent>, WatchHandle)> {
        self.config.validate()?;

        let (event_tx, event_rx) = mpsc::channel::<CaptureEvent>(100);
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);

        let config = self.config.clone();

        let handle = tokio::spawn(async move {
            if let Err(e) = run_watcher(config, event_tx, &mut stop_rx).await {
                tracing::error!("Watcher error: {}", e);
            }
        });

        Ok((
            event_rx,
            WatchHandle {
                stop_tx,
                task: handle,
            },
        ))
    }
}

/// Handle to control the watcher
pub struct WatchHandle {
    stop_tx: mpsc::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl WatchHandle {
    /// Stop the watcher
    pub async fn stop(self) -> Result<()> {
        let _ = self.stop_tx.send(()).await;
        self.task.await?;
        Ok(())
    }
}

fn is_capture_file(config: &WatcherConfig, path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            config
                .extensions
                .iter()
                .any(|e| e.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Internal watcher loop
async fn run_watcher(
    config: WatcherConfig,
    event_tx: mpsc::Sender<CaptureEvent>,
    stop_rx: &mut mpsc::Receiver<()>,
) -> Result<()> {
    // Track files being stabilized (path -> (size, last_seen))
    let mut pending: HashMap<PathBuf, (u64, Instant)> = HashMap::new();

    // Hashes already handed to the pipeline this session
    let mut seen: HashSet<String> = HashSet::new();

    // Create debounced watcher
    let (tx, rx) = std::sync::mpsc::channel();

    let mut debouncer = new_debouncer(Duration::from_secs(2), tx)?;
    debouncer
        .watcher()
        .watch(&config.watch_path, RecursiveMode::NonRecursive)?;

    let stability_delay = Duration::from_secs(config.stability_delay_secs);

    tracing::info!("Watching {} for captures", config.watch_path.display());

    loop {
        // Check for stop signal
        if stop_rx.try_recv().is_ok() {
            tracing::info!("Watcher stopping...");
            break;
        }

        // Check for file events (non-blocking with timeout)
        match rx.recv_timeout(Duration::from_millis(500)) {
            Ok(Ok(events)) => {
                for event in events {
                    let path = event.path;

                    if !is_capture_file(&config, &path) {
                        continue;
                    }

                    if let Ok(metadata) = std::fs::metadata(&path) {
                        if metadata.is_file() {
                            pending.insert(path, (metadata.len(), Instant::now()));
                        }
                    }
                }
            }
            Ok(Err(e)) => {
                tracing::warn!("Watcher error: {:?}", e);
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                // Expected - continue to stability check
            }
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                tracing::error!("Watcher channel disconnected");
                break;
            }
        }

        // Collect files whose size stopped changing
        let now = Instant::now();
        let mut stable_files = Vec::new();

        for (path, (last_size, last_seen)) in pending.iter() {
            if now.duration_since(*last_seen) >= stability_delay {
                if let Ok(metadata) = std::fs::metadata(path) {
                    let current_size = metadata.len();
                    if current_size == *last_size && current_size > 0 {
                        stable_files.push((path.clone(), current_size));
                    }
                }
            }
        }

        for (path, size) in stable_files {
            pending.remove(&path);

            match compute_file_hash(&path).await {
                Ok(hash) => {
                    if !seen.insert(hash.clone()) {
                        tracing::debug!("Capture already seen this session: {}", path.display());
                        continue;
                    }

                    tracing::info!("New capture detected: {} ({})", path.display(), hash);
                    let _ = event_tx
                        .send(CaptureEvent {
                            path,
                            hash,
                            size,
                            detected_at: Utc::now(),
                        })
                        .await;
                }
                Err(e) => {
                    tracing::warn!("Failed to hash {}: {}", path.display(), e);
                }
            }
        }

        // Small sleep to prevent busy loop
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    Ok(())
}

/// Compute SHA256 hash of file content (first 12 hex chars)
pub async fn compute_file_hash(path: &Path) -> Result<String, std::io::Error> {
    let content = tokio::fs::read(path).await?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    let result = hasher.finalize();

    Ok(hex::encode(result)[..12].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_extensions_cover_capture_containers() {
        let config = WatcherConfig::new(PathBuf::from("/tmp"));
        assert!(config.extensions.contains(&"webm".to_string()));
        assert!(config.extensions.contains(&"mp4".to_string()));
    }

    #[test]
    fn test_extension_filter_is_case_insensitive() {
        let config = WatcherConfig::new(PathBuf::from("/tmp"));
        assert!(is_capture_file(&config, Path::new("/tmp/clip.WEBM")));
        assert!(is_capture_file(&config, Path::new("/tmp/clip.mp4")));
        assert!(!is_capture_file(&config, Path::new("/tmp/notes.txt")));
        assert!(!is_capture_file(&config, Path::new("/tmp/noext")));
    }

    #[test]
    fn test_missing_directory_fails_validation() {
        let config = WatcherConfig::new(PathBuf::from("/nonexistent/captures"));
        assert!(matches!(
            config.validate(),
            Err(WatcherError::DirectoryNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_content_hash_is_stable() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("clip.webm");
        tokio::fs::write(&file, b"capture bytes").await.unwrap();

        let h1 = compute_file_hash(&file).await.unwrap();
        let h2 = compute_file_hash(&file).await.unwrap();

        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 12);
    }
}
