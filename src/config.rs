//! Configuration for haven paths and tools.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (HAVEN_HOME)
//! 2. Config file (.haven/config.yaml)
//! 3. Defaults (~/.haven)
//!
//! Config file discovery:
//! - Searches current directory and parents for .haven/config.yaml
//! - Paths in config file are relative to the config file's parent directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::EncodingProfile;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub tools: Option<ToolsConfig>,
    #[serde(default)]
    pub encoding: Option<EncodingConfig>,
    #[serde(default)]
    pub timeouts: Option<TimeoutsConfig>,
    #[serde(default)]
    pub capture: Option<CaptureConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to config file)
    pub home: Option<String>,
    /// Raw capture root (relative to config file parent)
    pub recordings: Option<String>,
    /// Compressed output root
    pub compressed: Option<String>,
    /// Intermediate audio root
    pub scratch: Option<String>,
    /// Whisper model directory
    pub models: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolsConfig {
    pub ffmpeg: Option<String>,
    pub ffprobe: Option<String>,
    pub whisper: Option<String>,
    /// Path to the ggml model file
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EncodingConfig {
    pub video_bitrate: Option<String>,
    pub audio_bitrate: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<u32>,
    pub format: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutsConfig {
    pub transcribe_seconds: Option<u64>,
    pub compress_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// Container extension raw captures are stored under
    pub format: Option<String>,
    /// Directory the `watch` command monitors
    pub watch_dir: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to haven home (state root)
    pub home: PathBuf,
    /// Raw capture root
    pub recordings_dir: PathBuf,
    /// Compressed output root
    pub compressed_dir: PathBuf,
    /// Intermediate audio root
    pub scratch_dir: PathBuf,
    /// Whisper model directory
    pub models_dir: PathBuf,
    /// External tool locations
    pub tools: ToolSettings,
    /// Default encoding profile handed to the orchestrator
    pub encoding: EncodingProfile,
    /// Adapter timeouts
    pub timeouts: TimeoutSettings,
    /// Extension raw captures are stored under
    pub capture_format: String,
    /// Directory the `watch` command monitors (defaults to `<home>/inbox`)
    pub watch_dir: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ToolSettings {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub whisper: PathBuf,
    pub model: PathBuf,
}

#[derive(Debug, Clone)]
pub struct TimeoutSettings {
    pub transcribe: Duration,
    pub compress: Duration,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            transcribe: Duration::from_secs(600),
            compress: Duration::from_secs(1800),
        }
    }
}

impl ResolvedConfig {
    /// Path of the SQLite database (`<home>/haven.db`).
    pub fn db_path(&self) -> PathBuf {
        self.home.join("haven.db")
    }

    /// Path of the watcher lock file (`<home>/watch.lock`).
    pub fn watch_lock_path(&self) -> PathBuf {
        self.home.join("watch.lock")
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".haven").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    // Default home directory
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".haven");

    // Check for config file
    let config_file = find_config_file();

    let (home, file) = if let Some(ref config_path) = config_file {
        let config = load_config_file(config_path)?;

        // Resolve home path: env wins, then the config file, then default.
        // home is relative to the .haven/ directory itself.
        let home = if let Ok(env_home) = std::env::var("HAVEN_HOME") {
            PathBuf::from(env_home)
        } else if let Some(ref home_path) = config.paths.home {
            let haven_dir = config_path.parent().unwrap_or(Path::new("."));
            resolve_path(haven_dir, home_path)
        } else {
            default_home
        };

        (home, Some(config))
    } else {
        let home = std::env::var("HAVEN_HOME")
            .map(PathBuf::from)
            .unwrap_or(default_home);

        (home, None)
    };

    // Base for relative artifact roots is the config file's parent project
    // directory when a file was found, otherwise the home itself.
    let base_dir = config_file
        .as_deref()
        .and_then(|p| p.parent())
        .and_then(|p| p.parent())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| home.clone());

    let paths = file.as_ref().map(|f| f.paths.clone()).unwrap_or_default();

    let resolve_root = |configured: &Option<String>, default: &str| -> PathBuf {
        match configured {
            Some(p) => resolve_path(&base_dir, p),
            None => home.join(default),
        }
    };

    let recordings_dir = resolve_root(&paths.recordings, "recordings");
    let compressed_dir = resolve_root(&paths.compressed, "compressed");
    let scratch_dir = resolve_root(&paths.scratch, "scratch");
    let models_dir = resolve_root(&paths.models, "models");

    let tools_file = file.as_ref().and_then(|f| f.tools.clone());
    let tools = ToolSettings {
        ffmpeg: tools_file
            .as_ref()
            .and_then(|t| t.ffmpeg.as_deref())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("ffmpeg")),
        ffprobe: tools_file
            .as_ref()
            .and_then(|t| t.ffprobe.as_deref())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("ffprobe")),
        whisper: tools_file
            .as_ref()
            .and_then(|t| t.whisper.as_deref())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("whisper-cli")),
        model: tools_file
            .as_ref()
            .and_then(|t| t.model.as_deref())
            .map(|p| resolve_path(&base_dir, p))
            .unwrap_or_else(|| models_dir.join("ggml-base.en.bin")),
    };

    let encoding_file = file.as_ref().and_then(|f| f.encoding.clone());
    let defaults = EncodingProfile::default();
    let encoding = EncodingProfile {
        video_bitrate: encoding_file
            .as_ref()
            .and_then(|e| e.video_bitrate.clone())
            .unwrap_or(defaults.video_bitrate),
        audio_bitrate: encoding_file
            .as_ref()
            .and_then(|e| e.audio_bitrate.clone())
            .unwrap_or(defaults.audio_bitrate),
        width: encoding_file
            .as_ref()
            .and_then(|e| e.width)
            .unwrap_or(defaults.width),
        height: encoding_file
            .as_ref()
            .and_then(|e| e.height)
            .unwrap_or(defaults.height),
        frame_rate: encoding_file
            .as_ref()
            .and_then(|e| e.frame_rate)
            .unwrap_or(defaults.frame_rate),
        format: encoding_file
            .as_ref()
            .and_then(|e| e.format.clone())
            .unwrap_or(defaults.format),
    };

    let timeouts_file = file.as_ref().and_then(|f| f.timeouts.clone());
    let timeout_defaults = TimeoutSettings::default();
    let timeouts = TimeoutSettings {
        transcribe: timeouts_file
            .as_ref()
            .and_then(|t| t.transcribe_seconds)
            .map(Duration::from_secs)
            .unwrap_or(timeout_defaults.transcribe),
        compress: timeouts_file
            .as_ref()
            .and_then(|t| t.compress_seconds)
            .map(Duration::from_secs)
            .unwrap_or(timeout_defaults.compress),
    };

    let capture_file = file.as_ref().and_then(|f| f.capture.clone());
    let capture_format = capture_file
        .as_ref()
        .and_then(|c| c.format.clone())
        .unwrap_or_else(|| "webm".to_string());
    let watch_dir = capture_file
        .as_ref()
        .and_then(|c| c.watch_dir.as_deref())
        .map(|p| resolve_path(&base_dir, p))
        .unwrap_or_else(|| home.join("inbox"));

    Ok(ResolvedConfig {
        home,
        recordings_dir,
        compressed_dir,
        scratch_dir,
        models_dir,
        tools,
        encoding,
        timeouts,
        capture_format,
        watch_dir,
        config_file,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

// ============================================================================
// Convenience functions
// ============================================================================

/// Get the haven home directory (state root).
pub fn haven_home() -> Result<PathBuf> {
    Ok(config()?.home.clone())
}

/// Get the SQLite database path ($HAVEN_HOME/haven.db)
pub fn db_path() -> Result<PathBuf> {
    Ok(config()?.db_path())
}

/// Get the raw capture root
pub fn recordings_dir() -> Result<PathBuf> {
    Ok(config()?.recordings_dir.clone())
}

/// Get the compressed output root
pub fn compressed_dir() -> Result<PathBuf> {
    Ok(config()?.compressed_dir.clone())
}

/// Get the intermediate audio root
pub fn scratch_dir() -> Result<PathBuf> {
    Ok(config()?.scratch_dir.clone())
}

/// Get the whisper model directory
pub fn models_dir() -> Result<PathBuf> {
    Ok(config()?.models_dir.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let haven_dir = temp.path().join(".haven");
        std::fs::create_dir_all(&haven_dir).unwrap();

        let config_path = haven_dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1.0"
paths:
  home: ./
  recordings: ./captures
tools:
  whisper: /opt/whisper/whisper-cli
  model: ./models/ggml-small.en.bin
encoding:
  width: 640
  height: 360
timeouts:
  transcribe_seconds: 120
capture:
  format: mkv
"#
        )
        .unwrap();

        let config = load_config_file(&config_path).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.paths.home, Some("./".to_string()));
        assert_eq!(config.paths.recordings, Some("./captures".to_string()));
        assert_eq!(
            config.tools.as_ref().unwrap().whisper,
            Some("/opt/whisper/whisper-cli".to_string())
        );
        assert_eq!(config.encoding.as_ref().unwrap().width, Some(640));
        assert_eq!(
            config.timeouts.unwrap().transcribe_seconds,
            Some(120)
        );
        assert_eq!(config.capture.unwrap().format, Some("mkv".to_string()));
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
        // Relative paths that don't exist yet fall back to plain join
        assert_eq!(
            resolve_path(&base, "captures"),
            PathBuf::from("/home/user/project/captures")
        );
    }

    #[test]
    fn test_default_roots_are_independent_siblings() {
        let temp = TempDir::new().unwrap();
        std::env::set_var("HAVEN_HOME", temp.path());
        let config = load_config().unwrap();
        std::env::remove_var("HAVEN_HOME");

        assert_eq!(config.recordings_dir, temp.path().join("recordings"));
        assert_eq!(config.compressed_dir, temp.path().join("compressed"));
        assert_eq!(config.scratch_dir, temp.path().join("scratch"));

        // None of the three roots nests inside another
        assert!(!config.compressed_dir.starts_with(&config.recordings_dir));
        assert!(!config.scratch_dir.starts_with(&config.recordings_dir));
        assert!(!config.scratch_dir.starts_with(&config.compressed_dir));
    }
}
