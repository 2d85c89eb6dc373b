//! Command-line interface for haven.
//!
//! Provides commands for processing captures, watching a drop directory,
//! browsing and editing the journal, and managing the whisper model.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime};
use clap::{Parser, Subcommand};
use fs2::FileExt;

use crate::adapters::{FfmpegCompressor, WhisperTranscriber};
use crate::config;
use crate::core::Orchestrator;
use crate::domain::{Entry, EntryPatch, PipelineReport, StageOutcome};
use crate::ingest::{CaptureWatcher, WatcherConfig};
use crate::store::{ArtifactStore, EntryStore};

/// haven - video journal capture pipeline
#[derive(Parser, Debug)]
#[command(name = "haven")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process a captured video file into a journal entry
    Capture {
        /// The capture file to process
        file: PathBuf,

        /// Capture timestamp, "YYYY-MM-DD HH:MM:SS" (defaults to the
        /// file's modification time)
        #[arg(long)]
        at: Option<String>,

        /// Print the pipeline report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Watch a directory and process every finished capture dropped into it
    Watch {
        /// Directory to watch (defaults to the configured watch dir)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// List journal entries, most recent first
    List {
        /// Maximum number of entries to show
        #[arg(short, long, default_value = "100")]
        limit: i64,

        /// Number of entries to skip
        #[arg(long, default_value = "0")]
        offset: i64,

        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one entry in full
    Show {
        /// Entry id
        id: i64,

        /// Print the entry as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search entries by title, transcript, or tag
    Search {
        /// Search term (case-insensitive substring)
        term: String,

        /// Print matches as JSON
        #[arg(long)]
        json: bool,
    },

    /// Edit an entry's title or tags
    Edit {
        /// Entry id
        id: i64,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// Replacement tag list (comma-separated)
        #[arg(long)]
        tags: Option<String>,
    },

    /// Delete an entry and its media files
    Delete {
        /// Entry id
        id: i64,

        /// Keep the media files on disk
        #[arg(long)]
        keep_files: bool,
    },

    /// List all tags
    Tags,

    /// Download a whisper model
    DownloadModel {
        /// Model name (e.g. base.en, small.en)
        #[arg(default_value = "base.en")]
        model: String,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Capture { file, at, json } => capture(file, at, json).await,
            Commands::Watch { dir } => watch(dir).await,
            Commands::List {
                limit,
                offset,
                json,
            } => list(limit, offset, json).await,
            Commands::Show { id, json } => show(id, json).await,
            Commands::Search { term, json } => search(term, json).await,
            Commands::Edit { id, title, tags } => edit(id, title, tags).await,
            Commands::Delete { id, keep_files } => delete(id, keep_files).await,
            Commands::Tags => tags().await,
            Commands::DownloadModel { model } => download_model(model).await,
            Commands::Config => show_config(),
        }
    }
}

/// Wire the orchestrator up from configuration.
async fn build_orchestrator() -> Result<Orchestrator> {
    let cfg = config::config()?;

    let artifacts = ArtifactStore::open(
        cfg.recordings_dir.clone(),
        cfg.compressed_dir.clone(),
        cfg.scratch_dir.clone(),
        cfg.capture_format.clone(),
    )
    .await?;

    let transcriber = Arc::new(WhisperTranscriber::new(
        cfg.tools.ffmpeg.clone(),
        cfg.tools.whisper.clone(),
        cfg.tools.model.clone(),
        cfg.scratch_dir.clone(),
        cfg.timeouts.transcribe,
    ));

    let compressor = Arc::new(FfmpegCompressor::new(
        cfg.tools.ffmpeg.clone(),
        cfg.compressed_dir.clone(),
        cfg.timeouts.compress,
    ));

    let store = Arc::new(EntryStore::open(&cfg.db_path())?);

    Ok(Orchestrator::new(
        artifacts,
        transcriber,
        compressor,
        store,
        cfg.encoding.clone(),
        cfg.tools.ffprobe.clone(),
    ))
}

async fn open_store() -> Result<EntryStore> {
    let cfg = config::config()?;
    Ok(EntryStore::open(&cfg.db_path())?)
}

/// Capture timestamp for a file: explicit --at wins, then mtime, then now.
async fn capture_timestamp(file: &Path, at: Option<String>) -> Result<DateTime<Local>> {
    if let Some(at) = at {
        let naive = NaiveDateTime::parse_from_str(&at, "%Y-%m-%d %H:%M:%S")
            .with_context(|| format!("Invalid timestamp '{at}', expected YYYY-MM-DD HH:MM:SS"))?;
        return naive
            .and_local_timezone(Local)
            .single()
            .context("Ambiguous local timestamp");
    }

    let metadata = tokio::fs::metadata(file).await?;
    match metadata.modified() {
        Ok(mtime) => Ok(DateTime::<Local>::from(mtime)),
        Err(_) => Ok(Local::now()),
    }
}

async fn capture(file: PathBuf, at: Option<String>, json: bool) -> Result<()> {
    let orchestrator = build_orchestrator().await?;

    let bytes = tokio::fs::read(&file)
        .await
        .with_context(|| format!("Failed to read capture file: {}", file.display()))?;
    let captured_at = capture_timestamp(&file, at).await?;

    let report = orchestrator.process(&bytes, captured_at).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

async fn watch(dir: Option<PathBuf>) -> Result<()> {
    let cfg = config::config()?;

    // One watcher per home; a second invocation fails fast.
    std::fs::create_dir_all(&cfg.home)?;
    let lock_path = cfg.watch_lock_path();
    let lock_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .open(&lock_path)?;
    lock_file
        .try_lock_exclusive()
        .with_context(|| format!("Another watch process holds {}", lock_path.display()))?;

    let watch_dir = dir.unwrap_or_else(|| cfg.watch_dir.clone());
    tokio::fs::create_dir_all(&watch_dir).await?;

    let orchestrator = Arc::new(build_orchestrator().await?);

    let watcher = CaptureWatcher::new(WatcherConfig::new(watch_dir.clone()));
    let (mut events, handle) = watcher.watch().await?;

    println!("Watching {} (ctrl-c to stop)", watch_dir.display());

    loop {
        tokio::select! {
            maybe_event = events.recv() => {
                let Some(event) = maybe_event else { break };

                // One task per capture; pipelines overlap, each entry's
                // stages stay sequential.
                let orchestrator = Arc::clone(&orchestrator);
                tokio::spawn(async move {
                    let bytes = match tokio::fs::read(&event.path).await {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            tracing::error!(path = %event.path.display(), error = %e, "Failed to read capture");
                            return;
                        }
                    };

                    let captured_at = match tokio::fs::metadata(&event.path)
                        .await
                        .and_then(|m| m.modified())
                    {
                        Ok(mtime) => DateTime::<Local>::from(mtime),
                        Err(_) => Local::now(),
                    };

                    match orchestrator.process(&bytes, captured_at).await {
                        Ok(report) => print_report(&report),
                        Err(e) => tracing::error!(path = %event.path.display(), error = %e, "Pipeline failed"),
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Stopping watcher");
                break;
            }
        }
    }

    handle.stop().await?;
    lock_file.unlock()?;
    Ok(())
}

async fn list(limit: i64, offset: i64, json: bool) -> Result<()> {
    let store = open_store().await?;
    let entries = store.list_entries(limit, offset).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No entries.");
        return Ok(());
    }

    for entry in &entries {
        print_entry_line(entry);
    }
    Ok(())
}

async fn show(id: i64, json: bool) -> Result<()> {
    let store = open_store().await?;
    let entry = store.get_entry(id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
        return Ok(());
    }

    print_entry_line(&entry);
    if let Some(ref transcription) = entry.transcription {
        println!("\n{transcription}");
    }
    Ok(())
}

async fn search(term: String, json: bool) -> Result<()> {
    let store = open_store().await?;
    let entries = store.search_entries(&term).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No entries match '{term}'.");
        return Ok(());
    }

    for entry in &entries {
        print_entry_line(entry);
    }
    Ok(())
}

async fn edit(id: i64, title: Option<String>, tags: Option<String>) -> Result<()> {
    let store = open_store().await?;

    let patch = EntryPatch {
        title,
        tags: tags.map(|t| {
            t.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        }),
        ..Default::default()
    };

    store.update_entry(id, &patch).await?;

    let entry = store.get_entry(id).await?;
    print_entry_line(&entry);
    Ok(())
}

async fn delete(id: i64, keep_files: bool) -> Result<()> {
    let store = open_store().await?;
    let deleted = store.delete_entry(id).await?;

    println!("Deleted entry {id}");

    if keep_files {
        return Ok(());
    }

    // File cleanup is the caller's job; the store never touches disk.
    let mut paths = vec![deleted.original_path.clone()];
    if let Some(compressed) = deleted.compressed_path.clone() {
        paths.push(compressed);
    }
    for path in paths {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => println!("Removed {path}"),
            Err(e) => tracing::warn!(%path, error = %e, "Failed to remove file"),
        }
    }

    Ok(())
}

async fn tags() -> Result<()> {
    let store = open_store().await?;
    let tags = store.list_tags().await?;

    if tags.is_empty() {
        println!("No tags.");
        return Ok(());
    }

    for tag in tags {
        println!("{}", tag.name);
    }
    Ok(())
}

async fn download_model(model: String) -> Result<()> {
    let cfg = config::config()?;
    let path = crate::models::download_model(&model, &cfg.models_dir).await?;
    println!("Model ready at {}", path.display());
    Ok(())
}

fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("home:        {}", cfg.home.display());
    println!("recordings:  {}", cfg.recordings_dir.display());
    println!("compressed:  {}", cfg.compressed_dir.display());
    println!("scratch:     {}", cfg.scratch_dir.display());
    println!("models:      {}", cfg.models_dir.display());
    println!("database:    {}", cfg.db_path().display());
    println!("watch dir:   {}", cfg.watch_dir.display());
    println!("ffmpeg:      {}", cfg.tools.ffmpeg.display());
    println!("ffprobe:     {}", cfg.tools.ffprobe.display());
    println!("whisper:     {}", cfg.tools.whisper.display());
    println!("model:       {}", cfg.tools.model.display());
    println!(
        "encoding:    {}x{} @{}fps, {} video / {} audio, {}",
        cfg.encoding.width,
        cfg.encoding.height,
        cfg.encoding.frame_rate,
        cfg.encoding.video_bitrate,
        cfg.encoding.audio_bitrate,
        cfg.encoding.format
    );
    match cfg.config_file {
        Some(ref path) => println!("config file: {}", path.display()),
        None => println!("config file: (none, using defaults)"),
    }

    Ok(())
}

fn print_report(report: &PipelineReport) {
    println!("Committed entry {}", report.entry_id);
    println!("  original:   {}", report.original_path);

    match &report.transcription {
        StageOutcome::Succeeded => println!("  transcript: ok"),
        StageOutcome::Degraded { reason } => println!("  transcript: DEGRADED ({reason})"),
    }

    match (&report.compression, &report.compressed_path) {
        (StageOutcome::Succeeded, Some(path)) => println!("  compressed: {path}"),
        (StageOutcome::Degraded { reason }, _) => {
            println!("  compressed: DEGRADED, original only ({reason})")
        }
        (StageOutcome::Succeeded, None) => {}
    }

    if !report.tags.is_empty() {
        println!("  tags:       {}", report.tags.join(", "));
    }
}

fn print_entry_line(entry: &Entry) {
    let title = entry.title.as_deref().unwrap_or("(untitled)");
    let tags = if entry.tags.is_empty() {
        String::new()
    } else {
        format!("  [{}]", entry.tags.join(", "))
    };
    println!(
        "#{:<4} {} {}  {}{}",
        entry.id, entry.date, entry.time, title, tags
    );
}
