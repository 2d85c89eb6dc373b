//! haven - video journal capture pipeline
//!
//! Takes a raw captured recording through transcription, compression and
//! tag extraction into a searchable SQLite store.
//!
//! # Architecture
//!
//! One capture flows through a strictly sequential pipeline:
//! - Raw bytes are persisted under a timestamp-derived name (fatal on failure)
//! - Transcription and compression each degrade to a documented fallback
//!   instead of losing the capture
//! - Tags are derived from the transcript and committed with the entry in
//!   one transaction
//!
//! Multiple captures may be in flight at once; the store serializes all
//! writes through a single connection.
//!
//! # Modules
//!
//! - `adapters`: External tool integrations (whisper.cpp, ffmpeg)
//! - `core`: Orchestration logic (Orchestrator, tag extraction)
//! - `store`: Artifact filesystem layout and the SQLite entry store
//! - `domain`: Data structures (Entry, PipelineReport)
//! - `ingest`: Capture drop-directory watcher
//! - `models`: Whisper model download
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Process a finished capture
//! haven capture clip.webm
//!
//! # Watch a drop directory
//! haven watch
//!
//! # Browse the journal
//! haven list
//! haven search "#grateful"
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod ingest;
pub mod models;
pub mod store;

// Re-export main types at crate root for convenience
pub use adapters::{
    CompressedArtifact, CompressionError, Compressor, EncodingProfile, Transcriber,
    TranscriptionError,
};
pub use crate::core::{Orchestrator, PipelineError};
pub use domain::{
    DeletedEntry, Entry, EntryDraft, EntryPatch, PipelineReport, Stage, StageOutcome, Tag,
    FALLBACK_TRANSCRIPT,
};
pub use store::{ArtifactStore, EntryStore, StoreError};

// Capture ingestion
pub use ingest::{CaptureEvent, CaptureWatcher, WatcherConfig};
