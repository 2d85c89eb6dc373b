//! Capture ingestion.
//!
//! Headless capture sources (a camera script, a phone sync folder) drop
//! finished recordings into a watched directory; the watcher notices each
//! file once it stops growing and hands it to the pipeline. One pipeline
//! task per capture, so entries overlap while each entry's stages stay
//! sequential.

pub mod watcher;

// Re-export key types
pub use watcher::{CaptureEvent, CaptureWatcher, WatchHandle, WatcherConfig, WatcherError};
