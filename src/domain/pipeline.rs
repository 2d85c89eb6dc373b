//! Pipeline stages and the processing report.
//!
//! One capture moves through the stages strictly in order. Stages after
//! raw persistence degrade instead of aborting: a failed transcription or
//! compression is recorded as a `Degraded` outcome and the entry is
//! committed anyway.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Transcript text substituted when the transcription stage fails.
pub const FALLBACK_TRANSCRIPT: &str =
    "This is a placeholder transcription. The whisper.cpp transcription service is being configured.";

/// The stages of entry processing, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Write the raw capture to the artifact store
    PersistRaw,

    /// Extract audio and run the transcription engine
    Transcribe,

    /// Re-encode a compressed playback copy
    Compress,

    /// Derive tags from the transcript
    Tag,

    /// Insert the entry and its tag links into the store
    Commit,
}

impl Stage {
    /// Stage name used in logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::PersistRaw => "persist_raw",
            Stage::Transcribe => "transcribe",
            Stage::Compress => "compress",
            Stage::Tag => "tag",
            Stage::Commit => "commit",
        }
    }
}

/// Outcome of a single degradable stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum StageOutcome {
    /// The stage produced its real output
    Succeeded,

    /// The stage failed and a documented fallback was used instead
    Degraded { reason: String },
}

impl StageOutcome {
    /// Fold an adapter result into an outcome, keeping the diagnostic.
    pub fn from_error<E: std::fmt::Display>(error: &E) -> Self {
        Self::Degraded {
            reason: error.to_string(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// The result of processing one capture.
///
/// Exposes, per degradable stage, whether it succeeded and which fallback
/// was used, plus the committed entry id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Correlation id for this pipeline run (log tracing only)
    pub run_id: Uuid,

    /// Id of the committed entry
    pub entry_id: i64,

    /// Where the raw capture was persisted
    pub original_path: String,

    /// Transcription stage outcome
    pub transcription: StageOutcome,

    /// Compression stage outcome
    pub compression: StageOutcome,

    /// Compressed artifact path, when compression succeeded
    pub compressed_path: Option<String>,

    /// Tags extracted from the transcript
    pub tags: Vec<String>,
}

impl PipelineReport {
    /// True when every degradable stage produced its real output.
    pub fn is_clean(&self) -> bool {
        !self.transcription.is_degraded() && !self.compression.is_degraded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::PersistRaw.name(), "persist_raw");
        assert_eq!(Stage::Commit.name(), "commit");
    }

    #[test]
    fn test_outcome_from_error_keeps_diagnostic() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "ffmpeg missing");
        let outcome = StageOutcome::from_error(&err);

        assert!(outcome.is_degraded());
        match outcome {
            StageOutcome::Degraded { reason } => assert!(reason.contains("ffmpeg missing")),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_report_serialization() {
        let report = PipelineReport {
            run_id: Uuid::new_v4(),
            entry_id: 7,
            original_path: "/tmp/2025-03-09_21-04-05.webm".to_string(),
            transcription: StageOutcome::Succeeded,
            compression: StageOutcome::Degraded {
                reason: "exit code 1".to_string(),
            },
            compressed_path: None,
            tags: vec!["grateful".to_string()],
        };

        let json = serde_json::to_string(&report).unwrap();
        let parsed: PipelineReport = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.entry_id, 7);
        assert!(!parsed.is_clean());
        assert!(parsed.compression.is_degraded());
    }
}
