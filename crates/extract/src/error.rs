//! Error taxonomy for extraction runs.
//!
//! Per-unit failures (`ExtractionParse`, `Validation`) are recovered inside
//! the pipelines and only logged. Everything else ends the run.

use std::time::Duration;
use thiserror::Error;

/// Failures raised by the text-generation boundary.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("capability unavailable: {0}")]
    Unavailable(String),

    #[error("capability timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid capability response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum ExtractError {
    /// Structured output could not be parsed for one unit (chunk or entity).
    #[error("unparseable output for {unit}: {reason}")]
    ExtractionParse { unit: String, reason: String },

    #[error("memory summarization failed: {0}")]
    MemorySummary(#[source] CapabilityError),

    #[error("invalid entity: {0}")]
    Validation(String),

    #[error("run cancelled")]
    Cancelled,

    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(#[source] CapabilityError),

    #[error("failed to start blocking runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("snapshot I/O error at {path}: {source}")]
    SnapshotIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot format error: {0}")]
    SnapshotFormat(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ExtractError>;

impl ExtractError {
    pub fn parse(unit: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExtractionParse {
            unit: unit.into(),
            reason: reason.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether this error terminates a run rather than a single unit.
    pub fn is_run_level(&self) -> bool {
        !matches!(self, Self::ExtractionParse { .. } | Self::Validation(_))
    }
}
