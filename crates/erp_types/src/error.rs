//! Error types for the experiment core

use thiserror::Error;

/// Errors raised by sequencing, presentation, recording and export.
#[derive(Error, Debug)]
pub enum ErpError {
    /// Invalid stimulus counts, separation bounds or a malformed trial order.
    /// Fatal to the run.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The acquisition source is not connected or dropped mid-run.
    #[error("Acquisition unavailable: {0}")]
    AcquisitionUnavailable(String),

    /// A stimulus index in the trial order is outside `[0, count)`.
    #[error("Stimulus index {index} out of range for {count} stimuli")]
    IndexOutOfRange { index: i64, count: usize },

    /// Draining the acquisition source did not reach the stop time in time.
    #[error("Timed out after {waited_ms} ms waiting for a sample at or after t={stop_time:.4}")]
    StallTimeout { stop_time: f64, waited_ms: u64 },

    #[error("Classification failed: {0}")]
    Classification(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(String),
}

impl ErpError {
    pub fn config(message: impl Into<String>) -> Self {
        ErpError::Configuration(message.into())
    }

    /// Errors after which the current run cannot continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErpError::Configuration(_))
    }
}

/// Result type for experiment operations
pub type ErpResult<T> = Result<T, ErpError>;
