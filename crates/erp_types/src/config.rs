//! Configuration types shared by the presenter, the recorder and the binary

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Presentation timing, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Stimulus onset asynchrony between consecutive presentations
    pub soa: f64,
    /// Delay before the first cue of a run or block
    pub start_offset: f64,
    /// Times the target is cued before a block
    pub times_to_cue: u32,
    /// Pause between the last cue and the first trial
    pub cue_to_trial_pause: f64,
    /// Settle time between the last trial of a block and the export
    pub settle_before_write: f64,
    /// Settle time after the last block of the experiment
    pub settle_at_experiment_end: f64,
    /// Break countdown between blocks of one sequence
    pub block_break: f64,
    /// Break countdown between sequences
    pub sequence_break: f64,
    /// Highlight each stimulus while it plays
    pub highlight_current_stimulus: bool,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            soa: 0.375,
            start_offset: 5.0,
            times_to_cue: 3,
            cue_to_trial_pause: 3.0,
            settle_before_write: 2.0,
            settle_at_experiment_end: 3.0,
            block_break: 5.0,
            sequence_break: 10.0,
            highlight_current_stimulus: false,
        }
    }
}

/// Window around each event that forms an epoch, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpochWindow {
    /// Offset of the window start relative to the event
    pub start_offset: f64,
    /// End of the window relative to the event
    pub duration: f64,
}

impl Default for EpochWindow {
    fn default() -> Self {
        Self {
            start_offset: 0.0,
            duration: 1.0,
        }
    }
}

impl EpochWindow {
    /// Acquisition time that must be reached before an event's window is
    /// complete. Never earlier than the window end `event + duration`, and
    /// extended by a negative `start_offset`.
    pub fn drain_stop_time(&self, last_event: f64) -> f64 {
        last_event + self.duration.max(self.duration - self.start_offset)
    }
}

/// Where and how block data is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory for data files
    pub directory: PathBuf,
    /// Directory holding `SUBJECT_<n>.json` trial orders
    pub subject_directory: PathBuf,
    /// Directory for configuration and presentation order reports
    pub report_directory: PathBuf,
    /// Append subsequent blocks to an existing data file
    pub append_if_exists: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("Data"),
            subject_directory: PathBuf::from("SubjectFiles"),
            report_directory: PathBuf::from("Reports"),
            append_if_exists: true,
        }
    }
}

impl ExportConfig {
    /// Data file for one subject, `Subject_<id>_Data.csv`.
    pub fn data_file_path(&self, subject: u32) -> PathBuf {
        data_file_path(&self.directory, subject)
    }

    /// Feature vectors of every epoch, one line each.
    pub fn training_examples_path(&self, subject: u32) -> PathBuf {
        self.directory.join(format!("Subject_{}_TrainExamples.csv", subject))
    }

    /// Epoch labels, one comma-separated line.
    pub fn training_labels_path(&self, subject: u32) -> PathBuf {
        self.directory.join(format!("Subject_{}_TrainLabels.csv", subject))
    }
}

pub fn data_file_path(directory: &Path, subject: u32) -> PathBuf {
    directory.join(format!("Subject_{}_Data.csv", subject))
}

/// Bounds on waiting for the acquisition source during a drain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrainConfig {
    /// Total time allowed to reach the stop time
    pub timeout_ms: u64,
    /// Pull timeout, doubled after each empty pull
    pub initial_backoff_ms: u64,
    /// Upper bound of the pull timeout
    pub max_backoff_ms: u64,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            initial_backoff_ms: 5,
            max_backoff_ms: 200,
        }
    }
}

impl DrainConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms.max(1))
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms.max(self.initial_backoff_ms).max(1))
    }
}
