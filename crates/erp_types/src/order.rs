//! Persisted trial order documents.
//!
//! A subject file is a JSON document describing every trial the participant
//! will hear, grouped into sequences of blocks. Each block has one target
//! stimulus. Array lengths must match the declared counts exactly.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ErpError;
use crate::event::MAX_ENCODABLE_STIMULI;

/// Trial indices are kept signed so an out-of-range entry survives loading
/// and is reported when the block reaches it.
pub type TrialIndex = i64;

/// One sequence: a target per block plus the block trial lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    pub targets: Vec<TrialIndex>,
    pub blocks: Vec<Vec<TrialIndex>>,
}

impl Sequence {
    pub fn target(&self, block: usize) -> Option<TrialIndex> {
        self.targets.get(block).copied()
    }
}

/// Whole-experiment trial order for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StimulusOrder {
    pub num_sequences: usize,
    pub blocks_per_sequence: usize,
    pub num_stimuli: usize,
    pub trials_per_block: usize,
    pub target_trial_percentage: f64,
    pub sequences: Vec<Sequence>,
}

impl StimulusOrder {
    /// Parses and validates a trial order document.
    pub fn from_json(json: &str) -> Result<Self, ErpError> {
        let order: StimulusOrder = serde_json::from_str(json)
            .map_err(|e| ErpError::config(format!("Malformed trial order document: {}", e)))?;
        order.validate()?;
        Ok(order)
    }

    pub fn to_json(&self) -> Result<String, ErpError> {
        Ok(serde_json::to_string(self)?)
    }

    /// File name of a subject's trial order, `SUBJECT_<n>.json`.
    pub fn subject_file_name(subject: u32) -> String {
        format!("SUBJECT_{}.json", subject)
    }

    pub fn subject_file_path(dir: &Path, subject: u32) -> PathBuf {
        dir.join(Self::subject_file_name(subject))
    }

    /// Loads `SUBJECT_<n>.json` from `dir`. A missing or unreadable file is a
    /// configuration error.
    pub fn load(dir: &Path, subject: u32) -> Result<Self, ErpError> {
        let path = Self::subject_file_path(dir, subject);
        let json = fs::read_to_string(&path).map_err(|e| {
            ErpError::config(format!("Could not read subject file {:?}: {}", path, e))
        })?;
        let order = Self::from_json(&json)?;
        info!("Imported {:?}: {}", path, order.summary());
        Ok(order)
    }

    pub fn save(&self, dir: &Path, subject: u32) -> Result<PathBuf, ErpError> {
        fs::create_dir_all(dir)?;
        let path = Self::subject_file_path(dir, subject);
        fs::write(&path, self.to_json()?)?;
        Ok(path)
    }

    /// Checks every array length against the declared counts.
    pub fn validate(&self) -> Result<(), ErpError> {
        if self.num_stimuli < 2 || self.num_stimuli > MAX_ENCODABLE_STIMULI {
            return Err(ErpError::config(format!(
                "num_stimuli must be between 2 and {}, got {}",
                MAX_ENCODABLE_STIMULI, self.num_stimuli
            )));
        }
        if self.sequences.len() != self.num_sequences {
            return Err(ErpError::config(format!(
                "Expected {} sequences, found {}",
                self.num_sequences,
                self.sequences.len()
            )));
        }
        for (s, sequence) in self.sequences.iter().enumerate() {
            if sequence.targets.len() != self.blocks_per_sequence {
                return Err(ErpError::config(format!(
                    "Sequence {}: expected {} targets, found {}",
                    s,
                    self.blocks_per_sequence,
                    sequence.targets.len()
                )));
            }
            if let Some(bad) = sequence
                .targets
                .iter()
                .find(|&&t| t < 0 || t as usize >= self.num_stimuli)
            {
                return Err(ErpError::config(format!(
                    "Sequence {}: target {} is not one of the {} stimuli",
                    s, bad, self.num_stimuli
                )));
            }
            if sequence.blocks.len() != self.blocks_per_sequence {
                return Err(ErpError::config(format!(
                    "Sequence {}: expected {} blocks, found {}",
                    s,
                    self.blocks_per_sequence,
                    sequence.blocks.len()
                )));
            }
            for (b, block) in sequence.blocks.iter().enumerate() {
                if block.len() != self.trials_per_block {
                    return Err(ErpError::config(format!(
                        "Sequence {} block {}: expected {} trials, found {}",
                        s,
                        b,
                        self.trials_per_block,
                        block.len()
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn total_blocks(&self) -> usize {
        self.num_sequences * self.blocks_per_sequence
    }

    pub fn summary(&self) -> String {
        format!(
            "Sequences: {}, Blocks: {}, Stimuli: {}, Trials: {}, Percent Target Trials: {}",
            self.num_sequences,
            self.blocks_per_sequence,
            self.num_stimuli,
            self.trials_per_block,
            self.target_trial_percentage
        )
    }
}
