use std::fmt;

use serde::{Deserialize, Serialize};

use erp_types::Event;
use recording::BlockReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PresentationState {
    Cue,
    Play,
    WritingData,
    Break,
    ExperimentDone,
}

impl fmt::Display for PresentationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PresentationState::Cue => "CUE",
            PresentationState::Play => "PLAY",
            PresentationState::WritingData => "WRITING_DATA",
            PresentationState::Break => "BREAK",
            PresentationState::ExperimentDone => "EXPERIMENT_DONE",
        };
        f.write_str(name)
    }
}

/// Calibration only records; live mode also classifies each exported block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentMode {
    #[default]
    Calibration,
    Live,
}

/// Position in the trial order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub sequence: usize,
    pub block: usize,
    pub trial: usize,
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    Idle,
    /// The block target was cued
    Cued(usize),
    /// A trial was presented and logged
    Played(Event),
    /// The block was written; the machine is now in `next`
    BlockExported {
        report: BlockReport,
        next: PresentationState,
    },
}
