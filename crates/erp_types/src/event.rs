//! Stimulus event records and their packed integer codes.
//!
//! An event code packs whether the stimulus was the block's target together
//! with the stimulus index: `(target << 2) + (index + 1)`. The low two bits
//! carry `index + 1`, so at most four stimuli can be encoded.

use serde::{Deserialize, Serialize};

use crate::error::ErpError;

/// Largest number of stimuli the packed event code can represent.
pub const MAX_ENCODABLE_STIMULI: usize = 4;

/// Sample event code for rows that carry no stimulus.
pub const NO_EVENT: i32 = 0;

/// Packed `(is_target, stimulus_index)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventCode(i32);

impl EventCode {
    pub fn encode(is_target: bool, stimulus_index: usize) -> Result<Self, ErpError> {
        if stimulus_index >= MAX_ENCODABLE_STIMULI {
            return Err(ErpError::IndexOutOfRange {
                index: stimulus_index as i64,
                count: MAX_ENCODABLE_STIMULI,
            });
        }
        let target_bit = if is_target { 1 } else { 0 };
        Ok(EventCode((target_bit << 2) + (stimulus_index as i32 + 1)))
    }

    /// Wraps a raw code read back from a recording. Returns `None` for
    /// [`NO_EVENT`] and values that no stimulus could have produced.
    pub fn from_raw(raw: i32) -> Option<Self> {
        if (1..=8).contains(&raw) {
            Some(EventCode(raw))
        } else {
            None
        }
    }

    pub fn raw(self) -> i32 {
        self.0
    }

    pub fn is_target(self) -> bool {
        ((self.0 - 1) >> 2) & 1 == 1
    }

    pub fn stimulus_index(self) -> usize {
        ((self.0 - 1) & 0b11) as usize
    }

    pub fn decode(self) -> (bool, usize) {
        (self.is_target(), self.stimulus_index())
    }
}

impl std::fmt::Display for EventCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stimulus presentation stamped on the acquisition clock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Seconds on the acquisition clock at play time
    pub timestamp: f64,
    pub code: EventCode,
}

impl Event {
    pub fn new(timestamp: f64, code: EventCode) -> Self {
        Self { timestamp, code }
    }
}
