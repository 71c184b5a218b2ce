//! Preceding-stimulus bookkeeping for target trials.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How often a target should be preceded by one particular stimulus, and how
/// often it has been so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StimPair {
    pub target: usize,
    pub preceding: usize,
    pub remaining: usize,
    pub placed: usize,
}

impl StimPair {
    pub fn new(target: usize, preceding: usize, desired: usize) -> Self {
        Self {
            target,
            preceding,
            remaining: desired,
            placed: 0,
        }
    }

    pub fn desired(&self) -> usize {
        self.remaining + self.placed
    }

    pub fn is_available(&self) -> bool {
        self.remaining > 0
    }

    /// A target preceded by the target itself.
    pub fn is_repeat(&self) -> bool {
        self.target == self.preceding
    }

    /// Target trials one placement of this pair contributes.
    pub fn target_units(&self) -> usize {
        if self.is_repeat() {
            2
        } else {
            1
        }
    }

    pub fn place(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
        self.placed += 1;
    }
}

impl fmt::Display for StimPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pairing: {} => {} [Placed {} of {}]",
            self.preceding,
            self.target,
            self.placed,
            self.desired()
        )
    }
}
