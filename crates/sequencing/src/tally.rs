//! Target and non-target trial counts of a subject file.

use std::fmt;

use erp_types::StimulusOrder;

/// Trial counts per stimulus across a whole subject order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialTally {
    pub target: Vec<usize>,
    pub non_target: Vec<usize>,
    /// Entries outside `[0, num_stimuli)`
    pub out_of_range: usize,
}

impl TrialTally {
    pub fn from_order(order: &StimulusOrder) -> Self {
        let mut tally = TrialTally {
            target: vec![0; order.num_stimuli],
            non_target: vec![0; order.num_stimuli],
            out_of_range: 0,
        };
        for sequence in &order.sequences {
            for (b, block) in sequence.blocks.iter().enumerate() {
                let target = sequence.target(b);
                for &trial in block {
                    if trial < 0 || trial as usize >= order.num_stimuli {
                        tally.out_of_range += 1;
                    } else if Some(trial) == target {
                        tally.target[trial as usize] += 1;
                    } else {
                        tally.non_target[trial as usize] += 1;
                    }
                }
            }
        }
        tally
    }
}

impl fmt::Display for TrialTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, count) in self.non_target.iter().enumerate() {
            writeln!(f, "non-target/{}: {}", i, count)?;
        }
        for (i, count) in self.target.iter().enumerate() {
            writeln!(f, "target/{}: {}", i, count)?;
        }
        if self.out_of_range > 0 {
            writeln!(f, "out of range: {}", self.out_of_range)?;
        }
        Ok(())
    }
}
