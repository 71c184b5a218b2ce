//! Block ordering strategies.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use erp_types::ErpError;

use crate::pair::StimPair;
use crate::plan::{choose_available_pair, choose_available_stimulus, BlockPlan, BlockSpec, Quotas};

/// A realized trial order for one block.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockOrder {
    pub target: usize,
    pub trials: Vec<usize>,
    /// Presentation position per trial, for strategies that move stimuli
    pub positions: Option<Vec<usize>>,
    /// Pairing table after generation
    pub pairs: Vec<StimPair>,
    pub n_target: usize,
    pub trials_per_non_target: usize,
    pub desired_pairings: usize,
}

impl BlockOrder {
    pub fn count_of(&self, stimulus: usize) -> usize {
        self.trials.iter().filter(|&&t| t == stimulus).count()
    }

    /// Number of non-target trials between each pair of consecutive targets.
    pub fn target_gaps(&self) -> Vec<usize> {
        let positions: Vec<usize> = self
            .trials
            .iter()
            .enumerate()
            .filter(|(_, t)| **t == self.target)
            .map(|(i, _)| i)
            .collect();
        positions.windows(2).map(|w| w[1] - w[0] - 1).collect()
    }
}

/// Produces the trial order of one block.
pub trait SequenceStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn build_block(&self, spec: &BlockSpec, rng: &mut StdRng) -> Result<BlockOrder, ErpError>;
}

/// Which strategy a generator uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    BalancedPairing,
    SimpleRandom,
    PositionShuffled,
}

impl StrategyKind {
    pub fn strategy(self) -> Box<dyn SequenceStrategy> {
        match self {
            StrategyKind::BalancedPairing => Box::new(BalancedPairing),
            StrategyKind::SimpleRandom => Box::new(SimpleRandom),
            StrategyKind::PositionShuffled => Box::new(PositionShuffled),
        }
    }
}

/// Exact per-stimulus counts, bounded target spacing and balanced
/// preceding stimuli.
#[derive(Debug, Clone, Copy, Default)]
pub struct BalancedPairing;

impl BalancedPairing {
    fn build_with_positions(
        spec: &BlockSpec,
        rng: &mut StdRng,
        with_positions: bool,
    ) -> Result<BlockOrder, ErpError> {
        let plan = BlockPlan::new(spec, rng)?;
        let runs = plan.draw_runs(rng);
        let target = spec.target_index;

        let mut free = plan.free.clone();
        let mut pairs = plan.pairs.clone();
        let mut trials = Vec::with_capacity(spec.trials);

        for (j, &run) in runs.iter().enumerate() {
            for _ in 0..run {
                trials.push(choose_available_stimulus(&mut free, target, rng));
            }
            if j + 1 == runs.len() {
                break;
            }
            let Some(p) = choose_available_pair(&pairs, rng) else {
                error!("Ran out of target pairings after {} placements", j);
                return Err(ErpError::config("Target pairings exhausted before the block was filled"));
            };
            trials.push(pairs[p].preceding);
            trials.push(pairs[p].target);
            pairs[p].place();
        }

        if trials.len() != spec.trials {
            return Err(ErpError::config(format!(
                "Generated {} trials for a block of {}",
                trials.len(),
                spec.trials
            )));
        }

        let positions = with_positions.then(|| {
            (0..trials.len())
                .map(|_| rng.gen_range(0..spec.stimulus_count))
                .collect()
        });

        debug!(
            "Built block for target {}: {} trials, runs {:?}",
            target,
            trials.len(),
            runs
        );

        Ok(BlockOrder {
            target,
            trials,
            positions,
            pairs,
            n_target: plan.quotas.n_target,
            trials_per_non_target: plan.quotas.trials_per_non_target,
            desired_pairings: plan.desired_pairings,
        })
    }
}

impl SequenceStrategy for BalancedPairing {
    fn name(&self) -> &'static str {
        "balanced-pairing"
    }

    fn build_block(&self, spec: &BlockSpec, rng: &mut StdRng) -> Result<BlockOrder, ErpError> {
        Self::build_with_positions(spec, rng, false)
    }
}

/// Exact per-stimulus counts in a uniformly shuffled order, with no spacing
/// or pairing constraints.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleRandom;

impl SequenceStrategy for SimpleRandom {
    fn name(&self) -> &'static str {
        "simple-random"
    }

    fn build_block(&self, spec: &BlockSpec, rng: &mut StdRng) -> Result<BlockOrder, ErpError> {
        let quotas = Quotas::compute(spec)?;
        let mut trials: Vec<usize> = quotas
            .counts
            .iter()
            .enumerate()
            .flat_map(|(i, &count)| std::iter::repeat(i).take(count))
            .collect();
        trials.shuffle(rng);

        let pairs = realized_pairs(&trials, spec.target_index, spec.stimulus_count);
        Ok(BlockOrder {
            target: spec.target_index,
            trials,
            positions: None,
            pairs,
            n_target: quotas.n_target,
            trials_per_non_target: quotas.trials_per_non_target,
            desired_pairings: 0,
        })
    }
}

/// The balanced order, plus a companion presentation position per trial
/// drawn uniformly among the stimulus positions.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionShuffled;

impl SequenceStrategy for PositionShuffled {
    fn name(&self) -> &'static str {
        "position-shuffled"
    }

    fn build_block(&self, spec: &BlockSpec, rng: &mut StdRng) -> Result<BlockOrder, ErpError> {
        BalancedPairing::build_with_positions(spec, rng, true)
    }
}

/// Counts which stimulus preceded each target occurrence in `trials`.
pub fn realized_pairs(trials: &[usize], target: usize, stimulus_count: usize) -> Vec<StimPair> {
    let mut pairs: Vec<StimPair> = (0..stimulus_count)
        .map(|i| StimPair::new(target, i, 0))
        .collect();
    for w in trials.windows(2) {
        if w[1] == target {
            if let Some(pair) = pairs.get_mut(w[0]) {
                pair.placed += 1;
            }
        }
    }
    pairs.retain(|p| p.placed > 0);
    pairs
}
