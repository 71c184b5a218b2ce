//! Subject-level trial order generation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use erp_types::{ErpError, Sequence, StimulusOrder, TrialIndex, MAX_ENCODABLE_STIMULI};

use crate::latin::Counterbalance;
use crate::plan::{BlockSpec, TargetTrials};
use crate::strategy::{BlockOrder, SequenceStrategy, StrategyKind};

/// Parameters for generating subject trial orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub num_sequences: usize,
    pub blocks_per_sequence: usize,
    pub num_stimuli: usize,
    pub trials_per_block: usize,
    /// Share of each block's trials that are targets
    pub target_trial_percentage: f64,
    /// Exact target count per block, overriding the percentage
    pub target_trials: Option<usize>,
    /// Up to this many extra targets are added to each block at random
    pub max_random_targets: usize,
    pub min_target_separation: usize,
    pub max_target_separation: usize,
    pub allow_target_repeat: bool,
    pub strategy: StrategyKind,
    pub seed: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            num_sequences: 15,
            blocks_per_sequence: 3,
            num_stimuli: 3,
            trials_per_block: 45,
            target_trial_percentage: 0.33,
            target_trials: None,
            max_random_targets: 0,
            min_target_separation: 1,
            max_target_separation: 5,
            allow_target_repeat: false,
            strategy: StrategyKind::BalancedPairing,
            seed: 0x50_13_2A,
        }
    }
}

impl GenerationConfig {
    pub fn validate(&self) -> Result<(), ErpError> {
        if self.num_stimuli < 2 || self.num_stimuli > MAX_ENCODABLE_STIMULI {
            return Err(ErpError::config(format!(
                "num_stimuli must be between 2 and {}, got {}",
                MAX_ENCODABLE_STIMULI, self.num_stimuli
            )));
        }
        if self.num_sequences == 0 || self.blocks_per_sequence == 0 || self.trials_per_block == 0 {
            return Err(ErpError::config(
                "Sequences, blocks per sequence and trials per block must all be non-zero",
            ));
        }
        Ok(())
    }

    pub fn total_blocks(&self) -> usize {
        self.num_sequences * self.blocks_per_sequence
    }

    fn target_trials(&self) -> TargetTrials {
        match self.target_trials {
            Some(n) => TargetTrials::Count(n),
            None => TargetTrials::Fraction(self.target_trial_percentage),
        }
    }
}

/// A generated subject order together with the per-block generation details.
#[derive(Debug, Clone)]
pub struct SubjectOrder {
    pub participant: usize,
    pub order: StimulusOrder,
    /// Blocks in presentation order, sequence-major
    pub blocks: Vec<BlockOrder>,
}

/// Builds block and subject trial orders with a swappable strategy.
pub struct SequenceBuilder {
    config: GenerationConfig,
    strategy: Box<dyn SequenceStrategy>,
    counterbalance: Counterbalance,
    rng: StdRng,
}

impl SequenceBuilder {
    pub fn new(config: GenerationConfig) -> Result<Self, ErpError> {
        config.validate()?;
        let strategy = config.strategy.strategy();
        let counterbalance = Counterbalance::new(config.num_stimuli);
        let rng = StdRng::seed_from_u64(config.seed);
        info!(
            "Sequence builder ready: {} strategy, {} stimuli, seed {}",
            strategy.name(),
            config.num_stimuli,
            config.seed
        );
        Ok(Self {
            config,
            strategy,
            counterbalance,
            rng,
        })
    }

    pub fn with_strategy(mut self, strategy: Box<dyn SequenceStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn block_spec(&self, target_index: usize) -> BlockSpec {
        BlockSpec {
            stimulus_count: self.config.num_stimuli,
            target_index,
            trials: self.config.trials_per_block,
            target_trials: self.config.target_trials(),
            extra_targets: 0,
            min_separation: self.config.min_target_separation,
            max_separation: self.config.max_target_separation,
            allow_target_repeat: self.config.allow_target_repeat,
        }
    }

    /// Builds one block for `target_index`, adding random extra targets when
    /// configured.
    pub fn build_block(&mut self, target_index: usize) -> Result<BlockOrder, ErpError> {
        let mut spec = self.block_spec(target_index);
        if self.config.max_random_targets > 0 {
            spec.extra_targets = self.rng.gen_range(0..=self.config.max_random_targets);
        }
        self.strategy.build_block(&spec, &mut self.rng)
    }

    /// Builds the whole trial order of one participant.
    pub fn build_subject(&mut self, participant: usize) -> Result<SubjectOrder, ErpError> {
        let mut sequences = Vec::with_capacity(self.config.num_sequences);
        let mut blocks = Vec::with_capacity(self.config.total_blocks());

        for s in 0..self.config.num_sequences {
            let targets =
                self.counterbalance
                    .targets(participant, s, self.config.blocks_per_sequence);
            let mut sequence = Sequence {
                targets: targets.iter().map(|&t| t as TrialIndex).collect(),
                blocks: Vec::with_capacity(targets.len()),
            };
            for &target in &targets {
                let block = self.build_block(target)?;
                sequence
                    .blocks
                    .push(block.trials.iter().map(|&t| t as TrialIndex).collect());
                blocks.push(block);
            }
            debug!("Participant {} sequence {} targets {:?}", participant, s, targets);
            sequences.push(sequence);
        }

        let order = StimulusOrder {
            num_sequences: self.config.num_sequences,
            blocks_per_sequence: self.config.blocks_per_sequence,
            num_stimuli: self.config.num_stimuli,
            trials_per_block: self.config.trials_per_block,
            target_trial_percentage: self.config.target_trial_percentage,
            sequences,
        };
        order.validate()?;

        Ok(SubjectOrder {
            participant,
            order,
            blocks,
        })
    }

    /// Builds orders for participants `0..count`, drawing from one random
    /// stream so the whole set is reproducible from the seed.
    pub fn build_participants(&mut self, count: usize) -> Result<Vec<SubjectOrder>, ErpError> {
        self.counterbalance
            .check_unique(count, self.config.num_sequences);
        (0..count).map(|p| self.build_subject(p)).collect()
    }
}
