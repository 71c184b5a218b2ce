//! Per-block trial quotas, target pairings and run-length bounds.
//!
//! A balanced block is laid out as alternating runs of free non-target
//! trials and pair placements:
//!
//! ```text
//! run_0 [p_1 T] run_1 [p_2 T] ... run_{k-1} [p_k T] tail
//! ```
//!
//! Each pair contributes its preceding stimulus plus the target, so the
//! number of non-targets between consecutive targets is `run + 1`. Runs are
//! drawn in `[max(min_sep, 1) - 1, max_sep - 1]`; the tail after the last
//! target takes whatever those bounds cannot absorb.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use erp_types::ErpError;

use crate::pair::StimPair;

/// How many target trials a block holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetTrials {
    /// Fraction of the block's trials, rounded to the nearest trial
    Fraction(f64),
    /// Exact number of target trials
    Count(usize),
}

/// Inputs for one block's trial order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSpec {
    pub stimulus_count: usize,
    pub target_index: usize,
    /// Total trials in the block
    pub trials: usize,
    pub target_trials: TargetTrials,
    /// Target trials added on top of `target_trials`, taken from the
    /// non-target share
    #[serde(default)]
    pub extra_targets: usize,
    pub min_separation: usize,
    pub max_separation: usize,
    #[serde(default)]
    pub allow_target_repeat: bool,
}

impl BlockSpec {
    pub fn validate(&self) -> Result<(), ErpError> {
        if self.stimulus_count < 2 {
            return Err(ErpError::config(format!(
                "At least two stimuli are required, got {}",
                self.stimulus_count
            )));
        }
        if self.target_index >= self.stimulus_count {
            return Err(ErpError::config(format!(
                "Target index {} outside of {} stimuli",
                self.target_index, self.stimulus_count
            )));
        }
        if self.max_separation < self.min_separation {
            return Err(ErpError::config(format!(
                "Maximum target separation {} is below the minimum {}",
                self.max_separation, self.min_separation
            )));
        }
        if self.max_separation == 0 && !self.allow_target_repeat {
            return Err(ErpError::config(
                "Maximum target separation must be at least 1 when targets cannot repeat",
            ));
        }
        if let TargetTrials::Fraction(p) = self.target_trials {
            if !(0.0..=1.0).contains(&p) {
                return Err(ErpError::config(format!(
                    "Target trial percentage must be within [0, 1], got {}",
                    p
                )));
            }
        }
        Ok(())
    }
}

/// Per-stimulus trial counts of a block.
#[derive(Debug, Clone, PartialEq)]
pub struct Quotas {
    pub target_index: usize,
    pub n_target: usize,
    pub n_non_target: usize,
    /// Base count for each non-target; the first `n_non_target % (N - 1)`
    /// non-targets get one more
    pub trials_per_non_target: usize,
    /// Trials per stimulus index, target included
    pub counts: Vec<usize>,
}

impl Quotas {
    pub fn compute(spec: &BlockSpec) -> Result<Self, ErpError> {
        spec.validate()?;
        let base_targets = match spec.target_trials {
            TargetTrials::Fraction(p) => (spec.trials as f64 * p).round() as usize,
            TargetTrials::Count(n) => n,
        };
        let n_target = base_targets + spec.extra_targets;
        if n_target > spec.trials {
            return Err(ErpError::config(format!(
                "{} target trials do not fit in a block of {} trials",
                n_target, spec.trials
            )));
        }

        let n_non_target = spec.trials - n_target;
        let non_targets = spec.stimulus_count - 1;
        let trials_per_non_target = n_non_target / non_targets;
        let remainder = n_non_target % non_targets;

        let mut rank = 0;
        let counts = (0..spec.stimulus_count)
            .map(|i| {
                if i == spec.target_index {
                    return n_target;
                }
                let extra = usize::from(rank < remainder);
                rank += 1;
                trials_per_non_target + extra
            })
            .collect();

        Ok(Self {
            target_index: spec.target_index,
            n_target,
            n_non_target,
            trials_per_non_target,
            counts,
        })
    }
}

/// Everything needed to lay out a balanced block.
#[derive(Debug, Clone)]
pub struct BlockPlan {
    pub quotas: Quotas,
    /// Base pairings per eligible preceding stimulus
    pub desired_pairings: usize,
    pub pairs: Vec<StimPair>,
    /// Non-target trials left over after the pairs take their share
    pub free: Vec<usize>,
    pub run_min: usize,
    pub run_max: usize,
}

impl BlockPlan {
    pub fn new(spec: &BlockSpec, rng: &mut StdRng) -> Result<Self, ErpError> {
        let quotas = Quotas::compute(spec)?;
        let (desired_pairings, pairs) = build_pairs(spec, quotas.n_target, rng);

        let mut free = vec![0usize; spec.stimulus_count];
        for (i, slot) in free.iter_mut().enumerate() {
            if i == spec.target_index {
                continue;
            }
            let paired: usize = pairs
                .iter()
                .filter(|p| p.preceding == i)
                .map(|p| p.remaining)
                .sum();
            *slot = quotas.counts[i].checked_sub(paired).ok_or_else(|| {
                ErpError::config(format!(
                    "Stimulus {} has {} trials but must precede {} targets",
                    i, quotas.counts[i], paired
                ))
            })?;
        }

        let run_min = spec.min_separation.max(1) - 1;
        let run_max = spec.max_separation.saturating_sub(1).max(run_min);
        let plan = Self {
            quotas,
            desired_pairings,
            pairs,
            free,
            run_min,
            run_max,
        };

        let needed = plan.placements() * plan.run_min;
        if plan.free_total() < needed {
            return Err(ErpError::config(format!(
                "Minimum separation {} needs {} free non-target trials, only {} remain",
                spec.min_separation,
                needed,
                plan.free_total()
            )));
        }
        Ok(plan)
    }

    /// Number of pair placements in the block.
    pub fn placements(&self) -> usize {
        self.pairs.iter().map(|p| p.remaining).sum()
    }

    pub fn free_total(&self) -> usize {
        self.free.iter().sum()
    }

    /// Draws the run lengths: one run before each placement, then the tail.
    ///
    /// Always returns `placements() + 1` runs summing to `free_total()`.
    pub fn draw_runs(&self, rng: &mut StdRng) -> Vec<usize> {
        let k = self.placements();
        let total = self.free_total();
        let (a, b) = (self.run_min, self.run_max);
        // The tail only grows past `b` when the bounded runs cannot absorb
        // the free trials.
        let tail_cap = b.max(total.saturating_sub(k * b));

        let mut left = total;
        let mut runs = Vec::with_capacity(k + 1);
        for j in 0..k {
            let after = k - 1 - j;
            let lo = a.max(left.saturating_sub(after * b + tail_cap));
            let hi = b.min(left - after * a);
            let run = if hi > lo { rng.gen_range(lo..=hi) } else { lo };
            runs.push(run);
            left -= run;
        }
        runs.push(left);
        runs
    }
}

fn build_pairs(spec: &BlockSpec, n_target: usize, rng: &mut StdRng) -> (usize, Vec<StimPair>) {
    let target = spec.target_index;
    let n = spec.stimulus_count;

    if !spec.allow_target_repeat {
        let mut pairs: Vec<StimPair> = (0..n)
            .filter(|&i| i != target)
            .map(|i| StimPair::new(target, i, 0))
            .collect();
        let desired = n_target / pairs.len();
        let remainder = n_target % pairs.len();
        for pair in pairs.iter_mut() {
            pair.remaining = desired;
        }
        let mut order: Vec<usize> = (0..pairs.len()).collect();
        order.shuffle(rng);
        for &i in order.iter().take(remainder) {
            pairs[i].remaining += 1;
        }
        return (desired, pairs);
    }

    // A repeat placement puts two targets back to back.
    let desired = n_target / n;
    let mut pairs: Vec<StimPair> = (0..n).map(|i| StimPair::new(target, i, desired)).collect();
    let non_self_units = (n - 1) * desired;
    let repeats = desired.min((n_target - non_self_units) / 2);
    pairs[target].remaining = repeats;

    let mut remainder = n_target - non_self_units - 2 * repeats;
    let mut order: Vec<usize> = (0..n).filter(|&i| i != target).collect();
    order.shuffle(rng);
    for &i in order.iter().cycle() {
        if remainder == 0 {
            break;
        }
        pairs[i].remaining += 1;
        remainder -= 1;
    }
    (desired, pairs)
}

/// Picks a non-target stimulus that still has free trials and takes one.
///
/// When none is left, falls back to a uniform draw over all non-targets.
pub fn choose_available_stimulus(free: &mut [usize], target: usize, rng: &mut StdRng) -> usize {
    let available: Vec<usize> = (0..free.len())
        .filter(|&i| i != target && free[i] > 0)
        .collect();
    let chosen = match available.choose(rng) {
        Some(&i) => i,
        None => {
            let non_targets: Vec<usize> = (0..free.len()).filter(|&i| i != target).collect();
            let fallback = non_targets.choose(rng).copied().unwrap_or(0);
            warn!(
                "No non-target stimulus has trials left, falling back to {}",
                fallback
            );
            fallback
        }
    };
    if let Some(slot) = free.get_mut(chosen) {
        *slot = slot.saturating_sub(1);
    }
    chosen
}

/// Picks one pair with placements remaining, uniformly.
pub fn choose_available_pair(pairs: &[StimPair], rng: &mut StdRng) -> Option<usize> {
    let available: Vec<usize> = (0..pairs.len())
        .filter(|&i| pairs[i].is_available())
        .collect();
    available.choose(rng).copied()
}
