//! Property tests for balanced block generation.

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use sequencing::{BalancedPairing, BlockSpec, Quotas, SequenceStrategy, TargetTrials};

/// Block shapes that are always feasible: `stimuli - 1` divides both the
/// target count and the non-target count, and the free non-targets cover the
/// minimum spacing.
fn feasible_spec() -> impl Strategy<Value = BlockSpec> {
    (2usize..=4, 1usize..=6, 0usize..=4, 0usize..=2, 1usize..=4)
        .prop_flat_map(|(stimuli, pair_mult, free_mult, min_sep, spread)| {
            let non_targets = stimuli - 1;
            let n_target = non_targets * pair_mult;
            // Each non-target precedes `pair_mult` targets plus free trials.
            let per_non_target = pair_mult + free_mult + n_target * min_sep.saturating_sub(1);
            let trials = n_target + non_targets * per_non_target;
            (0..stimuli).prop_map(move |target| BlockSpec {
                stimulus_count: stimuli,
                target_index: target,
                trials,
                target_trials: TargetTrials::Count(n_target),
                extra_targets: 0,
                min_separation: min_sep,
                max_separation: min_sep.max(1) + spread,
                allow_target_repeat: false,
            })
        })
}

/// Block shapes whose non-target share does not divide evenly among the
/// non-target stimuli, with enough non-targets to precede every target and
/// fill the minimum spacing.
fn remainder_spec() -> impl Strategy<Value = BlockSpec> {
    (2usize..=4, 1usize..=8, 0usize..=2, 1usize..=4)
        .prop_flat_map(|(stimuli, n_target, min_sep, spread)| {
            let non_targets = stimuli - 1;
            let run_min = min_sep.max(1) - 1;
            let per_non_target =
                n_target.div_ceil(non_targets) + (n_target * run_min).div_ceil(non_targets);
            (0..stimuli, 0..non_targets.max(1)).prop_map(move |(target, remainder)| BlockSpec {
                stimulus_count: stimuli,
                target_index: target,
                trials: n_target + non_targets * per_non_target + remainder,
                target_trials: TargetTrials::Count(n_target),
                extra_targets: 0,
                min_separation: min_sep,
                max_separation: min_sep.max(1) + spread,
                allow_target_repeat: false,
            })
        })
}

/// Block shapes that may place targets back to back.
fn repeat_spec() -> impl Strategy<Value = BlockSpec> {
    (2usize..=4, 1usize..=12, 0usize..=1, 1usize..=4, 0usize..=3)
        .prop_flat_map(|(stimuli, n_target, min_sep, max_sep, slack)| {
            let non_targets = stimuli - 1;
            let per_non_target = n_target / stimuli + 1 + slack;
            (0..stimuli).prop_map(move |target| BlockSpec {
                stimulus_count: stimuli,
                target_index: target,
                trials: n_target + non_targets * per_non_target,
                target_trials: TargetTrials::Count(n_target),
                extra_targets: 0,
                min_separation: min_sep,
                max_separation: max_sep,
                allow_target_repeat: true,
            })
        })
}

proptest! {
    #[test]
    fn prop_remainders_keep_counts_exact(spec in remainder_spec(), seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let block = BalancedPairing.build_block(&spec, &mut rng).unwrap();
        let quotas = Quotas::compute(&spec).unwrap();

        prop_assert_eq!(block.trials.len(), spec.trials);
        for stim in 0..spec.stimulus_count {
            prop_assert_eq!(block.count_of(stim), quotas.counts[stim]);
        }
        let non_target: Vec<usize> = (0..spec.stimulus_count)
            .filter(|&i| i != spec.target_index)
            .map(|i| quotas.counts[i])
            .collect();
        prop_assert_eq!(non_target.iter().sum::<usize>(), quotas.n_non_target);
        let max = non_target.iter().copied().max().unwrap_or(0);
        let min = non_target.iter().copied().min().unwrap_or(0);
        prop_assert!(max - min <= 1, "uneven non-target counts {:?}", non_target);
        for gap in block.target_gaps() {
            prop_assert!(gap >= spec.min_separation && gap <= spec.max_separation);
        }
    }

    #[test]
    fn prop_repeats_keep_target_count(spec in repeat_spec(), seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let block = BalancedPairing.build_block(&spec, &mut rng).unwrap();
        let quotas = Quotas::compute(&spec).unwrap();

        prop_assert_eq!(block.trials.len(), spec.trials);
        prop_assert_eq!(block.count_of(spec.target_index), quotas.n_target);
        for stim in 0..spec.stimulus_count {
            prop_assert_eq!(block.count_of(stim), quotas.counts[stim]);
        }
        let units: usize = block.pairs.iter().map(|p| p.placed * p.target_units()).sum();
        prop_assert_eq!(units, quotas.n_target);

        // Every repeat placement lays down one [T, T].
        let repeats: usize = block.pairs.iter().filter(|p| p.is_repeat()).map(|p| p.placed).sum();
        let gaps = block.target_gaps();
        prop_assert!(gaps.iter().filter(|&&g| g == 0).count() >= repeats);
        for gap in gaps {
            prop_assert!(gap <= spec.max_separation, "gap {} above {}", gap, spec.max_separation);
        }
    }

    #[test]
    fn prop_counts_are_exact(spec in feasible_spec(), seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let block = BalancedPairing.build_block(&spec, &mut rng).unwrap();
        let quotas = Quotas::compute(&spec).unwrap();

        prop_assert_eq!(block.trials.len(), spec.trials);
        for stim in 0..spec.stimulus_count {
            prop_assert_eq!(block.count_of(stim), quotas.counts[stim]);
        }
        prop_assert_eq!(block.count_of(spec.target_index), quotas.n_target);
    }

    #[test]
    fn prop_adjacent_targets_respect_separation(spec in feasible_spec(), seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let block = BalancedPairing.build_block(&spec, &mut rng).unwrap();
        for gap in block.target_gaps() {
            prop_assert!(gap >= spec.min_separation, "gap {} below {}", gap, spec.min_separation);
            prop_assert!(gap <= spec.max_separation, "gap {} above {}", gap, spec.max_separation);
        }
    }

    #[test]
    fn prop_pairings_are_balanced(spec in feasible_spec(), seed in any::<u64>()) {
        let mut rng = StdRng::seed_from_u64(seed);
        let block = BalancedPairing.build_block(&spec, &mut rng).unwrap();
        let placed: Vec<usize> = block.pairs.iter().map(|p| p.placed).collect();
        let max = placed.iter().copied().max().unwrap_or(0);
        let min = placed.iter().copied().min().unwrap_or(0);
        prop_assert!(max - min <= 1, "unbalanced pairings {:?}", placed);
        prop_assert_eq!(placed.iter().sum::<usize>(), block.n_target);
    }
}

#[test]
fn first_target_is_within_max_separation_of_block_start() {
    let spec = BlockSpec {
        stimulus_count: 3,
        target_index: 0,
        trials: 30,
        target_trials: TargetTrials::Count(6),
        extra_targets: 0,
        min_separation: 2,
        max_separation: 3,
        allow_target_repeat: false,
    };
    for seed in 0..20 {
        let block = BalancedPairing
            .build_block(&spec, &mut StdRng::seed_from_u64(seed))
            .unwrap();
        let first = block.trials.iter().position(|&t| t == 0).unwrap();
        assert!(first <= spec.max_separation, "seed {}: first target at {}", seed, first);
    }
}
