//! Trial order generation for the auditory ERP experiment.
//!
//! A [`SequenceBuilder`] turns a [`GenerationConfig`] into per-subject
//! [`erp_types::StimulusOrder`]s. Block orders come from a pluggable
//! [`SequenceStrategy`]; the default balanced strategy keeps exact
//! per-stimulus counts, bounds the spacing between targets, and balances
//! which stimulus precedes each target.

pub mod builder;
pub mod latin;
pub mod pair;
pub mod plan;
pub mod report;
pub mod strategy;
pub mod tally;

pub use builder::{GenerationConfig, SequenceBuilder, SubjectOrder};
pub use pair::StimPair;
pub use plan::{BlockPlan, BlockSpec, Quotas, TargetTrials};
pub use report::{write_reports, ReportPaths};
pub use strategy::{
    BalancedPairing, BlockOrder, PositionShuffled, SequenceStrategy, SimpleRandom, StrategyKind,
};
pub use tally::TrialTally;
