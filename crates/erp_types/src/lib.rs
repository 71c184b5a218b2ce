//! Shared types for the auditory ERP experiment
//!
//! This crate contains the core types used throughout the experiment,
//! including samples and event codes, trial orders, the acquisition clock,
//! configuration types and the error taxonomy.

pub mod clock;
pub mod config;
pub mod data;
pub mod error;
pub mod event;
pub mod order;

// Re-export commonly used types
pub use clock::*;
pub use config::*;
pub use data::*;
pub use error::*;
pub use event::*;
pub use order::*;
