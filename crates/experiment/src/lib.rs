//! Command-line front end of the auditory ERP experiment: subject file
//! generation, console-driven runs against the mock source and verification
//! of subject and data files.

pub mod classify;
pub mod config;
pub mod console;
pub mod generate;
pub mod run;
pub mod verify;

pub use config::{ClassifierConfig, ExperimentConfig, RunConfig};
pub use generate::{generate_subjects, GeneratedSubject};
pub use run::{run_subject, run_subject_with_resume, RunOutcome};
pub use verify::verify;
