//! Read-back checks of subject files and recorded data files.

use std::fmt::Write as _;
use std::path::Path;

use erp_types::{ErpError, StimulusOrder};
use recording::EventTally;
use sequencing::TrialTally;

/// Per-stimulus target and non-target counts of a subject file, and of a
/// recorded data file when one is given.
pub fn verify(subject_dir: &Path, subject: u32, data_file: Option<&Path>) -> Result<String, ErpError> {
    let order = StimulusOrder::load(subject_dir, subject)?;
    let mut out = String::new();
    let _ = writeln!(out, "{}", StimulusOrder::subject_file_name(subject));
    let _ = writeln!(out, "{}", order.summary());
    let _ = writeln!(out, "{}", TrialTally::from_order(&order));

    if let Some(path) = data_file {
        let tally = EventTally::from_data_file(path)?;
        let _ = writeln!(out, "{}", path.display());
        let _ = writeln!(out, "{}", tally);
    }
    Ok(out)
}
