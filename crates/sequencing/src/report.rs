//! Human-readable configuration and presentation order reports.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::info;

use erp_types::ErpError;

use crate::builder::{GenerationConfig, SubjectOrder};

/// Timestamp used in report file names, e.g. `03-14-24_9-26-53`.
pub fn file_stamp(at: &DateTime<Local>) -> String {
    at.format("%m-%d-%y_%-H-%M-%S").to_string()
}

/// Paths of the two reports written for one subject.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportPaths {
    pub config: PathBuf,
    pub presentation_order: PathBuf,
}

pub fn config_report(config: &GenerationConfig, strategy: &str, subject: &SubjectOrder, at: &DateTime<Local>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Audio ERP Experiment");
    let _ = writeln!(out, "{}", at.format("%m/%d/%y %-H:%M:%S"));
    let _ = writeln!(out);
    let _ = writeln!(out, "Participant: {}", subject.participant);
    let _ = writeln!(out, "Strategy: {}", strategy);
    let _ = writeln!(out, "Seed: {}", config.seed);
    let _ = writeln!(out, "Total number of stimuli: {}", config.num_stimuli);
    let _ = writeln!(
        out,
        "Sequences: {}, Blocks per sequence: {}, Trials per block: {}",
        config.num_sequences, config.blocks_per_sequence, config.trials_per_block
    );
    let _ = writeln!(
        out,
        "Total number of trials: {}",
        config.total_blocks() * config.trials_per_block
    );
    let _ = writeln!(
        out,
        "Target Can Repeat: {}",
        if config.allow_target_repeat { "Yes" } else { "No" }
    );
    let _ = writeln!(
        out,
        "Target separation: [{}, {}]",
        config.min_target_separation, config.max_target_separation
    );

    for (i, block) in subject.blocks.iter().enumerate() {
        let sequence = i / config.blocks_per_sequence;
        let index = i % config.blocks_per_sequence;
        let _ = writeln!(out);
        let _ = writeln!(out, "=== Sequence {} Block {} ===", sequence, index);
        let _ = writeln!(out, "Target stimulus: {}", block.target);
        let _ = writeln!(out, "Total number of target trials: {}", block.n_target);
        let _ = writeln!(
            out,
            "Total number of non-target trials: {}",
            block.trials.len() - block.n_target
        );
        let _ = writeln!(
            out,
            "Trials per non-target stimulus: {}",
            block.trials_per_non_target
        );
        let _ = writeln!(
            out,
            "Desired number of each stimulus pairing: {}",
            block.desired_pairings
        );
        let _ = writeln!(out, "=== Stimulus Pairings ===");
        for pair in &block.pairs {
            let _ = writeln!(out, "{}", pair);
        }
    }
    out
}

/// One line per trial: the stimulus index, followed by its position when the
/// strategy assigns positions.
pub fn presentation_order_report(subject: &SubjectOrder, blocks_per_sequence: usize) -> String {
    let mut out = String::new();
    for (i, block) in subject.blocks.iter().enumerate() {
        let _ = writeln!(
            out,
            "# sequence {} block {} target {}",
            i / blocks_per_sequence,
            i % blocks_per_sequence,
            block.target
        );
        match &block.positions {
            Some(positions) => {
                for (trial, position) in block.trials.iter().zip(positions) {
                    let _ = writeln!(out, "{}, {}", trial, position);
                }
            }
            None => {
                for trial in &block.trials {
                    let _ = writeln!(out, "{}", trial);
                }
            }
        }
    }
    out
}

/// Writes `config_<stamp>.txt` and `presentation_order_<stamp>.txt` into a
/// per-subject folder under `dir`.
pub fn write_reports(
    dir: &Path,
    config: &GenerationConfig,
    strategy: &str,
    subject: &SubjectOrder,
    at: &DateTime<Local>,
) -> Result<ReportPaths, ErpError> {
    let subject_dir = dir.join(format!("SUBJECT_{}", subject.participant));
    fs::create_dir_all(&subject_dir)?;
    let stamp = file_stamp(at);

    let paths = ReportPaths {
        config: subject_dir.join(format!("config_{}.txt", stamp)),
        presentation_order: subject_dir.join(format!("presentation_order_{}.txt", stamp)),
    };
    fs::write(&paths.config, config_report(config, strategy, subject, at))?;
    fs::write(
        &paths.presentation_order,
        presentation_order_report(subject, config.blocks_per_sequence),
    )?;
    info!("Wrote reports for participant {} to {:?}", subject.participant, subject_dir);
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SequenceBuilder;
    use chrono::TimeZone;

    fn config() -> GenerationConfig {
        GenerationConfig {
            num_sequences: 1,
            blocks_per_sequence: 2,
            num_stimuli: 3,
            trials_per_block: 20,
            target_trial_percentage: 0.2,
            ..GenerationConfig::default()
        }
    }

    #[test]
    fn test_file_stamp_format() {
        let at = Local.with_ymd_and_hms(2024, 3, 4, 9, 5, 7).unwrap();
        assert_eq!(file_stamp(&at), "03-04-24_9-05-07");
    }

    #[test]
    fn test_reports_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut builder = SequenceBuilder::new(config()).unwrap();
        let subject = builder.build_subject(1).unwrap();
        let at = Local.with_ymd_and_hms(2024, 3, 4, 9, 5, 7).unwrap();

        let paths = write_reports(dir.path(), builder.config(), builder.strategy_name(), &subject, &at).unwrap();

        let config_text = fs::read_to_string(&paths.config).unwrap();
        assert!(config_text.starts_with("Audio ERP Experiment\n03/04/24 9:05:07\n"));
        assert!(config_text.contains("=== Sequence 0 Block 1 ==="));
        assert!(config_text.contains("Pairing: "));

        let order_text = fs::read_to_string(&paths.presentation_order).unwrap();
        let trial_lines = order_text.lines().filter(|l| !l.starts_with('#')).count();
        assert_eq!(trial_lines, 40);
        assert!(paths.config.ends_with("SUBJECT_1/config_03-04-24_9-05-07.txt"));
    }
}
