use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::info;

use erp_types::ErpError;
use sequencing::{write_reports, GenerationConfig, SequenceBuilder};

/// Files written for one participant.
#[derive(Debug, Clone)]
pub struct GeneratedSubject {
    pub participant: usize,
    pub order_file: PathBuf,
    pub config_report: PathBuf,
    pub order_report: PathBuf,
}

/// Builds trial orders for `participants` subjects and writes each as
/// `SUBJECT_<n>.json` under `subject_dir`, with its reports under
/// `report_dir`.
pub fn generate_subjects(
    config: &GenerationConfig,
    participants: usize,
    subject_dir: &Path,
    report_dir: &Path,
) -> Result<Vec<GeneratedSubject>, ErpError> {
    let mut builder = SequenceBuilder::new(config.clone())?;
    let strategy = builder.strategy_name();
    let subjects = builder.build_participants(participants)?;
    let at = Local::now();

    let mut written = Vec::with_capacity(subjects.len());
    for subject in &subjects {
        let order_file = subject.order.save(subject_dir, subject.participant as u32)?;
        let reports = write_reports(report_dir, config, strategy, subject, &at)?;
        written.push(GeneratedSubject {
            participant: subject.participant,
            order_file,
            config_report: reports.config,
            order_report: reports.presentation_order,
        });
    }
    info!(
        "Generated {} subject files in {} with the {} strategy",
        written.len(),
        subject_dir.display(),
        strategy
    );
    Ok(written)
}
