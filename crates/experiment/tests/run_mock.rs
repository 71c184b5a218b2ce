//! A compressed run of a generated subject against the mock source.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use erp_experiment::{generate_subjects, run_subject, run_subject_with_resume, ExperimentConfig, RunOutcome};
use erp_types::{data_file_path, DrainConfig, EpochWindow, ExportConfig, TimingConfig};
use recording::EventTally;
use sequencing::GenerationConfig;

fn fast_config(root: &std::path::Path) -> ExperimentConfig {
    ExperimentConfig {
        generation: GenerationConfig {
            num_sequences: 1,
            blocks_per_sequence: 2,
            num_stimuli: 3,
            trials_per_block: 12,
            target_trials: Some(4),
            min_target_separation: 1,
            max_target_separation: 4,
            ..Default::default()
        },
        timing: TimingConfig {
            soa: 0.02,
            start_offset: 0.05,
            times_to_cue: 1,
            cue_to_trial_pause: 0.02,
            settle_before_write: 0.05,
            settle_at_experiment_end: 0.05,
            block_break: 0.05,
            sequence_break: 0.05,
            highlight_current_stimulus: true,
        },
        epoch: EpochWindow {
            start_offset: 0.0,
            duration: 0.1,
        },
        export: ExportConfig {
            directory: root.join("data"),
            subject_directory: root.join("subjects"),
            report_directory: root.join("reports"),
            append_if_exists: true,
        },
        drain: DrainConfig {
            timeout_ms: 2_000,
            ..Default::default()
        },
        run: erp_experiment::RunConfig {
            frame_ms: 2,
            ..Default::default()
        },
        ..Default::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn generated_subject_runs_to_completion() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config(dir.path());
    generate_subjects(
        &config.generation,
        1,
        &config.export.subject_directory,
        &config.export.report_directory,
    )
    .unwrap();

    let outcome = tokio::time::timeout(
        Duration::from_secs(30),
        run_subject(&config, 0, CancellationToken::new()),
    )
    .await
    .expect("run finished in time")
    .unwrap();
    assert_eq!(outcome, RunOutcome::Finished);

    let tally = EventTally::from_data_file(&data_file_path(&config.export.directory, 0)).unwrap();
    assert_eq!(tally.total_events(), 24);
    assert_eq!(tally.target.values().sum::<usize>(), 8);
    assert_eq!(tally.unknown, 0);

    let labels = std::fs::read_to_string(config.export.training_labels_path(0)).unwrap();
    assert_eq!(labels.trim().split(',').count(), 24);
    assert_eq!(labels.trim().split(',').filter(|l| *l == "1").count(), 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn manual_resume_continues_after_break() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = fast_config(dir.path());
    config.run.auto_resume = false;
    generate_subjects(
        &config.generation,
        1,
        &config.export.subject_directory,
        &config.export.report_directory,
    )
    .unwrap();

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    tokio::spawn(async move {
        while tx.send(()).is_ok() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    });

    let outcome = tokio::time::timeout(
        Duration::from_secs(30),
        run_subject_with_resume(&config, 0, CancellationToken::new(), Some(rx)),
    )
    .await
    .expect("run finished in time")
    .unwrap();
    assert_eq!(outcome, RunOutcome::Finished);

    let tally = EventTally::from_data_file(&data_file_path(&config.export.directory, 0)).unwrap();
    assert_eq!(tally.total_events(), 24);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn deck_follows_the_subject_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config(dir.path());
    let generation = GenerationConfig {
        num_stimuli: 4,
        target_trials: Some(3),
        ..config.generation.clone()
    };
    generate_subjects(
        &generation,
        1,
        &config.export.subject_directory,
        &config.export.report_directory,
    )
    .unwrap();

    let outcome = tokio::time::timeout(
        Duration::from_secs(30),
        run_subject(&config, 0, CancellationToken::new()),
    )
    .await
    .expect("run finished in time")
    .unwrap();
    assert_eq!(outcome, RunOutcome::Finished);

    let tally = EventTally::from_data_file(&data_file_path(&config.export.directory, 0)).unwrap();
    assert_eq!(tally.total_events(), 24);
    assert_eq!(tally.target.values().sum::<usize>(), 6);
    assert_eq!(tally.unknown, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_subject_file_fails_before_presenting() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config(dir.path());
    let err = run_subject(&config, 9, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is_fatal());
    assert!(!data_file_path(&config.export.directory, 9).exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancellation_stops_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = fast_config(dir.path());
    config.timing.start_offset = 60.0;
    generate_subjects(
        &config.generation,
        1,
        &config.export.subject_directory,
        &config.export.report_directory,
    )
    .unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });
    let outcome = run_subject(&config, 0, cancel).await.unwrap();
    assert_eq!(outcome, RunOutcome::Cancelled);
}
