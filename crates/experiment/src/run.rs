//! Runs one subject's experiment against the mock acquisition source.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use erp_sensor::{shared, MockSource};
use erp_types::{ErpError, MonotonicClock, StimulusOrder};
use presenter::{ExperimentMode, PresentationState, PresentationStateMachine, Tick};
use recording::{AcquisitionThread, BlockRecorder, ConnectionLink, SampleBuffer};

use crate::classify::classify;
use crate::config::ExperimentConfig;
use crate::console::{ConsoleBreakScreen, ConsoleDeck};

const ACQUISITION_POLL: Duration = Duration::from_millis(5);

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Finished,
    Cancelled,
}

pub async fn run_subject(
    config: &ExperimentConfig,
    subject: u32,
    cancel: CancellationToken,
) -> Result<RunOutcome, ErpError> {
    run_subject_with_resume(config, subject, cancel, None).await
}

/// Like [`run_subject`], with participant resume requests arriving on
/// `resume`. Each request ends the current break once its countdown is over;
/// earlier requests are ignored.
pub async fn run_subject_with_resume(
    config: &ExperimentConfig,
    subject: u32,
    cancel: CancellationToken,
    resume: Option<UnboundedReceiver<()>>,
) -> Result<RunOutcome, ErpError> {
    let order = StimulusOrder::load(&config.export.subject_directory, subject)?;
    info!(
        "Loaded {} for subject {}: {}",
        StimulusOrder::subject_file_name(subject),
        subject,
        order.summary()
    );

    let clock = Arc::new(MonotonicClock::new());
    let source = shared(MockSource::new(config.source.clone(), clock.clone())?);
    let buffer = Arc::new(SampleBuffer::new());
    let link = ConnectionLink::default();
    let mut acquisition =
        AcquisitionThread::spawn(source.clone(), buffer.clone(), link.clone(), ACQUISITION_POLL)?;

    let recorder = BlockRecorder::new(buffer, source, link, subject)
        .with_window(config.epoch)
        .with_export(config.export.clone())
        .with_drain(config.drain);

    let stimulus_count = order.num_stimuli;
    let mut machine = PresentationStateMachine::new(
        Box::new(ConsoleDeck::new(config.stimulus_names(stimulus_count))),
        recorder,
        clock,
        config.timing.clone(),
    )
    .with_break_screen(Box::new(ConsoleBreakScreen))
    .with_mode(config.mode)
    .with_subject_directory(config.export.subject_directory.clone());

    let outcome = match machine.load_order(order).and_then(|_| machine.start_presentation()) {
        Ok(()) => drive(&mut machine, config, cancel, resume).await,
        Err(e) => Err(e),
    };
    machine.stop_presentation();
    machine.recorder().stop_collecting();
    acquisition.stop();

    if matches!(outcome, Ok(RunOutcome::Finished)) && machine.mode() == ExperimentMode::Calibration {
        let written = machine.recorder().write_training_set()?;
        info!("Training set of {} epochs written for subject {}", written, subject);
    }
    outcome
}

/// Waits for the next resume request. Pends forever without a receiver or
/// once every sender is gone.
async fn resume_requested(resume: &mut Option<UnboundedReceiver<()>>) {
    if let Some(rx) = resume {
        if rx.recv().await.is_some() {
            return;
        }
        *resume = None;
    }
    std::future::pending::<()>().await
}

fn handle_resume_request(machine: &mut PresentationStateMachine) -> Result<(), ErpError> {
    if machine.state() != PresentationState::Break {
        debug!("Ignoring resume request in {}", machine.state());
        return Ok(());
    }
    if !machine.resume()? {
        info!("Break continues for {:.1}s", machine.break_remaining());
    }
    Ok(())
}

async fn drive(
    machine: &mut PresentationStateMachine,
    config: &ExperimentConfig,
    cancel: CancellationToken,
    mut resume: Option<UnboundedReceiver<()>>,
) -> Result<RunOutcome, ErpError> {
    let mut interval = tokio::time::interval(config.run.frame());
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut last = Instant::now();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Run cancelled at {:?}", machine.cursor());
                return Ok(RunOutcome::Cancelled);
            }
            _ = resume_requested(&mut resume) => {
                handle_resume_request(machine)?;
                continue;
            }
            _ = interval.tick() => {}
        }

        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f64();
        last = now;

        // A block export may wait on the acquisition drain.
        match tokio::task::block_in_place(|| machine.tick(dt)) {
            Ok(Tick::BlockExported { report, .. }) => {
                if !report.drain_complete {
                    warn!("Block written to {} without its full last window", report.path.display());
                }
                if machine.mode() == ExperimentMode::Live {
                    match classify(&config.classifier.address, &report.path, config.classifier.timeout()).await {
                        Ok(index) => {
                            machine.select_option(index);
                        }
                        Err(e) => warn!("{}", e),
                    }
                }
            }
            Ok(_) => {}
            Err(e) if e.is_fatal() => {
                error!("Stopping run: {}", e);
                return Err(e);
            }
            Err(e @ ErpError::AcquisitionUnavailable(_)) if !machine.is_running() => {
                error!("Stopping run: {}", e);
                return Err(e);
            }
            Err(e) => warn!("{}", e),
        }

        match machine.state() {
            PresentationState::ExperimentDone => return Ok(RunOutcome::Finished),
            PresentationState::Break if config.run.auto_resume => {
                if let Err(e) = machine.resume() {
                    error!("Cannot resume: {}", e);
                    return Err(e);
                }
            }
            _ => {}
        }
    }
}
