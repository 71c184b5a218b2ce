//! Frame-driven presentation of a subject's trial order.
//!
//! The machine is advanced by [`PresentationStateMachine::tick`] with the
//! elapsed frame time. It cues each block's target, plays the trials at a
//! fixed SOA while logging events on the acquisition clock, hands the block
//! to the [`BlockRecorder`] after a settle time and then waits in a break
//! until the participant resumes.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use erp_types::{Clock, ErpError, Event, EventCode, StimulusOrder, TimingConfig, TrialIndex};
use recording::BlockRecorder;

use crate::deck::{BreakScreen, Highlightable, StimulusDeck};
use crate::event_log::EventLog;
use crate::state::{Cursor, ExperimentMode, PresentationState, Tick};

pub struct PresentationStateMachine {
    deck: Box<dyn StimulusDeck>,
    break_screen: Option<Box<dyn BreakScreen>>,
    recorder: BlockRecorder,
    clock: Arc<dyn Clock>,
    timing: TimingConfig,
    mode: ExperimentMode,
    subject_directory: PathBuf,

    order: Option<StimulusOrder>,
    state: PresentationState,
    running: bool,
    cursor: Cursor,
    elapsed_cues: u32,
    events: EventLog,

    next_stim_timer: f64,
    post_block_timer: f64,
    post_block_total: f64,
    highlights_cleared: bool,
    break_remaining: f64,
    experiment_over: bool,
    at_end_of_sequence: bool,
}

impl PresentationStateMachine {
    pub fn new(
        deck: Box<dyn StimulusDeck>,
        recorder: BlockRecorder,
        clock: Arc<dyn Clock>,
        timing: TimingConfig,
    ) -> Self {
        Self {
            deck,
            break_screen: None,
            recorder,
            clock,
            timing,
            mode: ExperimentMode::Calibration,
            subject_directory: PathBuf::from("."),
            order: None,
            state: PresentationState::Cue,
            running: false,
            cursor: Cursor::default(),
            elapsed_cues: 0,
            events: EventLog::new(),
            next_stim_timer: 0.0,
            post_block_timer: 0.0,
            post_block_total: 0.0,
            highlights_cleared: true,
            break_remaining: 0.0,
            experiment_over: false,
            at_end_of_sequence: false,
        }
    }

    pub fn with_break_screen(mut self, screen: Box<dyn BreakScreen>) -> Self {
        self.break_screen = Some(screen);
        self
    }

    pub fn with_mode(mut self, mode: ExperimentMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_subject_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.subject_directory = dir.into();
        self
    }

    pub fn state(&self) -> PresentationState {
        self.state
    }

    pub fn mode(&self) -> ExperimentMode {
        self.mode
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn order(&self) -> Option<&StimulusOrder> {
        self.order.as_ref()
    }

    pub fn recorder(&self) -> &BlockRecorder {
        &self.recorder
    }

    /// Seconds left before the participant may resume; zero or less once
    /// resuming is allowed.
    pub fn break_remaining(&self) -> f64 {
        self.break_remaining
    }

    pub fn stimulus_count(&self) -> usize {
        self.deck.stimulus_count()
    }

    /// Reads `SUBJECT_<n>.json` for the recorder's subject. Any previously
    /// loaded order is dropped first, so a failed import leaves none.
    pub fn import_subject_file(&mut self) -> Result<(), ErpError> {
        self.order = None;
        let order = StimulusOrder::load(&self.subject_directory, self.recorder.subject())?;
        info!(
            "Imported {} for subject {}: {}",
            StimulusOrder::subject_file_name(self.recorder.subject()),
            self.recorder.subject(),
            order.summary()
        );
        self.load_order(order)
    }

    pub fn load_order(&mut self, order: StimulusOrder) -> Result<(), ErpError> {
        order.validate()?;
        self.order = Some(order);
        self.reset_presenter();
        Ok(())
    }

    /// Starts the presentation clock. Requires a loaded order and a connected
    /// acquisition source.
    pub fn start_presentation(&mut self) -> Result<(), ErpError> {
        if self.order.is_none() {
            return Err(ErpError::config("no subject file has been imported"));
        }
        if self.state == PresentationState::ExperimentDone {
            return Err(ErpError::config("experiment is over, reset before starting again"));
        }
        self.recorder.start_collecting()?;
        info!("Starting stimulus presentation in {:?} mode", self.mode);
        self.running = true;
        self.next_stim_timer = self.timing.start_offset;
        Ok(())
    }

    pub fn stop_presentation(&mut self) {
        if self.running {
            info!("Stopping stimulus presentation at {:?}", self.cursor);
        }
        self.running = false;
    }

    /// Moves every cursor back to the first trial of the first block.
    pub fn reset_presenter(&mut self) {
        self.cursor = Cursor::default();
        self.elapsed_cues = 0;
        self.events.clear();
        self.state = PresentationState::Cue;
        self.experiment_over = false;
        self.at_end_of_sequence = false;
        self.break_remaining = 0.0;
        self.highlights_cleared = true;
    }

    /// Forwards a selection to the deck; out-of-range indices are ignored.
    pub fn select_option(&mut self, index: usize) -> bool {
        if index < self.deck.stimulus_count() {
            self.deck.select_option(index);
            true
        } else {
            warn!(
                "Ignoring selection {} for {} stimuli",
                index,
                self.deck.stimulus_count()
            );
            false
        }
    }

    /// Leaves a finished break. Returns `Ok(false)` while the countdown is
    /// still running or when no break is in progress.
    pub fn resume(&mut self) -> Result<bool, ErpError> {
        if self.state != PresentationState::Break || self.break_remaining > 0.0 {
            return Ok(false);
        }
        if !self.recorder.is_connected() {
            return Err(ErpError::AcquisitionUnavailable(
                "cannot start the next block without a connected source".to_string(),
            ));
        }
        debug!("Resuming at {:?}", self.cursor);
        if let Some(screen) = self.break_screen.as_mut() {
            screen.end_break();
        }
        self.state = PresentationState::Cue;
        Ok(true)
    }

    /// Advances the machine by `dt` seconds of frame time.
    pub fn tick(&mut self, dt: f64) -> Result<Tick, ErpError> {
        if !self.running {
            return Ok(Tick::Idle);
        }
        self.next_stim_timer -= dt;

        match self.state {
            PresentationState::Cue => self.play_cue(),
            PresentationState::Play => self.play_trial(),
            PresentationState::WritingData => self.handle_end_of_block(dt),
            PresentationState::Break => {
                self.break_remaining -= dt;
                Ok(Tick::Idle)
            }
            PresentationState::ExperimentDone => Ok(Tick::Idle),
        }
    }

    fn play_cue(&mut self) -> Result<Tick, ErpError> {
        if self.next_stim_timer > 0.0 {
            return Ok(Tick::Idle);
        }
        if self.elapsed_cues == 0 && !self.recorder.is_connected() {
            self.running = false;
            return Err(ErpError::AcquisitionUnavailable(
                "acquisition source dropped before the block".to_string(),
            ));
        }
        if self.timing.times_to_cue == 0 {
            self.enter_play();
            return Ok(Tick::Idle);
        }

        let target = match self.current_target() {
            Ok(target) => target,
            Err(e) => return Err(self.abort_block(e)),
        };
        self.reset_highlights();
        self.deck.highlight(target, true);
        self.deck.play(target);
        self.next_stim_timer = self.timing.soa;
        self.elapsed_cues += 1;
        debug!(
            "Cue presentation {} of {} for stimulus {}",
            self.elapsed_cues, self.timing.times_to_cue, target
        );

        if self.elapsed_cues >= self.timing.times_to_cue {
            self.enter_play();
        }
        Ok(Tick::Cued(target))
    }

    fn enter_play(&mut self) {
        self.state = PresentationState::Play;
        self.next_stim_timer = self.timing.cue_to_trial_pause;
        self.elapsed_cues = 0;
    }

    fn play_trial(&mut self) -> Result<Tick, ErpError> {
        let trials_per_block = match self.order.as_ref() {
            Some(order) => order.trials_per_block,
            None => return Err(ErpError::config("no subject file has been imported")),
        };
        if self.cursor.trial >= trials_per_block || self.next_stim_timer > 0.0 {
            return Ok(Tick::Idle);
        }

        let (target, index) = match self.current_target().and_then(|t| Ok((t, self.current_trial()?))) {
            Ok(pair) => pair,
            Err(e) => return Err(self.abort_block(e)),
        };
        let code = match EventCode::encode(index == target, index) {
            Ok(code) => code,
            Err(e) => return Err(self.abort_block(e)),
        };

        debug!(
            "Trial {} of block {} in sequence {}",
            self.cursor.trial, self.cursor.block, self.cursor.sequence
        );
        self.reset_highlights();
        if self.timing.highlight_current_stimulus {
            self.deck.highlight(index, true);
        }
        self.deck.play(index);
        let event = Event::new(self.clock.local_clock(), code);
        self.events.push(event);

        if self.cursor.trial + 1 >= trials_per_block {
            self.finish_trials();
        } else {
            self.next_stim_timer = self.timing.soa;
            self.cursor.trial += 1;
        }
        Ok(Tick::Played(event))
    }

    /// Moves the cursors past the current block and schedules the export.
    fn finish_trials(&mut self) {
        info!(
            "Finished block {} of sequence {}",
            self.cursor.block, self.cursor.sequence
        );
        let settle = self.advance_block();
        self.state = PresentationState::WritingData;
        self.post_block_timer = settle;
        self.post_block_total = settle;
        self.highlights_cleared = false;
    }

    /// Returns the settle time before the export of the block just ended.
    fn advance_block(&mut self) -> f64 {
        let (blocks, sequences) = match self.order.as_ref() {
            Some(order) => (order.blocks_per_sequence, order.num_sequences),
            None => (0, 0),
        };
        self.cursor.trial = 0;
        if self.cursor.block + 1 >= blocks {
            self.at_end_of_sequence = true;
            if self.cursor.sequence + 1 >= sequences {
                info!("Finished sequence {}, experiment over", self.cursor.sequence);
                self.experiment_over = true;
                self.cursor.sequence += 1;
                return self.timing.settle_at_experiment_end;
            }
            info!("Finished sequence {}", self.cursor.sequence);
            self.cursor.sequence += 1;
            self.cursor.block = 0;
        } else {
            self.cursor.block += 1;
            self.at_end_of_sequence = false;
            self.next_stim_timer = self.timing.soa;
        }
        self.timing.settle_before_write
    }

    fn handle_end_of_block(&mut self, dt: f64) -> Result<Tick, ErpError> {
        self.post_block_timer -= dt;
        if !self.highlights_cleared && self.post_block_total - self.post_block_timer >= self.timing.soa {
            self.reset_highlights();
            self.highlights_cleared = true;
        }
        if self.post_block_timer > 0.0 {
            return Ok(Tick::Idle);
        }

        let report = match self.recorder.finish_block(self.events.as_slice()) {
            Ok(report) => report,
            Err(e) => {
                warn!("Writing block data failed, retrying: {}", e);
                self.post_block_timer = self.timing.soa;
                return Err(e);
            }
        };
        self.events.clear();

        if self.experiment_over {
            self.finish_experiment();
        } else {
            self.start_break();
        }
        Ok(Tick::BlockExported {
            report,
            next: self.state,
        })
    }

    fn start_break(&mut self) {
        let seconds = if self.at_end_of_sequence {
            self.timing.sequence_break
        } else {
            self.timing.block_break
        };
        info!("Breaking for {} s", seconds);
        self.state = PresentationState::Break;
        self.break_remaining = seconds;
        self.next_stim_timer = self.timing.start_offset;
        if let Some(screen) = self.break_screen.as_mut() {
            screen.start_break(seconds);
        }
    }

    fn finish_experiment(&mut self) {
        self.state = PresentationState::ExperimentDone;
        self.running = false;
        self.recorder.stop_collecting();
        if let Some(screen) = self.break_screen.as_mut() {
            screen.experiment_finished();
        }
        info!("Experiment finished");
    }

    /// Drops the current block's events and samples and skips to the next
    /// block. Data already exported is left alone.
    fn abort_block(&mut self, err: ErpError) -> ErpError {
        warn!(
            "Aborting block {} of sequence {}: {}",
            self.cursor.block, self.cursor.sequence, err
        );
        self.events.clear();
        self.recorder.discard();
        self.elapsed_cues = 0;
        self.reset_highlights();
        self.advance_block();
        if self.experiment_over {
            self.finish_experiment();
        } else {
            self.start_break();
        }
        err
    }

    fn reset_highlights(&mut self) {
        let count = self.deck.stimulus_count();
        self.deck.clear_highlights(count);
    }

    fn current_target(&self) -> Result<usize, ErpError> {
        let order = self
            .order
            .as_ref()
            .ok_or_else(|| ErpError::config("no subject file has been imported"))?;
        let target = order
            .sequences
            .get(self.cursor.sequence)
            .and_then(|s| s.target(self.cursor.block))
            .ok_or_else(|| ErpError::config("cursor is past the end of the trial order"))?;
        self.checked_index(target)
    }

    fn current_trial(&self) -> Result<usize, ErpError> {
        let order = self
            .order
            .as_ref()
            .ok_or_else(|| ErpError::config("no subject file has been imported"))?;
        let index = order
            .sequences
            .get(self.cursor.sequence)
            .and_then(|s| s.blocks.get(self.cursor.block))
            .and_then(|b| b.get(self.cursor.trial))
            .copied()
            .ok_or_else(|| ErpError::config("cursor is past the end of the trial order"))?;
        self.checked_index(index)
    }

    fn checked_index(&self, index: TrialIndex) -> Result<usize, ErpError> {
        let count = self.deck.stimulus_count();
        if index < 0 || index as usize >= count {
            return Err(ErpError::IndexOutOfRange { index, count });
        }
        Ok(index as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use erp_sensor::{shared, ScriptedSource};
    use erp_types::{ManualClock, Sequence};
    use recording::{ConnectionLink, ConnectionState, SampleBuffer};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Calls {
        played: Vec<usize>,
        lit: Vec<usize>,
        selected: Vec<usize>,
    }

    struct RecordingDeck {
        count: usize,
        calls: Arc<Mutex<Calls>>,
    }

    impl Highlightable for RecordingDeck {
        fn highlight(&mut self, index: usize, on: bool) {
            if on {
                self.calls.lock().unwrap().lit.push(index);
            }
        }
    }

    impl StimulusDeck for RecordingDeck {
        fn play(&mut self, index: usize) {
            self.calls.lock().unwrap().played.push(index);
        }

        fn select_option(&mut self, index: usize) {
            self.calls.lock().unwrap().selected.push(index);
        }

        fn stimulus_count(&self) -> usize {
            self.count
        }
    }

    fn order(blocks: Vec<Vec<i64>>, targets: Vec<i64>) -> StimulusOrder {
        StimulusOrder {
            num_sequences: 1,
            blocks_per_sequence: blocks.len(),
            num_stimuli: 3,
            trials_per_block: blocks[0].len(),
            target_trial_percentage: 0.33,
            sequences: vec![Sequence { targets, blocks }],
        }
    }

    fn machine(link: ConnectionLink, dir: &std::path::Path) -> (PresentationStateMachine, Arc<Mutex<Calls>>) {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let deck = RecordingDeck {
            count: 3,
            calls: calls.clone(),
        };
        let (source, _feed) = ScriptedSource::new(1, 100.0);
        let recorder = BlockRecorder::new(Arc::new(SampleBuffer::new()), shared(source), link, 1)
            .with_export(erp_types::ExportConfig {
                directory: dir.to_path_buf(),
                ..Default::default()
            });
        let timing = TimingConfig {
            start_offset: 0.0,
            cue_to_trial_pause: 0.0,
            ..Default::default()
        };
        let machine = PresentationStateMachine::new(
            Box::new(deck),
            recorder,
            Arc::new(ManualClock::new(0.0)),
            timing,
        )
        .with_subject_directory(dir);
        (machine, calls)
    }

    #[test]
    fn test_start_refused_without_order_or_connection() {
        let dir = tempfile::tempdir().unwrap();
        let (mut m, _) = machine(ConnectionLink::new(ConnectionState::Connected), dir.path());
        assert!(m.start_presentation().unwrap_err().is_fatal());

        let (mut m, _) = machine(ConnectionLink::default(), dir.path());
        m.load_order(order(vec![vec![0, 1, 2]], vec![0])).unwrap();
        assert!(matches!(m.start_presentation(), Err(ErpError::Configuration(_))));
        assert!(!m.is_running());
        assert_eq!(m.state(), PresentationState::Cue);
    }

    #[test]
    fn test_cues_target_three_times_then_plays() {
        let dir = tempfile::tempdir().unwrap();
        let (mut m, calls) = machine(ConnectionLink::new(ConnectionState::Connected), dir.path());
        m.load_order(order(vec![vec![1, 0, 2]], vec![2])).unwrap();
        m.start_presentation().unwrap();

        for _ in 0..3 {
            assert!(matches!(m.tick(0.4).unwrap(), Tick::Cued(2)));
        }
        assert_eq!(m.state(), PresentationState::Play);
        assert!(m.events().is_empty());

        let Tick::Played(event) = m.tick(0.4).unwrap() else {
            panic!("expected a trial");
        };
        assert_eq!(event.code.decode(), (false, 1));
        assert_eq!(calls.lock().unwrap().played, vec![2, 2, 2, 1]);
        assert_eq!(calls.lock().unwrap().lit, vec![2, 2, 2]);
    }

    #[test]
    fn test_out_of_range_index_aborts_block() {
        let dir = tempfile::tempdir().unwrap();
        let (mut m, _) = machine(ConnectionLink::new(ConnectionState::Connected), dir.path());
        m.load_order(order(vec![vec![0, 7, 1], vec![0, 1, 2]], vec![0, 1]))
            .unwrap();
        m.start_presentation().unwrap();
        for _ in 0..3 {
            m.tick(0.4).unwrap();
        }
        assert!(matches!(m.tick(0.4).unwrap(), Tick::Played(_)));
        m.recorder().buffer().push(vec![0.0], 0.0);

        let err = m.tick(0.4).unwrap_err();
        assert!(matches!(err, ErpError::IndexOutOfRange { index: 7, count: 3 }));
        assert!(m.events().is_empty());
        assert!(m.recorder().buffer().is_empty());
        assert_eq!(m.state(), PresentationState::Break);
        assert_eq!(m.cursor().block, 1);
        assert!(!m.recorder().data_path().exists());
    }

    #[test]
    fn test_resume_waits_for_countdown() {
        let dir = tempfile::tempdir().unwrap();
        let (mut m, _) = machine(ConnectionLink::new(ConnectionState::Connected), dir.path());
        m.load_order(order(vec![vec![0], vec![1]], vec![0, 1])).unwrap();
        m.start_presentation().unwrap();
        for _ in 0..4 {
            m.tick(0.4).unwrap();
        }
        assert_eq!(m.state(), PresentationState::WritingData);
        m.recorder().buffer().push(vec![0.0], 10.0);

        let mut exported = None;
        for _ in 0..10 {
            if let Tick::BlockExported { report, next } = m.tick(0.4).unwrap() {
                exported = Some((report, next));
                break;
            }
        }
        let (report, next) = exported.expect("block exported");
        assert_eq!(next, PresentationState::Break);
        assert_eq!(report.events_tagged, 1);

        assert!(!m.resume().unwrap());
        for _ in 0..13 {
            m.tick(0.4).unwrap();
        }
        assert!(m.resume().unwrap());
        assert_eq!(m.state(), PresentationState::Cue);
    }

    #[test]
    fn test_missing_subject_file_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let (mut m, _) = machine(ConnectionLink::new(ConnectionState::Connected), dir.path());
        let err = m.import_subject_file().unwrap_err();
        assert!(err.is_fatal());
        assert!(m.order().is_none());
        assert_eq!(m.state(), PresentationState::Cue);
    }

    #[test]
    fn test_select_option_ignores_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let (mut m, calls) = machine(ConnectionLink::new(ConnectionState::Connected), dir.path());
        assert!(m.select_option(1));
        assert!(!m.select_option(3));
        assert_eq!(calls.lock().unwrap().selected, vec![1]);
    }
}
