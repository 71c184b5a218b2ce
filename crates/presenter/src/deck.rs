//! Capabilities the state machine drives. Playback and highlighting are
//! fire-and-forget.

/// Something whose stimuli can be visually marked.
pub trait Highlightable {
    fn highlight(&mut self, index: usize, on: bool);

    fn clear_highlights(&mut self, count: usize) {
        for index in 0..count {
            self.highlight(index, false);
        }
    }
}

/// The set of stimuli a participant hears.
pub trait StimulusDeck: Highlightable + Send {
    fn play(&mut self, index: usize);

    /// Acts on a stimulus chosen by the participant or a classifier.
    fn select_option(&mut self, index: usize);

    fn stimulus_count(&self) -> usize;
}

/// Participant-facing break and end screens.
pub trait BreakScreen: Send {
    fn start_break(&mut self, seconds: f64);

    fn end_break(&mut self) {}

    fn experiment_finished(&mut self) {}
}
