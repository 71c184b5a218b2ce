//! Terminal stand-ins for the audio deck and the break screen.

use tracing::info;

use presenter::{BreakScreen, Highlightable, StimulusDeck};

/// Logs every playback, highlight and selection instead of producing sound.
pub struct ConsoleDeck {
    names: Vec<String>,
    lit: Vec<bool>,
    selections: Vec<usize>,
}

impl ConsoleDeck {
    pub fn new(names: Vec<String>) -> Self {
        let lit = vec![false; names.len()];
        Self {
            names,
            lit,
            selections: Vec::new(),
        }
    }

    pub fn selections(&self) -> &[usize] {
        &self.selections
    }

    fn name(&self, index: usize) -> &str {
        self.names.get(index).map(String::as_str).unwrap_or("?")
    }
}

impl Highlightable for ConsoleDeck {
    fn highlight(&mut self, index: usize, on: bool) {
        if let Some(slot) = self.lit.get_mut(index) {
            if *slot != on {
                *slot = on;
                tracing::debug!("[deck] {} highlight {}", self.name(index), if on { "on" } else { "off" });
            }
        }
    }
}

impl StimulusDeck for ConsoleDeck {
    fn play(&mut self, index: usize) {
        info!("[deck] play {} ({})", index, self.name(index));
    }

    fn select_option(&mut self, index: usize) {
        self.selections.push(index);
        info!("[deck] selected {} ({})", index, self.name(index));
    }

    fn stimulus_count(&self) -> usize {
        self.names.len()
    }
}

#[derive(Debug, Default)]
pub struct ConsoleBreakScreen;

impl BreakScreen for ConsoleBreakScreen {
    fn start_break(&mut self, seconds: f64) {
        info!("[break] take a break, resuming possible in {:.0} s", seconds);
    }

    fn end_break(&mut self) {
        info!("[break] resuming");
    }

    fn experiment_finished(&mut self) {
        info!("[break] experiment finished, thank you");
    }
}
