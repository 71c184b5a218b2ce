//! Per-event windows cut from the recorded stream.

use tracing::debug;

use erp_types::{EpochWindow, Event, SampleTable};

use crate::buffer::SampleBuffer;

/// Samples recorded around one stimulus event.
#[derive(Debug, Clone, PartialEq)]
pub struct Epoch {
    pub event: Event,
    pub data: SampleTable,
}

impl Epoch {
    pub fn is_target(&self) -> bool {
        self.event.code.is_target()
    }

    /// 1 for target presentations, 0 otherwise.
    pub fn label(&self) -> u8 {
        u8::from(self.is_target())
    }

    pub fn stimulus_index(&self) -> usize {
        self.event.code.stimulus_index()
    }

    /// Channel values flattened row by row.
    pub fn feature_vector(&self) -> Vec<f64> {
        self.data.values().to_vec()
    }

    pub fn sample_count(&self) -> usize {
        self.data.len()
    }
}

/// Cuts one epoch per event, covering
/// `[event + window.start_offset, event + window.duration)`.
///
/// Events whose window holds no samples still yield an empty epoch so the
/// result lines up with `events`.
pub fn extract_epochs(buffer: &SampleBuffer, events: &[Event], window: &EpochWindow) -> Vec<Epoch> {
    let epochs: Vec<Epoch> = events
        .iter()
        .map(|event| Epoch {
            event: *event,
            data: buffer.slice(
                event.timestamp + window.start_offset,
                event.timestamp + window.duration,
            ),
        })
        .collect();
    debug!(
        "Extracted {} epochs, {} empty",
        epochs.len(),
        epochs.iter().filter(|e| e.data.is_empty()).count()
    );
    epochs
}
