//! Presentation side of the experiment: the collaborator traits, the
//! per-block event log and the frame-driven state machine.

pub mod deck;
pub mod event_log;
pub mod machine;
pub mod state;

pub use deck::{BreakScreen, Highlightable, StimulusDeck};
pub use event_log::EventLog;
pub use machine::PresentationStateMachine;
pub use state::{Cursor, ExperimentMode, PresentationState, Tick};
