//! Continuous recording of the acquisition stream and per-block export.
//!
//! An [`AcquisitionThread`] moves samples from the source into a shared
//! [`SampleBuffer`] while the [`ConnectionLink`] says so. At the end of each
//! block a [`BlockRecorder`] drains the source past the last event's window,
//! tags the events onto their samples and appends the block to the subject's
//! data file.

pub mod buffer;
pub mod drain;
pub mod epoch;
pub mod export;
pub mod link;
pub mod producer;
pub mod session;

pub use buffer::SampleBuffer;
pub use drain::{drain_until, DrainOutcome};
pub use epoch::{extract_epochs, Epoch};
pub use export::{write_training_set, EventTally};
pub use link::{ConnectionLink, ConnectionState};
pub use producer::AcquisitionThread;
pub use session::{BlockRecorder, BlockReport};
