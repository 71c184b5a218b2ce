//! Acquisition sources for the experiment.
//!
//! A source delivers timestamped multi-channel samples one at a time. The
//! mock source synthesizes a signal on its own thread; the scripted source
//! replays samples fed to it by hand.

pub mod types;
pub mod mock_eeg;
pub mod scripted;

// Re-export the main types that users need
pub use types::{shared, AcquisitionSource, RawSample, SharedSource, SourceConfig, SourceError};
pub use mock_eeg::driver::MockSource;
pub use scripted::{ScriptedFeed, ScriptedSource};
