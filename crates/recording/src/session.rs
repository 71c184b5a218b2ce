//! End-of-block handling: drain, tag, export and clear.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

use erp_sensor::SharedSource;
use erp_types::{DrainConfig, EpochWindow, ErpError, Event, ExportConfig};

use crate::buffer::SampleBuffer;
use crate::drain::drain_until;
use crate::epoch::{extract_epochs, Epoch};
use crate::export::write_training_set;
use crate::link::{ConnectionLink, ConnectionState};

/// What one finished block left behind.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockReport {
    pub path: PathBuf,
    /// Rows written for this block
    pub rows: usize,
    pub events_tagged: usize,
    /// Whether the drain reached the last event's window end
    pub drain_complete: bool,
}

/// Per-subject recorder shared by the presenter and the acquisition thread.
pub struct BlockRecorder {
    buffer: Arc<SampleBuffer>,
    source: SharedSource,
    link: ConnectionLink,
    window: EpochWindow,
    export: ExportConfig,
    drain: DrainConfig,
    subject: u32,
    training: Mutex<Vec<Epoch>>,
}

impl BlockRecorder {
    pub fn new(
        buffer: Arc<SampleBuffer>,
        source: SharedSource,
        link: ConnectionLink,
        subject: u32,
    ) -> Self {
        Self {
            buffer,
            source,
            link,
            window: EpochWindow::default(),
            export: ExportConfig::default(),
            drain: DrainConfig::default(),
            subject,
            training: Mutex::new(Vec::new()),
        }
    }

    pub fn with_window(mut self, window: EpochWindow) -> Self {
        self.window = window;
        self
    }

    pub fn with_export(mut self, export: ExportConfig) -> Self {
        self.export = export;
        self
    }

    pub fn with_drain(mut self, drain: DrainConfig) -> Self {
        self.drain = drain;
        self
    }

    pub fn buffer(&self) -> &Arc<SampleBuffer> {
        &self.buffer
    }

    pub fn link(&self) -> &ConnectionLink {
        &self.link
    }

    pub fn subject(&self) -> u32 {
        self.subject
    }

    pub fn data_path(&self) -> PathBuf {
        self.export.data_file_path(self.subject)
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// Starts storing samples. Fails when the stream is not connected.
    pub fn start_collecting(&self) -> Result<(), ErpError> {
        if self.link.transition(ConnectionState::Collecting) {
            Ok(())
        } else {
            Err(ErpError::config("acquisition source is not connected"))
        }
    }

    /// Goes back to discarding samples, unless the stream has dropped.
    pub fn stop_collecting(&self) {
        self.link.transition(ConnectionState::Connected);
    }

    /// Drops whatever the buffer holds, used when a block is aborted.
    pub fn discard(&self) {
        self.buffer.clear();
    }

    /// Epochs for `events` from the samples currently buffered.
    pub fn epochs(&self, events: &[Event]) -> Vec<Epoch> {
        extract_epochs(&self.buffer, events, &self.window)
    }

    /// Epochs kept from every exported block so far.
    pub fn training_epochs(&self) -> usize {
        self.training.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Writes the epochs of every exported block to the subject's training
    /// example and label files. Returns the number of examples.
    pub fn write_training_set(&self) -> Result<usize, ErpError> {
        std::fs::create_dir_all(&self.export.directory)?;
        let epochs = self.training.lock().unwrap_or_else(PoisonError::into_inner);
        write_training_set(
            &epochs,
            &self.export.training_examples_path(self.subject),
            &self.export.training_labels_path(self.subject),
        )
    }

    /// Closes a block: drains until the last event's window is covered, tags
    /// the events, appends the buffer to the subject's data file and clears it.
    /// The block's epochs are kept for [`BlockRecorder::write_training_set`].
    ///
    /// A drain that stalls or loses the stream is logged and the samples
    /// gathered so far are exported. When the export fails nothing is cleared,
    /// so the call can be repeated with the same events.
    pub fn finish_block(&self, events: &[Event]) -> Result<BlockReport, ErpError> {
        self.link.transition(ConnectionState::Processing);

        let mut drain_complete = true;
        if let Some(last) = events.iter().map(|e| e.timestamp).reduce(f64::max) {
            let stop_time = self.window.drain_stop_time(last);
            match drain_until(&self.source, &self.buffer, stop_time, &self.drain) {
                Ok(outcome) => {
                    info!(
                        "Drained {} samples for block of subject {}, reached t={:.4}",
                        outcome.pulled, self.subject, outcome.reached
                    );
                }
                Err(ErpError::AcquisitionUnavailable(msg)) => {
                    warn!("Exporting partial block, source dropped: {}", msg);
                    self.link.disconnect();
                    drain_complete = false;
                }
                Err(e @ ErpError::StallTimeout { .. }) => {
                    warn!("Exporting partial block: {}", e);
                    drain_complete = false;
                }
                Err(e) => {
                    self.link.transition(ConnectionState::Collecting);
                    return Err(e);
                }
            }
        }

        let events_tagged = self.buffer.tag_events(events);
        let rows = self.buffer.len();
        let path = match self.buffer.export_to_table(
            &self.export.directory,
            self.subject,
            self.export.append_if_exists,
        ) {
            Ok(path) => path,
            Err(e) => {
                warn!("Export of subject {} failed, buffer kept: {}", self.subject, e);
                self.link.transition(ConnectionState::Collecting);
                return Err(e);
            }
        };
        let epochs = self.epochs(events);
        self.training
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(epochs);
        self.buffer.clear();
        self.link.transition(ConnectionState::Collecting);

        info!(
            "Exported {} rows with {} events to {}",
            rows,
            events_tagged,
            path.display()
        );
        Ok(BlockReport {
            path,
            rows,
            events_tagged,
            drain_complete,
        })
    }
}
