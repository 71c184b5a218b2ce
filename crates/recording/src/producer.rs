//! Background thread that moves samples from the source into the buffer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thread_priority::ThreadPriority;
use tracing::{debug, error, info, warn};

use erp_sensor::SharedSource;
use erp_types::ErpError;

use crate::buffer::SampleBuffer;
use crate::link::{ConnectionLink, ConnectionState};

/// Owns the acquisition thread. Dropping it stops and joins the thread.
pub struct AcquisitionThread {
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl AcquisitionThread {
    /// Starts pulling from `source` with `poll` as the per-pull wait.
    ///
    /// Samples are stored while the link is `Collecting` and discarded while
    /// it is `Connected`. During `Processing` the thread leaves the source to
    /// the block drain. A failed pull marks the link `NotConnected` and ends
    /// the thread.
    pub fn spawn(
        source: SharedSource,
        buffer: Arc<SampleBuffer>,
        link: ConnectionLink,
        poll: Duration,
    ) -> Result<Self, ErpError> {
        let connected = source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_connected();
        if connected && !link.is_connected() {
            link.reconnect();
        }

        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop = stop_flag.clone();
        let handle = thread::Builder::new()
            .name("erp_acq".into())
            .spawn(move || {
                if let Err(e) = thread_priority::set_current_thread_priority(ThreadPriority::Max) {
                    warn!("Failed to set acquisition thread priority: {:?}", e);
                }
                info!("Acquisition thread started");
                run(&source, &buffer, &link, &stop, poll);
                info!("Acquisition thread shutting down");
            })
            .map_err(|e| {
                ErpError::AcquisitionUnavailable(format!("Failed to spawn thread: {}", e))
            })?;

        Ok(Self {
            stop_flag,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Acquisition thread panicked");
            }
        }
    }
}

impl Drop for AcquisitionThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    source: &SharedSource,
    buffer: &SampleBuffer,
    link: &ConnectionLink,
    stop: &AtomicBool,
    poll: Duration,
) {
    let mut discarded: u64 = 0;
    while !stop.load(Ordering::Relaxed) {
        match link.get() {
            ConnectionState::NotConnected => {
                warn!("Link is not connected, acquisition stops");
                return;
            }
            ConnectionState::Processing => {
                thread::sleep(poll);
                continue;
            }
            ConnectionState::Connected | ConnectionState::Collecting => {}
        }

        let mut guard = source.lock().unwrap_or_else(PoisonError::into_inner);
        // The drain may have taken over while we waited for the lock.
        if link.get() == ConnectionState::Processing {
            continue;
        }

        match guard.pull_sample(poll) {
            Ok(Some(sample)) => match link.get() {
                ConnectionState::Collecting | ConnectionState::Processing => {
                    buffer.push(sample.channels, sample.timestamp);
                }
                _ => discarded += 1,
            },
            Ok(None) => {}
            Err(e) => {
                error!("Acquisition source failed: {}", e);
                link.disconnect();
                return;
            }
        }
    }
    debug!("Discarded {} samples outside of collection", discarded);
}
