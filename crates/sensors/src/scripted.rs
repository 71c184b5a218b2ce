//! A source replaying samples that are fed to it by hand.
//!
//! Used to drive the recorder deterministically: tests push samples through a
//! [`ScriptedFeed`] and the source hands them out in order.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use crate::types::{AcquisitionSource, RawSample, SourceError};

#[derive(Debug, Default)]
struct Script {
    queue: Mutex<VecDeque<RawSample>>,
    connected: AtomicBool,
    /// Drop the connection once the queue has been emptied
    close_when_empty: AtomicBool,
}

pub struct ScriptedSource {
    script: Arc<Script>,
    channel_count: usize,
    sample_rate: f64,
}

/// Producer side of a [`ScriptedSource`].
#[derive(Clone)]
pub struct ScriptedFeed {
    script: Arc<Script>,
}

impl ScriptedSource {
    pub fn new(channel_count: usize, sample_rate: f64) -> (Self, ScriptedFeed) {
        let script = Arc::new(Script {
            connected: AtomicBool::new(true),
            ..Default::default()
        });
        (
            Self {
                script: script.clone(),
                channel_count,
                sample_rate,
            },
            ScriptedFeed { script },
        )
    }
}

impl ScriptedFeed {
    pub fn push(&self, timestamp: f64, channels: Vec<f64>) {
        self.script
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(RawSample { channels, timestamp });
    }

    /// Queues samples at a fixed rate covering `[from, to)`.
    pub fn push_range(&self, from: f64, to: f64, rate: f64, channels: &[f64]) {
        let mut t = from;
        let step = 1.0 / rate;
        let mut n = 0u64;
        while t < to {
            self.push(t, channels.to_vec());
            n += 1;
            t = from + n as f64 * step;
        }
    }

    pub fn pending(&self) -> usize {
        self.script
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Drops the connection immediately; queued samples are discarded.
    pub fn disconnect(&self) {
        self.script.connected.store(false, Ordering::Relaxed);
    }

    /// Drops the connection after the queued samples have been pulled.
    pub fn close_when_empty(&self) {
        self.script.close_when_empty.store(true, Ordering::Relaxed);
    }
}

impl AcquisitionSource for ScriptedSource {
    fn pull_sample(&mut self, timeout: Duration) -> Result<Option<RawSample>, SourceError> {
        if !self.script.connected.load(Ordering::Relaxed) {
            return Err(SourceError::Disconnected("script ended".to_string()));
        }
        let next = self
            .script
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match next {
            Some(sample) => Ok(Some(sample)),
            None if self.script.close_when_empty.load(Ordering::Relaxed) => {
                self.script.connected.store(false, Ordering::Relaxed);
                Err(SourceError::Disconnected("script exhausted".to_string()))
            }
            None => {
                thread::sleep(timeout);
                Ok(None)
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.script.connected.load(Ordering::Relaxed)
    }

    fn channel_count(&self) -> usize {
        self.channel_count
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}
