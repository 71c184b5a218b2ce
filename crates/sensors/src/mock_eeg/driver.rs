use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use erp_types::Clock;
use flume::{Receiver, RecvTimeoutError};
use log::{debug, info, warn};

use super::mock_data_generator::SignalGenerator;
use crate::types::{AcquisitionSource, RawSample, SourceConfig, SourceError};

/// Longest single sleep of the generator thread, so stop requests and
/// hand-driven clocks are noticed promptly.
const MAX_GENERATOR_SLEEP: Duration = Duration::from_millis(5);

/// A source that synthesizes samples on its own thread at the configured
/// rate, stamped on the shared acquisition clock.
pub struct MockSource {
    config: SourceConfig,
    sample_rx: Receiver<RawSample>,
    connected: Arc<AtomicBool>,
    stop_flag: Arc<AtomicBool>,
    gen_thread: Option<JoinHandle<()>>,
}

impl MockSource {
    pub fn new<C: Clock + 'static>(config: SourceConfig, clock: Arc<C>) -> Result<Self, SourceError> {
        Self::with_seed(config, clock, 0x5EED)
    }

    pub fn with_seed<C: Clock + 'static>(
        config: SourceConfig,
        clock: Arc<C>,
        seed: u64,
    ) -> Result<Self, SourceError> {
        if config.channel_count == 0 {
            return Err(SourceError::ConfigurationError(
                "At least one channel must be configured".to_string(),
            ));
        }
        if !(config.sample_rate > 0.0) {
            return Err(SourceError::ConfigurationError(format!(
                "Invalid sample rate: {}",
                config.sample_rate
            )));
        }

        let (sample_tx, sample_rx) = flume::bounded(4096);
        let connected = Arc::new(AtomicBool::new(true));
        let stop_flag = Arc::new(AtomicBool::new(false));

        let mut generator = SignalGenerator::new(
            config.sample_rate,
            config.channel_count,
            config.noise_std,
            seed,
        );
        let interval = 1.0 / config.sample_rate;
        let disconnect_after = config.disconnect_after;
        let thread_stop = stop_flag.clone();

        let gen_thread = thread::Builder::new()
            .name("erp_mock_gen".to_string())
            .spawn(move || {
                let start = clock.local_clock();
                let mut sent: u64 = 0;
                while !thread_stop.load(Ordering::Relaxed) {
                    if disconnect_after.is_some_and(|limit| sent >= limit) {
                        warn!("Mock source dropping the stream after {} samples", sent);
                        break;
                    }
                    let due = start + sent as f64 * interval;
                    let now = clock.local_clock();
                    if now < due {
                        let wait = Duration::from_secs_f64(due - now).min(MAX_GENERATOR_SLEEP);
                        thread::sleep(wait);
                        continue;
                    }
                    let sample = RawSample {
                        channels: generator.next_sample(),
                        timestamp: due,
                    };
                    if sample_tx.send(sample).is_err() {
                        debug!("Sample receiver dropped, stopping mock generator");
                        break;
                    }
                    sent += 1;
                }
                info!("Mock generator thread shutting down after {} samples", sent);
            })
            .map_err(|e| SourceError::Other(format!("Failed to spawn thread: {}", e)))?;

        info!("MockSource created with config: {:?}", config);

        Ok(Self {
            config,
            sample_rx,
            connected,
            stop_flag,
            gen_thread: Some(gen_thread),
        })
    }
}

impl AcquisitionSource for MockSource {
    fn pull_sample(&mut self, timeout: Duration) -> Result<Option<RawSample>, SourceError> {
        match self.sample_rx.recv_timeout(timeout) {
            Ok(sample) => Ok(Some(sample)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                self.connected.store(false, Ordering::Relaxed);
                Err(SourceError::Disconnected(
                    "mock generator stopped".to_string(),
                ))
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn channel_count(&self) -> usize {
        self.config.channel_count
    }

    fn sample_rate(&self) -> f64 {
        self.config.sample_rate
    }
}

impl Drop for MockSource {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        // Unblock a generator waiting on a full channel.
        let (_, closed) = flume::bounded(1);
        drop(std::mem::replace(&mut self.sample_rx, closed));
        if let Some(handle) = self.gen_thread.take() {
            if handle.join().is_err() {
                warn!("Mock generator thread panicked");
            }
        }
    }
}
