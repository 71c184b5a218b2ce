//! Bounded pull of the remaining samples of a block.

use std::time::Instant;

use tracing::{debug, warn};

use erp_sensor::{SharedSource, SourceError};
use erp_types::{DrainConfig, ErpError};

use crate::buffer::SampleBuffer;

/// Result of a successful drain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrainOutcome {
    /// Samples pulled by the drain itself
    pub pulled: usize,
    /// Latest timestamp in the buffer when the drain finished
    pub reached: f64,
}

/// Pulls samples from `source` into `buffer` until one at or after
/// `stop_time` has been stored.
///
/// Waits at most `policy.timeout()` overall. Empty pulls back off
/// exponentially between the configured bounds. A dropped stream is reported
/// as [`ErpError::AcquisitionUnavailable`]; samples pulled before that stay in
/// the buffer.
pub fn drain_until(
    source: &SharedSource,
    buffer: &SampleBuffer,
    stop_time: f64,
    policy: &DrainConfig,
) -> Result<DrainOutcome, ErpError> {
    if let Some(last) = buffer.last_timestamp() {
        if last >= stop_time {
            return Ok(DrainOutcome {
                pulled: 0,
                reached: last,
            });
        }
    }

    let started = Instant::now();
    let timeout = policy.timeout();
    let mut backoff = policy.initial_backoff();
    let mut pulled = 0;
    let mut source = source
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);

    loop {
        let elapsed = started.elapsed();
        if elapsed >= timeout {
            warn!(
                "Drain stalled after {} samples, stop time t={:.4} not reached",
                pulled, stop_time
            );
            return Err(ErpError::StallTimeout {
                stop_time,
                waited_ms: elapsed.as_millis() as u64,
            });
        }

        match source.pull_sample(backoff.min(timeout - elapsed)) {
            Ok(Some(sample)) => {
                let timestamp = sample.timestamp;
                buffer.push(sample.channels, timestamp);
                pulled += 1;
                backoff = policy.initial_backoff();
                if timestamp >= stop_time {
                    debug!("Drained {} samples up to t={:.4}", pulled, timestamp);
                    return Ok(DrainOutcome {
                        pulled,
                        reached: timestamp,
                    });
                }
            }
            Ok(None) => {
                backoff = (backoff * 2).min(policy.max_backoff());
            }
            Err(SourceError::Disconnected(msg)) => {
                warn!("Source dropped during drain after {} samples: {}", pulled, msg);
                return Err(ErpError::AcquisitionUnavailable(msg));
            }
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use erp_sensor::{shared, ScriptedSource};

    fn policy(timeout_ms: u64) -> DrainConfig {
        DrainConfig {
            timeout_ms,
            initial_backoff_ms: 1,
            max_backoff_ms: 4,
        }
    }

    #[test]
    fn test_drain_stops_at_first_sample_past_stop_time() {
        let (source, feed) = ScriptedSource::new(1, 100.0);
        feed.push_range(0.0, 1.0, 100.0, &[0.0]);
        let source = shared(source);
        let buffer = SampleBuffer::new();

        let outcome = drain_until(&source, &buffer, 0.5, &policy(1000)).unwrap();
        assert!(outcome.reached >= 0.5);
        assert_eq!(outcome.pulled, 51);
        assert_eq!(buffer.len(), 51);
        assert_eq!(feed.pending(), 49);
    }

    #[test]
    fn test_drain_returns_at_once_when_buffer_is_ahead() {
        let (source, _feed) = ScriptedSource::new(1, 100.0);
        let buffer = SampleBuffer::new();
        buffer.push(vec![0.0], 2.0);
        let outcome = drain_until(&shared(source), &buffer, 1.0, &policy(10)).unwrap();
        assert_eq!(outcome.pulled, 0);
    }

    #[test]
    fn test_stalled_source_times_out() {
        let (source, feed) = ScriptedSource::new(1, 100.0);
        feed.push(0.1, vec![0.0]);
        let buffer = SampleBuffer::new();
        let err = drain_until(&shared(source), &buffer, 5.0, &policy(30)).unwrap_err();
        assert!(matches!(err, ErpError::StallTimeout { .. }), "{}", err);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_disconnect_keeps_pulled_samples() {
        let (source, feed) = ScriptedSource::new(1, 100.0);
        feed.push(0.1, vec![0.0]);
        feed.push(0.2, vec![0.0]);
        feed.close_when_empty();
        let buffer = SampleBuffer::new();
        let err = drain_until(&shared(source), &buffer, 5.0, &policy(1000)).unwrap_err();
        assert!(matches!(err, ErpError::AcquisitionUnavailable(_)));
        assert_eq!(buffer.len(), 2);
    }
}
