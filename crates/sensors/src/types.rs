//! Common types and traits for acquisition sources

use std::sync::{Arc, Mutex};
use std::time::Duration;

use erp_types::ErpError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration for acquisition sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Number of signal channels per sample
    #[serde(default = "default_channel_count")]
    pub channel_count: usize,
    /// Nominal sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,
    /// Standard deviation of the additive noise, in microvolts
    #[serde(default = "default_noise_std")]
    pub noise_std: f64,
    /// Simulate a dropped stream after this many samples
    #[serde(default)]
    pub disconnect_after: Option<u64>,
}

fn default_channel_count() -> usize { 8 }
fn default_sample_rate() -> f64 { 250.0 }
fn default_noise_std() -> f64 { 2.0 }

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            channel_count: default_channel_count(),
            sample_rate: default_sample_rate(),
            noise_std: default_noise_std(),
            disconnect_after: None,
        }
    }
}

/// One sample as delivered by a source.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    pub channels: Vec<f64>,
    /// Seconds on the acquisition clock
    pub timestamp: f64,
}

/// Errors that can occur in acquisition sources
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    /// The stream is gone and will not deliver further samples
    #[error("Source disconnected: {0}")]
    Disconnected(String),
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    /// Generic error
    #[error("Error: {0}")]
    Other(String),
}

impl From<SourceError> for ErpError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::ConfigurationError(msg) => ErpError::Configuration(msg),
            SourceError::Disconnected(msg) | SourceError::Other(msg) => {
                ErpError::AcquisitionUnavailable(msg)
            }
        }
    }
}

/// Trait that all acquisition sources must implement
pub trait AcquisitionSource: Send + 'static {
    /// Waits up to `timeout` for the next sample.
    ///
    /// Returns `Ok(None)` when nothing arrived in time and
    /// `Err(SourceError::Disconnected)` once the stream has ended.
    fn pull_sample(&mut self, timeout: Duration) -> Result<Option<RawSample>, SourceError>;

    fn is_connected(&self) -> bool;

    fn channel_count(&self) -> usize;

    fn sample_rate(&self) -> f64;
}

/// Handle shared between the acquisition thread and the block drain.
pub type SharedSource = Arc<Mutex<Box<dyn AcquisitionSource>>>;

pub fn shared<S: AcquisitionSource>(source: S) -> SharedSource {
    Arc::new(Mutex::new(Box::new(source)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnect_maps_to_acquisition_unavailable() {
        let err: ErpError = SourceError::Disconnected("gone".to_string()).into();
        assert!(matches!(err, ErpError::AcquisitionUnavailable(_)));
        let err: ErpError = SourceError::ConfigurationError("bad".to_string()).into();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let config: SourceConfig = serde_json::from_str(r#"{ "channel_count": 4 }"#).unwrap();
        assert_eq!(config.channel_count, 4);
        assert_eq!(config.sample_rate, 250.0);
        assert!(config.disconnect_after.is_none());
    }
}
