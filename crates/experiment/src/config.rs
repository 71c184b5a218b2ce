use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use erp_sensor::SourceConfig;
use erp_types::{DrainConfig, EpochWindow, ErpError, ExportConfig, TimingConfig};
use presenter::ExperimentMode;
use sequencing::GenerationConfig;

/// Where exported blocks are sent for classification in live mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_classifier_address")]
    pub address: String,
    #[serde(default = "default_classifier_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_classifier_address() -> String { "127.0.0.1:9999".to_string() }
fn default_classifier_timeout_ms() -> u64 { 5_000 }

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            address: default_classifier_address(),
            timeout_ms: default_classifier_timeout_ms(),
        }
    }
}

impl ClassifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Everything the binary reads from its YAML file. Missing sections take
/// their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub epoch: EpochWindow,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub drain: DrainConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub mode: ExperimentMode,
    #[serde(default)]
    pub run: RunConfig,
}

/// Pacing of the presentation loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Frame period of the tick loop
    #[serde(default = "default_frame_ms")]
    pub frame_ms: u64,
    /// Resume automatically once a break countdown ends
    #[serde(default = "default_auto_resume")]
    pub auto_resume: bool,
    /// Display names of the stimuli, by index
    #[serde(default)]
    pub stimulus_names: Vec<String>,
}

fn default_frame_ms() -> u64 { 16 }
fn default_auto_resume() -> bool { true }

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            frame_ms: default_frame_ms(),
            auto_resume: default_auto_resume(),
            stimulus_names: Vec::new(),
        }
    }
}

impl RunConfig {
    pub fn frame(&self) -> Duration {
        Duration::from_millis(self.frame_ms.max(1))
    }
}

impl ExperimentConfig {
    pub fn from_yaml(text: &str) -> Result<Self, ErpError> {
        let config: ExperimentConfig =
            serde_yaml::from_str(text).map_err(|e| ErpError::config(e.to_string()))?;
        config.generation.validate()?;
        Ok(config)
    }

    /// Reads the YAML file at `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ErpError> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    ErpError::config(format!("Could not read configuration file {:?}: {}", path, e))
                })?;
                Self::from_yaml(&text)
            }
            None => Ok(Self::default()),
        }
    }

    /// Names for `count` stimuli, filling gaps with `stimulus_<i>`.
    pub fn stimulus_names(&self, count: usize) -> Vec<String> {
        (0..count)
            .map(|i| {
                self.run
                    .stimulus_names
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("stimulus_{}", i))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = ExperimentConfig::from_yaml(
            r#"
generation:
  num_stimuli: 4
  trials_per_block: 40
timing:
  soa: 0.5
mode: live
run:
  stimulus_names: [left, right]
"#,
        )
        .unwrap();
        assert_eq!(config.generation.num_stimuli, 4);
        assert_eq!(config.generation.num_sequences, 15);
        assert_eq!(config.timing.soa, 0.5);
        assert_eq!(config.timing.times_to_cue, 3);
        assert_eq!(config.mode, ExperimentMode::Live);
        assert_eq!(config.classifier.address, "127.0.0.1:9999");
        assert_eq!(
            config.stimulus_names(3),
            vec!["left", "right", "stimulus_2"]
        );
    }

    #[test]
    fn test_invalid_generation_is_a_configuration_error() {
        let err = ExperimentConfig::from_yaml("generation:\n  num_stimuli: 1\n").unwrap_err();
        assert!(err.is_fatal());
        let err = ExperimentConfig::from_yaml("timing: [1, 2]").unwrap_err();
        assert!(err.is_fatal());
    }
}
