//! Sweep run configuration.
//!
//! Selects which collectors run, whether records are actually removed, and
//! how the background worker and batch jobs behave.
//!
//! # Example
//!
//! ```toml
//! [sweep]
//! collectors = ["pages", "change_sets"]
//! dry_run = false
//! batch_size = 100
//!
//! [sweep.worker]
//! enabled = true
//! interval_secs = 3600
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepConfig {
    /// Collector names to run, in order. Each must be defined under `[collectors]`.
    #[serde(default)]
    pub collectors: Vec<String>,

    /// Log what would be processed without calling any processor.
    /// Default: false
    #[serde(default)]
    pub dry_run: bool,

    /// Number of records a batch job handles per step.
    /// Default: 100
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Periodic background sweeping.
    #[serde(default)]
    pub worker: SweepWorkerConfig,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            collectors: Vec::new(),
            dry_run: false,
            batch_size: default_batch_size(),
            worker: SweepWorkerConfig::default(),
        }
    }
}

impl SweepConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("sweep.batch_size must be at least 1".into());
        }
        if self.worker.interval_secs == 0 {
            return Err("sweep.worker.interval_secs must be at least 1".into());
        }
        Ok(())
    }
}

fn default_batch_size() -> usize {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepWorkerConfig {
    /// Whether the worker sweeps on a schedule.
    /// Default: false (must be explicitly enabled)
    #[serde(default)]
    pub enabled: bool,

    /// Seconds between sweep runs.
    /// Default: 3600 (hourly)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for SweepWorkerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_interval_secs(),
        }
    }
}

impl SweepWorkerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_interval_secs() -> u64 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: SweepConfig = toml::from_str("").unwrap();
        assert!(config.collectors.is_empty());
        assert!(!config.dry_run);
        assert_eq!(config.batch_size, 100);
        assert!(!config.worker.enabled);
        assert_eq!(config.worker.interval(), Duration::from_secs(3600));
        config.validate().unwrap();
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = SweepConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(toml::from_str::<SweepConfig>("batch = 5").is_err());
    }
}
