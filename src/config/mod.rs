//! Retraining service configuration
//!
//! `RetrainConfig` is supplied once at construction and never mutated by the
//! service. It can be built in code with the `with_*` methods or loaded from
//! a YAML file for the CLI.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for the retraining service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrainConfig {
    /// Minimum new behavior samples before a scheduled retrain fires
    pub min_new_samples: u64,
    /// Hours that must elapse between retrains
    pub retrain_interval_hours: u64,
    /// Minimum accuracy delta counted as a meaningful change
    pub performance_threshold: f64,
    /// Snapshot production artifacts before each cycle
    pub backup_enabled: bool,
    /// Milliseconds between monitoring-loop wakeups
    pub poll_interval_ms: u64,
    /// Directory holding production artifacts, staging area, and backups
    pub artifact_root: PathBuf,
    /// Path of the persisted performance history file
    pub history_path: PathBuf,
}

impl Default for RetrainConfig {
    fn default() -> Self {
        Self {
            min_new_samples: 100,
            retrain_interval_hours: 24,
            performance_threshold: 0.05,
            backup_enabled: true,
            poll_interval_ms: 3_600_000,
            artifact_root: PathBuf::from("models"),
            history_path: PathBuf::from("performance_history.json"),
        }
    }
}

impl RetrainConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the minimum new-sample count
    #[must_use]
    pub fn with_min_new_samples(mut self, n: u64) -> Self {
        self.min_new_samples = n;
        self
    }

    /// Set the retrain interval in hours
    #[must_use]
    pub fn with_retrain_interval_hours(mut self, hours: u64) -> Self {
        self.retrain_interval_hours = hours;
        self
    }

    /// Set the performance threshold
    #[must_use]
    pub fn with_performance_threshold(mut self, threshold: f64) -> Self {
        self.performance_threshold = threshold;
        self
    }

    /// Enable or disable pre-cycle backups
    #[must_use]
    pub fn with_backup_enabled(mut self, enabled: bool) -> Self {
        self.backup_enabled = enabled;
        self
    }

    /// Set the monitoring poll interval in milliseconds
    #[must_use]
    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the artifact root directory
    #[must_use]
    pub fn with_artifact_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.artifact_root = root.into();
        self
    }

    /// Set the performance history file path
    #[must_use]
    pub fn with_history_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.history_path = path.into();
        self
    }

    /// Check configuration values for consistency
    pub fn validate(&self) -> Result<()> {
        if !self.performance_threshold.is_finite()
            || self.performance_threshold <= 0.0
            || self.performance_threshold >= 1.0
        {
            return Err(Error::Config(format!(
                "performance_threshold must be in (0, 1), got {}",
                self.performance_threshold
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be positive".into()));
        }
        Ok(())
    }
}
