use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::metrics::DEFAULT_CALIBRATION_BINS;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub run_log: RunLogConfig,
    pub metrics: MetricsConfig,
    pub merge: MergeConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RunLogConfig {
    /// Root directory; each evaluation gets a timestamped subdirectory here
    pub dir: PathBuf,
}

impl Default for RunLogConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/runs"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub calibration_bins: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            calibration_bins: DEFAULT_CALIBRATION_BINS,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct MergeConfig {
    pub duplicate_resolutions: DuplicatePolicy,
}

/// What to do when a resolutions file lists the same id more than once
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    #[default]
    LastWins,
    Reject,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_level: String,
    pub json_logs: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or fall back to defaults if the file is absent
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn validate(&self) -> Result<()> {
        if self.metrics.calibration_bins == 0 {
            bail!("metrics.calibration_bins must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[run_log]\ndir = \"/tmp/runs\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.run_log.dir, PathBuf::from("/tmp/runs"));
        assert_eq!(config.metrics.calibration_bins, 10);
        assert_eq!(config.merge.duplicate_resolutions, DuplicatePolicy::LastWins);
        assert_eq!(config.logging.log_level, "info");
    }

    #[test]
    fn test_duplicate_policy_parses() {
        let config: Config =
            toml::from_str("[merge]\nduplicate_resolutions = \"reject\"\n").unwrap();
        assert_eq!(config.merge.duplicate_resolutions, DuplicatePolicy::Reject);
    }

    #[test]
    fn test_zero_bins_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[metrics]\ncalibration_bins = 0\n").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempdir().unwrap();
        let config = Config::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.run_log.dir, PathBuf::from("data/runs"));
    }
}
