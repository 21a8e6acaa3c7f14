//! TOML configuration for ewmawatch.
//!
//! Layered the usual way: compiled-in defaults, then a config file (from
//! `--config`, the `EWMAWATCH_CONFIG` environment variable, or the system
//! location), then command-line overrides applied by the binary.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::detect::DetectError;

/// Environment variable naming a config file to load.
pub const CONFIG_ENV: &str = "EWMAWATCH_CONFIG";

/// Standard system location for the config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/ewmawatch/ewmawatch.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for the ewmawatch process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize configuration")
    }

    /// Try to load configuration from, in order:
    /// 1. The path in the `EWMAWATCH_CONFIG` environment variable.
    /// 2. `/etc/ewmawatch/ewmawatch.toml`.
    /// 3. Fall back to compiled-in defaults.
    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "EWMAWATCH_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let system_path = Path::new(SYSTEM_CONFIG_PATH);
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %e,
                        "system config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Baseline the deviation of a sample is measured against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviationReference {
    /// The baseline after the current sample has been folded in.
    #[default]
    Updated,
    /// The baseline as it stood before the current sample.
    Prior,
}

/// What to do with NaN and infinite sample values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NonFinitePolicy {
    /// Fail the observation with `DetectError::NonFiniteValue`.
    #[default]
    Reject,
    /// Classify as normal with the `numerically_unstable` flag set.
    Flag,
}

/// Parameters of the EWMA detector. Fixed for the detector's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Weight of the newest sample, in (0, 1].
    pub smoothing_factor: f64,
    /// Standard deviations a sample must deviate by to be anomalous.
    pub anomaly_threshold: f64,
    /// Spread at or below which nothing is classified anomalous.
    pub std_dev_floor: f64,
    pub deviation_reference: DeviationReference,
    pub non_finite: NonFinitePolicy,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            smoothing_factor: 0.7,
            anomaly_threshold: 1.0,
            std_dev_floor: 1e-6,
            deviation_reference: DeviationReference::Updated,
            non_finite: NonFinitePolicy::Reject,
        }
    }
}

impl DetectorConfig {
    pub fn new(smoothing_factor: f64, anomaly_threshold: f64) -> Self {
        Self {
            smoothing_factor,
            anomaly_threshold,
            ..Self::default()
        }
    }

    pub fn with_std_dev_floor(mut self, floor: f64) -> Self {
        self.std_dev_floor = floor;
        self
    }

    pub fn with_deviation_reference(mut self, reference: DeviationReference) -> Self {
        self.deviation_reference = reference;
        self
    }

    pub fn with_non_finite(mut self, policy: NonFinitePolicy) -> Self {
        self.non_finite = policy;
        self
    }

    /// Check every parameter against its allowed range.
    pub fn validate(&self) -> Result<(), DetectError> {
        // Written as negated range checks so NaN fails them.
        if !(self.smoothing_factor > 0.0 && self.smoothing_factor <= 1.0) {
            return Err(DetectError::InvalidConfiguration {
                field: "smoothing_factor",
                reason: format!("must be in (0, 1], got {}", self.smoothing_factor),
            });
        }
        if !(self.anomaly_threshold > 0.0 && self.anomaly_threshold.is_finite()) {
            return Err(DetectError::InvalidConfiguration {
                field: "anomaly_threshold",
                reason: format!("must be finite and > 0, got {}", self.anomaly_threshold),
            });
        }
        if !(self.std_dev_floor >= 0.0 && self.std_dev_floor.is_finite()) {
            return Err(DetectError::InvalidConfiguration {
                field: "std_dev_floor",
                reason: format!("must be finite and >= 0, got {}", self.std_dev_floor),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

/// Synthetic seasonal signal with injected spikes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Period of the sine component, in samples.
    pub period: f64,
    /// Standard deviation of the Gaussian noise.
    pub noise_std: f64,
    /// Probability that a sample carries an injected spike.
    pub anomaly_probability: f64,
    pub spike_min: f64,
    pub spike_max: f64,
    /// RNG seed; random when absent.
    pub seed: Option<u64>,
    /// Stop after this many samples; unbounded when absent.
    pub count: Option<u64>,
    /// Delay between samples, in milliseconds.
    pub interval_ms: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            period: 50.0,
            noise_std: 0.5,
            anomaly_probability: 0.01,
            spike_min: 5.0,
            spike_max: 10.0,
            seed: None,
            count: None,
            interval_ms: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Aligned text rows on stdout.
    #[default]
    Text,
    /// One JSON object per line on stdout.
    Json,
    /// Anomalies reported through the log only.
    Log,
}

impl std::str::FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "log" => Ok(OutputFormat::Log),
            other => anyhow::bail!("unknown output format '{}', expected text, json or log", other),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Only emit anomalous samples.
    pub anomalies_only: bool,
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    /// `RUST_LOG` takes precedence when set.
    pub level: String,
    /// Emit structured JSON log lines instead of plain text.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
