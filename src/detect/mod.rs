//! Streaming anomaly detection over an EWMA baseline.

pub mod classify;
pub mod ewma;
pub mod state;

pub use self::classify::{Classification, Verdict};
pub use self::ewma::{Annotated, Detector};
pub use self::state::DetectorState;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DetectError {
    #[error("invalid configuration: {field} {reason}")]
    InvalidConfiguration { field: &'static str, reason: String },

    #[error("non-finite value at index {index}: {value}")]
    NonFiniteValue { index: u64, value: f64 },

    #[error("estimator overflow at index {index}: {value} drives the state non-finite")]
    Overflow { index: u64, value: f64 },
}

/// Severity levels for anomalous samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// A single observation in the stream.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Sample {
    /// Caller-supplied position in the stream, monotonically increasing.
    pub index: u64,
    pub value: f64,
}

impl Sample {
    pub fn new(index: u64, value: f64) -> Self {
        Self { index, value }
    }
}
