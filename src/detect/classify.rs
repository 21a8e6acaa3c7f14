use crate::detect::Severity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Normal,
    Anomalous,
}

/// Decision attached to a sample as it leaves the detector.
///
/// `baseline` and `std_dev` are the values the decision was made against,
/// not necessarily the detector's state after later samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    pub verdict: Verdict,
    pub baseline: f64,
    pub std_dev: f64,
    pub deviation: f64,
    /// Set when the sample (or the state it would produce) was not finite and
    /// bypassed the estimator.
    pub numerically_unstable: bool,
    #[serde(skip)]
    pub(crate) threshold: f64,
    #[serde(skip)]
    pub(crate) floor: f64,
}

impl Classification {
    /// Apply the threshold rule: anomalous iff the spread is above the floor
    /// and the deviation exceeds `threshold` standard deviations.
    pub(crate) fn decide(
        baseline: f64,
        std_dev: f64,
        deviation: f64,
        threshold: f64,
        floor: f64,
    ) -> Self {
        let verdict = if std_dev > floor && deviation > threshold * std_dev {
            Verdict::Anomalous
        } else {
            Verdict::Normal
        };
        Self {
            verdict,
            baseline,
            std_dev,
            deviation,
            numerically_unstable: false,
            threshold,
            floor,
        }
    }

    /// A `Normal` result for a sample that never reached the estimator.
    pub(crate) fn unstable(baseline: f64, std_dev: f64, threshold: f64, floor: f64) -> Self {
        Self {
            verdict: Verdict::Normal,
            baseline,
            std_dev,
            deviation: 0.0,
            numerically_unstable: true,
            threshold,
            floor,
        }
    }

    pub fn is_anomalous(&self) -> bool {
        self.verdict == Verdict::Anomalous
    }

    /// Deviation expressed in standard deviations (0 below the floor).
    pub fn score(&self) -> f64 {
        if self.std_dev > self.floor {
            self.deviation / self.std_dev
        } else {
            0.0
        }
    }

    /// Grade an anomaly by how far its score overshoots the threshold.
    pub fn severity(&self) -> Option<Severity> {
        if !self.is_anomalous() {
            return None;
        }
        let ratio = self.score() / self.threshold;
        Some(if ratio > 3.0 {
            Severity::Critical
        } else if ratio > 2.0 {
            Severity::Warning
        } else {
            Severity::Info
        })
    }
}
