use serde::{Deserialize, Serialize};

/// Running state of one detector: the EWMA baseline and variance.
///
/// `baseline` is `None` until the first finite sample has been committed.
/// `variance` never goes negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectorState {
    baseline: Option<f64>,
    variance: f64,
    observed: u64,
}

impl DetectorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn baseline(&self) -> Option<f64> {
        self.baseline
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }

    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }

    /// Number of samples committed since construction or the last reset.
    pub fn observed(&self) -> u64 {
        self.observed
    }

    pub fn is_initialized(&self) -> bool {
        self.baseline.is_some()
    }

    /// Compute the state that folding `value` in would produce, without
    /// committing it.
    ///
    /// The first value seeds the baseline with zero variance; every later
    /// value applies one EWMA step with smoothing factor `lambda`.
    pub(crate) fn step(&self, value: f64, lambda: f64) -> Step {
        let prior = self.baseline;
        let (baseline, variance) = match prior {
            None => (value, 0.0),
            Some(prior) => {
                let baseline = lambda * value + (1.0 - lambda) * prior;
                let residual = value - baseline;
                // Both terms are non-negative for lambda in (0, 1]; clamp guards rounding.
                let variance =
                    (lambda * residual * residual + (1.0 - lambda) * self.variance).max(0.0);
                (baseline, variance)
            }
        };
        Step {
            prior,
            baseline,
            variance,
        }
    }

    pub(crate) fn commit(&mut self, step: &Step) {
        self.baseline = Some(step.baseline);
        self.variance = step.variance;
        self.observed += 1;
    }

    /// Fold `value` in and commit the result.
    #[cfg(test)]
    pub(crate) fn update(&mut self, value: f64, lambda: f64) -> Step {
        let step = self.step(value, lambda);
        self.commit(&step);
        step
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Outcome of a single [`DetectorState::update`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Step {
    /// Baseline before the update; `None` when this value seeded the state.
    pub prior: Option<f64>,
    pub baseline: f64,
    pub variance: f64,
}

impl Step {
    /// False when the recursion overflowed, even though the input was finite.
    pub fn is_finite(&self) -> bool {
        self.baseline.is_finite() && self.variance.is_finite()
    }
}
