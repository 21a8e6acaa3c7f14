//! Exponentially weighted baseline and variance with a sigma-threshold rule.
//!
//! Each sample updates the state in O(1) and receives a [`Classification`]:
//!
//! ```text
//! baseline' = λ·x + (1 − λ)·baseline
//! variance' = λ·(x − baseline')² + (1 − λ)·variance
//! anomalous ⇔ σ' > floor ∧ |x − reference| > k·σ'
//! ```
//!
//! where `reference` is `baseline'` or `baseline` depending on
//! [`DeviationReference`].

use crate::config::{DetectorConfig, DeviationReference, NonFinitePolicy};
use crate::detect::{Classification, DetectError, DetectorState, Sample};

/// Online anomaly detector for a single series.
///
/// `observe` takes `&mut self`; share a detector across threads only behind
/// a lock.
#[derive(Debug, Clone)]
pub struct Detector {
    config: DetectorConfig,
    state: DetectorState,
}

impl Detector {
    pub fn new(config: DetectorConfig) -> Result<Self, DetectError> {
        config.validate()?;
        Ok(Self {
            config,
            state: DetectorState::new(),
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn state(&self) -> &DetectorState {
        &self.state
    }

    /// Forget everything observed so far.
    pub fn reset(&mut self) {
        self.state.clear();
    }

    /// Fold one sample into the baseline and classify it.
    pub fn observe(&mut self, sample: Sample) -> Result<(Sample, Classification), DetectError> {
        let DetectorConfig {
            smoothing_factor,
            anomaly_threshold,
            std_dev_floor,
            deviation_reference,
            non_finite,
        } = self.config;

        if !sample.value.is_finite() {
            return self.bypass(sample, non_finite, DetectError::NonFiniteValue {
                index: sample.index,
                value: sample.value,
            });
        }

        let step = self.state.step(sample.value, smoothing_factor);
        if !step.is_finite() {
            // A finite value can still overflow the squared residual; committing
            // an infinite variance would silence every later sample.
            return self.bypass(sample, non_finite, DetectError::Overflow {
                index: sample.index,
                value: sample.value,
            });
        }
        self.state.commit(&step);
        let std_dev = step.variance.sqrt();

        let Some(prior) = step.prior else {
            // Nothing to deviate from yet.
            return Ok((
                sample,
                Classification::decide(step.baseline, 0.0, 0.0, anomaly_threshold, std_dev_floor),
            ));
        };

        let reference = match deviation_reference {
            DeviationReference::Updated => step.baseline,
            DeviationReference::Prior => prior,
        };
        let deviation = (sample.value - reference).abs();

        let classification = Classification::decide(
            reference,
            std_dev,
            deviation,
            anomaly_threshold,
            std_dev_floor,
        );
        Ok((sample, classification))
    }

    /// Handle a sample that must not reach the state, per the non-finite policy.
    fn bypass(
        &self,
        sample: Sample,
        policy: NonFinitePolicy,
        error: DetectError,
    ) -> Result<(Sample, Classification), DetectError> {
        match policy {
            NonFinitePolicy::Reject => Err(error),
            NonFinitePolicy::Flag => {
                let classification = Classification::unstable(
                    self.state.baseline().unwrap_or(0.0),
                    self.state.std_dev(),
                    self.config.anomaly_threshold,
                    self.config.std_dev_floor,
                );
                Ok((sample, classification))
            }
        }
    }

    /// Lazily classify every sample of `samples`, in order.
    pub fn annotate<I>(&mut self, samples: I) -> Annotated<'_, I::IntoIter>
    where
        I: IntoIterator<Item = Sample>,
    {
        Annotated {
            detector: self,
            samples: samples.into_iter(),
        }
    }
}

/// Iterator returned by [`Detector::annotate`].
pub struct Annotated<'a, I> {
    detector: &'a mut Detector,
    samples: I,
}

impl<I> Iterator for Annotated<'_, I>
where
    I: Iterator<Item = Sample>,
{
    type Item = Result<(Sample, Classification), DetectError>;

    fn next(&mut self) -> Option<Self::Item> {
        let sample = self.samples.next()?;
        Some(self.detector.observe(sample))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.samples.size_hint()
    }
}
