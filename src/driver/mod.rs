//! Pulls samples from a source through the detector into a sink.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, info_span};
use uuid::Uuid;

use crate::detect::Detector;
use crate::sink::Sink;
use crate::source::SampleSource;

/// Cooperative stop flag, checked between samples.
///
/// Clones share the same flag, so one handle can live in a signal handler
/// while the driver loop polls another.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Summary of one driver run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub samples: u64,
    pub anomalies: u64,
    pub unstable: u64,
    /// True when the stop signal or the sample limit ended the run.
    pub stopped_early: bool,
    pub final_baseline: Option<f64>,
    pub final_variance: f64,
}

/// Runs a source through a detector into a sink, one sample at a time.
#[derive(Debug, Clone, Default)]
pub struct Driver {
    limit: Option<u64>,
    progress_every: Option<u64>,
}

impl Driver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process at most `limit` samples.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Log a progress line every `every` samples.
    pub fn with_progress(mut self, every: u64) -> Self {
        self.progress_every = (every > 0).then_some(every);
        self
    }

    /// Drive until the source ends, the stop signal is raised, the limit is
    /// reached, or any stage fails. Errors halt the loop and are returned.
    pub fn run<S, K>(
        &self,
        mut source: S,
        detector: &mut Detector,
        mut sink: K,
        stop: &StopSignal,
    ) -> Result<RunReport>
    where
        S: SampleSource,
        K: Sink,
    {
        let run_id = Uuid::new_v4();
        let span = info_span!("run", %run_id);
        let _guard = span.enter();

        let mut report = RunReport {
            run_id,
            samples: 0,
            anomalies: 0,
            unstable: 0,
            stopped_early: false,
            final_baseline: None,
            final_variance: 0.0,
        };

        loop {
            if stop.is_stopped() {
                debug!(samples = report.samples, "stop signal received");
                report.stopped_early = true;
                break;
            }
            if self.limit.is_some_and(|n| report.samples >= n) {
                debug!(limit = report.samples, "sample limit reached");
                report.stopped_early = true;
                break;
            }

            let Some(sample) = source
                .next_sample()
                .with_context(|| format!("source failed after {} samples", report.samples))?
            else {
                debug!(samples = report.samples, "source exhausted");
                break;
            };

            let (sample, classification) = detector
                .observe(sample)
                .with_context(|| format!("detector rejected sample {}", sample.index))?;
            sink.emit(&sample, &classification)
                .with_context(|| format!("sink failed on sample {}", sample.index))?;

            report.samples += 1;
            if classification.is_anomalous() {
                report.anomalies += 1;
            }
            if classification.numerically_unstable {
                report.unstable += 1;
            }

            if self.progress_every.is_some_and(|n| report.samples % n == 0) {
                info!(
                    samples = report.samples,
                    anomalies = report.anomalies,
                    baseline = ?detector.state().baseline(),
                    "progress"
                );
            }
        }

        sink.flush().context("sink failed to flush")?;

        report.final_baseline = detector.state().baseline();
        report.final_variance = detector.state().variance();
        info!(
            samples = report.samples,
            anomalies = report.anomalies,
            unstable = report.unstable,
            stopped_early = report.stopped_early,
            "run finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DetectorConfig, NonFinitePolicy};
    use crate::detect::{Classification, Sample};
    use crate::sink::MemorySink;
    use crate::source::{from_values, IterSource};

    fn detector() -> Detector {
        Detector::new(DetectorConfig::new(0.7, 1.0)).unwrap()
    }

    #[test]
    fn test_run_preserves_order_and_counts() {
        let mut d = detector();
        let mut sink = MemorySink::new();
        let report = Driver::new()
            .run(
                from_values([0.0, 0.0, 0.0, 0.0, 10.0]),
                &mut d,
                &mut sink,
                &StopSignal::new(),
            )
            .unwrap();

        assert_eq!(report.samples, 5);
        assert_eq!(report.anomalies, 1);
        assert!(!report.stopped_early);
        assert_eq!(report.final_baseline, d.state().baseline());

        let indexes: Vec<u64> = sink.records().iter().map(|(s, _)| s.index).collect();
        assert_eq!(indexes, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_raised_stop_processes_nothing() {
        let stop = StopSignal::new();
        stop.stop();

        let mut d = detector();
        let mut sink = MemorySink::new();
        let report = Driver::new()
            .run(from_values([1.0, 2.0]), &mut d, &mut sink, &stop)
            .unwrap();

        assert_eq!(report.samples, 0);
        assert!(report.stopped_early);
        assert!(sink.records().is_empty());
        assert!(!d.state().is_initialized());
    }

    /// Raises the stop signal once it has seen `after` samples.
    struct StopAfter {
        after: usize,
        stop: StopSignal,
        seen: usize,
    }

    impl Sink for StopAfter {
        fn emit(&mut self, _: &Sample, _: &Classification) -> Result<()> {
            self.seen += 1;
            if self.seen == self.after {
                self.stop.stop();
            }
            Ok(())
        }
    }

    #[test]
    fn test_stop_between_samples_on_unbounded_source() {
        let stop = StopSignal::new();
        let sink = StopAfter {
            after: 3,
            stop: stop.clone(),
            seen: 0,
        };
        let unbounded = IterSource::new((0u64..).map(|i| Sample::new(i, i as f64)));

        let mut d = detector();
        let report = Driver::new().run(unbounded, &mut d, sink, &stop).unwrap();
        assert_eq!(report.samples, 3);
        assert!(report.stopped_early);
        assert_eq!(d.state().observed(), 3);
    }

    #[test]
    fn test_limit_caps_samples() {
        let mut d = detector();
        let report = Driver::new()
            .with_limit(2)
            .run(from_values([1.0, 2.0, 3.0]), &mut d, MemorySink::new(), &StopSignal::new())
            .unwrap();
        assert_eq!(report.samples, 2);
        assert!(report.stopped_early);
    }

    struct FailingSource {
        remaining: u32,
    }

    impl SampleSource for FailingSource {
        fn next_sample(&mut self) -> Result<Option<Sample>> {
            if self.remaining == 0 {
                anyhow::bail!("connection reset");
            }
            self.remaining -= 1;
            Ok(Some(Sample::new(self.remaining as u64, 1.0)))
        }
    }

    #[test]
    fn test_source_error_halts_and_surfaces() {
        let mut d = detector();
        let mut sink = MemorySink::new();
        let err = Driver::new()
            .run(FailingSource { remaining: 2 }, &mut d, &mut sink, &StopSignal::new())
            .unwrap_err();

        assert!(format!("{:#}", err).contains("connection reset"));
        assert_eq!(sink.records().len(), 2);
    }

    struct FailingSink;

    impl Sink for FailingSink {
        fn emit(&mut self, _: &Sample, _: &Classification) -> Result<()> {
            anyhow::bail!("disk full")
        }
    }

    #[test]
    fn test_sink_error_halts_and_surfaces() {
        let mut d = detector();
        let err = Driver::new()
            .run(from_values([1.0, 2.0]), &mut d, FailingSink, &StopSignal::new())
            .unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("sample 0"));
        assert!(msg.contains("disk full"));
        // The first sample was observed before the sink failed.
        assert_eq!(d.state().observed(), 1);
    }

    #[test]
    fn test_rejected_non_finite_halts_run() {
        let mut d = detector();
        let err = Driver::new()
            .run(from_values([1.0, f64::NAN, 2.0]), &mut d, MemorySink::new(), &StopSignal::new())
            .unwrap_err();
        assert!(err.to_string().contains("sample 1"));
    }

    #[test]
    fn test_flagged_non_finite_is_counted() {
        let cfg = DetectorConfig::new(0.7, 1.0).with_non_finite(NonFinitePolicy::Flag);
        let mut d = Detector::new(cfg).unwrap();
        let report = Driver::new()
            .run(from_values([1.0, f64::NAN, 2.0]), &mut d, MemorySink::new(), &StopSignal::new())
            .unwrap();
        assert_eq!(report.samples, 3);
        assert_eq!(report.unstable, 1);
        assert_eq!(d.state().observed(), 2);
    }
}
