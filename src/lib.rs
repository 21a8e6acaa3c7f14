//! ewmawatch -- streaming EWMA anomaly detection.
//!
//! This crate provides a constant-memory detector that classifies each
//! sample of a numeric stream against an exponentially weighted baseline,
//! plus the sources, sinks and driver loop needed to run it end to end.

pub mod config;
pub mod detect;
pub mod driver;
pub mod sink;
pub mod source;

use std::io;

use anyhow::Result;

use crate::config::{AppConfig, OutputConfig, OutputFormat};
use crate::detect::Detector;
use crate::driver::{Driver, RunReport, StopSignal};
use crate::sink::{JsonLinesSink, LogSink, Sink, TextSink};
use crate::source::SampleSource;

/// Build the sink selected by the output configuration, writing to stdout.
pub fn stdout_sink(output: &OutputConfig) -> Box<dyn Sink> {
    match output.format {
        OutputFormat::Text => Box::new(TextSink::new(io::stdout().lock(), output.anomalies_only)),
        OutputFormat::Json => Box::new(JsonLinesSink::new(
            io::stdout().lock(),
            output.anomalies_only,
        )),
        OutputFormat::Log => Box::new(LogSink),
    }
}

/// Run `source` through a fresh detector into the configured stdout sink,
/// processing at most `limit` samples when given.
pub fn run_stream<S: SampleSource>(
    source: S,
    config: &AppConfig,
    limit: Option<u64>,
    stop: &StopSignal,
) -> Result<RunReport> {
    let mut detector = Detector::new(config.detector)?;
    tracing::info!(
        smoothing_factor = config.detector.smoothing_factor,
        anomaly_threshold = config.detector.anomaly_threshold,
        std_dev_floor = config.detector.std_dev_floor,
        reference = ?config.detector.deviation_reference,
        non_finite = ?config.detector.non_finite,
        "Starting detector"
    );

    let sink = stdout_sink(&config.output);
    let mut driver = Driver::new().with_progress(10_000);
    if let Some(limit) = limit {
        driver = driver.with_limit(limit);
    }
    driver.run(source, &mut detector, sink, stop)
}
