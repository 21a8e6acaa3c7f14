use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::detect::{Classification, Sample, Severity, Verdict};
use crate::sink::Sink;

/// One output line of [`JsonLinesSink`].
#[derive(Debug, Serialize)]
pub struct Record {
    pub index: u64,
    pub value: f64,
    pub verdict: Verdict,
    pub baseline: f64,
    pub std_dev: f64,
    pub deviation: f64,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub numerically_unstable: bool,
    pub emitted_at: DateTime<Utc>,
}

impl Record {
    pub fn new(sample: &Sample, c: &Classification) -> Self {
        Self {
            index: sample.index,
            value: sample.value,
            verdict: c.verdict,
            baseline: c.baseline,
            std_dev: c.std_dev,
            deviation: c.deviation,
            score: c.score(),
            severity: c.severity(),
            numerically_unstable: c.numerically_unstable,
            emitted_at: Utc::now(),
        }
    }
}

/// Newline-delimited JSON, one [`Record`] per sample.
pub struct JsonLinesSink<W: Write> {
    out: W,
    anomalies_only: bool,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W, anomalies_only: bool) -> Self {
        Self {
            out,
            anomalies_only,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Sink for JsonLinesSink<W> {
    fn emit(&mut self, sample: &Sample, c: &Classification) -> Result<()> {
        if self.anomalies_only && !c.is_anomalous() {
            return Ok(());
        }
        // Non-finite values have no JSON representation; serde_json writes them as null.
        serde_json::to_writer(&mut self.out, &Record::new(sample, c))
            .with_context(|| format!("failed to encode sample {}", sample.index))?;
        self.out
            .write_all(b"\n")
            .with_context(|| format!("failed to write sample {}", sample.index))?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush().context("failed to flush output")
    }
}
