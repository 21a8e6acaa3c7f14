//! Consumers of classified samples.

pub mod json;
pub mod text;

pub use self::json::JsonLinesSink;
pub use self::text::TextSink;

use anyhow::Result;
use tracing::{trace, warn};

use crate::detect::{Classification, Sample};

/// Push interface receiving each sample together with its classification.
pub trait Sink {
    fn emit(&mut self, sample: &Sample, classification: &Classification) -> Result<()>;

    /// Push out anything buffered. Called once when the stream ends.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn emit(&mut self, sample: &Sample, classification: &Classification) -> Result<()> {
        (**self).emit(sample, classification)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn emit(&mut self, sample: &Sample, classification: &Classification) -> Result<()> {
        (**self).emit(sample, classification)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Reports anomalies and unstable samples through `tracing`.
#[derive(Debug, Default)]
pub struct LogSink;

impl Sink for LogSink {
    fn emit(&mut self, sample: &Sample, c: &Classification) -> Result<()> {
        if c.numerically_unstable {
            warn!(index = sample.index, value = %sample.value, "non-finite sample skipped");
        } else if let Some(severity) = c.severity() {
            warn!(
                index = sample.index,
                value = format_args!("{:.2}", sample.value),
                baseline = format_args!("{:.2}", c.baseline),
                std_dev = format_args!("{:.3}", c.std_dev),
                score = format_args!("{:.2}", c.score()),
                %severity,
                "anomaly detected"
            );
        } else {
            trace!(index = sample.index, value = sample.value, baseline = c.baseline, "normal");
        }
        Ok(())
    }
}

/// Keeps every classified sample in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Vec<(Sample, Classification)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[(Sample, Classification)] {
        &self.records
    }

    pub fn anomalies(&self) -> impl Iterator<Item = &(Sample, Classification)> {
        self.records.iter().filter(|(_, c)| c.is_anomalous())
    }
}

impl Sink for MemorySink {
    fn emit(&mut self, sample: &Sample, classification: &Classification) -> Result<()> {
        self.records.push((*sample, *classification));
        Ok(())
    }
}
