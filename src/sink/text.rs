use std::io::Write;

use anyhow::{Context, Result};

use crate::detect::{Classification, Sample};
use crate::sink::Sink;

/// Aligned, human-readable rows.
pub struct TextSink<W: Write> {
    out: W,
    anomalies_only: bool,
    header_written: bool,
}

impl<W: Write> TextSink<W> {
    pub fn new(out: W, anomalies_only: bool) -> Self {
        Self {
            out,
            anomalies_only,
            header_written: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_header(&mut self) -> Result<()> {
        writeln!(
            self.out,
            "{:>10} | {:>12} | {:>12} | {:>10} | {:>8} | Status",
            "Index", "Value", "Baseline", "StdDev", "Score"
        )?;
        writeln!(
            self.out,
            "{:-<10}-|-{:-<12}-|-{:-<12}-|-{:-<10}-|-{:-<8}-|-{:-<10}",
            "", "", "", "", "", ""
        )?;
        self.header_written = true;
        Ok(())
    }
}

impl<W: Write> Sink for TextSink<W> {
    fn emit(&mut self, sample: &Sample, c: &Classification) -> Result<()> {
        if self.anomalies_only && !c.is_anomalous() {
            return Ok(());
        }
        if !self.header_written {
            self.write_header().context("failed to write output header")?;
        }

        let status = if c.numerically_unstable {
            "UNSTABLE".to_string()
        } else {
            match c.severity() {
                Some(severity) => format!("ANOMALY ({})", severity),
                None => "ok".to_string(),
            }
        };
        writeln!(
            self.out,
            "{:>10} | {:>12.4} | {:>12.4} | {:>10.4} | {:>8.2} | {}",
            sample.index,
            sample.value,
            c.baseline,
            c.std_dev,
            c.score(),
            status
        )
        .with_context(|| format!("failed to write sample {}", sample.index))?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush().context("failed to flush output")
    }
}
