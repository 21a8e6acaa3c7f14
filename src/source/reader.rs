//! Samples read line by line from any `BufRead`.
//!
//! Accepted line forms:
//! - `value`: index assigned automatically, one past the previous sample.
//! - `index,value`: explicit index, must be strictly increasing.
//!
//! Blank lines and lines starting with `#` are skipped. `nan`, `inf` and
//! `-inf` parse as non-finite values; what happens to them is up to the
//! detector's non-finite policy.

use std::io::BufRead;

use anyhow::{bail, Context, Result};

use crate::detect::Sample;
use crate::source::SampleSource;

pub struct LineReader<R> {
    reader: R,
    line_no: usize,
    next_index: u64,
    last_index: Option<u64>,
    buf: String,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            next_index: 0,
            last_index: None,
            buf: String::new(),
        }
    }

    fn parse_line(&mut self, line: &str) -> Result<Sample> {
        let (index, raw_value) = match line.split_once(',') {
            Some((idx, val)) => {
                let idx = idx.trim();
                let index: u64 = idx
                    .parse()
                    .with_context(|| format!("line {}: invalid index '{}'", self.line_no, idx))?;
                (index, val.trim())
            }
            None => (self.next_index, line),
        };

        if let Some(last) = self.last_index {
            if index <= last {
                bail!(
                    "line {}: index {} is not greater than previous index {}",
                    self.line_no,
                    index,
                    last
                );
            }
        }

        let value: f64 = raw_value
            .parse()
            .with_context(|| format!("line {}: invalid value '{}'", self.line_no, raw_value))?;

        self.last_index = Some(index);
        self.next_index = index.saturating_add(1);
        Ok(Sample::new(index, value))
    }
}

impl<R: BufRead> SampleSource for LineReader<R> {
    fn next_sample(&mut self) -> Result<Option<Sample>> {
        loop {
            self.buf.clear();
            let read = self
                .reader
                .read_line(&mut self.buf)
                .with_context(|| format!("failed to read line {}", self.line_no + 1))?;
            if read == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let line = self.buf.trim().to_string();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            return self.parse_line(&line).map(Some);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read_all(input: &str) -> Result<Vec<Sample>> {
        let mut reader = LineReader::new(Cursor::new(input.to_string()));
        let mut out = Vec::new();
        while let Some(s) = reader.next_sample()? {
            out.push(s);
        }
        Ok(out)
    }

    #[test]
    fn test_bare_values_are_numbered() {
        let samples = read_all("1.5\n-2\n\n# comment\n3e2\n").unwrap();
        assert_eq!(
            samples,
            vec![
                Sample::new(0, 1.5),
                Sample::new(1, -2.0),
                Sample::new(2, 300.0)
            ]
        );
    }

    #[test]
    fn test_explicit_indexes_and_crlf() {
        let samples = read_all("10, 0.5\r\n12,0.25\r\n").unwrap();
        assert_eq!(samples, vec![Sample::new(10, 0.5), Sample::new(12, 0.25)]);
    }

    #[test]
    fn test_bare_value_continues_after_explicit_index() {
        let samples = read_all("5,1.0\n2.0\n").unwrap();
        assert_eq!(samples[1], Sample::new(6, 2.0));
    }

    #[test]
    fn test_non_finite_tokens_parse() {
        let samples = read_all("nan\ninf\n-inf\n").unwrap();
        assert!(samples[0].value.is_nan());
        assert_eq!(samples[1].value, f64::INFINITY);
        assert_eq!(samples[2].value, f64::NEG_INFINITY);
    }

    #[test]
    fn test_malformed_value_names_line() {
        let err = read_all("1.0\n# skip\nbanana\n").unwrap_err();
        assert!(format!("{:#}", err).contains("line 3"));
    }

    #[test]
    fn test_decreasing_index_rejected() {
        let err = read_all("3,1.0\n3,2.0\n").unwrap_err();
        assert!(err.to_string().contains("not greater"));
    }

    #[test]
    fn test_empty_input_is_empty_stream() {
        assert!(read_all("").unwrap().is_empty());
        assert!(read_all("\n\n# nothing\n").unwrap().is_empty());
    }
}
