//! Producers of samples for the detector.
//!
//! A source hands out one sample per call, in stream order, and reports
//! `Ok(None)` once exhausted. Unbounded sources never return `None`; the
//! driver stops them through its stop signal instead.

pub mod reader;
pub mod simulator;

pub use self::reader::LineReader;
pub use self::simulator::Simulator;

use anyhow::Result;

use crate::detect::Sample;

/// Pull interface over an ordered, possibly unbounded sample stream.
pub trait SampleSource {
    /// Produce the next sample, `Ok(None)` at end of stream.
    fn next_sample(&mut self) -> Result<Option<Sample>>;
}

impl<S: SampleSource + ?Sized> SampleSource for &mut S {
    fn next_sample(&mut self) -> Result<Option<Sample>> {
        (**self).next_sample()
    }
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn next_sample(&mut self) -> Result<Option<Sample>> {
        (**self).next_sample()
    }
}

/// Adapts any in-memory iterator of samples into a source.
pub struct IterSource<I> {
    inner: I,
}

impl<I> IterSource<I>
where
    I: Iterator<Item = Sample>,
{
    pub fn new(inner: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            inner: inner.into_iter(),
        }
    }
}

/// Wrap plain values as a source, numbering them from 0.
pub fn from_values<V>(values: V) -> IterSource<impl Iterator<Item = Sample>>
where
    V: IntoIterator<Item = f64>,
{
    IterSource::new(
        values
            .into_iter()
            .enumerate()
            .map(|(i, v)| Sample::new(i as u64, v)),
    )
}

impl<I> SampleSource for IterSource<I>
where
    I: Iterator<Item = Sample>,
{
    fn next_sample(&mut self) -> Result<Option<Sample>> {
        Ok(self.inner.next())
    }
}
