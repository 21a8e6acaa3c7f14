//! Synthetic seasonal signal with occasional injected spikes.
//!
//! Sample `t` is `sin(2πt / period) + N(0, noise_std)`, plus a uniform spike
//! in `[spike_min, spike_max)` with probability `anomaly_probability`.

use std::f64::consts::PI;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, Uniform};
use tracing::debug;

use crate::config::SimulatorConfig;
use crate::detect::Sample;
use crate::source::SampleSource;

pub struct Simulator {
    period: f64,
    noise: Normal<f64>,
    spike: Uniform<f64>,
    anomaly_probability: f64,
    rng: StdRng,
    step: u64,
    count: Option<u64>,
    interval: Duration,
    last_injected: bool,
}

impl Simulator {
    pub fn new(config: &SimulatorConfig) -> Result<Self> {
        ensure!(
            config.period > 0.0 && config.period.is_finite(),
            "simulator period must be finite and > 0, got {}",
            config.period
        );
        ensure!(
            (0.0..=1.0).contains(&config.anomaly_probability),
            "simulator anomaly_probability must be in [0, 1], got {}",
            config.anomaly_probability
        );
        ensure!(
            config.spike_min.is_finite() && config.spike_max.is_finite(),
            "simulator spike bounds must be finite, got [{}, {})",
            config.spike_min,
            config.spike_max
        );
        ensure!(
            config.spike_min < config.spike_max,
            "simulator spike range is empty: [{}, {})",
            config.spike_min,
            config.spike_max
        );
        ensure!(
            config.noise_std >= 0.0 && config.noise_std.is_finite(),
            "simulator noise_std must be finite and >= 0, got {}",
            config.noise_std
        );

        let noise = Normal::new(0.0, config.noise_std)
            .with_context(|| format!("invalid simulator noise_std: {}", config.noise_std))?;
        let spike = Uniform::new(config.spike_min, config.spike_max);
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        debug!(
            period = config.period,
            noise_std = config.noise_std,
            anomaly_probability = config.anomaly_probability,
            seed = ?config.seed,
            "simulator ready"
        );

        Ok(Self {
            period: config.period,
            noise,
            spike,
            anomaly_probability: config.anomaly_probability,
            rng,
            step: 0,
            count: config.count,
            interval: Duration::from_millis(config.interval_ms),
            last_injected: false,
        })
    }

    /// Whether the most recently produced sample carried an injected spike.
    pub fn last_injected(&self) -> bool {
        self.last_injected
    }

    fn generate(&mut self) -> f64 {
        let t = self.step as f64;
        let seasonal = (2.0 * PI * t / self.period).sin();
        let mut value = seasonal + self.noise.sample(&mut self.rng);

        self.last_injected = self.rng.gen::<f64>() < self.anomaly_probability;
        if self.last_injected {
            value += self.spike.sample(&mut self.rng);
        }
        value
    }
}

impl SampleSource for Simulator {
    fn next_sample(&mut self) -> Result<Option<Sample>> {
        if self.count.is_some_and(|n| self.step >= n) {
            return Ok(None);
        }
        if !self.interval.is_zero() && self.step > 0 {
            std::thread::sleep(self.interval);
        }

        let value = self.generate();
        let sample = Sample::new(self.step, value);
        self.step += 1;
        Ok(Some(sample))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(seed: u64, count: u64) -> SimulatorConfig {
        SimulatorConfig {
            seed: Some(seed),
            count: Some(count),
            ..SimulatorConfig::default()
        }
    }

    fn drain(sim: &mut Simulator) -> Vec<Sample> {
        let mut out = Vec::new();
        while let Some(s) = sim.next_sample().unwrap() {
            out.push(s);
        }
        out
    }

    #[test]
    fn test_same_seed_same_stream() {
        let a = drain(&mut Simulator::new(&seeded(7, 100)).unwrap());
        let b = drain(&mut Simulator::new(&seeded(7, 100)).unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn test_count_bounds_stream_and_indexes_are_sequential() {
        let samples = drain(&mut Simulator::new(&seeded(1, 25)).unwrap());
        assert_eq!(samples.len(), 25);
        for (i, s) in samples.iter().enumerate() {
            assert_eq!(s.index, i as u64);
            assert!(s.value.is_finite());
        }
    }

    #[test]
    fn test_noiseless_signal_is_pure_sine() {
        let cfg = SimulatorConfig {
            noise_std: 0.0,
            anomaly_probability: 0.0,
            ..seeded(3, 51)
        };
        let samples = drain(&mut Simulator::new(&cfg).unwrap());
        assert!(samples[0].value.abs() < 1e-12);
        assert!((samples[25].value).abs() < 1e-9);
        assert!((samples[50].value).abs() < 1e-9);
        assert!((samples[12].value - (2.0 * PI * 12.0 / 50.0).sin()).abs() < 1e-12);
    }

    #[test]
    fn test_certain_spikes_land_in_range() {
        let cfg = SimulatorConfig {
            noise_std: 0.0,
            anomaly_probability: 1.0,
            ..seeded(5, 20)
        };
        let mut sim = Simulator::new(&cfg).unwrap();
        while let Some(s) = sim.next_sample().unwrap() {
            assert!(sim.last_injected());
            let seasonal = (2.0 * PI * s.index as f64 / 50.0).sin();
            let spike = s.value - seasonal;
            assert!((5.0 - 1e-9..10.0 + 1e-9).contains(&spike), "spike {} out of range", spike);
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad_period = SimulatorConfig {
            period: 0.0,
            ..SimulatorConfig::default()
        };
        assert!(Simulator::new(&bad_period).is_err());

        let bad_probability = SimulatorConfig {
            anomaly_probability: 1.5,
            ..SimulatorConfig::default()
        };
        assert!(Simulator::new(&bad_probability).is_err());

        let empty_spike = SimulatorConfig {
            spike_min: 10.0,
            spike_max: 5.0,
            ..SimulatorConfig::default()
        };
        assert!(Simulator::new(&empty_spike).is_err());

        let bad_noise = SimulatorConfig {
            noise_std: -1.0,
            ..SimulatorConfig::default()
        };
        assert!(Simulator::new(&bad_noise).is_err());

        let infinite_noise = SimulatorConfig {
            noise_std: f64::INFINITY,
            ..SimulatorConfig::default()
        };
        assert!(Simulator::new(&infinite_noise).is_err());
    }

    #[test]
    fn test_non_finite_spike_bounds_rejected() {
        let open_low = SimulatorConfig {
            spike_min: f64::NEG_INFINITY,
            ..SimulatorConfig::default()
        };
        let err = Simulator::new(&open_low).err().unwrap();
        assert!(err.to_string().contains("finite"));

        let open_high = SimulatorConfig {
            spike_max: f64::INFINITY,
            ..SimulatorConfig::default()
        };
        assert!(Simulator::new(&open_high).is_err());

        let nan_low = SimulatorConfig {
            spike_min: f64::NAN,
            ..SimulatorConfig::default()
        };
        assert!(Simulator::new(&nan_low).is_err());
    }
}
