use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use ewmawatch::config::{
    AppConfig, DeviationReference, LoggingConfig, NonFinitePolicy, OutputFormat,
};
use ewmawatch::driver::StopSignal;
use ewmawatch::source::{LineReader, Simulator};

#[derive(Parser)]
#[command(
    name = "ewmawatch",
    about = "Streaming EWMA anomaly detection for telemetry pipelines",
    version,
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

/// Settings that override the config file.
#[derive(Args)]
struct Overrides {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Smoothing factor in (0, 1]
    #[arg(long, global = true)]
    lambda: Option<f64>,

    /// Anomaly threshold in standard deviations
    #[arg(long, global = true)]
    threshold: Option<f64>,

    /// Standard deviation floor below which nothing is anomalous
    #[arg(long, global = true)]
    floor: Option<f64>,

    /// Measure deviation against the baseline before the update
    #[arg(long, global = true)]
    prior_baseline: bool,

    /// Flag non-finite values instead of failing on them
    #[arg(long, global = true)]
    flag_non_finite: bool,

    /// Stop after this many samples
    #[arg(long, global = true)]
    limit: Option<u64>,

    /// Output format: text, json or log
    #[arg(long, global = true)]
    format: Option<OutputFormat>,

    /// Only emit anomalous samples
    #[arg(long, global = true)]
    anomalies_only: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the detector over a simulated seasonal signal with injected spikes
    Simulate {
        /// RNG seed for a reproducible stream
        #[arg(long)]
        seed: Option<u64>,

        /// Number of samples to generate (unbounded when omitted)
        #[arg(long)]
        count: Option<u64>,

        /// Delay between samples in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// Run the detector over values read from a file or stdin
    Scan {
        /// Input file, one `value` or `index,value` per line ("-" for stdin)
        path: Option<PathBuf>,
    },

    /// Print the effective configuration as TOML
    Config,
}

impl Overrides {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(lambda) = self.lambda {
            config.detector.smoothing_factor = lambda;
        }
        if let Some(threshold) = self.threshold {
            config.detector.anomaly_threshold = threshold;
        }
        if let Some(floor) = self.floor {
            config.detector.std_dev_floor = floor;
        }
        if self.prior_baseline {
            config.detector.deviation_reference = DeviationReference::Prior;
        }
        if self.flag_non_finite {
            config.detector.non_finite = NonFinitePolicy::Flag;
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }
        if self.anomalies_only {
            config.output.anomalies_only = true;
        }
        if self.log_json {
            config.logging.json = true;
        }
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Raise `stop` on the first Ctrl-C; exit on the second.
fn spawn_ctrl_c_handler(stop: StopSignal) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::info!("Interrupt received, stopping after the current sample");
        stop.stop();

        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Second interrupt, exiting immediately");
            std::process::exit(130);
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.overrides.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::load_or_default(),
    };
    cli.overrides.apply(&mut config);

    init_tracing(&config.logging);
    if let Some(path) = &cli.overrides.config {
        tracing::debug!(path = %path.display(), "Using config file");
    }

    let stop = StopSignal::new();
    let limit = cli.overrides.limit;

    match cli.command {
        Commands::Simulate {
            seed,
            count,
            interval_ms,
        } => {
            if seed.is_some() {
                config.simulator.seed = seed;
            }
            if count.is_some() {
                config.simulator.count = count;
            }
            if let Some(ms) = interval_ms {
                config.simulator.interval_ms = ms;
            }
            tracing::info!(
                seed = ?config.simulator.seed,
                count = ?config.simulator.count,
                "Simulating stream"
            );

            let source = Simulator::new(&config.simulator)?;
            spawn_ctrl_c_handler(stop.clone());
            tokio::task::spawn_blocking(move || {
                ewmawatch::run_stream(source, &config, limit, &stop)
            })
            .await
            .context("detector task panicked")??;
        }
        Commands::Scan { path } => {
            spawn_ctrl_c_handler(stop.clone());
            match path.filter(|p| p.as_os_str() != "-") {
                Some(path) => {
                    tracing::info!(path = %path.display(), "Scanning file");
                    let file = File::open(&path)
                        .with_context(|| format!("failed to open {}", path.display()))?;
                    let source = LineReader::new(BufReader::new(file));
                    tokio::task::spawn_blocking(move || {
                        ewmawatch::run_stream(source, &config, limit, &stop)
                    })
                    .await
                    .context("detector task panicked")??;
                }
                None => {
                    tracing::info!("Scanning stdin");
                    tokio::task::spawn_blocking(move || {
                        let source = LineReader::new(io::stdin().lock());
                        ewmawatch::run_stream(source, &config, limit, &stop)
                    })
                    .await
                    .context("detector task panicked")??;
                }
            }
        }
        Commands::Config => {
            config
                .detector
                .validate()
                .context("effective detector configuration is invalid")?;
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}
