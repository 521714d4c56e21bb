//! openloop-ff command-line runner.
//!
//! Reads telemetry pairs (JSON lines, `{"drive": .., "rate": ..}`) from stdin
//! or a replay file, runs the adaptive feedforward estimator one tick per
//! sample, and emits drive commands as JSON lines on stdout.
//!
//! # Usage
//!
//! ```bash
//! # Live telemetry from an external bridge, fixed 250 rad/s target
//! python motor_bridge.py | openloop-ff --reference 250
//!
//! # Replay a recorded run with a sine reference sweep
//! openloop-ff --replay run.jsonl --sine-amplitude 500 --sine-period 628
//! ```
//!
//! # Environment Variables
//!
//! - `OPENLOOP_FF_CONFIG`: Path to an estimator TOML config
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use openloop_ff::{
    ControlLoop, EstimatorConfig, ReferenceProgram, ReplaySource, StdinTelemetrySource,
    StdoutSink, Telemetry, UpdateCycle,
};

#[derive(Parser, Debug)]
#[command(name = "openloop-ff")]
#[command(about = "Adaptive open-loop feedforward estimator")]
#[command(version)]
struct CliArgs {
    /// Path to an estimator TOML config (overrides OPENLOOP_FF_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Replay telemetry from a JSON-lines file instead of stdin
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Inter-sample delay for replay, ms (default: the configured tick period)
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Hold a fixed reference rate, rad/s
    #[arg(long, default_value = "0.0")]
    reference: f64,

    /// Sweep the reference with a sine of this amplitude instead of holding
    #[arg(long)]
    sine_amplitude: Option<f64>,

    /// Sine period in ticks
    #[arg(long, default_value = "628")]
    sine_period: u64,

    /// Log model status every N ticks (0 disables)
    #[arg(long, default_value = "50")]
    status_every: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = CliArgs::parse();

    let config = match &args.config {
        Some(path) => EstimatorConfig::load_from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => EstimatorConfig::load(),
    };
    let params = config.params().context("invalid estimator configuration")?;

    let cycle = UpdateCycle::new(&params);

    let program = match args.sine_amplitude {
        Some(amplitude) => ReferenceProgram::Sine {
            amplitude,
            period_ticks: args.sine_period,
        },
        None => ReferenceProgram::Hold(args.reference),
    };

    let cancel_token = CancellationToken::new();
    let ctrl_c_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            ctrl_c_token.cancel();
        }
    });

    info!(
        free_running_rate = params.free_running_rate,
        nominal_drive = params.nominal_drive,
        bin_resolution = params.bin_resolution,
        "Starting feedforward estimator"
    );

    let looped = ControlLoop::new(cycle, StdoutSink, program, cancel_token)
        .with_status_every(args.status_every);

    let stats = match &args.replay {
        Some(path) => {
            let samples = load_replay(path)
                .with_context(|| format!("loading replay from {}", path.display()))?;
            let delay = args.delay_ms.unwrap_or(params.tick_period_ms);
            let mut source = ReplaySource::new(samples, delay);
            looped.run(&mut source).await
        }
        None => {
            let mut source = StdinTelemetrySource::new();
            looped.run(&mut source).await
        }
    };

    info!(
        ticks = stats.ticks,
        accepted = stats.accepted,
        rejected = stats.rejected,
        "Done"
    );
    Ok(())
}

/// Load telemetry from a JSON-lines file, skipping malformed lines.
fn load_replay(path: &PathBuf) -> Result<Vec<Telemetry>> {
    let contents = std::fs::read_to_string(path)?;
    let mut samples = Vec::new();
    for (n, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Telemetry>(line) {
            Ok(t) => samples.push(t),
            Err(e) => tracing::warn!(line = n + 1, error = %e, "Skipping malformed replay line"),
        }
    }
    info!(count = samples.len(), path = %path.display(), "Loaded replay telemetry");
    Ok(samples)
}
