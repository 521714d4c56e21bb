//! Async control loop wiring a telemetry source to the update cycle.
//!
//! The estimator core is synchronous; this module is the external scheduler
//! around it. One telemetry sample drives one tick — the source's pacing
//! (real sensor cadence, replay delay, stdin producer) is the control period.
//! All estimator state is confined to the loop task, so no mutation is ever
//! visible mid-tick from another thread.

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cycle::UpdateCycle;
use crate::types::Telemetry;

// ============================================================================
// Telemetry Sources
// ============================================================================

/// Events produced by a telemetry source.
pub enum TelemetryEvent {
    /// A telemetry pair was read.
    Sample(Telemetry),
    /// Source reached end of data.
    Eof,
}

/// Trait abstracting where telemetry comes from.
///
/// Implementations handle format parsing and pacing internally. The control
/// loop calls [`next_sample`](TelemetrySource::next_sample) in a select! with
/// cancellation.
#[async_trait]
pub trait TelemetrySource: Send + 'static {
    /// Read the next telemetry pair.
    ///
    /// Returns `TelemetryEvent::Eof` when no more data is available.
    async fn next_sample(&mut self) -> Result<TelemetryEvent>;

    /// Human-readable name for logging (e.g. "replay", "stdin").
    fn source_name(&self) -> &str;
}

/// Replays pre-loaded telemetry with an optional inter-sample delay.
pub struct ReplaySource {
    samples: std::vec::IntoIter<Telemetry>,
    delay_ms: u64,
    yielded_first: bool,
}

impl ReplaySource {
    pub fn new(samples: Vec<Telemetry>, delay_ms: u64) -> Self {
        Self {
            samples: samples.into_iter(),
            delay_ms,
            yielded_first: false,
        }
    }
}

#[async_trait]
impl TelemetrySource for ReplaySource {
    async fn next_sample(&mut self) -> Result<TelemetryEvent> {
        if self.yielded_first && self.delay_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.delay_ms)).await;
        }
        match self.samples.next() {
            Some(t) => {
                self.yielded_first = true;
                Ok(TelemetryEvent::Sample(t))
            }
            None => Ok(TelemetryEvent::Eof),
        }
    }

    fn source_name(&self) -> &str {
        "replay"
    }
}

/// Reads JSON-formatted telemetry pairs from stdin, one per line.
///
/// Used with an external producer:
/// `python motor_bridge.py | openloop-ff`
pub struct StdinTelemetrySource {
    reader: tokio::io::BufReader<tokio::io::Stdin>,
    line_buffer: String,
}

impl StdinTelemetrySource {
    pub fn new() -> Self {
        Self {
            reader: tokio::io::BufReader::new(tokio::io::stdin()),
            line_buffer: String::with_capacity(256),
        }
    }
}

impl Default for StdinTelemetrySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TelemetrySource for StdinTelemetrySource {
    async fn next_sample(&mut self) -> Result<TelemetryEvent> {
        use tokio::io::AsyncBufReadExt;
        loop {
            self.line_buffer.clear();
            let bytes = self.reader.read_line(&mut self.line_buffer).await?;
            if bytes == 0 {
                return Ok(TelemetryEvent::Eof);
            }
            let line = self.line_buffer.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Telemetry>(line) {
                Ok(t) => return Ok(TelemetryEvent::Sample(t)),
                Err(e) => {
                    warn!("[StdinTelemetrySource] Failed to parse sample: {}", e);
                    // Skip malformed lines and keep reading.
                }
            }
        }
    }

    fn source_name(&self) -> &str {
        "stdin"
    }
}

// ============================================================================
// Drive Sinks
// ============================================================================

/// Accepts one scalar drive command per tick.
pub trait DriveSink: Send {
    fn set_drive(&mut self, tick: u64, drive: f64) -> Result<()>;
}

/// Emits commands as JSON lines on stdout.
pub struct StdoutSink;

impl DriveSink for StdoutSink {
    fn set_drive(&mut self, tick: u64, drive: f64) -> Result<()> {
        println!("{{\"tick\":{tick},\"drive\":{drive}}}");
        Ok(())
    }
}

/// Captures commands in memory; for tests and dry runs.
#[derive(Debug, Default)]
pub struct CaptureSink {
    pub commands: Vec<f64>,
}

impl DriveSink for CaptureSink {
    fn set_drive(&mut self, _tick: u64, drive: f64) -> Result<()> {
        self.commands.push(drive);
        Ok(())
    }
}

// ============================================================================
// Reference Programs
// ============================================================================

/// Per-tick reference rate generation.
///
/// `Hold` is the normal operating mode (an operator or planner sets the
/// target); the waveform programs exercise the estimator across its range
/// during commissioning runs.
#[derive(Debug, Clone, Copy)]
pub enum ReferenceProgram {
    /// Constant target rate.
    Hold(f64),
    /// `amplitude * sin(2π * tick / period_ticks)`.
    Sine { amplitude: f64, period_ticks: u64 },
    /// `min(step * tick, limit)`.
    Ramp { step: f64, limit: f64 },
    /// Sawtooth spanning ±span/2 with the given per-tick step.
    Sawtooth { step: f64, span: f64 },
}

impl ReferenceProgram {
    /// Reference rate at a given tick.
    pub fn at(&self, tick: u64) -> f64 {
        match *self {
            Self::Hold(rate) => rate,
            Self::Sine {
                amplitude,
                period_ticks,
            } => {
                let period = period_ticks.max(1) as f64;
                amplitude * (2.0 * std::f64::consts::PI * tick as f64 / period).sin()
            }
            Self::Ramp { step, limit } => (step * tick as f64).min(limit),
            Self::Sawtooth { step, span } => (step * tick as f64) % span - span / 2.0,
        }
    }
}

// ============================================================================
// Control Loop
// ============================================================================

/// Final accounting for one control loop run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ControlLoopStats {
    pub ticks: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub last_command: f64,
}

/// Owns the update cycle and drives it with telemetry until the source is
/// exhausted or cancellation.
pub struct ControlLoop<K: DriveSink> {
    cycle: UpdateCycle,
    sink: K,
    program: ReferenceProgram,
    cancel_token: CancellationToken,
    /// Log model status every this many ticks (0 disables).
    status_every: u64,
}

impl<K: DriveSink> ControlLoop<K> {
    pub fn new(
        cycle: UpdateCycle,
        sink: K,
        program: ReferenceProgram,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            cycle,
            sink,
            program,
            cancel_token,
            status_every: 50,
        }
    }

    /// Change the status logging interval.
    pub fn with_status_every(mut self, ticks: u64) -> Self {
        self.status_every = ticks;
        self
    }

    /// Run the loop until the source is exhausted or cancellation.
    ///
    /// Returns final statistics; the sink and cycle are consumed with the
    /// loop.
    pub async fn run<S: TelemetrySource>(mut self, source: &mut S) -> ControlLoopStats {
        let mut ticks = 0u64;
        let mut last_command = 0.0;

        info!("Processing telemetry from {}...", source.source_name());

        loop {
            let event = tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("[ControlLoop] Shutdown signal received");
                    break;
                }
                result = source.next_sample() => {
                    match result {
                        Ok(ev) => ev,
                        Err(e) => {
                            warn!("[ControlLoop] Source error: {}", e);
                            break;
                        }
                    }
                }
            };

            let telemetry = match event {
                TelemetryEvent::Sample(t) => t,
                TelemetryEvent::Eof => {
                    info!("[ControlLoop] Source reached end ({} ticks)", ticks);
                    break;
                }
            };

            self.cycle.set_reference(self.program.at(ticks));
            last_command = self.cycle.on_tick(telemetry);
            ticks += 1;

            if let Err(e) = self.sink.set_drive(ticks, last_command) {
                warn!("[ControlLoop] Failed to emit drive command: {}", e);
            }

            if self.status_every > 0 && ticks % self.status_every == 0 {
                let status = self.cycle.status();
                info!(
                    reference = status.reference,
                    command = last_command,
                    accepted = status.filter.accepted,
                    rejected = status.filter.rejected,
                    "{} | {}",
                    status.positive,
                    status.negative
                );
            }
        }

        let status = self.cycle.status();
        let stats = ControlLoopStats {
            ticks,
            accepted: status.filter.accepted,
            rejected: status.filter.rejected,
            last_command,
        };

        info!("FINAL STATISTICS");
        info!("   Ticks:             {}", stats.ticks);
        info!("   Samples accepted:  {}", stats.accepted);
        info!("   Samples rejected:  {}", stats.rejected);
        info!("   {}", status.positive);
        info!("   {}", status.negative);

        stats
    }
}
