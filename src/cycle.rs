//! Per-tick orchestration: filter → store → refit → unseed → command.
//!
//! The cycle is synchronous and single-threaded: one external tick invocation
//! runs the whole chain to completion, so the command emitted for tick N
//! always reflects any sample accepted in tick N. Telemetry arrives as a
//! plain input value each tick; the cycle holds no state beyond the model
//! and the current reference rate.

use tracing::{debug, warn};

use crate::config::{ConfigError, CycleParams, EstimatorConfig};
use crate::model::FeedforwardModel;
use crate::types::{Direction, EstimatorStatus, FilterCounters, Telemetry};

// ============================================================================
// Telemetry Filter
// ============================================================================

/// Why a telemetry sample was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// NaN or infinite field — would poison the sums inside the fit.
    NonFinite,
    /// |rate| under the noise floor (stationary or encoder noise).
    RateBelowFloor,
    /// |drive| under the noise floor (controller idle).
    DriveBelowFloor,
    /// |drive| above the nominal supply magnitude (sensor glitch).
    DriveOverSupply,
    /// Drive and rate disagree in sign (non-causal or inverted reading).
    SignMismatch,
}

/// Admission filter for raw telemetry.
///
/// Rejection is not an error: the sample is counted and dropped, and the
/// next tick supplies fresh telemetry.
#[derive(Debug, Clone)]
pub struct TelemetryFilter {
    rate_floor: f64,
    drive_floor: f64,
    max_drive: f64,
    counters: FilterCounters,
}

impl TelemetryFilter {
    pub fn new(params: &CycleParams) -> Self {
        Self {
            rate_floor: params.rate_noise_floor,
            drive_floor: params.drive_noise_floor,
            max_drive: params.nominal_drive,
            counters: FilterCounters::default(),
        }
    }

    fn check(&self, t: &Telemetry) -> Result<(), RejectReason> {
        if !t.rate.is_finite() || !t.drive.is_finite() {
            return Err(RejectReason::NonFinite);
        }
        if t.rate.abs() < self.rate_floor {
            return Err(RejectReason::RateBelowFloor);
        }
        if t.drive.abs() < self.drive_floor {
            return Err(RejectReason::DriveBelowFloor);
        }
        if t.drive.abs() > self.max_drive {
            return Err(RejectReason::DriveOverSupply);
        }
        if t.drive.signum() != t.rate.signum() {
            return Err(RejectReason::SignMismatch);
        }
        Ok(())
    }

    /// Check a sample and update the counters.
    pub fn admit(&mut self, t: &Telemetry) -> bool {
        match self.check(t) {
            Ok(()) => {
                self.counters.accepted += 1;
                true
            }
            Err(reason) => {
                self.counters.rejected += 1;
                match reason {
                    RejectReason::NonFinite => self.counters.non_finite += 1,
                    RejectReason::RateBelowFloor => self.counters.rate_below_floor += 1,
                    RejectReason::DriveBelowFloor => self.counters.drive_below_floor += 1,
                    RejectReason::DriveOverSupply => self.counters.drive_over_supply += 1,
                    RejectReason::SignMismatch => self.counters.sign_mismatch += 1,
                }
                debug!(drive = t.drive, rate = t.rate, ?reason, "telemetry rejected");
                false
            }
        }
    }

    pub fn counters(&self) -> FilterCounters {
        self.counters
    }
}

// ============================================================================
// Update Cycle
// ============================================================================

/// The per-tick estimator: ingest telemetry, adapt the model, emit a command.
#[derive(Debug, Clone)]
pub struct UpdateCycle {
    model: FeedforwardModel,
    filter: TelemetryFilter,
    reference: f64,
    drive_limit: f64,
    simulation_scale: f64,
    ticks: u64,
}

impl UpdateCycle {
    /// Build a cycle from validated parameters.
    pub fn new(params: &CycleParams) -> Self {
        Self {
            model: FeedforwardModel::new(params),
            filter: TelemetryFilter::new(params),
            reference: 0.0,
            drive_limit: params.nominal_drive,
            simulation_scale: params.simulation_scale,
            ticks: 0,
        }
    }

    /// Convenience constructor that validates a raw config first.
    pub fn from_config(config: &EstimatorConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(&config.params()?))
    }

    /// Set the target rate used for commanding.
    pub fn set_reference(&mut self, rate: f64) {
        self.reference = rate;
    }

    /// Latest externally set target rate.
    pub fn reference(&self) -> f64 {
        self.reference
    }

    /// Clamp and scale a raw model output into a safe command.
    ///
    /// Non-finite model output degrades to zero drive; the hot path must
    /// never forward a non-finite command to the actuator.
    fn command_for(&self, rate: f64) -> f64 {
        let drive = self.model.query(rate);
        if !drive.is_finite() {
            warn!(rate, drive, "non-finite model output; commanding zero drive");
            return 0.0;
        }
        drive.clamp(-self.drive_limit, self.drive_limit) * self.simulation_scale
    }

    /// Preview the command for a rate without mutating any state.
    pub fn dry_run(&self, rate: f64) -> f64 {
        self.command_for(rate)
    }

    /// Run one full tick: filter the incoming sample, update the model, run
    /// the un-seed policy, and return the drive command for the current
    /// reference.
    pub fn on_tick(&mut self, telemetry: Telemetry) -> f64 {
        self.ticks += 1;

        // Filtering → storing → refitting. Rejected samples have no further
        // effect this tick.
        if self.filter.admit(&telemetry) {
            self.model.observe(telemetry.rate, telemetry.drive);
        }

        // Unseeding runs every tick, accepted sample or not.
        self.model.attempt_unseed();

        // Commanding.
        self.command_for(self.reference)
    }

    /// Full status for diagnostics.
    pub fn status(&self) -> EstimatorStatus {
        EstimatorStatus {
            reference: self.reference,
            ticks: self.ticks,
            positive: self.model.snapshot(Direction::Positive),
            negative: self.model.snapshot(Direction::Negative),
            filter: self.filter.counters(),
        }
    }

    /// Read access to the model (tests and diagnostics).
    pub fn model(&self) -> &FeedforwardModel {
        &self.model
    }
}
