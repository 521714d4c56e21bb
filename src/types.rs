//! Core data types shared across the estimator.

use serde::{Deserialize, Serialize};

/// One telemetry observation: the drive signal applied to the actuator and
/// the rate it was measured to produce.
///
/// `drive` is the actuation signal (e.g. volts), `rate` the controlled
/// quantity (e.g. rad/s). Both are raw sensor values; filtering happens in
/// the update cycle, not here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// Applied drive signal believed to have produced `rate`.
    pub drive: f64,
    /// Measured rate.
    pub rate: f64,
}

/// A stored (rate, drive) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub rate: f64,
    pub drive: f64,
}

/// Sign partition of the model.
///
/// The actuator response is not assumed symmetric, so each direction of
/// motion gets its own sample set and its own line fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Positive,
    Negative,
}

impl Direction {
    /// Partition selector for a measured rate.
    ///
    /// Returns `None` for a rate of exactly zero — zero-rate samples are
    /// never stored.
    pub fn from_rate(rate: f64) -> Option<Self> {
        if rate > 0.0 {
            Some(Self::Positive)
        } else if rate < 0.0 {
            Some(Self::Negative)
        } else {
            None
        }
    }

    /// +1.0 or -1.0.
    pub fn sign(self) -> f64 {
        match self {
            Self::Positive => 1.0,
            Self::Negative => -1.0,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Positive => write!(f, "positive"),
            Self::Negative => write!(f, "negative"),
        }
    }
}

/// Observable state of one partition's fitted model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub direction: Direction,
    pub slope: f64,
    pub intercept: f64,
    /// Raw sum of squared residuals of the fit — not a normalized R².
    pub sse: f64,
    /// Sample count in the partition, seeds included.
    pub samples: usize,
}

impl std::fmt::Display for ModelSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} model: u = {:.5} + {:.5} * x from {} points with error {:.3}",
            self.direction, self.intercept, self.slope, self.samples, self.sse
        )
    }
}

/// Full estimator status for diagnostics and dashboards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorStatus {
    /// Latest externally set target rate.
    pub reference: f64,
    /// Ticks processed so far.
    pub ticks: u64,
    pub positive: ModelSnapshot,
    pub negative: ModelSnapshot,
    /// Telemetry filter accounting.
    pub filter: FilterCounters,
}

/// Running counts of telemetry admission decisions.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FilterCounters {
    pub accepted: u64,
    pub rejected: u64,
    pub non_finite: u64,
    pub rate_below_floor: u64,
    pub drive_below_floor: u64,
    pub drive_over_supply: u64,
    pub sign_mismatch: u64,
}
