//! Named default constants for the estimator configuration.
//!
//! Every tunable has a named constant here so `Default` impls and docs agree
//! on a single source of truth.

/// Default free-running rate at nominal drive, rad/s.
pub const DEFAULT_FREE_RUNNING_RATE: f64 = 500.0;

/// Default nominal supply drive magnitude, volts.
pub const DEFAULT_NOMINAL_DRIVE: f64 = 12.0;

/// Default bin resolution as a fraction of nominal drive.
pub const DEFAULT_BIN_FRACTION: f64 = 0.02;

/// Default rate noise floor as a fraction of the free-running rate.
pub const DEFAULT_RATE_NOISE_FRACTION: f64 = 0.01;

/// Default drive noise floor as a fraction of nominal drive.
pub const DEFAULT_DRIVE_NOISE_FRACTION: f64 = 0.01;

/// Default scale applied to emitted commands (1.0 = real hardware).
pub const DEFAULT_SIMULATION_SCALE: f64 = 1.0;

/// Default control period, milliseconds.
pub const DEFAULT_TICK_PERIOD_MS: u64 = 20;

/// Reserved seed bins sit at these multiples of nominal drive — far outside
/// the physically valid ±nominal range, so no real sample can collide.
pub const SEED_ONE_DRIVE_FACTOR: f64 = 100.0;
pub const SEED_TWO_DRIVE_FACTOR: f64 = 101.0;

/// Partition population above which the first seed is retired.
pub const UNSEED_FIRST_ABOVE: usize = 5;

/// Partition population above which the second seed is retired (once the
/// first is gone).
pub const UNSEED_SECOND_ABOVE: usize = 4;
