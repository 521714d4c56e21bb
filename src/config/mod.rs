//! Estimator configuration loaded from TOML.
//!
//! ## Loading order
//!
//! 1. `OPENLOOP_FF_CONFIG` environment variable (path to TOML file)
//! 2. `estimator.toml` in the current working directory
//! 3. Built-in defaults
//!
//! There is no process-global config: callers load an [`EstimatorConfig`],
//! resolve it to [`CycleParams`] with [`EstimatorConfig::params`], and pass
//! the result to constructors explicitly. That keeps every component a pure
//! function of its inputs and trivially testable.

pub mod defaults;

use defaults::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Environment variable naming an explicit config file path.
pub const CONFIG_ENV_VAR: &str = "OPENLOOP_FF_CONFIG";

/// Default config file searched in the working directory.
pub const CONFIG_LOCAL_PATH: &str = "estimator.toml";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse config file {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("{field} must be a finite value > 0, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("{field} must be a finite value >= 0, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("store.bin_resolution ({resolution}) must not exceed actuator.nominal_drive ({nominal})")]
    ResolutionTooCoarse { resolution: f64, nominal: f64 },

    #[error("timing.tick_period_ms must be >= 1")]
    ZeroTickPeriod,
}

// ============================================================================
// Config Sections
// ============================================================================

/// Actuator characteristics used to synthesize seed samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActuatorConfig {
    /// Rate achieved at nominal drive with no load, rad/s.
    pub free_running_rate: f64,
    /// Reference drive magnitude (nominal supply), volts.
    pub nominal_drive: f64,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            free_running_rate: DEFAULT_FREE_RUNNING_RATE,
            nominal_drive: DEFAULT_NOMINAL_DRIVE,
        }
    }
}

/// Sample store tuning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Drive-axis quantization granularity, volts.
    ///
    /// When unset, defaults to [`DEFAULT_BIN_FRACTION`] of nominal drive.
    pub bin_resolution: Option<f64>,
}

/// Telemetry admission thresholds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Samples with |rate| below this are treated as sensor noise.
    ///
    /// When unset, defaults to [`DEFAULT_RATE_NOISE_FRACTION`] of the
    /// free-running rate.
    pub rate_noise_floor: Option<f64>,
    /// Samples with |drive| below this are treated as sensor noise.
    ///
    /// When unset, defaults to [`DEFAULT_DRIVE_NOISE_FRACTION`] of nominal
    /// drive.
    pub drive_noise_floor: Option<f64>,
}

/// Command output tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Scale applied to the emitted command after clamping.
    ///
    /// Compatibility knob for downstream collaborators whose simulated
    /// response treats the command differently from real hardware. Not part
    /// of the estimation algorithm; leave at 1.0 on real hardware.
    pub simulation_scale: f64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            simulation_scale: DEFAULT_SIMULATION_SCALE,
        }
    }
}

/// Control loop timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Control period used to pace replay sources, milliseconds.
    pub tick_period_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: DEFAULT_TICK_PERIOD_MS,
        }
    }
}

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one estimator instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EstimatorConfig {
    #[serde(default)]
    pub actuator: ActuatorConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub filter: FilterConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub timing: TimingConfig,
}

impl EstimatorConfig {
    /// Load configuration using the standard search order.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded estimator config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(CONFIG_LOCAL_PATH);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded estimator config from ./{}", CONFIG_LOCAL_PATH);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", CONFIG_LOCAL_PATH);
                }
            }
        }

        info!("No {} found — using built-in defaults", CONFIG_LOCAL_PATH);
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }

    /// Validate and resolve into the concrete parameter set the estimator
    /// components consume.
    pub fn params(&self) -> Result<CycleParams, ConfigError> {
        let free_running_rate =
            require_positive("actuator.free_running_rate", self.actuator.free_running_rate)?;
        let nominal_drive =
            require_positive("actuator.nominal_drive", self.actuator.nominal_drive)?;

        let bin_resolution = match self.store.bin_resolution {
            Some(r) => require_positive("store.bin_resolution", r)?,
            None => nominal_drive * DEFAULT_BIN_FRACTION,
        };
        if bin_resolution > nominal_drive {
            return Err(ConfigError::ResolutionTooCoarse {
                resolution: bin_resolution,
                nominal: nominal_drive,
            });
        }

        let rate_noise_floor = match self.filter.rate_noise_floor {
            Some(f) => require_non_negative("filter.rate_noise_floor", f)?,
            None => free_running_rate * DEFAULT_RATE_NOISE_FRACTION,
        };
        let drive_noise_floor = match self.filter.drive_noise_floor {
            Some(f) => require_non_negative("filter.drive_noise_floor", f)?,
            None => nominal_drive * DEFAULT_DRIVE_NOISE_FRACTION,
        };

        let simulation_scale =
            require_positive("output.simulation_scale", self.output.simulation_scale)?;

        if self.timing.tick_period_ms == 0 {
            return Err(ConfigError::ZeroTickPeriod);
        }

        Ok(CycleParams {
            free_running_rate,
            nominal_drive,
            bin_resolution,
            rate_noise_floor,
            drive_noise_floor,
            simulation_scale,
            tick_period_ms: self.timing.tick_period_ms,
        })
    }
}

fn require_positive(field: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

fn require_non_negative(field: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::Negative { field, value })
    }
}

// ============================================================================
// Resolved Parameters
// ============================================================================

/// Validated, fully resolved parameters for one estimator instance.
///
/// Produced by [`EstimatorConfig::params`]; all fields are concrete and
/// already range-checked.
#[derive(Debug, Clone, Copy)]
pub struct CycleParams {
    pub free_running_rate: f64,
    pub nominal_drive: f64,
    pub bin_resolution: f64,
    pub rate_noise_floor: f64,
    pub drive_noise_floor: f64,
    pub simulation_scale: f64,
    pub tick_period_ms: u64,
}
