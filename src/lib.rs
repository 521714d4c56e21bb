//! openloop-ff: online-learning open-loop feedforward for velocity control.
//!
//! Continuously observes (applied-drive, measured-rate) telemetry from a
//! velocity-controlled actuator, fits a linear rate→drive model per direction
//! of motion, and turns commanded rates into drive signals with no closed-loop
//! correction.
//!
//! ## Architecture
//!
//! - **Regression engine** ([`regression`]): ordinary-least-squares line fit
//! - **Sample store** ([`store`]): quantized-bin sample maps with seed policy
//! - **Feedforward model** ([`model`]): one fit per sign partition, refit on
//!   every mutation
//! - **Update cycle** ([`cycle`]): per-tick filter → store → refit → unseed →
//!   command
//! - **Runner** ([`runner`]): async control loop, telemetry sources, sinks

pub mod config;
pub mod cycle;
pub mod model;
pub mod regression;
pub mod runner;
pub mod store;
pub mod types;

// Re-export configuration
pub use config::{ConfigError, CycleParams, EstimatorConfig};

// Re-export the estimator core
pub use cycle::{RejectReason, TelemetryFilter, UpdateCycle};
pub use model::FeedforwardModel;
pub use regression::{LinearFit, RegressionError};
pub use store::SampleStore;

// Re-export commonly used types
pub use types::{Direction, EstimatorStatus, FilterCounters, ModelSnapshot, Sample, Telemetry};

// Re-export runner components
pub use runner::{
    CaptureSink, ControlLoop, ControlLoopStats, DriveSink, ReferenceProgram, ReplaySource,
    StdinTelemetrySource, StdoutSink, TelemetryEvent, TelemetrySource,
};
