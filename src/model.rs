//! Per-direction feedforward model: one line fit per sample partition.
//!
//! The model owns the sample store and refits the affected partition's line
//! synchronously on every mutation, so a query can never observe samples that
//! the coefficients do not yet reflect.

use tracing::{debug, warn};

use crate::config::CycleParams;
use crate::regression::LinearFit;
use crate::store::SampleStore;
use crate::types::{Direction, ModelSnapshot};

/// Adaptive rate→drive model with independent positive and negative fits.
#[derive(Debug, Clone)]
pub struct FeedforwardModel {
    store: SampleStore,
    positive: LinearFit,
    negative: LinearFit,
}

impl FeedforwardModel {
    /// Build a model over a freshly seeded store.
    ///
    /// The seed samples normally have distinct x-values, so the initial fit
    /// succeeds. The one exception is a nominal drive of exactly 1.0, which
    /// collapses both seeds onto the same rate; in that case the model pins
    /// the proportional seed line instead, so queries always see finite
    /// coefficients.
    pub fn new(params: &CycleParams) -> Self {
        let store = SampleStore::new(params);
        let pinned = |direction: Direction| {
            warn!(
                %direction,
                "seed samples are colinear in x; pinning proportional seed model"
            );
            LinearFit {
                slope: params.nominal_drive / params.free_running_rate,
                intercept: 0.0,
                sse: 0.0,
            }
        };
        let positive = LinearFit::fit(store.points(Direction::Positive))
            .unwrap_or_else(|_| pinned(Direction::Positive));
        let negative = LinearFit::fit(store.points(Direction::Negative))
            .unwrap_or_else(|_| pinned(Direction::Negative));
        Self {
            store,
            positive,
            negative,
        }
    }

    fn fit(&self, direction: Direction) -> &LinearFit {
        match direction {
            Direction::Positive => &self.positive,
            Direction::Negative => &self.negative,
        }
    }

    /// Recompute one partition's fit from its full current sample set.
    ///
    /// On a degenerate sample set the previous valid fit is retained — a
    /// stale-but-finite model is always preferable to a non-finite command.
    fn refit(&mut self, direction: Direction) {
        match LinearFit::fit(self.store.points(direction)) {
            Ok(fit) => {
                debug!(%direction, slope = fit.slope, intercept = fit.intercept, sse = fit.sse, "refit");
                match direction {
                    Direction::Positive => self.positive = fit,
                    Direction::Negative => self.negative = fit,
                }
            }
            Err(e) => {
                warn!(%direction, error = %e, "refit degenerate; retaining previous model");
            }
        }
    }

    /// Ingest one accepted observation: store it and refit the affected
    /// partition before returning.
    pub fn observe(&mut self, rate: f64, drive: f64) -> Option<Direction> {
        let direction = self.store.put(rate, drive)?;
        self.refit(direction);
        Some(direction)
    }

    /// Run the seed retirement policy and refit any mutated partition.
    pub fn attempt_unseed(&mut self) {
        for direction in self.store.attempt_unseed() {
            self.refit(direction);
        }
    }

    /// Feedforward drive for a target rate.
    ///
    /// Exactly `0.0` for a zero rate; otherwise the matching partition's line
    /// applied to `rate`. The result is the unclamped linear extrapolation —
    /// clamping to the actuator's command range is the caller's job.
    pub fn query(&self, rate: f64) -> f64 {
        match Direction::from_rate(rate) {
            None => 0.0,
            Some(direction) => self.fit(direction).apply(rate),
        }
    }

    /// Observable state of one partition.
    pub fn snapshot(&self, direction: Direction) -> ModelSnapshot {
        let fit = self.fit(direction);
        ModelSnapshot {
            direction,
            slope: fit.slope,
            intercept: fit.intercept,
            sse: fit.sse,
            samples: self.store.len(direction),
        }
    }

    /// Read access to the underlying store.
    pub fn store(&self) -> &SampleStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EstimatorConfig;

    fn model_with(free: f64, nominal: f64) -> FeedforwardModel {
        let mut config = EstimatorConfig::default();
        config.actuator.free_running_rate = free;
        config.actuator.nominal_drive = nominal;
        FeedforwardModel::new(&config.params().unwrap())
    }

    #[test]
    fn seed_bootstrap_queries_nominal_drive() {
        let m = model_with(500.0, 12.0);
        assert_eq!(m.store().len(Direction::Positive), 2);
        assert!((m.query(500.0) - 12.0).abs() < 1e-3);
        assert!((m.query(-500.0) + 12.0).abs() < 1e-3);
    }

    #[test]
    fn zero_rate_query_is_exactly_zero() {
        let mut m = model_with(500.0, 12.0);
        assert_eq!(m.query(0.0), 0.0);
        m.observe(100.0, 3.0);
        assert_eq!(m.query(0.0), 0.0);
    }

    #[test]
    fn observe_refits_synchronously() {
        let mut m = model_with(500.0, 12.0);
        let before = m.query(200.0);
        // An observation far off the seed line must move the prediction.
        m.observe(200.0, 9.0);
        let after = m.query(200.0);
        assert!((after - before).abs() > 1e-6);
        let snap = m.snapshot(Direction::Positive);
        assert_eq!(snap.samples, 3);
    }

    #[test]
    fn partitions_fit_independently() {
        let mut m = model_with(500.0, 12.0);
        m.observe(200.0, 9.0);
        // Negative side still rides the untouched seed line.
        assert!((m.query(-500.0) + 12.0).abs() < 1e-3);
    }

    #[test]
    fn query_is_one_global_line_per_sign() {
        let m = model_with(500.0, 12.0);
        // Linear across the whole positive domain: second differences vanish,
        // including across bin boundaries.
        let q = |x: f64| m.query(x);
        for x in [1.0, 10.0, 123.4, 250.0, 499.0] {
            let d2 = q(x + 2.0) - 2.0 * q(x + 1.0) + q(x);
            assert!(d2.abs() < 1e-9, "nonlinear at {x}: {d2}");
        }
    }

    #[test]
    fn unit_nominal_drive_pins_proportional_model() {
        // nominal_drive == 1.0 collapses both seeds to the same rate.
        let m = model_with(500.0, 1.0);
        assert!((m.query(500.0) - 1.0).abs() < 1e-9);
        assert!((m.query(250.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn unseed_triggers_refit() {
        let mut m = model_with(500.0, 12.0);
        // Five real samples on an offset line: drive = 0.02 * rate + 0.5.
        for rate in [50.0, 100.0, 150.0, 200.0, 250.0] {
            m.observe(rate, 0.02 * rate + 0.5);
            m.attempt_unseed();
        }
        m.attempt_unseed();
        // Both seeds retired; the fit now passes exactly through the real
        // samples.
        assert!(!m.store().seed_one_present(Direction::Positive));
        assert!(!m.store().seed_two_present(Direction::Positive));
        let snap = m.snapshot(Direction::Positive);
        assert!((snap.slope - 0.02).abs() < 1e-9);
        assert!((snap.intercept - 0.5).abs() < 1e-9);
        assert!(snap.sse < 1e-12);
    }
}
