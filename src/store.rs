//! Quantized sample store with per-direction partitions and seed policy.
//!
//! Each partition maps an integer bin index (quantized drive) to the most
//! recent sample observed at that bin — a de-duplicating map, not a log, so
//! memory is bounded by the configured resolution rather than by runtime.
//! Bin keys are explicit integers (`round(drive / resolution)`); the
//! representative drive value is kept inside the sample itself, which removes
//! any floating-point key-equality hazard.

use std::collections::BTreeMap;

use crate::config::defaults::{
    SEED_ONE_DRIVE_FACTOR, SEED_TWO_DRIVE_FACTOR, UNSEED_FIRST_ABOVE, UNSEED_SECOND_ABOVE,
};
use crate::config::CycleParams;
use crate::types::{Direction, Sample};

/// One sign's sample map plus its reserved seed bins.
#[derive(Debug, Clone)]
struct Partition {
    /// BTreeMap so iteration is ascending bin index — fixed summation order
    /// for the regression.
    samples: BTreeMap<i64, Sample>,
    seed_one_key: i64,
    seed_two_key: i64,
}

impl Partition {
    /// Seed the partition with two synthetic boundary samples.
    ///
    /// Both lie on the extrapolated proportional line through
    /// (free-running rate, nominal drive): the line fit through them biases
    /// the first real observation toward a physically plausible model instead
    /// of the degenerate zero model, and guarantees the partition always
    /// holds the two distinct x-values a regression needs.
    fn seeded(direction: Direction, params: &CycleParams, resolution: f64) -> Self {
        let sign = direction.sign();
        let seed_one_key = bin_index(sign * SEED_ONE_DRIVE_FACTOR * params.nominal_drive, resolution);
        let seed_two_key = bin_index(sign * SEED_TWO_DRIVE_FACTOR * params.nominal_drive, resolution);

        let mut samples = BTreeMap::new();
        samples.insert(
            seed_one_key,
            Sample {
                rate: sign * params.free_running_rate,
                drive: sign * params.nominal_drive,
            },
        );
        samples.insert(
            seed_two_key,
            Sample {
                rate: sign * params.free_running_rate / params.nominal_drive,
                drive: sign * 1.0,
            },
        );

        Self {
            samples,
            seed_one_key,
            seed_two_key,
        }
    }

    /// Retire at most one seed, first seed first.
    ///
    /// The first seed goes once the population exceeds `UNSEED_FIRST_ABOVE`;
    /// the second only after the first is gone and the population again
    /// exceeds `UNSEED_SECOND_ABOVE`. One removal per call keeps the
    /// retirement staged: a partition reaching six samples sheds one seed on
    /// that call and the other on a later call.
    fn unseed(&mut self) -> bool {
        let population = self.samples.len();
        if population > UNSEED_FIRST_ABOVE && self.samples.contains_key(&self.seed_one_key) {
            self.samples.remove(&self.seed_one_key);
            return true;
        }
        if population > UNSEED_SECOND_ABOVE
            && !self.samples.contains_key(&self.seed_one_key)
            && self.samples.contains_key(&self.seed_two_key)
        {
            self.samples.remove(&self.seed_two_key);
            return true;
        }
        false
    }
}

/// Quantize a drive value to its bin index.
fn bin_index(drive: f64, resolution: f64) -> i64 {
    (drive / resolution).round() as i64
}

/// Two sign partitions of quantized (rate, drive) samples.
#[derive(Debug, Clone)]
pub struct SampleStore {
    positive: Partition,
    negative: Partition,
    resolution: f64,
}

impl SampleStore {
    /// Construct a store with both partitions seeded.
    pub fn new(params: &CycleParams) -> Self {
        let resolution = params.bin_resolution;
        Self {
            positive: Partition::seeded(Direction::Positive, params, resolution),
            negative: Partition::seeded(Direction::Negative, params, resolution),
            resolution,
        }
    }

    fn partition(&self, direction: Direction) -> &Partition {
        match direction {
            Direction::Positive => &self.positive,
            Direction::Negative => &self.negative,
        }
    }

    fn partition_mut(&mut self, direction: Direction) -> &mut Partition {
        match direction {
            Direction::Positive => &mut self.positive,
            Direction::Negative => &mut self.negative,
        }
    }

    /// Insert or overwrite the sample at `drive`'s bin in the partition
    /// selected by the sign of `rate`.
    ///
    /// No validation happens here — admission is the update cycle's job.
    /// Returns the mutated partition so the owner can refit it, or `None`
    /// for a rate of exactly zero (never stored).
    pub fn put(&mut self, rate: f64, drive: f64) -> Option<Direction> {
        let direction = Direction::from_rate(rate)?;
        let key = bin_index(drive, self.resolution);
        self.partition_mut(direction)
            .samples
            .insert(key, Sample { rate, drive });
        Some(direction)
    }

    /// Run the seed retirement policy on both partitions.
    ///
    /// Returns the partitions that lost a seed (and therefore need a refit).
    pub fn attempt_unseed(&mut self) -> Vec<Direction> {
        let mut mutated = Vec::new();
        for direction in [Direction::Positive, Direction::Negative] {
            if self.partition_mut(direction).unseed() {
                mutated.push(direction);
            }
        }
        mutated
    }

    /// Sample count of a partition, seeds included.
    pub fn len(&self, direction: Direction) -> usize {
        self.partition(direction).samples.len()
    }

    /// True when a partition holds no samples. Never the case in practice:
    /// seeds guarantee two from construction.
    pub fn is_empty(&self, direction: Direction) -> bool {
        self.partition(direction).samples.is_empty()
    }

    /// Partition samples as (rate, drive) points in ascending bin order.
    pub fn points(&self, direction: Direction) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.partition(direction)
            .samples
            .values()
            .map(|s| (s.rate, s.drive))
    }

    /// Whether the first reserved seed is still present.
    pub fn seed_one_present(&self, direction: Direction) -> bool {
        let p = self.partition(direction);
        p.samples.contains_key(&p.seed_one_key)
    }

    /// Whether the second reserved seed is still present.
    pub fn seed_two_present(&self, direction: Direction) -> bool {
        let p = self.partition(direction);
        p.samples.contains_key(&p.seed_two_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EstimatorConfig;

    fn params() -> CycleParams {
        let mut config = EstimatorConfig::default();
        config.actuator.free_running_rate = 500.0;
        config.actuator.nominal_drive = 12.0;
        config.store.bin_resolution = Some(0.25);
        config.params().unwrap()
    }

    fn store() -> SampleStore {
        SampleStore::new(&params())
    }

    #[test]
    fn construction_seeds_both_partitions() {
        let s = store();
        for d in [Direction::Positive, Direction::Negative] {
            assert_eq!(s.len(d), 2);
            assert!(s.seed_one_present(d));
            assert!(s.seed_two_present(d));
        }
    }

    #[test]
    fn seed_bins_outside_physical_range() {
        let s = store();
        // Any physically valid drive quantizes well below the reserved bins.
        let max_real = bin_index(12.0, 0.25);
        let seed_one = bin_index(100.0 * 12.0, 0.25);
        assert!(seed_one > max_real * 10);
        // Inserting at full nominal drive must not touch a seed.
        let mut s = s;
        s.put(400.0, 12.0);
        assert_eq!(s.len(Direction::Positive), 3);
        assert!(s.seed_one_present(Direction::Positive));
        assert!(s.seed_two_present(Direction::Positive));
    }

    #[test]
    fn same_bin_overwrites() {
        let mut s = store();
        s.put(100.0, 3.00);
        s.put(110.0, 3.05); // quantizes to the same 0.25 V bin
        assert_eq!(s.len(Direction::Positive), 3);
        // Most recent sample wins.
        let stored: Vec<_> = s.points(Direction::Positive).collect();
        assert!(stored.iter().any(|&(r, _)| (r - 110.0).abs() < 1e-12));
        assert!(!stored.iter().any(|&(r, _)| (r - 100.0).abs() < 1e-12));
    }

    #[test]
    fn distinct_bins_append() {
        let mut s = store();
        s.put(100.0, 3.0);
        s.put(140.0, 4.0);
        assert_eq!(s.len(Direction::Positive), 4);
    }

    #[test]
    fn zero_rate_never_stored() {
        let mut s = store();
        assert_eq!(s.put(0.0, 3.0), None);
        assert_eq!(s.len(Direction::Positive), 2);
        assert_eq!(s.len(Direction::Negative), 2);
    }

    #[test]
    fn sign_selects_partition() {
        let mut s = store();
        assert_eq!(s.put(100.0, 3.0), Some(Direction::Positive));
        assert_eq!(s.put(-100.0, -3.0), Some(Direction::Negative));
        assert_eq!(s.len(Direction::Positive), 3);
        assert_eq!(s.len(Direction::Negative), 3);
    }

    #[test]
    fn unseed_thresholds_are_staged() {
        let mut s = store();
        let d = Direction::Positive;
        // Insert four distinct-bin real samples, unseeding after each, the
        // way the update cycle does.
        for (i, drive) in [2.0, 4.0, 6.0, 8.0].iter().enumerate() {
            s.put(50.0 * (i as f64 + 1.0), *drive);
            s.attempt_unseed();
        }
        // Population hit 6: first seed retired, second still present.
        assert_eq!(s.len(d), 5);
        assert!(!s.seed_one_present(d));
        assert!(s.seed_two_present(d));

        // Fifth distinct sample retires the second seed as well.
        s.put(250.0, 10.0);
        s.attempt_unseed();
        assert_eq!(s.len(d), 5);
        assert!(!s.seed_two_present(d));
    }

    #[test]
    fn unseed_exact_counts_each_step() {
        let mut s = store();
        let d = Direction::Positive;
        let mut expected = [3, 4, 5, 5, 5].iter();
        for (i, drive) in [2.0, 4.0, 6.0, 8.0, 10.0].iter().enumerate() {
            s.put(50.0 * (i as f64 + 1.0), *drive);
            s.attempt_unseed();
            assert_eq!(s.len(d), *expected.next().unwrap(), "after insert {}", i + 1);
        }
    }

    #[test]
    fn unseed_is_per_partition() {
        let mut s = store();
        for (i, drive) in [2.0, 4.0, 6.0, 8.0].iter().enumerate() {
            s.put(50.0 * (i as f64 + 1.0), *drive);
            s.attempt_unseed();
        }
        // Negative partition untouched by positive-side population.
        assert!(s.seed_one_present(Direction::Negative));
        assert!(s.seed_two_present(Direction::Negative));
        assert_eq!(s.len(Direction::Negative), 2);
    }

    #[test]
    fn points_iterate_ascending_bin() {
        let mut s = store();
        s.put(200.0, 8.0);
        s.put(100.0, 3.0);
        let drives: Vec<f64> = s.points(Direction::Positive).map(|(_, d)| d).collect();
        // Real bins first (ascending drive), then the two reserved seed bins.
        assert_eq!(drives, vec![3.0, 8.0, 12.0, 1.0]);
    }
}
