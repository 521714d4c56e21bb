//! End-to-end behavioral regression tests for the update cycle.
//!
//! These exercise the estimator through its public surface only: construct
//! from config, feed telemetry tick by tick, observe commands and status.

use openloop_ff::{
    CaptureSink, ControlLoop, Direction, EstimatorConfig, ReferenceProgram, ReplaySource,
    Telemetry, UpdateCycle,
};
use tokio_util::sync::CancellationToken;

fn test_config() -> EstimatorConfig {
    let mut config = EstimatorConfig::default();
    config.actuator.free_running_rate = 500.0;
    config.actuator.nominal_drive = 12.0;
    config.store.bin_resolution = Some(0.25);
    config
}

fn test_cycle() -> UpdateCycle {
    UpdateCycle::from_config(&test_config()).unwrap()
}

fn positive_count(c: &UpdateCycle) -> usize {
    c.model().store().len(Direction::Positive)
}

// ============================================================================
// Seed bootstrap
// ============================================================================

#[test]
fn fresh_estimator_commands_nominal_drive_at_free_rate() {
    let c = test_cycle();
    // No real samples yet: the seed line alone must already map the
    // free-running rate to the nominal drive, in both directions.
    assert!((c.dry_run(500.0) - 12.0).abs() < 1e-3);
    assert!((c.dry_run(-500.0) + 12.0).abs() < 1e-3);
    assert_eq!(c.status().positive.samples, 2);
    assert_eq!(c.status().negative.samples, 2);
}

#[test]
fn zero_reference_always_commands_zero() {
    let mut c = test_cycle();
    c.set_reference(0.0);
    for i in 1..=8 {
        let cmd = c.on_tick(Telemetry {
            drive: 0.5 + i as f64,
            rate: 40.0 * i as f64,
        });
        assert_eq!(cmd, 0.0);
    }
}

// ============================================================================
// Seed retirement through the cycle
// ============================================================================

#[test]
fn seeds_retire_as_real_data_accumulates() {
    let mut c = test_cycle();
    c.set_reference(200.0);

    // Four accepted samples at distinct bins: population reaches six and the
    // first seed retires; the second must survive this step.
    for (i, drive) in [2.0, 4.0, 6.0, 8.0].iter().enumerate() {
        c.on_tick(Telemetry {
            drive: *drive,
            rate: 60.0 * (i as f64 + 1.0),
        });
    }
    let store = c.model().store();
    assert_eq!(store.len(Direction::Positive), 5);
    assert!(!store.seed_one_present(Direction::Positive));
    assert!(store.seed_two_present(Direction::Positive));

    // Fifth distinct sample retires the second seed.
    c.on_tick(Telemetry {
        drive: 10.0,
        rate: 300.0,
    });
    let store = c.model().store();
    assert_eq!(store.len(Direction::Positive), 5);
    assert!(!store.seed_two_present(Direction::Positive));

    // The untouched negative partition keeps both seeds.
    assert!(store.seed_one_present(Direction::Negative));
    assert!(store.seed_two_present(Direction::Negative));
}

// ============================================================================
// Outlier rejection
// ============================================================================

#[test]
fn outliers_never_reach_the_store() {
    let mut c = test_cycle();
    for _ in 0..25 {
        // Over-supply drive.
        c.on_tick(Telemetry {
            drive: 14.0,
            rate: 450.0,
        });
        // Sign-inverted reading.
        c.on_tick(Telemetry {
            drive: 8.0,
            rate: -300.0,
        });
    }
    assert_eq!(positive_count(&c), 2);
    assert_eq!(c.model().store().len(Direction::Negative), 2);
    let f = c.status().filter;
    assert_eq!(f.accepted, 0);
    assert_eq!(f.rejected, 50);
    assert_eq!(f.drive_over_supply, 25);
    assert_eq!(f.sign_mismatch, 25);
}

// ============================================================================
// Convergence on a consistent actuator
// ============================================================================

#[test]
fn converges_to_offset_linear_actuator() {
    // Actuator with static offset: drive = 0.02 * rate + 0.5.
    let mut c = test_cycle();
    c.set_reference(300.0);
    let mut last = 0.0;
    for rate in [50.0, 100.0, 150.0, 200.0, 250.0, 350.0] {
        last = c.on_tick(Telemetry {
            drive: 0.02 * rate + 0.5,
            rate,
        });
    }
    // Both seeds are gone by now, so the fit passes exactly through the real
    // samples and the command matches the actuator's true inverse.
    assert!((last - (0.02 * 300.0 + 0.5)).abs() < 1e-9);
    assert!((c.dry_run(100.0) - 2.5).abs() < 1e-9);
}

#[test]
fn command_reflects_sample_accepted_same_tick() {
    let mut c = test_cycle();
    c.set_reference(250.0);
    let preview = c.dry_run(250.0);
    let cmd = c.on_tick(Telemetry {
        drive: 11.0,
        rate: 250.0,
    });
    assert!(
        (cmd - preview).abs() > 1e-6,
        "tick N command must reflect tick N's accepted sample"
    );
}

// ============================================================================
// Command bounds
// ============================================================================

#[test]
fn commands_stay_within_actuator_range() {
    let mut c = test_cycle();
    for reference in [100_000.0, -100_000.0, f64::MAX / 1e10] {
        c.set_reference(reference);
        let cmd = c.on_tick(Telemetry {
            drive: 6.0,
            rate: 250.0,
        });
        assert!(cmd.is_finite());
        assert!(cmd.abs() <= 12.0 + 1e-12);
    }
}

// ============================================================================
// Full loop over a replayed run
// ============================================================================

#[tokio::test]
async fn replayed_run_produces_bounded_commands() {
    let samples: Vec<Telemetry> = (1..=60)
        .map(|i| {
            let rate = 8.0 * i as f64;
            Telemetry {
                drive: 0.024 * rate,
                rate,
            }
        })
        .collect();
    let mut source = ReplaySource::new(samples, 0);

    let looped = ControlLoop::new(
        test_cycle(),
        CaptureSink::default(),
        ReferenceProgram::Sine {
            amplitude: 480.0,
            period_ticks: 30,
        },
        CancellationToken::new(),
    )
    .with_status_every(0);

    let stats = looped.run(&mut source).await;
    assert_eq!(stats.ticks, 60);
    assert_eq!(stats.accepted + stats.rejected, 60);
    assert!(stats.last_command.is_finite());
    assert!(stats.last_command.abs() <= 12.0 + 1e-12);
}
