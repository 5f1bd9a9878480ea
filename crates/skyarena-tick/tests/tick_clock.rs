//! Integration tests for the main-context tick clock.
//!
//! Uses paused Tokio time so `sleep_until` resolves as soon as the
//! runtime auto-advances the clock.

use std::time::Duration;

use skyarena_tick::{TickClock, TickConfig};

// =========================================================================
// TickConfig
// =========================================================================

#[test]
fn test_default_config_is_twenty_hz() {
    let cfg = TickConfig::default();
    assert_eq!(cfg.tick_rate_hz, 20);
    assert_eq!(cfg.tick_duration(), Duration::from_millis(50));
}

#[test]
fn test_validated_raises_zero_rate() {
    let cfg = TickConfig::with_rate(0).validated();
    assert_eq!(cfg.tick_rate_hz, 1);
}

#[test]
fn test_validated_clamps_rate_and_threshold() {
    let cfg = TickConfig {
        tick_rate_hz: 1000,
        budget_warn_threshold: 3.0,
        ..TickConfig::default()
    }
    .validated();
    assert_eq!(cfg.tick_rate_hz, TickConfig::MAX_TICK_RATE_HZ);
    assert_eq!(cfg.budget_warn_threshold, 1.0);
}

#[test]
fn test_ticks_for_whole_minutes() {
    let cfg = TickConfig::with_rate(20);
    assert_eq!(cfg.ticks_for(Duration::from_secs(60)), 1200);
    assert_eq!(cfg.ticks_for(Duration::ZERO), 1);
}

// =========================================================================
// Clock
// =========================================================================

#[test]
fn test_clock_initial_state() {
    let clock = TickClock::with_rate(10);
    assert_eq!(clock.tick_count(), 0);
    assert_eq!(clock.tick_rate_hz(), 10);
    assert_eq!(clock.tick_duration(), Duration::from_millis(100));
    assert!(!clock.is_paused());
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_tick_increments_monotonically() {
    let mut clock = TickClock::with_rate(20);

    for expected in 1..=5 {
        let info = clock.wait_for_tick().await;
        assert_eq!(info.tick, expected);
        assert_eq!(info.dt, Duration::from_millis(50));
        assert_eq!(info.ticks_skipped, 0);
    }
    assert_eq!(clock.tick_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_overrun_skips_ahead() {
    let mut clock = TickClock::with_rate(20);
    clock.wait_for_tick().await;

    // Stall the main context for four ticks' worth.
    tokio::time::advance(Duration::from_millis(250)).await;

    let info = clock.wait_for_tick().await;
    assert_eq!(info.tick, 2);
    assert!(info.ticks_skipped >= 3, "skipped {}", info.ticks_skipped);
    assert_eq!(clock.total_skipped(), info.ticks_skipped);
}

#[tokio::test(start_paused = true)]
async fn test_record_tick_end_reports_utilization() {
    let mut clock = TickClock::with_rate(20);
    assert_eq!(clock.record_tick_end(), None, "nothing to record yet");

    clock.wait_for_tick().await;
    let used = clock.record_tick_end().expect("tick was started");
    assert!(used >= 0.0);
    assert_eq!(clock.record_tick_end(), None, "consumed once");
}

#[tokio::test(start_paused = true)]
async fn test_paused_clock_does_not_fire() {
    let mut clock = TickClock::with_rate(20);
    clock.pause();
    clock.pause();
    assert!(clock.is_paused());

    let fired = tokio::time::timeout(Duration::from_secs(1), clock.wait_for_tick()).await;
    assert!(fired.is_err(), "paused clock must not tick");

    clock.resume();
    let info = clock.wait_for_tick().await;
    assert_eq!(info.tick, 1);
    assert_eq!(info.ticks_skipped, 0, "resume resets the deadline");
}
