//! Integration tests for the fixed-interval tick scheduler.
//!
//! Uses `start_paused = true` so Tokio's clock only moves when the
//! runtime is idle or when a test calls `tokio::time::advance`.

use std::time::Duration;

use summsync_tick::{TickConfig, TickPolicy, TickScheduler};
use tokio::time::Instant;

// =========================================================================
// Helpers
// =========================================================================

fn one_second() -> TickConfig {
    TickConfig::default()
}

// =========================================================================
// TickConfig
// =========================================================================

#[test]
fn test_default_config_ticks_every_second() {
    let cfg = TickConfig::default();
    assert_eq!(cfg.interval, Duration::from_secs(1));
    assert_eq!(cfg.policy, TickPolicy::Skip);
    assert_eq!(cfg.initial_jitter, Duration::ZERO);
}

#[test]
fn test_validated_clamps_zero_interval() {
    let cfg = TickConfig::with_interval(Duration::ZERO).validated();
    assert_eq!(cfg.interval, TickConfig::MIN_INTERVAL);
}

#[test]
fn test_validated_clamps_threshold() {
    let cfg = TickConfig {
        budget_warn_threshold: 3.0,
        ..one_second()
    }
    .validated();
    assert_eq!(cfg.budget_warn_threshold, 1.0);
}

// =========================================================================
// Tick firing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_first_tick_fires_after_one_interval() {
    let start = Instant::now();
    let mut s = TickScheduler::new(one_second());

    let info = s.wait_for_tick().await;
    assert_eq!(info.tick, 1);
    assert_eq!(info.interval, Duration::from_secs(1));
    assert!(!info.overrun);
    assert_eq!(info.ticks_skipped, 0);
    assert_eq!(Instant::now() - start, Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_ticks_increment_monotonically() {
    let start = Instant::now();
    let mut s = TickScheduler::new(one_second());

    for expected in 1..=5 {
        let info = s.wait_for_tick().await;
        assert_eq!(info.tick, expected);
    }
    assert_eq!(s.tick_count(), 5);
    assert_eq!(Instant::now() - start, Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_tick_does_not_fire_early() {
    let mut s = TickScheduler::new(one_second());
    let early =
        tokio::time::timeout(Duration::from_millis(900), s.wait_for_tick()).await;
    assert!(early.is_err(), "tick fired before its interval elapsed");
    assert_eq!(s.tick_count(), 0);

    // The cancelled wait didn't consume the tick.
    let info = s.wait_for_tick().await;
    assert_eq!(info.tick, 1);
}

#[tokio::test(start_paused = true)]
async fn test_initial_jitter_stays_within_bound() {
    let start = Instant::now();
    let s = TickScheduler::new(TickConfig {
        initial_jitter: Duration::from_millis(100),
        ..one_second()
    });
    let offset = s.next_deadline() - start;
    assert!(offset >= Duration::from_secs(1));
    assert!(offset < Duration::from_millis(1100));
}

// =========================================================================
// Overrun policies
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_skip_policy_skips_missed_intervals() {
    let mut s = TickScheduler::new(one_second());

    // Stall for 3.5 s: the tick due at 1 s is 2.5 s late.
    tokio::time::advance(Duration::from_millis(3500)).await;
    let info = s.wait_for_tick().await;
    assert!(info.overrun);
    assert_eq!(info.ticks_skipped, 2);

    // Next tick is a full interval after the late one, not immediate.
    let immediate =
        tokio::time::timeout(Duration::from_millis(10), s.wait_for_tick()).await;
    assert!(immediate.is_err());
    assert_eq!(s.metrics().total_overruns, 1);
    assert_eq!(s.metrics().total_skipped, 2);
}

#[tokio::test(start_paused = true)]
async fn test_catchup_policy_fires_missed_ticks_back_to_back() {
    let mut s = TickScheduler::new(TickConfig {
        policy: TickPolicy::CatchUp { max_catchup: 3 },
        ..one_second()
    });

    tokio::time::advance(Duration::from_millis(3500)).await;
    let first = s.wait_for_tick().await;
    assert!(first.overrun);
    assert_eq!(first.ticks_skipped, 0);

    // Ticks due at 2 s and 3 s are already in the past.
    for expected in 2..=3 {
        let info = tokio::time::timeout(Duration::from_millis(1), s.wait_for_tick())
            .await
            .expect("catch-up tick should fire immediately");
        assert_eq!(info.tick, expected);
    }
}

#[tokio::test(start_paused = true)]
async fn test_catchup_policy_caps_catchup() {
    let mut s = TickScheduler::new(TickConfig {
        policy: TickPolicy::CatchUp { max_catchup: 1 },
        ..one_second()
    });

    tokio::time::advance(Duration::from_millis(5500)).await;
    let info = s.wait_for_tick().await;
    assert_eq!(info.ticks_skipped, 3);

    // Too far behind: schedule resumes from now.
    let immediate =
        tokio::time::timeout(Duration::from_millis(10), s.wait_for_tick()).await;
    assert!(immediate.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_drop_policy_keeps_cadence() {
    let mut s = TickScheduler::new(TickConfig {
        policy: TickPolicy::Drop,
        ..one_second()
    });

    tokio::time::advance(Duration::from_millis(1500)).await;
    let info = s.wait_for_tick().await;
    assert!(info.overrun);

    // Next deadline is 2 s after start, which is 0.5 s from now.
    let start_of_wait = Instant::now();
    s.wait_for_tick().await;
    assert_eq!(Instant::now() - start_of_wait, Duration::from_millis(500));
}

// =========================================================================
// Metrics
// =========================================================================

#[test]
fn test_initial_metrics_are_zero() {
    let s = TickScheduler::new(one_second());
    let m = s.metrics();
    assert_eq!(m.total_ticks, 0);
    assert_eq!(m.total_overruns, 0);
    assert_eq!(m.total_skipped, 0);
    assert_eq!(m.max_tick_time, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_record_tick_end_without_wait_is_noop() {
    let mut s = TickScheduler::new(one_second());
    s.record_tick_end();
    assert_eq!(s.metrics().max_tick_time, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_metrics_disabled_keeps_counters_at_zero() {
    let mut s = TickScheduler::new(TickConfig {
        metrics_enabled: false,
        ..one_second()
    });

    s.wait_for_tick().await;
    std::thread::sleep(Duration::from_micros(50));
    s.record_tick_end();

    assert_eq!(s.metrics().total_ticks, 0);
    assert_eq!(s.metrics().max_tick_time, Duration::ZERO);
    assert_eq!(s.tick_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_metrics_max_tick_time_tracked() {
    let mut s = TickScheduler::new(one_second());

    // record_tick_end measures wall-clock time, which the paused Tokio
    // clock doesn't affect.
    s.wait_for_tick().await;
    std::thread::sleep(Duration::from_micros(50));
    s.record_tick_end();

    assert!(s.metrics().max_tick_time > Duration::ZERO);
}

// =========================================================================
// select! loop pattern (mirrors session usage)
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_select_loop_pattern() {
    let mut s = TickScheduler::new(one_second());
    let (tx, mut rx) = tokio::sync::mpsc::channel::<&str>(10);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(3500)).await;
        tx.send("leave").await.ok();
    });

    let mut ticks_fired = 0u64;
    loop {
        tokio::select! {
            Some(cmd) = rx.recv() => {
                assert_eq!(cmd, "leave");
                break;
            }
            info = s.wait_for_tick() => {
                ticks_fired += 1;
                s.record_tick_end();
                assert_eq!(info.tick, ticks_fired);
            }
        }
    }

    assert_eq!(ticks_fired, 3);
}
