//! Fixed-interval tick scheduler for summsync.
//!
//! Every participant runs one scheduler per joined room. It fires once
//! per interval (one second for cooldown timers) and tells the caller
//! whether it woke up late, so the caller can decide what a late tick
//! means for its state.
//!
//! # Integration
//!
//! The scheduler is meant to sit inside a session's `tokio::select!`
//! loop next to the inbound message branch:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         msg = channel.recv() => { /* merge */ }
//!         info = scheduler.wait_for_tick() => {
//!             room.tick();
//!             scheduler.record_tick_end();
//!         }
//!     }
//! }
//! ```
//!
//! `wait_for_tick` is cancel-safe: if another branch wins, no tick is
//! consumed and the deadline stays where it was.

use std::time::{Duration, Instant};

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when the scheduler wakes up later than one interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickPolicy {
    /// Skip the missed tick(s) and resume from now.
    ///
    /// For shared countdowns this is the right default: a participant
    /// that stalled adopts a peer's more advanced snapshot instead of
    /// replaying the seconds it missed.
    #[default]
    Skip,
    /// Fire up to `max_catchup` extra ticks back to back.
    CatchUp {
        /// Hard cap on consecutive catch-up ticks.
        max_catchup: u32,
    },
    /// Keep the original cadence; the next tick fires at its originally
    /// scheduled time.
    Drop,
}

/// Full configuration for the tick scheduler.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between ticks. Default: one second.
    pub interval: Duration,
    /// Overrun handling policy.
    pub policy: TickPolicy,
    /// Warn when the work done for one tick takes longer than this
    /// fraction of the interval (0.0–1.0). Default: 0.5.
    pub budget_warn_threshold: f64,
    /// Enable per-tick metrics collection.
    pub metrics_enabled: bool,
    /// Random delay (0..jitter) added to the first tick only.
    ///
    /// Zero by default. Useful when many sessions start at the same
    /// instant in one process, e.g. a load test.
    pub initial_jitter: Duration,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            policy: TickPolicy::default(),
            budget_warn_threshold: 0.5,
            metrics_enabled: true,
            initial_jitter: Duration::ZERO,
        }
    }
}

impl TickConfig {
    /// Smallest interval the scheduler accepts.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

    /// Create a config with the given interval and default settings.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`TickScheduler::new`].
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_secs_f64() * 1000.0,
                "tick interval below minimum: clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }
}

// ---------------------------------------------------------------------------
// Tick info (returned to caller each tick)
// ---------------------------------------------------------------------------

/// Information about a fired tick, returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// The configured interval.
    pub interval: Duration,
    /// `true` if this tick fired more than 10% of an interval late.
    pub overrun: bool,
    /// How many whole intervals were skipped because of the overrun.
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Runtime metrics for the tick scheduler.
#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    /// Total ticks fired.
    pub total_ticks: u64,
    /// Total overruns detected.
    pub total_overruns: u64,
    /// Total intervals skipped (Skip/CatchUp policies).
    pub total_skipped: u64,
    /// Maximum per-tick work time reported via `record_tick_end`.
    pub max_tick_time: Duration,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-interval tick scheduler.
pub struct TickScheduler {
    config: TickConfig,
    tick_count: u64,
    /// When the next tick should fire (Tokio instant for `sleep_until`).
    next_tick: TokioInstant,
    /// Set by `wait_for_tick`, consumed by `record_tick_end`.
    tick_start: Option<Instant>,
    metrics: TickMetrics,
}

impl TickScheduler {
    /// Create a new scheduler from config. The first tick is due one
    /// interval (plus optional jitter) from now.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();

        let jitter = if config.initial_jitter > Duration::ZERO {
            let max_us = config.initial_jitter.as_micros() as u64;
            Duration::from_micros(rand::rng().random_range(0..max_us.max(1)))
        } else {
            Duration::ZERO
        };
        let next_tick = TokioInstant::now() + config.interval + jitter;

        debug!(
            interval_ms = config.interval.as_secs_f64() * 1000.0,
            policy = ?config.policy,
            "tick scheduler created"
        );

        Self {
            config,
            tick_count: 0,
            next_tick,
            tick_start: None,
            metrics: TickMetrics::default(),
        }
    }

    /// Create a scheduler with the given interval and default settings.
    pub fn with_interval(interval: Duration) -> Self {
        Self::new(TickConfig::with_interval(interval))
    }

    /// Wait until the next tick is due.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let next = self.next_tick;
        let interval = self.config.interval;

        time::sleep_until(next).await;

        let now = TokioInstant::now();
        self.tick_count += 1;
        self.tick_start = Some(Instant::now());

        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > interval / 10;
        let behind = (late_by.as_nanos() / interval.as_nanos()) as u64;
        let mut ticks_skipped = 0u64;

        self.next_tick = match self.config.policy {
            TickPolicy::Skip => {
                if overrun && behind > 0 {
                    ticks_skipped = behind;
                    warn!(
                        tick = self.tick_count,
                        skipped = ticks_skipped,
                        late_ms = late_by.as_secs_f64() * 1000.0,
                        "tick overrun: skipping ahead"
                    );
                }
                now + interval
            }
            TickPolicy::CatchUp { max_catchup } => {
                if overrun && behind > 0 {
                    ticks_skipped = behind.saturating_sub(max_catchup as u64);
                    warn!(
                        tick = self.tick_count,
                        behind,
                        skipping = ticks_skipped,
                        "tick overrun: catch-up capped at {max_catchup}"
                    );
                    if behind <= max_catchup as u64 {
                        next + interval
                    } else {
                        now + interval
                    }
                } else {
                    next + interval
                }
            }
            TickPolicy::Drop => {
                if overrun {
                    warn!(
                        tick = self.tick_count,
                        late_ms = late_by.as_secs_f64() * 1000.0,
                        "tick overrun: keeping original cadence"
                    );
                }
                next + interval
            }
        };

        if self.config.metrics_enabled {
            self.metrics.total_ticks += 1;
            self.metrics.total_skipped += ticks_skipped;
            if overrun {
                self.metrics.total_overruns += 1;
            }
        }

        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            interval,
            overrun,
            ticks_skipped,
        }
    }

    /// Record that the work for the current tick has finished.
    ///
    /// Enables the budget warning and `max_tick_time`. A no-op if called
    /// without a preceding tick.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.tick_start.take() else {
            return;
        };
        let elapsed = start.elapsed();
        let utilization =
            elapsed.as_secs_f64() / self.config.interval.as_secs_f64();

        if utilization >= self.config.budget_warn_threshold {
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                utilization_pct = format!("{:.1}", utilization * 100.0),
                "tick work approaching interval"
            );
        }

        if self.config.metrics_enabled && elapsed > self.metrics.max_tick_time {
            self.metrics.max_tick_time = elapsed;
        }
    }

    /// Number of ticks fired so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Snapshot of current metrics.
    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }

    /// The configured interval.
    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    /// When the next tick is due.
    pub fn next_deadline(&self) -> TokioInstant {
        self.next_tick
    }
}
