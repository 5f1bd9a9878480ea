//! Main-context tick clock for SkyArena.
//!
//! The server runs a single cooperative main context. Everything that
//! touches gameplay-visible state happens between two ticks of a
//! [`TickClock`]; periodic work (draining the worker pool, dispatching
//! storage callbacks, idle-worker reclamation, leaderboard refresh) is
//! declared once in a [`Timetable`] and looked up by tick number.
//!
//! # Integration
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(event) = events.recv() => server.handle_event(event),
//!         info = clock.wait_for_tick() => {
//!             for task in timetable.due(info.tick) {
//!                 server.run_task(task);
//!             }
//!             clock.record_tick_end();
//!         }
//!     }
//! }
//! ```

mod timetable;

pub use timetable::{Cadence, Timetable};

use std::time::{Duration, Instant};

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the main-context tick clock.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Tick rate in Hz. Clamped to `1..=MAX_TICK_RATE_HZ`.
    pub tick_rate_hz: u32,
    /// Fraction of the tick budget (0.0–1.0) above which a handler is
    /// reported as slow.
    pub budget_warn_threshold: f64,
    /// Random delay (0–max µs) before the first tick.
    pub initial_jitter_us: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 20,
            budget_warn_threshold: 0.80,
            initial_jitter_us: 0,
        }
    }
}

impl TickConfig {
    /// Maximum supported tick rate.
    pub const MAX_TICK_RATE_HZ: u32 = 128;

    /// Config for a specific tick rate with default settings.
    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            ..Default::default()
        }
    }

    /// Clamps out-of-range values so the config is safe to use.
    ///
    /// The main context always ticks, so a rate of 0 is raised to 1.
    pub fn validated(mut self) -> Self {
        if self.tick_rate_hz == 0 {
            warn!("tick_rate_hz of 0 is not allowed for the main context; using 1");
            self.tick_rate_hz = 1;
        }
        if self.tick_rate_hz > Self::MAX_TICK_RATE_HZ {
            warn!(
                rate = self.tick_rate_hz,
                max = Self::MAX_TICK_RATE_HZ,
                "tick_rate_hz exceeds maximum, clamping"
            );
            self.tick_rate_hz = Self::MAX_TICK_RATE_HZ;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }

    /// Duration of a single tick.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate_hz.max(1)))
    }

    /// Number of ticks that cover `period`, rounded up, never zero.
    pub fn ticks_for(&self, period: Duration) -> u64 {
        let per_tick = self.tick_duration().as_nanos().max(1);
        let ticks = period.as_nanos().div_ceil(per_tick);
        u64::try_from(ticks).unwrap_or(u64::MAX).max(1)
    }
}

// ---------------------------------------------------------------------------
// Tick info
// ---------------------------------------------------------------------------

/// Information about a fired tick.
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// Fixed tick duration.
    pub dt: Duration,
    /// How many ticks were skipped because the previous one overran.
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Fixed-rate clock driving the main context.
///
/// Overruns are skipped rather than caught up: a long tick pushes the
/// next deadline to `now + dt`, so a slow handler never causes a burst.
pub struct TickClock {
    config: TickConfig,
    tick_duration: Duration,
    tick_count: u64,
    next_tick: TokioInstant,
    tick_start: Option<Instant>,
    paused: bool,
    total_skipped: u64,
}

impl TickClock {
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let tick_duration = config.tick_duration();

        let jitter = if config.initial_jitter_us > 0 {
            Duration::from_micros(rand::rng().random_range(0..config.initial_jitter_us))
        } else {
            Duration::ZERO
        };

        debug!(
            rate_hz = config.tick_rate_hz,
            budget_ms = tick_duration.as_secs_f64() * 1000.0,
            "tick clock created"
        );

        Self {
            next_tick: TokioInstant::now() + tick_duration + jitter,
            config,
            tick_duration,
            tick_count: 0,
            tick_start: None,
            paused: false,
            total_skipped: 0,
        }
    }

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(tick_rate_hz))
    }

    /// Waits until the next tick is due.
    ///
    /// While paused this future pends forever, which lets a surrounding
    /// `tokio::select!` keep serving its other branches.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        if self.paused {
            std::future::pending::<()>().await;
        }

        let deadline = self.next_tick;
        time::sleep_until(deadline).await;

        let now = TokioInstant::now();
        self.tick_count += 1;
        self.tick_start = Some(Instant::now());

        let late_by = now.saturating_duration_since(deadline);
        let ticks_skipped =
            u64::try_from(late_by.as_nanos() / self.tick_duration.as_nanos().max(1))
                .unwrap_or(u64::MAX);
        if ticks_skipped > 0 {
            warn!(
                tick = self.tick_count,
                skipped = ticks_skipped,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "main context overrun, skipping ahead"
            );
            self.total_skipped += ticks_skipped;
            self.next_tick = now + self.tick_duration;
        } else {
            self.next_tick = deadline + self.tick_duration;
        }

        trace!(tick = self.tick_count, "tick fired");

        TickInfo {
            tick: self.tick_count,
            dt: self.tick_duration,
            ticks_skipped,
        }
    }

    /// Records that the handlers for the current tick finished.
    ///
    /// Returns the fraction of the tick budget that was used.
    pub fn record_tick_end(&mut self) -> Option<f64> {
        let start = self.tick_start.take()?;
        let elapsed = start.elapsed();
        let utilization = elapsed.as_secs_f64() / self.tick_duration.as_secs_f64();

        if utilization >= self.config.budget_warn_threshold {
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                utilization_pct = format!("{:.1}", utilization * 100.0),
                "main context handlers approaching tick budget"
            );
        }
        Some(utilization)
    }

    /// Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(tick = self.tick_count, "tick clock paused");
        }
    }

    /// Resets the deadline to `now + dt` so a pause does not cause a burst.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            self.next_tick = TokioInstant::now() + self.tick_duration;
            debug!(tick = self.tick_count, "tick clock resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn total_skipped(&self) -> u64 {
        self.total_skipped
    }

    pub fn tick_rate_hz(&self) -> u32 {
        self.config.tick_rate_hz
    }

    pub fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    pub fn config(&self) -> &TickConfig {
        &self.config
    }
}
