//! Fixed-interval pacing for simulation loops and state broadcasters.
//!
//! A [`Pacer`] tracks a deadline grid at a configured rate and reports,
//! each time it is polled, how many intervals have come due. Nothing here
//! blocks or spawns: the owning loop calls [`Pacer::poll`] once per
//! iteration and fires its work that many times. This keeps every pacer
//! on the single simulation thread regardless of how many rates run
//! side by side (sim step, transform broadcast, AI broadcast).
//!
//! Behavior when the caller falls behind is governed by [`PacePolicy`]:
//!
//! - `Skip`: fire once, drop the missed intervals, stay on the grid
//! - `CatchUp { max_catchup }`: fire up to `1 + max_catchup` times per
//!   poll, drop the rest
//!
//! Rate `0` disables a pacer entirely; it never fires. Pacers created
//! together spread their first deadlines with a small random jitter so
//! several broadcasters do not burst on the same poll.

use std::time::{Duration, Instant};

use rand::Rng;
use tracing::warn;

/// Upper bound on configured rates. Anything above this is clamped by
/// [`PaceConfig::validated`].
pub const MAX_RATE_HZ: u32 = 128;

/// Default spread applied to the first deadline, in microseconds.
pub const DEFAULT_START_JITTER_US: u64 = 2_000;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What a pacer does when more than one interval elapsed between polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacePolicy {
    /// Fire once and discard the missed intervals. Right for periodic
    /// snapshot broadcasts, where only the freshest state matters.
    Skip,
    /// Fire up to `1 + max_catchup` times in one poll, discarding the
    /// rest. Right for fixed-step simulation that must not drift.
    CatchUp { max_catchup: u32 },
}

impl Default for PacePolicy {
    fn default() -> Self {
        PacePolicy::Skip
    }
}

/// Pacer settings. Construct with [`PaceConfig::with_rate`] and run the
/// result through [`PaceConfig::validated`] before use.
#[derive(Debug, Clone, Copy)]
pub struct PaceConfig {
    /// Intervals per second. `0` disables the pacer.
    pub rate_hz: u32,
    /// Behavior when polls arrive late.
    pub policy: PacePolicy,
    /// Random spread added to the first deadline, in microseconds.
    /// `0` arms the first deadline exactly one interval out.
    pub start_jitter_us: u64,
}

impl PaceConfig {
    /// Config firing `rate_hz` times per second with default policy
    /// and jitter.
    pub fn with_rate(rate_hz: u32) -> Self {
        Self {
            rate_hz,
            policy: PacePolicy::default(),
            start_jitter_us: DEFAULT_START_JITTER_US,
        }
    }

    /// Clamps out-of-range settings instead of erroring, so a bad
    /// config degrades to a sane pacer rather than a refusal to run.
    pub fn validated(mut self) -> Self {
        if self.rate_hz > MAX_RATE_HZ {
            warn!(
                rate_hz = self.rate_hz,
                max = MAX_RATE_HZ,
                "pace rate clamped"
            );
            self.rate_hz = MAX_RATE_HZ;
        }
        if let PacePolicy::CatchUp { max_catchup } = self.policy {
            if max_catchup > 16 {
                warn!(max_catchup, "max_catchup clamped to 16");
                self.policy = PacePolicy::CatchUp { max_catchup: 16 };
            }
        }
        self
    }

    /// Interval between deadlines, or `None` when disabled.
    pub fn interval(&self) -> Option<Duration> {
        if self.rate_hz == 0 {
            None
        } else {
            Some(Duration::from_nanos(1_000_000_000 / self.rate_hz as u64))
        }
    }
}

impl Default for PaceConfig {
    fn default() -> Self {
        Self::with_rate(20)
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Running counters for one pacer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PaceMetrics {
    /// Intervals the caller was told to fire.
    pub total_fired: u64,
    /// Intervals discarded under the configured policy.
    pub total_skipped: u64,
}

// ---------------------------------------------------------------------------
// Pacer
// ---------------------------------------------------------------------------

/// Polled deadline tracker for one fixed rate.
///
/// The pacer is unarmed until the first [`poll`](Pacer::poll), which
/// establishes the deadline grid from the instant it is given and
/// returns `0`. Every later poll returns how many grid points have
/// passed, capped by policy. Passing explicit instants keeps the type
/// fully deterministic under test.
#[derive(Debug)]
pub struct Pacer {
    config: PaceConfig,
    interval: Option<Duration>,
    next_due: Option<Instant>,
    paused: bool,
    metrics: PaceMetrics,
}

impl Pacer {
    pub fn new(config: PaceConfig) -> Self {
        let config = config.validated();
        let interval = config.interval();
        Self {
            config,
            interval,
            next_due: None,
            paused: false,
            metrics: PaceMetrics::default(),
        }
    }

    /// Shorthand for a pacer at `rate_hz` with default policy.
    pub fn with_rate(rate_hz: u32) -> Self {
        Self::new(PaceConfig::with_rate(rate_hz))
    }

    /// Advances the deadline grid to `now` and returns how many
    /// intervals the caller should fire. Returns `0` when disabled,
    /// paused, unarmed, or simply not due yet.
    pub fn poll(&mut self, now: Instant) -> u32 {
        let Some(interval) = self.interval else {
            return 0;
        };
        if self.paused {
            return 0;
        }
        let Some(next_due) = self.next_due else {
            self.arm(now, interval);
            return 0;
        };
        if now < next_due {
            return 0;
        }

        // How many grid points fall in (next_due ..= now]. At least one,
        // since now >= next_due.
        let behind = (now - next_due).as_nanos() / interval.as_nanos();
        let due = (behind + 1).min(u32::MAX as u128) as u32;

        let fire = match self.config.policy {
            PacePolicy::Skip => 1,
            PacePolicy::CatchUp { max_catchup } => due.min(1 + max_catchup),
        };
        let skipped = due - fire;
        if skipped > 0 {
            warn!(
                skipped,
                rate_hz = self.config.rate_hz,
                "pacer fell behind, skipping intervals"
            );
        }

        // Advance past every due grid point, keeping the original phase.
        // The new deadline is strictly in the future.
        self.next_due = Some(next_due + interval * due);
        self.metrics.total_fired += u64::from(fire);
        self.metrics.total_skipped += u64::from(skipped);
        fire
    }

    fn arm(&mut self, now: Instant, interval: Duration) {
        let jitter = if self.config.start_jitter_us == 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(rand::rng().random_range(0..self.config.start_jitter_us))
        };
        self.next_due = Some(now + interval + jitter);
    }

    /// Stops the pacer from firing until [`resume`](Pacer::resume).
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resumes with a fresh deadline one interval after `now`. Time
    /// spent paused never produces a burst of catch-up fires.
    pub fn resume(&mut self, now: Instant) {
        self.paused = false;
        if let Some(interval) = self.interval {
            self.next_due = Some(now + interval);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// True when the configured rate is `0`.
    pub fn is_disabled(&self) -> bool {
        self.interval.is_none()
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn config(&self) -> &PaceConfig {
        &self.config
    }

    pub fn metrics(&self) -> PaceMetrics {
        self.metrics
    }
}

// ===========================================================================
// Tests
// ===========================================================================
