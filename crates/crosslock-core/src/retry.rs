//! Deadline tracking and backoff pacing for acquisition loops.

use std::time::{Duration, Instant};

use rand::Rng;

/// Absolute deadline measured from construction.
///
/// Acquisition loops create one on entry and consult it before every sleep,
/// so the blocking timeout bounds the whole loop rather than any single
/// attempt.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    timeout: Duration,
}

impl Deadline {
    /// Starts the clock now.
    pub fn starting_now(timeout: Duration) -> Self {
        Self {
            start: Instant::now(),
            timeout,
        }
    }

    /// Whether the budget is spent.
    pub fn expired(&self) -> bool {
        self.start.elapsed() >= self.timeout
    }

    /// Time left, saturating at zero.
    pub fn remaining(&self) -> Duration {
        self.timeout.saturating_sub(self.start.elapsed())
    }

    /// Clamps a desired sleep to the remaining budget.
    pub fn clamp(&self, want: Duration) -> Duration {
        want.min(self.remaining())
    }

    /// Elapsed time since the deadline started.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Jittered exponential backoff: starts at a base interval, doubles per
/// step, caps at a maximum, and spreads each sleep by ±25% so contending
/// processes don't re-attempt in lockstep.
#[derive(Debug)]
pub struct Backoff {
    next: Duration,
    max: Duration,
}

impl Backoff {
    /// Default cap on a single backoff sleep.
    pub const DEFAULT_MAX_SLEEP: Duration = Duration::from_secs(1);

    /// Creates a backoff starting at `base` (clamped to ≥ 1ms), capped at
    /// the larger of `base` and [`Self::DEFAULT_MAX_SLEEP`].
    pub fn new(base: Duration) -> Self {
        let base = base.max(Duration::from_millis(1));
        Self {
            next: base,
            max: base.max(Self::DEFAULT_MAX_SLEEP),
        }
    }

    /// Returns the next sleep (with jitter applied) and advances the
    /// exponential schedule.
    pub fn next_delay(&mut self) -> Duration {
        let delay = jitter(self.next);
        self.next = (self.next * 2).min(self.max);
        delay
    }
}

/// Spreads `duration` uniformly across ±25%.
fn jitter(duration: Duration) -> Duration {
    let millis = duration.as_millis() as u64;
    let span = millis / 4;
    if span == 0 {
        return duration;
    }
    let offset = rand::thread_rng().gen_range(0..=span * 2);
    Duration::from_millis(millis - span + offset)
}
