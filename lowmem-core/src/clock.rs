//! Tick sources.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::host::Clock;
use crate::types::Tick;

/// Wall-clock ticks at a fixed rate since construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
    ticks_per_second: u64,
}

impl MonotonicClock {
    /// Start counting now. A rate of zero is treated as one tick per second.
    #[must_use]
    pub fn new(ticks_per_second: u64) -> Self {
        Self {
            start: Instant::now(),
            ticks_per_second: ticks_per_second.max(1),
        }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Tick {
        let elapsed = self.start.elapsed();
        let ticks = elapsed.as_nanos() * u128::from(self.ticks_per_second) / 1_000_000_000;
        Tick(u64::try_from(ticks).unwrap_or(u64::MAX))
    }
}

/// Manually advanced clock for simulations and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Clock starting at `tick`.
    #[must_use]
    pub const fn starting_at(tick: u64) -> Self {
        Self {
            now: AtomicU64::new(tick),
        }
    }

    /// Move forward by `ticks`.
    pub fn advance(&self, ticks: u64) {
        self.now.fetch_add(ticks, Ordering::AcqRel);
    }

    /// Jump to `tick`.
    pub fn set(&self, tick: u64) {
        self.now.store(tick, Ordering::Release);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Tick {
        Tick(self.now.load(Ordering::Acquire))
    }
}
