//! Decision counters.
//!
//! Lock-free `AtomicU64` counters bumped on the scan path and read on
//! export. Query calls (`scan_request <= 0`) never touch them.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::engine::Decision;

/// Atomic counters for scan outcomes.
#[derive(Debug)]
pub struct LowmemCounters {
    /// Scans performed (threshold crossed, `scan_request > 0`).
    pub scans: AtomicU64,
    /// Kills issued.
    pub kills_issued: AtomicU64,
    /// Scans abandoned because a victim was still dying.
    pub aborted: AtomicU64,
    /// Scans that found no eligible process.
    pub no_victim: AtomicU64,
    /// Scan requests that arrived with memory above every floor.
    pub no_pressure: AtomicU64,
    /// Victims dropped because a concurrent decision armed the cooldown first.
    pub cooldown_races: AtomicU64,
    /// Resident pages of all victims.
    pub pages_targeted: AtomicU64,
}

impl LowmemCounters {
    /// Create a new set of zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            scans: AtomicU64::new(0),
            kills_issued: AtomicU64::new(0),
            aborted: AtomicU64::new(0),
            no_victim: AtomicU64::new(0),
            no_pressure: AtomicU64::new(0),
            cooldown_races: AtomicU64::new(0),
            pages_targeted: AtomicU64::new(0),
        }
    }

    /// Count the outcome of a scan request.
    pub(crate) fn record(&self, decision: &Decision) {
        match decision {
            Decision::NoPressure => {
                self.no_pressure.fetch_add(1, Ordering::Relaxed);
            }
            Decision::Reclaimable(_) => {}
            Decision::Aborted => {
                self.aborted.fetch_add(1, Ordering::Relaxed);
            }
            Decision::KillIssued { victim, .. } => {
                self.kills_issued.fetch_add(1, Ordering::Relaxed);
                self.pages_targeted
                    .fetch_add(u64::from(victim.resident_pages), Ordering::Relaxed);
            }
            Decision::NoVictim => {
                self.no_victim.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Snapshot all counters for export.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            scans: self.scans.load(Ordering::Relaxed),
            kills_issued: self.kills_issued.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
            no_victim: self.no_victim.load(Ordering::Relaxed),
            no_pressure: self.no_pressure.load(Ordering::Relaxed),
            cooldown_races: self.cooldown_races.load(Ordering::Relaxed),
            pages_targeted: self.pages_targeted.load(Ordering::Relaxed),
        }
    }
}

impl Default for LowmemCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of counter values at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Scans performed.
    pub scans: u64,
    /// Kills issued.
    pub kills_issued: u64,
    /// Aborted scans.
    pub aborted: u64,
    /// Scans without an eligible victim.
    pub no_victim: u64,
    /// Scan requests without pressure.
    pub no_pressure: u64,
    /// Lost cooldown races.
    pub cooldown_races: u64,
    /// Resident pages of all victims.
    pub pages_targeted: u64,
}

impl CounterSnapshot {
    /// Format as Prometheus-compatible text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        format!(
            "# HELP lowmem_scans_total Process scans performed\n\
             # TYPE lowmem_scans_total counter\n\
             lowmem_scans_total {}\n\
             # HELP lowmem_kills_total Kills issued\n\
             # TYPE lowmem_kills_total counter\n\
             lowmem_kills_total {}\n\
             # HELP lowmem_decisions_total Scan request outcomes\n\
             # TYPE lowmem_decisions_total counter\n\
             lowmem_decisions_total{{outcome=\"aborted\"}} {}\n\
             lowmem_decisions_total{{outcome=\"no_victim\"}} {}\n\
             lowmem_decisions_total{{outcome=\"no_pressure\"}} {}\n\
             # HELP lowmem_cooldown_races_total Victims dropped after losing the cooldown race\n\
             # TYPE lowmem_cooldown_races_total counter\n\
             lowmem_cooldown_races_total {}\n\
             # HELP lowmem_pages_targeted_total Resident pages of killed processes\n\
             # TYPE lowmem_pages_targeted_total counter\n\
             lowmem_pages_targeted_total {}\n",
            self.scans,
            self.kills_issued,
            self.aborted,
            self.no_victim,
            self.no_pressure,
            self.cooldown_races,
            self.pages_targeted,
        )
    }
}
