//! Victim selection — one pass over the process snapshot.
//!
//! Filters, in order:
//!
//! 1. kernel threads are skipped
//! 2. a pending-death process inside the cooldown aborts everything
//! 3. scores below the threshold are skipped
//! 4. processes with nothing resident are skipped
//!
//! Among survivors the highest score wins. Equal scores keep the first one
//! seen unless [`TieBreak::LargerResident`] is configured.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cooldown::KillCooldownGuard;
use crate::types::{ProcessSnapshot, Tick};

/// Rule for candidates with equal scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Earliest in iteration order wins.
    #[default]
    FirstSeen,
    /// Larger resident set wins; still first-seen on an exact tie.
    LargerResident,
}

/// The process chosen to be killed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Victim {
    /// Snapshot as seen during the scan.
    pub process: ProcessSnapshot,
    /// Pages expected back once it dies.
    pub resident_pages: u32,
}

/// Outcome of one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// A previous kill is still in flight.
    Aborted,
    /// Best eligible process.
    Found(Victim),
    /// Nothing eligible.
    NotFound,
}

/// Stateless selector; carries only the tie-break rule and log verbosity.
#[derive(Debug, Clone, Copy)]
pub struct VictimSelector {
    tie_break: TieBreak,
    debug_level: u32,
}

impl VictimSelector {
    /// Build a selector.
    #[must_use]
    pub const fn new(tie_break: TieBreak, debug_level: u32) -> Self {
        Self {
            tie_break,
            debug_level,
        }
    }

    /// Scan `snapshot` once and pick at most one victim.
    pub fn select<I>(
        &self,
        snapshot: I,
        min_score: i16,
        cooldown: &KillCooldownGuard,
        now: Tick,
    ) -> Selection
    where
        I: IntoIterator<Item = ProcessSnapshot>,
    {
        let mut best: Option<ProcessSnapshot> = None;

        for process in snapshot {
            if process.is_kernel_thread {
                continue;
            }
            if process.is_pending_death && cooldown.should_abort(true, now) {
                return Selection::Aborted;
            }
            if process.score < min_score || process.resident_pages == 0 {
                continue;
            }
            if best.as_ref().is_some_and(|b| !self.beats(&process, b)) {
                continue;
            }
            if self.debug_level >= 2 {
                debug!(
                    pid = %process.pid,
                    comm = %process.comm,
                    adj = process.score,
                    size = process.resident_pages,
                    "select to kill"
                );
            }
            best = Some(process);
        }

        best.map_or(Selection::NotFound, |process| {
            let resident_pages = process.resident_pages;
            Selection::Found(Victim {
                process,
                resident_pages,
            })
        })
    }

    fn beats(&self, candidate: &ProcessSnapshot, best: &ProcessSnapshot) -> bool {
        if candidate.score != best.score {
            return candidate.score > best.score;
        }
        match self.tie_break {
            TieBreak::FirstSeen => false,
            TieBreak::LargerResident => candidate.resident_pages > best.resident_pages,
        }
    }
}

impl Default for VictimSelector {
    fn default() -> Self {
        Self::new(TieBreak::FirstSeen, 0)
    }
}
