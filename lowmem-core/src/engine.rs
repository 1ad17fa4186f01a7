//! Reclaim controller — the `shrink` decision.
//!
//! ```text
//! Start ─▶ ThresholdCheck ─┬─▶ NoPressure                      (0)
//!                          ├─▶ QueryOnly    scan_request <= 0  (total)
//!                          └─▶ Scanning ─┬─▶ Aborted           (0)
//!                                        ├─▶ VictimKilled      (total - victim)
//!                                        └─▶ NoVictim          (-1)
//! ```
//!
//! A query (`scan_request <= 0`) never scans, kills, arms the cooldown or
//! counts anything.

use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;
use tracing::{debug, info, trace, warn};

use crate::config::{LowmemConfig, ThresholdConfig};
use crate::cooldown::KillCooldownGuard;
use crate::error::Result;
use crate::host::{CompactionTrigger, MemorySample, Signaler};
use crate::metrics::{CounterSnapshot, LowmemCounters};
use crate::params;
use crate::selector::{Selection, TieBreak, Victim, VictimSelector};
use crate::threshold::{MAX_THRESHOLD_ENTRIES, PressurePolicy, ThresholdTable};
use crate::types::{ProcessSnapshot, Tick};

/// Outcome of one `shrink` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Memory is above every floor.
    NoPressure,
    /// Query answer: total reclaimable pages.
    Reclaimable(i64),
    /// A previous kill is still in flight; do nothing.
    Aborted,
    /// A kill was issued.
    KillIssued {
        /// Who was killed.
        victim: Victim,
        /// Reclaimable estimate after subtracting the victim's pages.
        remaining: i64,
    },
    /// Pressure crossed a floor but nothing was eligible.
    NoVictim,
}

impl Decision {
    /// Shrinker return convention: `0` no pressure or aborted, `-1` no
    /// victim, otherwise the reclaimable estimate.
    #[must_use]
    pub fn pages(&self) -> i64 {
        match self {
            Self::NoPressure | Self::Aborted => 0,
            Self::Reclaimable(pages) => *pages,
            Self::KillIssued { remaining, .. } => *remaining,
            Self::NoVictim => -1,
        }
    }

    /// The victim, if a kill was issued.
    #[must_use]
    pub fn victim(&self) -> Option<&Victim> {
        match self {
            Self::KillIssued { victim, .. } => Some(victim),
            _ => None,
        }
    }
}

/// Threshold configuration plus the table built from it.
#[derive(Debug)]
struct Thresholds {
    config: ThresholdConfig,
    table: ThresholdTable,
}

impl Thresholds {
    fn new(config: ThresholdConfig) -> Self {
        let mut thresholds = Self {
            table: ThresholdTable::from_config(&config),
            config,
        };
        thresholds.rebuild();
        thresholds
    }

    /// Drop entries the table cannot hold, then rebuild it.
    fn rebuild(&mut self) {
        self.config.adj.truncate(MAX_THRESHOLD_ENTRIES);
        self.config.minfree.truncate(MAX_THRESHOLD_ENTRIES);
        self.table = ThresholdTable::from_config(&self.config);
    }
}

/// Engine state shared by every reclaim path.
///
/// `Send + Sync`; all methods take `&self`.
#[derive(Debug)]
pub struct ReclaimController {
    thresholds: RwLock<Thresholds>,
    cooldown: KillCooldownGuard,
    tie_break: TieBreak,
    debug_level: AtomicU32,
    cost: AtomicU32,
    counters: LowmemCounters,
}

impl ReclaimController {
    /// Build from configuration.
    #[must_use]
    pub fn new(config: &LowmemConfig) -> Self {
        Self {
            thresholds: RwLock::new(Thresholds::new(config.thresholds.clone())),
            cooldown: KillCooldownGuard::new(config.cooldown.grace_period_ticks),
            tie_break: config.selection.tie_break,
            debug_level: AtomicU32::new(config.general.debug_level),
            cost: AtomicU32::new(config.shrinker.cost),
            counters: LowmemCounters::new(),
        }
    }

    /// Run one decision and return the shrinker integer.
    pub fn shrink<I, S, K>(
        &self,
        scan_request: i64,
        memory: MemorySample,
        snapshot: I,
        now: Tick,
        signaler: &S,
        compaction: &K,
    ) -> i64
    where
        I: IntoIterator<Item = ProcessSnapshot>,
        S: Signaler + ?Sized,
        K: CompactionTrigger + ?Sized,
    {
        self.decide(scan_request, memory, snapshot, now, signaler, compaction)
            .pages()
    }

    /// Run one decision over an already captured snapshot.
    ///
    /// A snapshot captured before this call may miss a victim marked by a
    /// concurrent path; [`decide_with`](Self::decide_with) enumerates only
    /// once the cooldown ticket is held.
    pub fn decide<I, S, K>(
        &self,
        scan_request: i64,
        memory: MemorySample,
        snapshot: I,
        now: Tick,
        signaler: &S,
        compaction: &K,
    ) -> Decision
    where
        I: IntoIterator<Item = ProcessSnapshot>,
        S: Signaler + ?Sized,
        K: CompactionTrigger + ?Sized,
    {
        self.decide_with(scan_request, memory, || snapshot, now, signaler, compaction)
    }

    /// Run one decision, calling `enumerate` only if a scan is needed.
    pub fn decide_with<F, I, S, K>(
        &self,
        scan_request: i64,
        memory: MemorySample,
        enumerate: F,
        now: Tick,
        signaler: &S,
        compaction: &K,
    ) -> Decision
    where
        F: FnOnce() -> I,
        I: IntoIterator<Item = ProcessSnapshot>,
        S: Signaler + ?Sized,
        K: CompactionTrigger + ?Sized,
    {
        let level = self.debug_level();
        let stats = memory.stats;

        let Some(min_score) = self.thresholds.read().table.choose_min_score(&stats) else {
            if scan_request > 0 {
                self.counters.record(&Decision::NoPressure);
            }
            return Decision::NoPressure;
        };

        if scan_request > 0 && level >= 3 {
            debug!(
                scan_request,
                free = stats.free_pages,
                file = stats.file_cache_pages,
                min_score,
                "lowmem_shrink"
            );
        }

        let total = memory.lru.total();
        if scan_request <= 0 {
            if level >= 5 {
                trace!(scan_request, total, "lowmem_shrink query");
            }
            return Decision::Reclaimable(total);
        }

        self.counters.scans.fetch_add(1, Ordering::Relaxed);
        let ticket = self.cooldown.ticket();
        let selector = VictimSelector::new(self.tie_break, level);

        let decision = match selector.select(enumerate(), min_score, &self.cooldown, now) {
            Selection::Aborted => Decision::Aborted,
            Selection::NotFound => Decision::NoVictim,
            Selection::Found(victim) => {
                // Mark before arming: any scan that observes the new deadline
                // also observes the victim as dying and aborts.
                signaler.mark_pending_death(victim.process.pid);
                if self.cooldown.try_arm(ticket, now) {
                    issue_kill(&victim, signaler, level);
                    let remaining = total - i64::from(victim.resident_pages);
                    Decision::KillIssued { victim, remaining }
                } else {
                    self.counters.cooldown_races.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        pid = %victim.process.pid,
                        "another reclaim path killed first, dropping victim"
                    );
                    Decision::Aborted
                }
            }
        };

        if level >= 4 && decision != Decision::Aborted {
            trace!(scan_request, result = decision.pages(), "lowmem_shrink done");
        }
        self.counters.record(&decision);

        if matches!(decision, Decision::KillIssued { .. }) {
            compaction.request_async();
        }
        decision
    }

    // -----------------------------------------------------------------------
    // Runtime configuration
    // -----------------------------------------------------------------------

    /// Replace both threshold lists.
    ///
    /// Entries past [`MAX_THRESHOLD_ENTRIES`] are dropped, so
    /// [`parameter`](Self::parameter) reports exactly the effective table.
    pub fn set_thresholds(&self, adj: Vec<i16>, minfree: Vec<u32>) {
        let mut thresholds = self.thresholds.write();
        thresholds.config.adj = adj;
        thresholds.config.minfree = minfree;
        thresholds.rebuild();
    }

    /// Switch the free/cache comparison policy.
    pub fn set_policy(&self, policy: PressurePolicy) {
        let mut thresholds = self.thresholds.write();
        thresholds.config.policy = policy;
        thresholds.rebuild();
    }

    /// Apply one parameter in its text form.
    ///
    /// Recognised names: `adj`, `minfree`, `debug_level`, `cost`.
    ///
    /// # Errors
    /// `InvalidParameter` for an unknown name or unparsable value; the
    /// previous value stays in effect.
    pub fn set_parameter(&self, name: &str, text: &str) -> Result<()> {
        match name {
            "adj" => {
                let adj = params::parse_array(name, text, MAX_THRESHOLD_ENTRIES)?;
                let mut thresholds = self.thresholds.write();
                thresholds.config.adj = adj;
                thresholds.rebuild();
            }
            "minfree" => {
                let minfree = params::parse_array(name, text, MAX_THRESHOLD_ENTRIES)?;
                let mut thresholds = self.thresholds.write();
                thresholds.config.minfree = minfree;
                thresholds.rebuild();
            }
            "debug_level" => self.set_debug_level(params::parse_scalar(name, text)?),
            "cost" => self.cost.store(params::parse_scalar(name, text)?, Ordering::Relaxed),
            _ => return Err(params::invalid(name, text, "unknown parameter")),
        }
        debug!(param = name, value = text.trim(), "parameter updated");
        Ok(())
    }

    /// Read a parameter back in text form.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<String> {
        match name {
            "adj" => Some(params::format_array(&self.thresholds.read().config.adj)),
            "minfree" => Some(params::format_array(&self.thresholds.read().config.minfree)),
            "debug_level" => Some(self.debug_level().to_string()),
            "cost" => Some(self.cost().to_string()),
            _ => None,
        }
    }

    /// Set log verbosity.
    pub fn set_debug_level(&self, level: u32) {
        self.debug_level.store(level, Ordering::Relaxed);
    }

    /// Current log verbosity.
    #[must_use]
    pub fn debug_level(&self) -> u32 {
        self.debug_level.load(Ordering::Relaxed)
    }

    /// Advertised reclaim cost.
    #[must_use]
    pub fn cost(&self) -> u32 {
        self.cost.load(Ordering::Relaxed)
    }

    /// Effective threshold table.
    #[must_use]
    pub fn table(&self) -> ThresholdTable {
        self.thresholds.read().table.clone()
    }

    /// Kill cooldown state.
    #[must_use]
    pub fn cooldown(&self) -> &KillCooldownGuard {
        &self.cooldown
    }

    /// Counter snapshot.
    #[must_use]
    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }
}

fn issue_kill<S: Signaler + ?Sized>(victim: &Victim, signaler: &S, level: u32) {
    let process = &victim.process;
    if level >= 1 {
        info!(
            pid = %process.pid,
            comm = %process.comm,
            adj = process.score,
            size = victim.resident_pages,
            "send sigkill"
        );
    }
    signaler.terminate(process.pid);
}

impl Default for ReclaimController {
    fn default() -> Self {
        Self::new(&LowmemConfig::default())
    }
}
