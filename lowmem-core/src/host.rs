//! Collaborator interfaces the engine consumes from its host.
//!
//! Everything OS-specific lives behind these traits: sampling memory
//! counters, enumerating processes, delivering the kill, and kicking
//! compaction. The engine only reads what they return and asks them to act.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::{LruCounts, MemoryStats, Pid, ProcessSnapshot, Tick};

/// Supplies system memory counters.
pub trait MemoryStatsSource {
    /// Free and file-cache pages for the threshold check.
    fn sample(&self) -> MemoryStats;

    /// LRU list sizes for the reclaimable estimate.
    fn lru_counts(&self) -> LruCounts;

    /// Both halves from one observation. Sources that read both from the
    /// same place should override this so a decision never mixes moments.
    fn read_sample(&self) -> MemorySample {
        MemorySample {
            stats: self.sample(),
            lru: self.lru_counts(),
        }
    }
}

/// Supplies a fresh, lazy view of the process table.
///
/// Each call starts a new enumeration; nothing is cached between calls.
pub trait ProcessSnapshotSource {
    /// Iterate processes in table order.
    fn enumerate(&self) -> impl Iterator<Item = ProcessSnapshot> + '_;
}

/// Delivers termination to a process.
pub trait Signaler {
    /// Send the kill signal.
    fn terminate(&self, pid: Pid);

    /// Flag the process so later enumerations report it as pending death.
    fn mark_pending_death(&self, pid: Pid);
}

/// Best-effort, fire-and-forget memory compaction.
pub trait CompactionTrigger {
    /// Ask for asynchronous compaction.
    fn request_async(&self);
}

/// Source of the current tick.
pub trait Clock {
    /// Now.
    fn now(&self) -> Tick;
}

// Shared collaborators: an `Arc` forwards to its contents.

impl<T: MemoryStatsSource + ?Sized> MemoryStatsSource for Arc<T> {
    fn sample(&self) -> MemoryStats {
        (**self).sample()
    }

    fn lru_counts(&self) -> LruCounts {
        (**self).lru_counts()
    }

    fn read_sample(&self) -> MemorySample {
        (**self).read_sample()
    }
}

impl<T: ProcessSnapshotSource + ?Sized> ProcessSnapshotSource for Arc<T> {
    fn enumerate(&self) -> impl Iterator<Item = ProcessSnapshot> + '_ {
        (**self).enumerate()
    }
}

impl<T: Signaler + ?Sized> Signaler for Arc<T> {
    fn terminate(&self, pid: Pid) {
        (**self).terminate(pid);
    }

    fn mark_pending_death(&self, pid: Pid) {
        (**self).mark_pending_death(pid);
    }
}

impl<T: CompactionTrigger + ?Sized> CompactionTrigger for Arc<T> {
    fn request_async(&self) {
        (**self).request_async();
    }
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> Tick {
        (**self).now()
    }
}

/// Both memory readings taken for one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemorySample {
    /// Threshold-check counters.
    pub stats: MemoryStats,
    /// Reclaimable-estimate counters.
    pub lru: LruCounts,
}

impl MemorySample {
    /// Read both halves from `source`.
    pub fn from_source<M: MemoryStatsSource + ?Sized>(source: &M) -> Self {
        source.read_sample()
    }
}

/// Shared registry of processes that have been signalled.
///
/// Signalers that cannot set a kernel-side flag record the pid here, and
/// process sources consult it when building snapshots.
#[derive(Debug, Default)]
pub struct PendingDeaths {
    pids: Mutex<HashSet<Pid>>,
}

impl PendingDeaths {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `pid` as signalled.
    pub fn mark(&self, pid: Pid) {
        self.pids.lock().insert(pid);
    }

    /// Whether `pid` has been signalled.
    #[must_use]
    pub fn contains(&self, pid: Pid) -> bool {
        self.pids.lock().contains(&pid)
    }

    /// Drop entries for which `alive` returns false.
    pub fn retain_alive(&self, mut alive: impl FnMut(Pid) -> bool) {
        self.pids.lock().retain(|&pid| alive(pid));
    }

    /// Number of tracked pids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pids.lock().len()
    }

    /// Whether nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pids.lock().is_empty()
    }
}
