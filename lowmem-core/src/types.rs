//! Core type definitions shared by every stage of the shrink path.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity & time
// ---------------------------------------------------------------------------

/// Process identifier as reported by the process snapshot source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pid(pub u32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic tick counter (the engine's notion of "now").
///
/// Ticks only ever move forward; the engine never assumes a particular
/// rate, only that the cooldown grace period is expressed in the same unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tick(pub u64);

impl Tick {
    /// `self + ticks`, saturating at `u64::MAX`.
    #[must_use]
    pub const fn saturating_add(self, ticks: u64) -> Self {
        Self(self.0.saturating_add(ticks))
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Memory statistics
// ---------------------------------------------------------------------------

/// Momentary view of system memory used for the threshold check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    /// Pages on the free lists.
    pub free_pages: u32,
    /// Pages of file cache considered cheaply reclaimable.
    pub file_cache_pages: u32,
}

impl MemoryStats {
    /// Free plus file cache, widened so the sum never overflows.
    #[must_use]
    pub fn combined(&self) -> u64 {
        u64::from(self.free_pages) + u64::from(self.file_cache_pages)
    }
}

/// Page counts on the four LRU lists.
///
/// Their sum is the "total reclaimable working set" reported back to the
/// host memory manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LruCounts {
    /// Active anonymous pages.
    pub active_anon: u64,
    /// Inactive anonymous pages.
    pub inactive_anon: u64,
    /// Active file-backed pages.
    pub active_file: u64,
    /// Inactive file-backed pages.
    pub inactive_file: u64,
}

impl LruCounts {
    /// Sum of all four lists, clamped into the shrinker's signed range.
    #[must_use]
    pub fn total(&self) -> i64 {
        let sum = self
            .active_anon
            .saturating_add(self.inactive_anon)
            .saturating_add(self.active_file)
            .saturating_add(self.inactive_file);
        i64::try_from(sum).unwrap_or(i64::MAX)
    }
}

// ---------------------------------------------------------------------------
// Processes
// ---------------------------------------------------------------------------

/// One process as seen by a single scan.
///
/// Snapshots are produced fresh for every invocation and are never written
/// back; the pending-death flag set by a kill only shows up on a later
/// enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    /// Process id.
    pub pid: Pid,
    /// Short display name (`comm`).
    pub comm: String,
    /// Badness score (`oom_score_adj`); higher is more killable.
    pub score: i16,
    /// Resident set size in pages.
    pub resident_pages: u32,
    /// Kernel threads are never candidates.
    pub is_kernel_thread: bool,
    /// Already signalled, not yet gone.
    pub is_pending_death: bool,
}

impl ProcessSnapshot {
    /// A user-space, live process.
    #[must_use]
    pub fn new(pid: u32, comm: impl Into<String>, score: i16, resident_pages: u32) -> Self {
        Self {
            pid: Pid(pid),
            comm: comm.into(),
            score,
            resident_pages,
            is_kernel_thread: false,
            is_pending_death: false,
        }
    }

    /// Mark as a kernel thread.
    #[must_use]
    pub fn kernel_thread(mut self) -> Self {
        self.is_kernel_thread = true;
        self
    }

    /// Mark as already signalled.
    #[must_use]
    pub fn pending_death(mut self) -> Self {
        self.is_pending_death = true;
        self
    }
}

impl fmt::Display for ProcessSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.pid, self.comm)
    }
}

/// Allocation context handed to the shrinker by the host.
///
/// Only the gfp flag bits are carried, and only as log context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocationContext {
    /// Raw gfp mask of the allocation that triggered reclaim.
    pub gfp_mask: u32,
}
