//! Host-facing shrinker: the one entry point the memory manager calls.
//!
//! [`LowMemoryKiller`] binds a [`ReclaimController`] to its collaborators so
//! the host only ever sees `shrink(scan_request, ctx) -> i64`.

use tracing::debug_span;

use crate::config::LowmemConfig;
use crate::engine::{Decision, ReclaimController};
use crate::host::{
    Clock, CompactionTrigger, MemorySample, MemoryStatsSource, ProcessSnapshotSource, Signaler,
};
use crate::types::AllocationContext;

/// A reclaimer the host memory manager can call.
pub trait Shrinker {
    /// `scan_request == 0` asks for an estimate; `> 0` asks for reclaim.
    fn shrink(&self, scan_request: i64, ctx: AllocationContext) -> i64;

    /// Relative cost of a reclaim attempt.
    fn seeks(&self) -> u32;
}

/// The low-memory killer wired to its host collaborators.
#[derive(Debug)]
pub struct LowMemoryKiller<M, P, S, K, C> {
    controller: ReclaimController,
    memory: M,
    processes: P,
    signaler: S,
    compaction: K,
    clock: C,
}

impl<M, P, S, K, C> LowMemoryKiller<M, P, S, K, C>
where
    M: MemoryStatsSource,
    P: ProcessSnapshotSource,
    S: Signaler,
    K: CompactionTrigger,
    C: Clock,
{
    /// Wire a killer from configuration and collaborators.
    pub fn new(
        config: &LowmemConfig,
        memory: M,
        processes: P,
        signaler: S,
        compaction: K,
        clock: C,
    ) -> Self {
        Self {
            controller: ReclaimController::new(config),
            memory,
            processes,
            signaler,
            compaction,
            clock,
        }
    }

    /// Same as [`Shrinker::shrink`] but returns the structured outcome.
    ///
    /// The process table is only enumerated for a real scan, and only after
    /// the engine has captured its cooldown ticket.
    pub fn decide(&self, scan_request: i64, ctx: AllocationContext) -> Decision {
        // Engine events inherit the gfp mask from this span.
        let _span = debug_span!("shrink", gfp_mask = ctx.gfp_mask).entered();
        let memory = MemorySample::from_source(&self.memory);
        let now = self.clock.now();
        self.controller.decide_with(
            scan_request,
            memory,
            || self.processes.enumerate(),
            now,
            &self.signaler,
            &self.compaction,
        )
    }

    /// Shared engine state (runtime parameters, cooldown, counters).
    pub fn controller(&self) -> &ReclaimController {
        &self.controller
    }

    /// The process source.
    pub fn processes(&self) -> &P {
        &self.processes
    }

    /// The signaler.
    pub fn signaler(&self) -> &S {
        &self.signaler
    }
}

impl<M, P, S, K, C> Shrinker for LowMemoryKiller<M, P, S, K, C>
where
    M: MemoryStatsSource,
    P: ProcessSnapshotSource,
    S: Signaler,
    K: CompactionTrigger,
    C: Clock,
{
    fn shrink(&self, scan_request: i64, ctx: AllocationContext) -> i64 {
        self.decide(scan_request, ctx).pages()
    }

    fn seeks(&self) -> u32 {
        self.controller.cost()
    }
}
