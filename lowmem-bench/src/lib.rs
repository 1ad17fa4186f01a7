//! Fixtures shared by the lowmem benchmarks.

use lowmem_core::host::{CompactionTrigger, MemorySample, Signaler};
use lowmem_core::types::{LruCounts, MemoryStats, Pid, ProcessSnapshot};

/// A process table of `n` entries with a spread of scores and sizes.
///
/// Every 16th entry is a kernel thread; scores cycle through the stock
/// adj levels so every filter in the selector gets exercised.
#[must_use]
pub fn process_table(n: u32) -> Vec<ProcessSnapshot> {
    const SCORES: [i16; 6] = [-1000, -900, 0, 1, 6, 12];
    (0..n)
        .map(|i| {
            let p = ProcessSnapshot::new(
                i + 1,
                format!("proc{i}"),
                SCORES[(i as usize) % SCORES.len()],
                (i * 37) % 20_000,
            );
            if i % 16 == 0 { p.kernel_thread() } else { p }
        })
        .collect()
}

/// Memory state with free+cache under the lowest stock floor.
#[must_use]
pub fn critical_sample() -> MemorySample {
    MemorySample {
        stats: MemoryStats {
            free_pages: 1024,
            file_cache_pages: 1024,
        },
        lru: LruCounts {
            active_anon: 200_000,
            inactive_anon: 100_000,
            active_file: 50_000,
            inactive_file: 50_000,
        },
    }
}

/// Collaborator that discards every action.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullActions;

impl Signaler for NullActions {
    fn terminate(&self, _pid: Pid) {}

    fn mark_pending_death(&self, _pid: Pid) {}
}

impl CompactionTrigger for NullActions {
    fn request_async(&self) {}
}
