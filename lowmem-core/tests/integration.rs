//! Integration Tests — end-to-end shrink flows.
//!
//! Drive a [`LowMemoryKiller`] against an in-memory "world" that plays every
//! host collaborator: memory counters, the process table, signal delivery,
//! compaction and the clock.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::Mutex;

use lowmem_core::clock::ManualClock;
use lowmem_core::config::LowmemConfig;
use lowmem_core::host::{
    CompactionTrigger, MemorySample, MemoryStatsSource, ProcessSnapshotSource, Signaler,
};
use lowmem_core::types::{AllocationContext, LruCounts, MemoryStats, Pid, ProcessSnapshot, Tick};
use lowmem_core::{Decision, LowMemoryKiller, ReclaimController, Shrinker};

// ---------------------------------------------------------------------------
// Fake host
// ---------------------------------------------------------------------------

#[derive(Default)]
struct World {
    stats: Mutex<MemoryStats>,
    lru: Mutex<LruCounts>,
    procs: Mutex<Vec<ProcessSnapshot>>,
    killed: Mutex<Vec<Pid>>,
    compactions: AtomicU32,
    enumerations: AtomicU32,
}

impl World {
    fn new(free: u32, file: u32, total: u64, procs: Vec<ProcessSnapshot>) -> Arc<Self> {
        let world = Self::default();
        *world.stats.lock() = MemoryStats {
            free_pages: free,
            file_cache_pages: file,
        };
        *world.lru.lock() = LruCounts {
            active_anon: total,
            ..LruCounts::default()
        };
        *world.procs.lock() = procs;
        Arc::new(world)
    }

    /// The victim finally exits.
    fn reap(&self, pid: Pid) {
        self.procs.lock().retain(|p| p.pid != pid);
    }

    fn killed(&self) -> Vec<Pid> {
        self.killed.lock().clone()
    }
}

impl MemoryStatsSource for World {
    fn sample(&self) -> MemoryStats {
        *self.stats.lock()
    }

    fn lru_counts(&self) -> LruCounts {
        *self.lru.lock()
    }
}

impl ProcessSnapshotSource for World {
    fn enumerate(&self) -> impl Iterator<Item = ProcessSnapshot> + '_ {
        self.enumerations.fetch_add(1, Ordering::Relaxed);
        self.procs.lock().clone().into_iter()
    }
}

impl Signaler for World {
    fn terminate(&self, pid: Pid) {
        self.killed.lock().push(pid);
    }

    fn mark_pending_death(&self, pid: Pid) {
        for p in self.procs.lock().iter_mut().filter(|p| p.pid == pid) {
            p.is_pending_death = true;
        }
    }
}

impl CompactionTrigger for World {
    fn request_async(&self) {
        self.compactions.fetch_add(1, Ordering::Relaxed);
    }
}

type Killer = LowMemoryKiller<Arc<World>, Arc<World>, Arc<World>, Arc<World>, Arc<ManualClock>>;

fn killer(world: &Arc<World>, clock: &Arc<ManualClock>) -> Killer {
    LowMemoryKiller::new(
        &LowmemConfig::default(),
        Arc::clone(world),
        Arc::clone(world),
        Arc::clone(world),
        Arc::clone(world),
        Arc::clone(clock),
    )
}

fn phone() -> Vec<ProcessSnapshot> {
    vec![
        ProcessSnapshot::new(2, "kthreadd", 15, 0).kernel_thread(),
        ProcessSnapshot::new(1, "init", -1000, 200),
        ProcessSnapshot::new(400, "system_server", -900, 40_000),
        ProcessSnapshot::new(1000, "launcher", 0, 12_000),
        ProcessSnapshot::new(1100, "email", 6, 3_000),
        ProcessSnapshot::new(1200, "camera", 12, 8_000),
        ProcessSnapshot::new(1300, "game", 12, 30_000),
    ]
}

const CTX: AllocationContext = AllocationContext { gfp_mask: 0xd0 };

// ---------------------------------------------------------------------------
// Flows
// ---------------------------------------------------------------------------

#[test]
fn query_reports_total_and_touches_nothing() {
    let world = World::new(1000, 500, 80_000, phone());
    let clock = Arc::new(ManualClock::starting_at(10));
    let lmk = killer(&world, &clock);

    assert_eq!(lmk.shrink(0, CTX), 80_000);
    assert!(world.killed().is_empty());
    assert_eq!(world.enumerations.load(Ordering::Relaxed), 0);
    assert_eq!(lmk.controller().cooldown().deadline(), None);
}

#[test]
fn kill_then_hold_off_until_grace_expires() {
    // 1500 pages free+cache: under the first floor, min score 0.
    let world = World::new(1000, 500, 80_000, phone());
    let clock = Arc::new(ManualClock::starting_at(1000));
    let lmk = killer(&world, &clock);

    // Equal scores: camera is seen before game and wins.
    let first = lmk.decide(128, CTX);
    assert_eq!(first.victim().map(|v| v.process.pid), Some(Pid(1200)));
    assert_eq!(first.pages(), 80_000 - 8_000);
    assert_eq!(world.compactions.load(Ordering::Relaxed), 1);

    // Camera is still dying: every call inside the grace period aborts.
    for tick in [1001, 1050, 1100] {
        clock.set(tick);
        assert_eq!(lmk.shrink(128, CTX), 0, "tick {tick}");
    }
    assert_eq!(world.killed(), vec![Pid(1200)]);

    // Queries are unaffected by the cooldown.
    assert_eq!(lmk.shrink(0, CTX), 80_000);

    // Past the deadline the dying camera is an ordinary candidate again.
    clock.set(1101);
    let again = lmk.decide(128, CTX);
    assert_eq!(again.victim().map(|v| v.process.pid), Some(Pid(1200)));
}

#[test]
fn reaped_victim_lets_the_next_kill_through() {
    let world = World::new(1000, 500, 80_000, phone());
    let clock = Arc::new(ManualClock::starting_at(0));
    let lmk = killer(&world, &clock);

    assert!(lmk.decide(1, CTX).victim().is_some());
    world.reap(Pid(1200));

    clock.advance(5);
    let next = lmk.decide(1, CTX);
    assert_eq!(next.victim().map(|v| v.process.pid), Some(Pid(1300)));
    assert_eq!(next.pages(), 80_000 - 30_000);
    assert_eq!(world.killed(), vec![Pid(1200), Pid(1300)]);
    assert_eq!(lmk.controller().cooldown().deadline().map(|t| t.0), Some(105));
}

#[test]
fn pressure_without_candidates_is_minus_one() {
    let procs = vec![
        ProcessSnapshot::new(1, "init", -1000, 200),
        ProcessSnapshot::new(1000, "launcher", -1, 12_000),
    ];
    let world = World::new(10, 10, 80_000, procs);
    let clock = Arc::new(ManualClock::starting_at(0));
    let lmk = killer(&world, &clock);

    assert_eq!(lmk.decide(64, CTX), Decision::NoVictim);
    assert_eq!(lmk.shrink(64, CTX), -1);
    assert_eq!(world.compactions.load(Ordering::Relaxed), 0);
    assert_eq!(lmk.controller().counters().no_victim, 2);
}

#[test]
fn plenty_of_memory_is_zero_even_for_queries() {
    let world = World::new(20_000, 0, 80_000, phone());
    let clock = Arc::new(ManualClock::starting_at(0));
    let lmk = killer(&world, &clock);

    assert_eq!(lmk.shrink(0, CTX), 0);
    assert_eq!(lmk.shrink(128, CTX), 0);
    assert!(world.killed().is_empty());
}

#[test]
fn escalating_pressure_lowers_the_bar() {
    let world = World::new(0, 0, 80_000, vec![ProcessSnapshot::new(1000, "launcher", 0, 12_000)]);
    let clock = Arc::new(ManualClock::starting_at(0));
    let lmk = killer(&world, &clock);

    // 12000 pages: min score 12, launcher is safe.
    *world.stats.lock() = MemoryStats {
        free_pages: 6000,
        file_cache_pages: 6000,
    };
    assert_eq!(lmk.shrink(1, CTX), -1);

    // 3000 pages: min score 0, launcher goes.
    *world.stats.lock() = MemoryStats {
        free_pages: 2000,
        file_cache_pages: 1000,
    };
    assert_eq!(lmk.shrink(1, CTX), 80_000 - 12_000);
}

#[test]
fn runtime_parameters_change_decisions() {
    let world = World::new(5000, 0, 80_000, phone());
    let clock = Arc::new(ManualClock::starting_at(0));
    let lmk = killer(&world, &clock);
    assert_eq!(lmk.seeks(), 32);

    lmk.controller().set_parameter("minfree", "1024,2048").expect("minfree");
    assert_eq!(lmk.shrink(1, CTX), 0);

    lmk.controller().set_parameter("minfree", "8192,16384").expect("minfree");
    lmk.controller().set_parameter("adj", "12,15").expect("adj");
    lmk.controller().set_parameter("cost", "64").expect("cost");
    assert_eq!(lmk.seeks(), 64);
    assert_eq!(lmk.decide(1, CTX).victim().map(|v| v.process.pid), Some(Pid(1200)));
}

#[test]
fn concurrent_reclaim_paths_kill_once_per_grace_period() {
    let world = World::new(1000, 500, 80_000, phone());
    let clock = Arc::new(ManualClock::starting_at(0));
    let lmk = Arc::new(killer(&world, &clock));

    let results: Vec<i64> = (0..8)
        .map(|_| {
            let lmk = Arc::clone(&lmk);
            std::thread::spawn(move || lmk.shrink(32, CTX))
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|h| h.join().expect("join"))
        .collect();

    // Exactly one path killed camera; every other one backed off.
    assert!(results.iter().all(|&r| r == 0 || r == 80_000 - 8_000), "{results:?}");
    assert_eq!(results.iter().filter(|&&r| r != 0).count(), 1, "{results:?}");
    assert_eq!(world.killed(), vec![Pid(1200)]);

    let counters = lmk.controller().counters();
    assert_eq!(counters.kills_issued, 1);
    assert_eq!(counters.aborted, 7);
}

// ---------------------------------------------------------------------------
// Interleaved reclaim paths
// ---------------------------------------------------------------------------

/// Where the second reclaim path runs inside the first one's kill.
#[derive(Clone, Copy)]
enum Interleave {
    /// Right after the first path marks its victim, before it arms.
    AfterMark,
    /// Right after the first path arms and signals.
    AfterTerminate,
}

/// Signaler that runs a second, nested decision at a chosen point.
struct Interleaved<'a> {
    world: &'a World,
    controller: &'a ReclaimController,
    at: Interleave,
    entered: AtomicBool,
    nested: Mutex<Option<Decision>>,
}

impl<'a> Interleaved<'a> {
    fn new(world: &'a World, controller: &'a ReclaimController, at: Interleave) -> Self {
        Self {
            world,
            controller,
            at,
            entered: AtomicBool::new(false),
            nested: Mutex::new(None),
        }
    }

    fn second_path(&self) {
        if self.entered.swap(true, Ordering::SeqCst) {
            return;
        }
        let decision = self.controller.decide_with(
            32,
            MemorySample::from_source(self.world),
            || self.world.enumerate(),
            Tick(1),
            self,
            self.world,
        );
        *self.nested.lock() = Some(decision);
    }

    fn nested(&self) -> Option<Decision> {
        self.nested.lock().clone()
    }
}

impl Signaler for Interleaved<'_> {
    fn terminate(&self, pid: Pid) {
        self.world.terminate(pid);
        if matches!(self.at, Interleave::AfterTerminate) {
            self.second_path();
        }
    }

    fn mark_pending_death(&self, pid: Pid) {
        self.world.mark_pending_death(pid);
        if matches!(self.at, Interleave::AfterMark) {
            self.second_path();
        }
    }
}

fn first_path(world: &World, controller: &ReclaimController, signaler: &Interleaved<'_>) -> Decision {
    controller.decide_with(
        32,
        MemorySample::from_source(world),
        || world.enumerate(),
        Tick(0),
        signaler,
        world,
    )
}

#[test]
fn path_starting_after_the_arm_sees_the_dying_victim() {
    let world = World::new(1000, 500, 80_000, phone());
    let controller = ReclaimController::default();
    let signaler = Interleaved::new(&world, &controller, Interleave::AfterTerminate);

    let first = first_path(&world, &controller, &signaler);

    assert_eq!(first.victim().map(|v| v.process.pid), Some(Pid(1200)));
    assert_eq!(signaler.nested(), Some(Decision::Aborted));
    assert_eq!(world.killed(), vec![Pid(1200)]);
    assert_eq!(controller.cooldown().deadline(), Some(Tick(100)));
    assert_eq!(controller.counters().kills_issued, 1);
}

#[test]
fn path_starting_before_the_arm_wins_and_the_first_backs_off() {
    let world = World::new(1000, 500, 80_000, phone());
    let controller = ReclaimController::default();
    let signaler = Interleaved::new(&world, &controller, Interleave::AfterMark);

    let first = first_path(&world, &controller, &signaler);

    // The nested path armed first; the outer one loses the swap.
    assert_eq!(first, Decision::Aborted);
    let nested = signaler.nested().expect("second path ran");
    assert_eq!(nested.victim().map(|v| v.process.pid), Some(Pid(1200)));
    assert_eq!(world.killed(), vec![Pid(1200)]);
    assert_eq!(controller.cooldown().deadline(), Some(Tick(101)));

    let counters = controller.counters();
    assert_eq!(counters.kills_issued, 1);
    assert_eq!(counters.cooldown_races, 1);
}

#[test]
fn shrink_logs_one_scan_line_with_the_allocation_context() {
    let world = World::new(1000, 500, 80_000, phone());
    let clock = Arc::new(ManualClock::starting_at(0));
    let lmk = killer(&world, &clock);
    lmk.controller().set_debug_level(3);

    let buf = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&buf);
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || LogSink(Arc::clone(&sink)))
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .finish();
    tracing::subscriber::with_default(subscriber, || {
        assert!(lmk.decide(64, CTX).victim().is_some());
    });

    let logs = String::from_utf8_lossy(&buf.lock()).into_owned();
    assert_eq!(logs.matches("lowmem_shrink scan_request=64").count(), 1, "{logs}");
    assert!(logs.contains("gfp_mask=208"), "{logs}");
}

struct LogSink(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
