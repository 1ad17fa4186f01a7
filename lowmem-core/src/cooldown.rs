//! Kill cooldown — don't kill faster than victims can die.
//!
//! After a kill the guard is armed until `now + grace_period`. While it is
//! armed, seeing any process that is still pending death aborts the whole
//! decision. Expiry is purely time based; there is no disarm.
//!
//! The deadline is one `AtomicU64` owned by the engine instance. Arming
//! from a decision goes through [`KillCooldownGuard::try_arm`], a
//! compare-and-swap against the value observed when the decision started.
//! The engine marks its victim as dying before that swap, so a decision
//! that starts after the swap sees the dying victim and aborts, and one
//! that started before it loses the swap. Either way two concurrent
//! reclaim paths cannot both kill inside one grace period.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::Tick;

/// Raw value meaning "never armed".
const UNARMED: u64 = 0;

/// Cooldown deadline captured at the start of a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownTicket(u64);

/// Tracks the grace period of the most recent kill.
#[derive(Debug)]
pub struct KillCooldownGuard {
    /// `deadline + 1`, or [`UNARMED`]. The offset keeps tick 0 usable as a
    /// real deadline.
    raw: AtomicU64,
    grace_period: u64,
}

impl KillCooldownGuard {
    /// A guard that is not armed.
    #[must_use]
    pub const fn new(grace_period_ticks: u64) -> Self {
        Self {
            raw: AtomicU64::new(UNARMED),
            grace_period: grace_period_ticks,
        }
    }

    /// Configured grace period in ticks.
    #[must_use]
    pub const fn grace_period(&self) -> u64 {
        self.grace_period
    }

    /// Current deadline, if a kill has ever been issued.
    #[must_use]
    pub fn deadline(&self) -> Option<Tick> {
        decode(self.raw.load(Ordering::Acquire))
    }

    /// Whether `now` is still inside the grace period of the last kill.
    #[must_use]
    pub fn is_active(&self, now: Tick) -> bool {
        self.deadline().is_some_and(|deadline| now <= deadline)
    }

    /// True iff a pending-death process was observed and the grace period
    /// has not yet expired. The caller must abandon the whole decision.
    #[must_use]
    pub fn should_abort(&self, pending_death_observed: bool, now: Tick) -> bool {
        pending_death_observed && self.is_active(now)
    }

    /// Unconditionally start a grace period at `now`.
    pub fn arm(&self, now: Tick) {
        self.raw.store(encode(now.saturating_add(self.grace_period)), Ordering::Release);
    }

    /// Snapshot the deadline before scanning.
    #[must_use]
    pub fn ticket(&self) -> CooldownTicket {
        CooldownTicket(self.raw.load(Ordering::Acquire))
    }

    /// Arm only if nobody else armed since `ticket` was taken.
    ///
    /// Returns `false` when another decision won the race; that decision's
    /// kill stands and this one must not issue its own.
    #[must_use]
    pub fn try_arm(&self, ticket: CooldownTicket, now: Tick) -> bool {
        let next = encode(now.saturating_add(self.grace_period));
        self.raw
            .compare_exchange(ticket.0, next, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

fn encode(deadline: Tick) -> u64 {
    deadline.0.saturating_add(1)
}

fn decode(raw: u64) -> Option<Tick> {
    (raw != UNARMED).then(|| Tick(raw - 1))
}
