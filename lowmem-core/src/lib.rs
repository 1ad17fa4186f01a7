//! # lowmem core library
//!
//! Early-intervention low-memory killer policy. Given free/cache page
//! counts and a process snapshot annotated with badness scores, decide
//! whether to kill, whom to kill, and when to hold off because the last
//! victim has not died yet.
//!
//! ```text
//!   MemoryStatsSource ──▶ ThresholdTable ──▶ min score
//!                                               │
//!   ProcessSnapshotSource ──▶ VictimSelector ◀──┘ ◀── KillCooldownGuard
//!                                  │
//!                                  ▼
//!                          ReclaimController ──▶ Signaler, CompactionTrigger
//! ```
//!
//! The host sees a single [`Shrinker::shrink`] call: `scan_request == 0`
//! queries the reclaimable estimate, `> 0` may kill. See
//! [`engine::Decision::pages`] for the integer convention.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod clock;
pub mod config;
pub mod cooldown;
pub mod engine;
pub mod error;
pub mod host;
pub mod logging;
pub mod metrics;
pub mod params;
pub mod procfs;
pub mod selector;
pub mod shrinker;
pub mod threshold;
pub mod types;

pub use config::LowmemConfig;
pub use engine::{Decision, ReclaimController};
pub use error::LowmemError;
pub use shrinker::{LowMemoryKiller, Shrinker};
pub use types::*;
