//! Linux `/proc` collaborators.
//!
//! - [`MemInfo`] / [`ProcMeminfo`]: `/proc/meminfo` → page counts.
//! - [`ProcfsSource`]: lazy walk of `/proc/<pid>` → [`ProcessSnapshot`]s.
//!
//! Both take a root path so they can be pointed at a fixture tree.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{LowmemError, Result};
use crate::host::{MemorySample, MemoryStatsSource, PendingDeaths, ProcessSnapshotSource};
use crate::types::{LruCounts, MemoryStats, Pid, ProcessSnapshot};

/// `PF_KTHREAD` in the `flags` field of `/proc/<pid>/stat`.
pub const PF_KTHREAD: u64 = 0x0020_0000;

/// Default page size in KiB.
pub const DEFAULT_PAGE_KB: u64 = 4;

// ---------------------------------------------------------------------------
// /proc/meminfo
// ---------------------------------------------------------------------------

/// Which pages count as "file cache" for the threshold check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCacheAccounting {
    /// `Active(file) + Inactive(file)`.
    #[default]
    LruFile,
    /// `Cached - Shmem`.
    FileMinusShmem,
}

/// Parsed `/proc/meminfo`, all values in KiB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemInfo {
    /// `MemFree`.
    pub free_kb: u64,
    /// `Cached`.
    pub cached_kb: u64,
    /// `Shmem`.
    pub shmem_kb: u64,
    /// `Active(anon)`.
    pub active_anon_kb: u64,
    /// `Inactive(anon)`.
    pub inactive_anon_kb: u64,
    /// `Active(file)`.
    pub active_file_kb: u64,
    /// `Inactive(file)`.
    pub inactive_file_kb: u64,
}

impl MemInfo {
    /// Parse meminfo text.
    ///
    /// # Errors
    /// `Procfs` if `MemFree` or any LRU line is missing or unparsable.
    pub fn parse(text: &str) -> Result<Self> {
        let mut info = Self::default();
        let mut seen = 0_u8;

        for line in text.lines() {
            let Some((key, rest)) = line.split_once(':') else {
                continue;
            };
            let (slot, bit) = match key.trim() {
                "MemFree" => (&mut info.free_kb, 1),
                "Active(anon)" => (&mut info.active_anon_kb, 2),
                "Inactive(anon)" => (&mut info.inactive_anon_kb, 4),
                "Active(file)" => (&mut info.active_file_kb, 8),
                "Inactive(file)" => (&mut info.inactive_file_kb, 16),
                "Cached" => (&mut info.cached_kb, 0),
                "Shmem" => (&mut info.shmem_kb, 0),
                _ => continue,
            };
            let value = rest.trim().trim_end_matches("kB").trim();
            *slot = value.parse().map_err(|_| meminfo_error(&format!("bad value for {key}")))?;
            seen |= bit;
        }

        if seen != 31 {
            return Err(meminfo_error("missing MemFree or LRU counters"));
        }
        Ok(info)
    }

    /// Read and parse a meminfo file.
    ///
    /// # Errors
    /// I/O or parse failure.
    pub fn read(path: &Path) -> Result<Self> {
        Self::parse(&fs::read_to_string(path)?)
    }

    /// Threshold-check counters in pages.
    #[must_use]
    pub fn memory_stats(&self, accounting: FileCacheAccounting, page_kb: u64) -> MemoryStats {
        let file_kb = match accounting {
            FileCacheAccounting::LruFile => self.active_file_kb + self.inactive_file_kb,
            FileCacheAccounting::FileMinusShmem => self.cached_kb.saturating_sub(self.shmem_kb),
        };
        MemoryStats {
            free_pages: to_pages_u32(self.free_kb, page_kb),
            file_cache_pages: to_pages_u32(file_kb, page_kb),
        }
    }

    /// LRU counters in pages.
    #[must_use]
    pub fn lru_counts(&self, page_kb: u64) -> LruCounts {
        let page_kb = page_kb.max(1);
        LruCounts {
            active_anon: self.active_anon_kb / page_kb,
            inactive_anon: self.inactive_anon_kb / page_kb,
            active_file: self.active_file_kb / page_kb,
            inactive_file: self.inactive_file_kb / page_kb,
        }
    }
}

fn to_pages_u32(kb: u64, page_kb: u64) -> u32 {
    u32::try_from(kb / page_kb.max(1)).unwrap_or(u32::MAX)
}

fn meminfo_error(reason: &str) -> LowmemError {
    LowmemError::Procfs {
        file: "meminfo".to_string(),
        reason: reason.to_string(),
    }
}

/// [`MemoryStatsSource`] that re-reads a meminfo file for every sample.
///
/// A failed read reports memory as plentiful (`u32::MAX` free, zero
/// reclaimable), so the killer never acts on missing data.
#[derive(Debug, Clone)]
pub struct ProcMeminfo {
    path: PathBuf,
    accounting: FileCacheAccounting,
    page_kb: u64,
}

impl ProcMeminfo {
    /// Read from `path` with the given accounting and page size.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, accounting: FileCacheAccounting, page_kb: u64) -> Self {
        Self {
            path: path.into(),
            accounting,
            page_kb,
        }
    }

    /// `/proc/meminfo`, LRU file accounting, 4 KiB pages.
    #[must_use]
    pub fn system() -> Self {
        Self::new("/proc/meminfo", FileCacheAccounting::LruFile, DEFAULT_PAGE_KB)
    }

    fn read(&self) -> Option<MemInfo> {
        MemInfo::read(&self.path)
            .inspect_err(|e| warn!(path = %self.path.display(), error = %e, "meminfo unavailable"))
            .ok()
    }
}

const PLENTIFUL: MemoryStats = MemoryStats {
    free_pages: u32::MAX,
    file_cache_pages: 0,
};

impl MemoryStatsSource for ProcMeminfo {
    fn sample(&self) -> MemoryStats {
        self.read()
            .map_or(PLENTIFUL, |info| info.memory_stats(self.accounting, self.page_kb))
    }

    fn lru_counts(&self) -> LruCounts {
        self.read()
            .map(|info| info.lru_counts(self.page_kb))
            .unwrap_or_default()
    }

    fn read_sample(&self) -> MemorySample {
        self.read().map_or(
            MemorySample {
                stats: PLENTIFUL,
                lru: LruCounts::default(),
            },
            |info| MemorySample {
                stats: info.memory_stats(self.accounting, self.page_kb),
                lru: info.lru_counts(self.page_kb),
            },
        )
    }
}

// ---------------------------------------------------------------------------
// /proc/<pid>
// ---------------------------------------------------------------------------

/// Fields taken from `/proc/<pid>/stat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatLine {
    /// `comm`, without the parentheses.
    pub comm: String,
    /// Single-letter state.
    pub state: char,
    /// Task flags.
    pub flags: u64,
}

impl StatLine {
    /// Parse a stat line. `comm` may itself contain spaces and parentheses,
    /// so it is delimited by the first `(` and the last `)`.
    ///
    /// # Errors
    /// `Procfs` if the line is truncated or a field is unparsable.
    pub fn parse(line: &str) -> Result<Self> {
        let open = line.find('(').ok_or_else(|| stat_error("no comm"))?;
        let close = line.rfind(')').ok_or_else(|| stat_error("no comm"))?;
        if close < open {
            return Err(stat_error("no comm"));
        }
        let comm = line[open + 1..close].to_string();

        // state ppid pgrp session tty_nr tpgid flags ...
        let mut fields = line[close + 1..].split_whitespace();
        let state = fields
            .next()
            .and_then(|s| s.chars().next())
            .ok_or_else(|| stat_error("no state"))?;
        let flags = fields
            .nth(5)
            .ok_or_else(|| stat_error("no flags"))?
            .parse()
            .map_err(|_| stat_error("bad flags"))?;

        Ok(Self { comm, state, flags })
    }

    /// Whether the task is a kernel thread.
    #[must_use]
    pub fn is_kernel_thread(&self) -> bool {
        self.flags & PF_KTHREAD != 0
    }
}

fn stat_error(reason: &str) -> LowmemError {
    LowmemError::Procfs {
        file: "stat".to_string(),
        reason: reason.to_string(),
    }
}

/// Resident pages from a `statm` line (second field).
///
/// # Errors
/// `Procfs` if the field is missing or unparsable.
pub fn parse_statm_resident(line: &str) -> Result<u32> {
    let resident: u64 = line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| statm_error("no resident field"))?
        .parse()
        .map_err(|_| statm_error("bad resident field"))?;
    Ok(u32::try_from(resident).unwrap_or(u32::MAX))
}

fn statm_error(reason: &str) -> LowmemError {
    LowmemError::Procfs {
        file: "statm".to_string(),
        reason: reason.to_string(),
    }
}

/// Lazy process enumeration over a proc root.
///
/// Every process is read independently; one that disappears mid-scan is
/// skipped. Pending death comes from the shared [`PendingDeaths`] registry.
#[derive(Debug, Clone)]
pub struct ProcfsSource {
    root: PathBuf,
    pending: Arc<PendingDeaths>,
}

impl ProcfsSource {
    /// Walk `root`, consulting `pending` for signalled pids.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, pending: Arc<PendingDeaths>) -> Self {
        Self {
            root: root.into(),
            pending,
        }
    }

    /// Walk `/proc`.
    #[must_use]
    pub fn system(pending: Arc<PendingDeaths>) -> Self {
        Self::new("/proc", pending)
    }

    /// Read one process directory.
    ///
    /// # Errors
    /// I/O or parse failure (typically: the process exited).
    pub fn read_process(&self, pid: Pid) -> Result<ProcessSnapshot> {
        let dir = self.root.join(pid.0.to_string());
        let stat = StatLine::parse(&fs::read_to_string(dir.join("stat"))?)?;

        // Kernel threads have no mm and often no readable statm.
        if stat.is_kernel_thread() {
            return Ok(ProcessSnapshot {
                pid,
                comm: stat.comm,
                score: 0,
                resident_pages: 0,
                is_kernel_thread: true,
                is_pending_death: self.pending.contains(pid),
            });
        }

        let score = fs::read_to_string(dir.join("oom_score_adj"))?
            .trim()
            .parse::<i16>()
            .map_err(|_| LowmemError::Procfs {
                file: "oom_score_adj".to_string(),
                reason: "not an integer".to_string(),
            })?;
        let resident_pages = parse_statm_resident(&fs::read_to_string(dir.join("statm"))?)?;

        Ok(ProcessSnapshot {
            pid,
            comm: stat.comm,
            score,
            resident_pages,
            is_kernel_thread: false,
            is_pending_death: self.pending.contains(pid),
        })
    }

    /// Whether `/proc/<pid>` still exists.
    #[must_use]
    pub fn is_alive(&self, pid: Pid) -> bool {
        self.root.join(pid.0.to_string()).exists()
    }

    /// Forget signalled pids whose directory is gone.
    pub fn prune_pending(&self) {
        self.pending.retain_alive(|pid| self.is_alive(pid));
    }
}

impl ProcessSnapshotSource for ProcfsSource {
    fn enumerate(&self) -> impl Iterator<Item = ProcessSnapshot> + '_ {
        let entries = fs::read_dir(&self.root)
            .inspect_err(|e| warn!(root = %self.root.display(), error = %e, "cannot list processes"))
            .ok();

        entries
            .into_iter()
            .flatten()
            .filter_map(std::result::Result::ok)
            .filter_map(|entry| entry.file_name().to_str()?.parse::<u32>().ok())
            .filter_map(move |pid| self.read_process(Pid(pid)).ok())
    }
}
