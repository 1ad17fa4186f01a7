//! Threshold table — maps memory pressure to a minimum badness score.
//!
//! ```text
//!   minfree:   3072    4096    10240   16384   (pages)
//!   adj:          0       1        6      12
//!                 ▲ scanned from index 0; the first floor above
//!                   free+cache wins, not the tightest one
//! ```
//!
//! The table is never re-sorted. Out-of-order configuration is accepted
//! and produces deterministic first-match results.

use serde::{Deserialize, Serialize};

use crate::types::MemoryStats;

/// Capacity of the parameter arrays; longer lists are truncated.
pub const MAX_THRESHOLD_ENTRIES: usize = 6;

/// How free pages and file cache are compared against a floor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PressurePolicy {
    /// `free + file_cache < floor`.
    #[default]
    Combined,
    /// `free < floor && file_cache < floor`.
    Independent,
}

/// One level of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdEntry {
    /// The level applies when available memory drops below this many pages.
    pub min_free_pages: u32,
    /// Minimum badness score eligible for killing at this level.
    pub min_score: i16,
}

/// Ordered list of threshold levels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThresholdTable {
    entries: Vec<ThresholdEntry>,
    policy: PressurePolicy,
}

impl ThresholdTable {
    /// Pair `adj[i]` with `minfree[i]`.
    ///
    /// The effective size is the shortest of the two lists and
    /// [`MAX_THRESHOLD_ENTRIES`]; extra values are ignored.
    #[must_use]
    pub fn from_lists(adj: &[i16], minfree: &[u32], policy: PressurePolicy) -> Self {
        let entries = adj
            .iter()
            .zip(minfree)
            .take(MAX_THRESHOLD_ENTRIES)
            .map(|(&min_score, &min_free_pages)| ThresholdEntry {
                min_free_pages,
                min_score,
            })
            .collect();
        Self { entries, policy }
    }

    /// Build from a [`crate::config::ThresholdConfig`].
    #[must_use]
    pub fn from_config(config: &crate::config::ThresholdConfig) -> Self {
        Self::from_lists(&config.adj, &config.minfree, config.policy)
    }

    /// Levels in table order.
    #[must_use]
    pub fn entries(&self) -> &[ThresholdEntry] {
        &self.entries
    }

    /// Number of effective levels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no levels (never triggers).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Comparison policy in effect.
    #[must_use]
    pub fn policy(&self) -> PressurePolicy {
        self.policy
    }

    /// Minimum score for the current pressure, or `None` if memory is above
    /// every configured floor.
    #[must_use]
    pub fn choose_min_score(&self, stats: &MemoryStats) -> Option<i16> {
        self.entries
            .iter()
            .find(|entry| self.under_floor(stats, entry.min_free_pages))
            .map(|entry| entry.min_score)
    }

    fn under_floor(&self, stats: &MemoryStats, floor: u32) -> bool {
        match self.policy {
            PressurePolicy::Combined => stats.combined() < u64::from(floor),
            PressurePolicy::Independent => {
                stats.free_pages < floor && stats.file_cache_pages < floor
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(free: u32, file: u32) -> MemoryStats {
        MemoryStats {
            free_pages: free,
            file_cache_pages: file,
        }
    }

    fn stock() -> ThresholdTable {
        ThresholdTable::from_lists(
            &[0, 1, 6, 12],
            &[3072, 4096, 10240, 16384],
            PressurePolicy::Combined,
        )
    }

    #[test]
    fn effective_size_is_shortest_list() {
        let table = ThresholdTable::from_lists(&[0, 1, 6], &[10, 20], PressurePolicy::Combined);
        assert_eq!(table.len(), 2);

        let table = ThresholdTable::from_lists(&[0; 10], &[1; 10], PressurePolicy::Combined);
        assert_eq!(table.len(), MAX_THRESHOLD_ENTRIES);
    }

    #[test]
    fn first_matching_entry_wins() {
        let table = stock();
        // 2000 < 3072: every floor is above, index 0 is reported.
        assert_eq!(table.choose_min_score(&stats(1000, 1000)), Some(0));
        // 3500 only passes the 4096 floor first.
        assert_eq!(table.choose_min_score(&stats(2000, 1500)), Some(1));
        assert_eq!(table.choose_min_score(&stats(8000, 2000)), Some(6));
        assert_eq!(table.choose_min_score(&stats(8000, 8000)), Some(12));
    }

    #[test]
    fn at_or_above_every_floor_is_none() {
        let table = stock();
        assert_eq!(table.choose_min_score(&stats(16384, 0)), None);
        assert_eq!(table.choose_min_score(&stats(10000, 10000)), None);
    }

    #[test]
    fn cache_counts_as_free_in_combined_policy() {
        let table = stock();
        // Free alone is critical but the cache lifts it over the top floor.
        assert_eq!(table.choose_min_score(&stats(100, 20_000)), None);
    }

    #[test]
    fn independent_policy_needs_both_under() {
        let table = ThresholdTable::from_lists(
            &[0, 1, 6, 12],
            &[3072, 4096, 10240, 16384],
            PressurePolicy::Independent,
        );
        assert_eq!(table.choose_min_score(&stats(100, 20_000)), None);
        assert_eq!(table.choose_min_score(&stats(3500, 3500)), Some(1));
        assert_eq!(table.choose_min_score(&stats(100, 5000)), Some(6));
    }

    #[test]
    fn unsorted_table_is_first_match() {
        let table = ThresholdTable::from_lists(&[12, 0], &[16384, 3072], PressurePolicy::Combined);
        // 1000 is under both floors; the first entry is reported, not the tightest.
        assert_eq!(table.choose_min_score(&stats(500, 500)), Some(12));
    }

    #[test]
    fn empty_table_never_triggers() {
        let table = ThresholdTable::from_lists(&[], &[1, 2], PressurePolicy::Combined);
        assert!(table.is_empty());
        assert_eq!(table.choose_min_score(&stats(0, 0)), None);
    }
}
