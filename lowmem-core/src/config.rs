//! Configuration for the low-memory killer.
//!
//! Maps directly to `lowmem.toml`. Every field has a default matching the
//! stock driver tables, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::selector::TieBreak;
use crate::threshold::PressurePolicy;

/// Top-level configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LowmemConfig {
    /// Logging settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Threshold table and comparison policy.
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    /// Victim selection tuning.
    #[serde(default)]
    pub selection: SelectionConfig,
    /// Kill cooldown.
    #[serde(default)]
    pub cooldown: CooldownConfig,
    /// Values advertised to the host reclaim framework.
    #[serde(default)]
    pub shrinker: ShrinkerConfig,
}

impl LowmemConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `LowmemError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        toml::from_str(toml_str).map_err(|e| crate::LowmemError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Verbosity of the decision log (0 = silent, 5 = every query).
    #[serde(default = "default_debug_level")]
    pub debug_level: u32,
    /// `tracing-subscriber` filter directive used by [`crate::logging::init`].
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            debug_level: 2,
            log_filter: "info".to_string(),
        }
    }
}

/// Threshold table configuration.
///
/// `adj[i]` pairs with `minfree[i]`; both lists are expected in ascending
/// order. The effective table is the shorter of the two.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Minimum badness score per level.
    #[serde(default = "default_adj")]
    pub adj: Vec<i16>,
    /// Free-page floor per level.
    #[serde(default = "default_minfree")]
    pub minfree: Vec<u32>,
    /// How free and file-cache pages are compared against a floor.
    #[serde(default)]
    pub policy: PressurePolicy,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            adj: default_adj(),
            minfree: default_minfree(),
            policy: PressurePolicy::default(),
        }
    }
}

/// Victim selection tuning.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Rule applied when two candidates share a score.
    #[serde(default)]
    pub tie_break: TieBreak,
}

/// Kill cooldown configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CooldownConfig {
    /// Ticks after a kill during which a dying victim aborts further kills.
    #[serde(default = "default_grace_period")]
    pub grace_period_ticks: u64,
    /// Tick rate used by [`crate::clock::MonotonicClock`].
    #[serde(default = "default_ticks_per_second")]
    pub ticks_per_second: u64,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            grace_period_ticks: DEFAULT_GRACE_PERIOD_TICKS,
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
        }
    }
}

/// Host-facing shrinker settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ShrinkerConfig {
    /// Relative reclaim cost ("seeks"). Affects how often the host calls
    /// us, never what we decide.
    #[serde(default = "default_cost")]
    pub cost: u32,
}

impl Default for ShrinkerConfig {
    fn default() -> Self {
        Self { cost: DEFAULT_COST }
    }
}

// ---------------------------------------------------------------------------
// Constants & serde default helpers
// ---------------------------------------------------------------------------

/// Host default seek cost.
pub const DEFAULT_SEEKS: u32 = 2;
/// Advertised cost: sixteen times the host default.
pub const DEFAULT_COST: u32 = DEFAULT_SEEKS * 16;
/// Ticks per second of the reference tick source.
pub const DEFAULT_TICKS_PER_SECOND: u64 = 100;
/// One second at the reference tick rate.
pub const DEFAULT_GRACE_PERIOD_TICKS: u64 = DEFAULT_TICKS_PER_SECOND;

fn default_debug_level() -> u32 { 2 }
fn default_log_filter() -> String { "info".to_string() }
fn default_adj() -> Vec<i16> { vec![0, 1, 6, 12] }
fn default_minfree() -> Vec<u32> { vec![3 * 1024, 4 * 1024, 10 * 1024, 16 * 1024] }
fn default_grace_period() -> u64 { DEFAULT_GRACE_PERIOD_TICKS }
fn default_ticks_per_second() -> u64 { DEFAULT_TICKS_PER_SECOND }
fn default_cost() -> u32 { DEFAULT_COST }
