//! Error types for the lowmem core library.
//!
//! The shrink path itself never fails; every outcome there is a
//! [`crate::Decision`]. These errors cover the edges: configuration,
//! parameter text and procfs collaborators.

use thiserror::Error;

/// Top-level error type for all lowmem operations.
#[derive(Error, Debug)]
pub enum LowmemError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A runtime parameter could not be applied.
    #[error("Invalid parameter {name}={value:?}: {reason}")]
    InvalidParameter {
        /// Parameter name (`adj`, `minfree`, `debug_level`, `cost`).
        name: String,
        /// Raw text that was rejected.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A procfs file did not have the expected shape.
    #[error("Malformed {file}: {reason}")]
    Procfs {
        /// Which file (e.g. `/proc/meminfo`, `stat`).
        file: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, LowmemError>;
