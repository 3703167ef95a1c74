//! Error types for vault-core operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VaultError {
    /// The configuration tree is structurally invalid (missing lists,
    /// malformed entries, unknown privacy level). Raised at load time —
    /// the vault never starts from a partially valid config.
    #[error("Invalid configuration: {0}")]
    ConfigValidation(String),

    /// The configuration file path is untrusted or unusable (traversal
    /// component, nonexistent, not a regular file, outside the allowed
    /// directory). Distinct from `ConfigValidation` so callers can tell
    /// "bad input file" from "bad file contents".
    #[error("Invalid configuration path: {0}")]
    PathValidation(String),

    /// A query window exceeds the configured ceiling. Hard rejection:
    /// a truncated availability answer would be wrong, not just incomplete.
    #[error("Date range of {days} days exceeds the maximum of {max_days} days")]
    RangeTooWide { days: i64, max_days: i64 },

    /// A query window ends at or before it starts.
    #[error("Invalid time window: {start} is not before {end}")]
    InvalidWindow { start: String, end: String },

    /// A datetime string could not be parsed as either an RFC 3339 instant
    /// or a naive local datetime.
    #[error("Invalid datetime: {0}")]
    InvalidDatetime(String),
}

pub type Result<T> = std::result::Result<T, VaultError>;
