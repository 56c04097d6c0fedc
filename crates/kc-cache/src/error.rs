//! Cache error types.

use std::fmt;

/// Cache operation errors.
#[derive(Debug)]
pub enum CacheError {
    /// Connection to cache backend failed.
    Connection(String),
    /// Serialization/deserialization error.
    Serialization(String),
    /// Cache operation timed out.
    Timeout,
    /// Invalid cache configuration.
    Configuration(String),
    /// A staged write was based on a version that is no longer current.
    ///
    /// Raised at commit time when another writer modified or removed the
    /// key after it was read. The whole transaction is rejected.
    StaleWrite {
        /// Key whose precondition failed.
        key: String,
        /// Version the writer read the value at.
        expected: u64,
        /// Version currently stored, `None` when the key is gone.
        actual: Option<u64>,
    },
    /// Internal cache error.
    Internal(String),
}

impl CacheError {
    /// Returns whether this error is a stale-write conflict that can be
    /// resolved by re-reading and retrying.
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        matches!(self, Self::StaleWrite { .. })
    }
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(msg) => write!(f, "cache connection error: {msg}"),
            Self::Serialization(msg) => write!(f, "cache serialization error: {msg}"),
            Self::Timeout => write!(f, "cache operation timed out"),
            Self::Configuration(msg) => write!(f, "cache configuration error: {msg}"),
            Self::StaleWrite {
                key,
                expected,
                actual: Some(actual),
            } => write!(
                f,
                "stale write on '{key}': read at version {expected}, now {actual}"
            ),
            Self::StaleWrite {
                key,
                expected,
                actual: None,
            } => write!(
                f,
                "stale write on '{key}': read at version {expected}, key was removed"
            ),
            Self::Internal(msg) => write!(f, "internal cache error: {msg}"),
        }
    }
}

impl std::error::Error for CacheError {}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
