//! Replicated cache facade.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CacheResult;
use crate::transaction::CacheTransaction;

/// A cached value with the version it was stored at.
///
/// Versions start at 1 and grow by one on every successful write of the
/// key. They are the basis for optimistic concurrency: a staged replace
/// carries the version it was read at and is rejected if the key moved on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<V> {
    /// Stored value.
    pub value: V,
    /// Version of the value.
    pub version: u64,
}

impl<V> Versioned<V> {
    /// Wraps a value at the given version.
    pub const fn new(value: V, version: u64) -> Self {
        Self { value, version }
    }
}

/// Keyed store with transactional, version-checked writes.
///
/// This is the system of record for sessions. Durability and cross-node
/// visibility are the implementation's responsibility; callers must treat
/// every call as fallible.
#[async_trait]
pub trait ReplicatedCache<V>: Send + Sync
where
    V: Send + Sync + 'static,
{
    /// Gets a value and its version.
    ///
    /// Returns `None` if the key doesn't exist.
    async fn get(&self, key: &str) -> CacheResult<Option<Versioned<V>>>;

    /// Stores a value unconditionally, outside any transaction.
    ///
    /// Returns the new version.
    async fn put(&self, key: &str, value: V) -> CacheResult<u64>;

    /// Removes a key unconditionally.
    ///
    /// Returns `Ok(())` even if the key doesn't exist.
    async fn remove(&self, key: &str) -> CacheResult<()>;

    /// Applies every staged write atomically.
    ///
    /// If any precondition fails, nothing is written and
    /// [`CacheError::StaleWrite`](crate::CacheError::StaleWrite) is returned.
    async fn commit(&self, tx: CacheTransaction<V>) -> CacheResult<()>;

    /// Returns a snapshot of every entry.
    async fn scan(&self) -> CacheResult<Vec<(String, Versioned<V>)>>;
}
