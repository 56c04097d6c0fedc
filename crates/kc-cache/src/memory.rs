//! In-process cache backend.
//!
//! Used for single-node deployments and tests. Commit holds the write lock
//! while it validates and applies, so concurrent commits are serialized and
//! each one is all-or-nothing.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{CacheError, CacheResult};
use crate::provider::{ReplicatedCache, Versioned};
use crate::transaction::{CacheTransaction, WriteOp};

/// In-memory implementation of [`ReplicatedCache`].
#[derive(Debug)]
pub struct InMemoryCache<V> {
    entries: RwLock<HashMap<String, Versioned<V>>>,
}

impl<V> InMemoryCache<V> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if the cache holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<V> Default for InMemoryCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

fn next_version<V>(entries: &HashMap<String, Versioned<V>>, key: &str) -> u64 {
    entries.get(key).map_or(1, |e| e.version + 1)
}

#[async_trait]
impl<V> ReplicatedCache<V> for InMemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> CacheResult<Option<Versioned<V>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn put(&self, key: &str, value: V) -> CacheResult<u64> {
        let mut entries = self.entries.write();
        let version = next_version(&entries, key);
        entries.insert(key.to_string(), Versioned::new(value, version));
        Ok(version)
    }

    async fn remove(&self, key: &str) -> CacheResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn commit(&self, tx: CacheTransaction<V>) -> CacheResult<()> {
        if tx.is_empty() {
            return Ok(());
        }

        let mut entries = self.entries.write();

        for (key, staged) in tx.iter() {
            if let Some(expected) = staged.expected {
                let actual = entries.get(key).map(|e| e.version);
                if actual != Some(expected) {
                    return Err(CacheError::StaleWrite {
                        key: key.clone(),
                        expected,
                        actual,
                    });
                }
            }
        }

        let mut applied = 0usize;
        for (key, staged) in tx.into_writes() {
            match staged.op {
                WriteOp::Set(value) => {
                    let version = next_version(&entries, &key);
                    entries.insert(key, Versioned::new(value, version));
                }
                WriteOp::Remove => {
                    entries.remove(&key);
                }
            }
            applied += 1;
        }

        tracing::trace!(writes = applied, "in-memory cache commit applied");
        Ok(())
    }

    async fn scan(&self) -> CacheResult<Vec<(String, Versioned<V>)>> {
        Ok(self
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
