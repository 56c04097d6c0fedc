//! Transaction staging for the replicated cache.
//!
//! A [`CacheTransaction`] collects writes without touching the cache. The
//! writes become visible only when the transaction is handed to
//! [`ReplicatedCache::commit`](crate::ReplicatedCache::commit), which applies
//! all of them or none of them.

use std::collections::BTreeMap;

/// A single write operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp<V> {
    /// Store the value, creating or overwriting the key.
    Set(V),
    /// Delete the key.
    Remove,
}

/// A write staged in a transaction together with its precondition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedWrite<V> {
    /// Operation to apply at commit.
    pub op: WriteOp<V>,
    /// Version the key must still have at commit time.
    ///
    /// `None` means the write is unconditional.
    pub expected: Option<u64>,
}

/// Writes staged for one unit of work.
///
/// Keys are unique: staging a key again replaces the pending operation but
/// keeps the precondition from the first staging, which is the version the
/// transaction originally read.
#[derive(Debug, Clone)]
pub struct CacheTransaction<V> {
    writes: BTreeMap<String, StagedWrite<V>>,
}

impl<V> Default for CacheTransaction<V> {
    fn default() -> Self {
        Self {
            writes: BTreeMap::new(),
        }
    }
}

impl<V> CacheTransaction<V> {
    /// Begins an empty transaction.
    #[must_use]
    pub fn begin() -> Self {
        Self::default()
    }

    /// Stages an unconditional write.
    pub fn put(&mut self, key: impl Into<String>, value: V) {
        self.stage(key.into(), WriteOp::Set(value), None);
    }

    /// Stages a write that only applies if the key is still at `expected`.
    pub fn replace(&mut self, key: impl Into<String>, value: V, expected: u64) {
        self.stage(key.into(), WriteOp::Set(value), Some(expected));
    }

    /// Stages a removal.
    ///
    /// With `expected` set the removal fails the commit if another writer
    /// changed the key in the meantime.
    pub fn remove(&mut self, key: impl Into<String>, expected: Option<u64>) {
        self.stage(key.into(), WriteOp::Remove, expected);
    }

    fn stage(&mut self, key: String, op: WriteOp<V>, expected: Option<u64>) {
        match self.writes.get_mut(&key) {
            Some(staged) => staged.op = op,
            None => {
                self.writes.insert(key, StagedWrite { op, expected });
            }
        }
    }

    /// Returns the staged write for a key.
    #[must_use]
    pub fn staged(&self, key: &str) -> Option<&StagedWrite<V>> {
        self.writes.get(key)
    }

    /// Number of distinct keys with a pending write.
    #[must_use]
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Returns `true` if nothing has been staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Iterates over the staged writes in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &StagedWrite<V>)> {
        self.writes.iter()
    }

    /// Consumes the transaction, yielding its writes in key order.
    pub fn into_writes(self) -> impl Iterator<Item = (String, StagedWrite<V>)> {
        self.writes.into_iter()
    }

    /// Discards every staged write.
    pub fn rollback(self) {
        drop(self);
    }
}
