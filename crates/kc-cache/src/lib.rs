//! # kc-cache
//!
//! Replicated cache facade for Keycloak Rust.
//!
//! This crate defines the keyed store that sessions are persisted through.
//! The store is the system of record: it owns durability, replication and
//! cross-node consistency. Callers stage writes in a [`CacheTransaction`]
//! and hand the whole batch to [`ReplicatedCache::commit`].
//!
//! ## Consistency
//!
//! Every stored value carries a version. A staged replace records the version
//! it was read at, and commit rejects the batch with
//! [`CacheError::StaleWrite`] if any key moved on. Callers resolve that by
//! re-reading and re-applying their change.
//!
//! ## Backends
//!
//! - [`InMemoryCache`] - single process, for tests and single-node setups
//! - `kc-cache-redis` - Redis, for clustered deployments
//!
//! ## Example
//!
//! ```ignore
//! use kc_cache::{CacheTransaction, InMemoryCache, ReplicatedCache};
//!
//! let cache = InMemoryCache::new();
//! let current = cache.get("session:1").await?.expect("exists");
//!
//! let mut tx = CacheTransaction::begin();
//! tx.replace("session:1", updated, current.version);
//! cache.commit(tx).await?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod memory;
pub mod provider;
pub mod transaction;

pub use error::{CacheError, CacheResult};
pub use memory::InMemoryCache;
pub use provider::{ReplicatedCache, Versioned};
pub use transaction::{CacheTransaction, StagedWrite, WriteOp};
