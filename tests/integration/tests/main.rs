//! End-to-end tests for the session store.
//!
//! Most tests run over the in-memory cache. Tests marked `#[ignore]` need
//! Docker for an ephemeral Redis instance:
//!
//! ```sh
//! cargo test -p kc-integration-tests -- --ignored
//! ```

mod common;
mod concurrency;
mod lifecycle;
mod redis;
mod relationships;
