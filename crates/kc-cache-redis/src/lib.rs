//! # kc-cache-redis
//!
//! Redis backend for the Keycloak Rust replicated session cache.
//!
//! This crate implements [`kc_cache::ReplicatedCache`] on top of Redis using
//! the `fred` crate. All nodes pointing at the same Redis namespace share one
//! consistent view of sessions: every commit is a single server-side script
//! that checks versions and writes atomically.
//!
//! ## Example
//!
//! ```ignore
//! use kc_cache_redis::{RedisCache, RedisConfig};
//! use kc_session::SessionEntity;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RedisConfig::from_env();
//!
//!     let cache: RedisCache<SessionEntity> = RedisCache::connect(config).await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cache;
pub mod config;
pub mod error;

pub use cache::RedisCache;
pub use config::RedisConfig;
