//! # kc-session
//!
//! Replicated user and client session store for Keycloak Rust.
//!
//! Sessions live in a [`ReplicatedCache`](kc_cache::ReplicatedCache) and are
//! only changed inside a [`SessionTransaction`]. A client session may be
//! attached to at most one user session, and the user session lists every
//! client session attached to it; both sides are always changed together.
//!
//! ```ignore
//! let provider = SessionProvider::new(cache, directory, SessionConfig::from_env())?;
//!
//! let mut tx = provider.begin();
//! let user_session = tx.create_user_session(NewUserSession::new(realm, user, "alice")).await?.id();
//! let mut client_session = tx.create_client_session(realm, client).await?;
//! client_session.set_user_session(Some(user_session)).await?;
//! tx.commit().await?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod adapter;
pub mod client_session;
pub mod config;
pub mod directory;
pub mod entity;
pub mod error;
pub mod provider;
pub mod transaction;
pub mod user_session;

#[cfg(test)]
mod testing;

pub use adapter::{ClientSessionAdapter, SessionAdapter, UserSessionAdapter};
pub use client_session::{AuthenticatorStatus, ClientSessionEntity};
pub use config::SessionConfig;
pub use directory::{DirectoryClient, DirectoryProvider, DirectoryUser, InMemoryDirectory};
pub use entity::{ReplicatedEntity, SessionEntity, SessionKind};
pub use error::{SessionError, SessionResult};
pub use provider::{SessionEventListener, SessionProvider};
pub use transaction::{NewUserSession, SessionTransaction};
pub use user_session::{SessionState, UserSessionEntity};
