//! Session error types.

use kc_cache::CacheError;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during session operations.
///
/// Plain lookups never fail with `NotFound`; they return `Ok(None)`.
/// `NotFound` is reserved for mutations that need the target to exist.
#[derive(Debug, Error)]
pub enum SessionError {
    /// An entity a mutation depends on does not exist.
    #[error("{entity_type} not found: {id}")]
    NotFound {
        /// Type of entity (e.g., "UserSession", "Client").
        entity_type: &'static str,
        /// Entity ID.
        id: Uuid,
    },

    /// Client session is already attached to a different user session.
    ///
    /// The caller must detach it first.
    #[error(
        "client session {client_session} is attached to user session {attached_to}, \
         cannot attach to {requested}"
    )]
    ConflictingAttachment {
        /// Client session being attached.
        client_session: Uuid,
        /// User session it is currently attached to.
        attached_to: Uuid,
        /// User session the attach was requested for.
        requested: Uuid,
    },

    /// A concurrent writer kept invalidating the unit of work.
    #[error("stale write on '{key}' after {attempts} attempt(s)")]
    StaleWrite {
        /// Key whose version check failed last.
        key: String,
        /// Number of commit attempts made.
        attempts: u32,
    },

    /// Commit was requested on a transaction marked rollback-only.
    #[error("transaction aborted")]
    TransactionAborted,

    /// Directory (realm/client/user) lookup failed.
    #[error("directory error: {0}")]
    Directory(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Cache failure surfaced from the underlying store.
    #[error("session cache error: {0}")]
    Cache(#[from] CacheError),
}

impl SessionError {
    /// Creates a not found error for an entity.
    #[must_use]
    pub const fn not_found(entity_type: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity_type, id }
    }

    /// Checks if this is a not found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Checks if this is an attachment conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::ConflictingAttachment { .. })
    }

    /// Checks if retrying the unit of work later may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::StaleWrite { .. }
                | Self::Cache(CacheError::Connection(_) | CacheError::Timeout)
        )
    }
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
