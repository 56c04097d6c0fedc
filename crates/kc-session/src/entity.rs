//! Replicated session entities.
//!
//! The cache stores a closed set of entity kinds behind [`SessionEntity`].
//! [`ReplicatedEntity`] gives both kinds the same capabilities (identity,
//! cache key, conversion to and from the stored form) so adapters and the
//! transaction can handle them generically.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::client_session::ClientSessionEntity;
use crate::user_session::UserSessionEntity;

/// Kind of a session entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    /// SSO session shared across clients.
    User,
    /// One client's login flow.
    Client,
}

impl SessionKind {
    /// Name used in errors and logs.
    #[must_use]
    pub const fn entity_type(self) -> &'static str {
        match self {
            Self::User => "UserSession",
            Self::Client => "ClientSession",
        }
    }

    const fn key_prefix(self) -> &'static str {
        match self {
            Self::User => "user-session",
            Self::Client => "client-session",
        }
    }

    /// Cache key of the entity with the given id.
    #[must_use]
    pub fn cache_key(self, id: Uuid) -> String {
        format!("{}:{id}", self.key_prefix())
    }
}

/// A session entity as stored in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionEntity {
    /// User session.
    User(UserSessionEntity),
    /// Client session.
    Client(ClientSessionEntity),
}

impl SessionEntity {
    /// Kind of the entity.
    #[must_use]
    pub const fn kind(&self) -> SessionKind {
        match self {
            Self::User(_) => SessionKind::User,
            Self::Client(_) => SessionKind::Client,
        }
    }

    /// Entity id.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        match self {
            Self::User(e) => e.id,
            Self::Client(e) => e.id,
        }
    }

    /// Realm the entity belongs to.
    #[must_use]
    pub const fn realm_id(&self) -> Uuid {
        match self {
            Self::User(e) => e.realm_id,
            Self::Client(e) => e.realm_id,
        }
    }

    /// Cache key of the entity.
    #[must_use]
    pub fn cache_key(&self) -> String {
        self.kind().cache_key(self.id())
    }
}

/// Capabilities shared by every replicated session entity.
pub trait ReplicatedEntity: Clone + Send + Sync + 'static {
    /// Kind of this entity type.
    const KIND: SessionKind;

    /// Entity id.
    fn id(&self) -> Uuid;

    /// Realm the entity belongs to.
    fn realm_id(&self) -> Uuid;

    /// Wraps the entity in its stored form.
    fn into_entity(self) -> SessionEntity;

    /// Unwraps the stored form, returning `None` for another kind.
    fn from_entity(entity: SessionEntity) -> Option<Self>;

    /// Cache key of the entity.
    fn cache_key(&self) -> String {
        Self::KIND.cache_key(self.id())
    }
}

impl ReplicatedEntity for UserSessionEntity {
    const KIND: SessionKind = SessionKind::User;

    fn id(&self) -> Uuid {
        self.id
    }

    fn realm_id(&self) -> Uuid {
        self.realm_id
    }

    fn into_entity(self) -> SessionEntity {
        SessionEntity::User(self)
    }

    fn from_entity(entity: SessionEntity) -> Option<Self> {
        match entity {
            SessionEntity::User(e) => Some(e),
            SessionEntity::Client(_) => None,
        }
    }
}

impl ReplicatedEntity for ClientSessionEntity {
    const KIND: SessionKind = SessionKind::Client;

    fn id(&self) -> Uuid {
        self.id
    }

    fn realm_id(&self) -> Uuid {
        self.realm_id
    }

    fn into_entity(self) -> SessionEntity {
        SessionEntity::Client(self)
    }

    fn from_entity(entity: SessionEntity) -> Option<Self> {
        match entity {
            SessionEntity::Client(e) => Some(e),
            SessionEntity::User(_) => None,
        }
    }
}
