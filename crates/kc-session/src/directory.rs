//! Realm directory lookups.
//!
//! Sessions reference clients and users by id only. Resolving those ids is
//! the job of the realm directory, which lives outside the session store.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SessionResult;

/// A client as seen by the session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryClient {
    /// Internal client id.
    pub id: Uuid,
    /// Realm the client belongs to.
    pub realm_id: Uuid,
    /// Public client identifier (e.g. `account-console`).
    pub client_id: String,
    /// Protocol the client speaks (`openid-connect`, `saml`).
    pub protocol: String,
}

/// A user as seen by the session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
    /// User id.
    pub id: Uuid,
    /// Realm the user belongs to.
    pub realm_id: Uuid,
    /// Username.
    pub username: String,
}

/// Resolves clients and users within a realm.
///
/// Implementations must be thread-safe and support concurrent access.
#[async_trait]
pub trait DirectoryProvider: Send + Sync {
    /// Gets a client by internal id.
    async fn get_client(&self, realm_id: Uuid, id: Uuid) -> SessionResult<Option<DirectoryClient>>;

    /// Gets a user by id.
    async fn get_user(&self, realm_id: Uuid, id: Uuid) -> SessionResult<Option<DirectoryUser>>;
}

/// In-memory directory for tests and embedded use.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    clients: RwLock<HashMap<(Uuid, Uuid), DirectoryClient>>,
    users: RwLock<HashMap<(Uuid, Uuid), DirectoryUser>>,
}

impl InMemoryDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a client and returns it.
    pub fn add_client(
        &self,
        realm_id: Uuid,
        client_id: impl Into<String>,
        protocol: impl Into<String>,
    ) -> DirectoryClient {
        let client = DirectoryClient {
            id: Uuid::now_v7(),
            realm_id,
            client_id: client_id.into(),
            protocol: protocol.into(),
        };
        self.clients
            .write()
            .insert((realm_id, client.id), client.clone());
        client
    }

    /// Registers a user and returns it.
    pub fn add_user(&self, realm_id: Uuid, username: impl Into<String>) -> DirectoryUser {
        let user = DirectoryUser {
            id: Uuid::now_v7(),
            realm_id,
            username: username.into(),
        };
        self.users.write().insert((realm_id, user.id), user.clone());
        user
    }

    /// Removes a client.
    pub fn remove_client(&self, realm_id: Uuid, id: Uuid) -> Option<DirectoryClient> {
        self.clients.write().remove(&(realm_id, id))
    }

    /// Removes a user.
    pub fn remove_user(&self, realm_id: Uuid, id: Uuid) -> Option<DirectoryUser> {
        self.users.write().remove(&(realm_id, id))
    }
}

#[async_trait]
impl DirectoryProvider for InMemoryDirectory {
    async fn get_client(&self, realm_id: Uuid, id: Uuid) -> SessionResult<Option<DirectoryClient>> {
        Ok(self.clients.read().get(&(realm_id, id)).cloned())
    }

    async fn get_user(&self, realm_id: Uuid, id: Uuid) -> SessionResult<Option<DirectoryUser>> {
        Ok(self.users.read().get(&(realm_id, id)).cloned())
    }
}
