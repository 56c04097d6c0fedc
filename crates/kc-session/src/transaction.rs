//! Unit of work over the session cache.
//!
//! A [`SessionTransaction`] is the only path through which sessions are
//! read and changed. It keeps one in-memory copy per entity (the version it
//! was read at included), stages every change as a cache write, and makes
//! all of them visible at once on [`SessionTransaction::commit`].
//!
//! Relationship changes between a client session and a user session always
//! stage both sides here, so a commit either publishes the whole change or
//! nothing.

use std::collections::HashMap;
use std::sync::Arc;

use kc_cache::{CacheError, CacheTransaction};
use kc_core::event::{Event, EventType};
use uuid::Uuid;

use crate::adapter::{ClientSessionAdapter, SessionAdapter, UserSessionAdapter};
use crate::client_session::ClientSessionEntity;
use crate::config::SessionConfig;
use crate::directory::DirectoryProvider;
use crate::entity::{ReplicatedEntity, SessionEntity, SessionKind};
use crate::error::{SessionError, SessionResult};
use crate::provider::ProviderInner;
use crate::user_session::UserSessionEntity;

/// Parameters for creating a user session.
#[derive(Debug, Clone)]
pub struct NewUserSession {
    /// Realm of the session.
    pub realm_id: Uuid,
    /// Authenticated user.
    pub user_id: Uuid,
    /// Username the user logged in with.
    pub login_username: String,
    /// IP address of the client.
    pub ip_address: Option<String>,
    /// Authentication method used.
    pub auth_method: Option<String>,
    /// Whether "Remember Me" was selected.
    pub remember_me: bool,
    /// Broker session ID (for federated logins).
    pub broker_session_id: Option<String>,
    /// User ID at the identity broker.
    pub broker_user_id: Option<String>,
}

impl NewUserSession {
    /// Creates parameters with only the required fields.
    #[must_use]
    pub fn new(realm_id: Uuid, user_id: Uuid, login_username: impl Into<String>) -> Self {
        Self {
            realm_id,
            user_id,
            login_username: login_username.into(),
            ip_address: None,
            auth_method: None,
            remember_me: false,
            broker_session_id: None,
            broker_user_id: None,
        }
    }

    /// Sets the IP address.
    #[must_use]
    pub fn with_ip_address(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    /// Sets the authentication method.
    #[must_use]
    pub fn with_auth_method(mut self, method: impl Into<String>) -> Self {
        self.auth_method = Some(method.into());
        self
    }

    /// Sets the remember me flag.
    #[must_use]
    pub const fn with_remember_me(mut self, remember_me: bool) -> Self {
        self.remember_me = remember_me;
        self
    }

    /// Sets the identity broker session and user ids.
    #[must_use]
    pub fn with_broker(
        mut self,
        broker_session_id: impl Into<String>,
        broker_user_id: impl Into<String>,
    ) -> Self {
        self.broker_session_id = Some(broker_session_id.into());
        self.broker_user_id = Some(broker_user_id.into());
        self
    }
}

#[derive(Debug)]
enum Slot {
    /// Loaded or created in this transaction. `version` is `None` for
    /// entities created here.
    Present {
        entity: SessionEntity,
        version: Option<u64>,
    },
    Removed,
}

/// A unit of work over sessions.
///
/// Obtained from [`SessionProvider::begin`](crate::SessionProvider::begin).
/// Adapters borrow the transaction mutably, so at most one adapter is live at
/// a time and every adapter sees the latest in-transaction state.
///
/// Dropping a transaction without committing discards all staged writes.
pub struct SessionTransaction {
    inner: Arc<ProviderInner>,
    loaded: HashMap<String, Slot>,
    staged: CacheTransaction<SessionEntity>,
    events: Vec<Event>,
    rollback_only: bool,
    finished: bool,
}

impl SessionTransaction {
    pub(crate) fn new(inner: Arc<ProviderInner>) -> Self {
        Self {
            inner,
            loaded: HashMap::new(),
            staged: CacheTransaction::begin(),
            events: Vec::new(),
            rollback_only: false,
            finished: false,
        }
    }

    pub(crate) fn directory(&self) -> &dyn DirectoryProvider {
        self.inner.directory.as_ref()
    }

    pub(crate) fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    // === Creation ===

    /// Creates a user session for a user known to the directory.
    ///
    /// ## Errors
    ///
    /// Returns `SessionError::NotFound` if the user does not exist in the realm.
    pub async fn create_user_session(
        &mut self,
        new: NewUserSession,
    ) -> SessionResult<UserSessionAdapter<'_>> {
        if self
            .directory()
            .get_user(new.realm_id, new.user_id)
            .await?
            .is_none()
        {
            return Err(SessionError::not_found("User", new.user_id));
        }

        let mut entity = UserSessionEntity::new(new.realm_id, new.user_id, new.login_username);
        entity.ip_address = new.ip_address;
        entity.auth_method = new.auth_method;
        entity.remember_me = new.remember_me;
        entity.broker_session_id = new.broker_session_id;
        entity.broker_user_id = new.broker_user_id;

        self.insert_new(entity.clone().into_entity());
        self.events.push(
            Event::builder(EventType::UserSessionStarted, entity.realm_id)
                .user_session(entity.id)
                .user(entity.user_id)
                .build(),
        );
        tracing::debug!(session_id = %entity.id, realm_id = %entity.realm_id, "user session created");

        Ok(SessionAdapter::new(self, entity))
    }

    /// Creates an unattached client session for a client known to the directory.
    ///
    /// ## Errors
    ///
    /// Returns `SessionError::NotFound` if the client does not exist in the realm.
    pub async fn create_client_session(
        &mut self,
        realm_id: Uuid,
        client_id: Uuid,
    ) -> SessionResult<ClientSessionAdapter<'_>> {
        if self
            .directory()
            .get_client(realm_id, client_id)
            .await?
            .is_none()
        {
            return Err(SessionError::not_found("Client", client_id));
        }

        let entity = ClientSessionEntity::new(realm_id, client_id);

        self.insert_new(entity.clone().into_entity());
        self.events.push(
            Event::builder(EventType::ClientSessionStarted, realm_id)
                .client_session(entity.id)
                .client(client_id)
                .build(),
        );
        tracing::debug!(client_session_id = %entity.id, realm_id = %realm_id, "client session created");

        Ok(SessionAdapter::new(self, entity))
    }

    // === Lookup ===

    /// Looks up a user session in a realm.
    pub async fn user_session(
        &mut self,
        realm_id: Uuid,
        id: Uuid,
    ) -> SessionResult<Option<UserSessionAdapter<'_>>> {
        match self.load_in_realm::<UserSessionEntity>(realm_id, id).await? {
            Some(entity) => Ok(Some(SessionAdapter::new(self, entity))),
            None => Ok(None),
        }
    }

    /// Looks up a client session in a realm.
    pub async fn client_session(
        &mut self,
        realm_id: Uuid,
        id: Uuid,
    ) -> SessionResult<Option<ClientSessionAdapter<'_>>> {
        match self.load_in_realm::<ClientSessionEntity>(realm_id, id).await? {
            Some(entity) => Ok(Some(SessionAdapter::new(self, entity))),
            None => Ok(None),
        }
    }

    // === Removal ===

    /// Removes a user session together with the client sessions attached to it.
    ///
    /// Returns `false` if the session does not exist.
    pub async fn remove_user_session(&mut self, realm_id: Uuid, id: Uuid) -> SessionResult<bool> {
        self.remove_user_session_as(realm_id, id, EventType::UserSessionRemoved)
            .await
    }

    /// Removes a client session, detaching it from its user session first.
    ///
    /// Returns `false` if the session does not exist.
    pub async fn remove_client_session(&mut self, realm_id: Uuid, id: Uuid) -> SessionResult<bool> {
        self.remove_client_session_as(realm_id, id, EventType::ClientSessionRemoved)
            .await
    }

    pub(crate) async fn remove_user_session_as(
        &mut self,
        realm_id: Uuid,
        id: Uuid,
        event_type: EventType,
    ) -> SessionResult<bool> {
        let Some(user) = self.load_in_realm::<UserSessionEntity>(realm_id, id).await? else {
            return Ok(false);
        };

        let mut client_ids: Vec<Uuid> = user.client_sessions.iter().copied().collect();
        client_ids.sort_unstable();

        for client_session_id in client_ids {
            let Some(client) = self.load::<ClientSessionEntity>(client_session_id).await? else {
                continue;
            };
            // A client session that moved on to another user session stays.
            if client.user_session != Some(id) {
                continue;
            }
            self.stage_remove(&client.cache_key());
            self.events.push(
                Event::builder(event_type, realm_id)
                    .user_session(id)
                    .client_session(client.id)
                    .client(client.client_id)
                    .build(),
            );
        }

        self.stage_remove(&user.cache_key());
        self.events.push(
            Event::builder(event_type, realm_id)
                .user_session(id)
                .user(user.user_id)
                .build(),
        );
        tracing::debug!(session_id = %id, realm_id = %realm_id, "user session removed");

        Ok(true)
    }

    pub(crate) async fn remove_client_session_as(
        &mut self,
        realm_id: Uuid,
        id: Uuid,
        event_type: EventType,
    ) -> SessionResult<bool> {
        let Some(mut client) = self.load_in_realm::<ClientSessionEntity>(realm_id, id).await?
        else {
            return Ok(false);
        };

        if let Some(user_session_id) = client.user_session {
            self.detach_session(user_session_id, &mut client).await?;
        }

        self.stage_remove(&client.cache_key());
        self.events.push(
            Event::builder(event_type, realm_id)
                .client_session(id)
                .client(client.client_id)
                .build(),
        );
        tracing::debug!(client_session_id = %id, realm_id = %realm_id, "client session removed");

        Ok(true)
    }

    // === Relationship maintenance ===

    /// Loads a user session that a relationship change depends on.
    pub(crate) async fn require_user_session(
        &mut self,
        realm_id: Uuid,
        id: Uuid,
    ) -> SessionResult<UserSessionEntity> {
        self.load_in_realm::<UserSessionEntity>(realm_id, id)
            .await?
            .ok_or_else(|| SessionError::not_found(SessionKind::User.entity_type(), id))
    }

    /// Attaches `client` to a user session, staging both sides.
    ///
    /// Rejects a client session attached to a different user session; the
    /// caller must detach it first.
    pub(crate) async fn attach_session(
        &mut self,
        user_session_id: Uuid,
        client: &mut ClientSessionEntity,
    ) -> SessionResult<()> {
        if let Some(attached_to) = client.user_session {
            if attached_to != user_session_id {
                return Err(SessionError::ConflictingAttachment {
                    client_session: client.id,
                    attached_to,
                    requested: user_session_id,
                });
            }
        }

        let mut user = self
            .require_user_session(client.realm_id, user_session_id)
            .await?;

        let added = user.client_sessions.insert(client.id);
        let linked = client.user_session.replace(user_session_id).is_none();

        if added {
            self.stage(user.into_entity());
        }
        if linked {
            self.stage(client.clone().into_entity());
        }
        if added || linked {
            self.events.push(
                Event::builder(EventType::ClientSessionAttached, client.realm_id)
                    .user_session(user_session_id)
                    .client_session(client.id)
                    .client(client.client_id)
                    .build(),
            );
            tracing::debug!(
                session_id = %user_session_id,
                client_session_id = %client.id,
                "client session attached"
            );
        }

        Ok(())
    }

    /// Detaches `client` from a user session, staging both sides.
    ///
    /// Idempotent: a missing user session or an already severed link is not
    /// an error.
    pub(crate) async fn detach_session(
        &mut self,
        user_session_id: Uuid,
        client: &mut ClientSessionEntity,
    ) -> SessionResult<()> {
        let mut changed = false;

        if let Some(mut user) = self.load::<UserSessionEntity>(user_session_id).await? {
            if user.client_sessions.remove(&client.id) {
                self.stage(user.into_entity());
                changed = true;
            }
        }

        if client.user_session == Some(user_session_id) {
            client.user_session = None;
            self.stage(client.clone().into_entity());
            changed = true;
        }

        if changed {
            self.events.push(
                Event::builder(EventType::ClientSessionDetached, client.realm_id)
                    .user_session(user_session_id)
                    .client_session(client.id)
                    .client(client.client_id)
                    .build(),
            );
            tracing::debug!(
                session_id = %user_session_id,
                client_session_id = %client.id,
                "client session detached"
            );
        }

        Ok(())
    }

    // === Entity bookkeeping ===

    async fn load_entity(&mut self, key: String) -> SessionResult<Option<SessionEntity>> {
        if let Some(slot) = self.loaded.get(&key) {
            return Ok(match slot {
                Slot::Present { entity, .. } => Some(entity.clone()),
                Slot::Removed => None,
            });
        }

        let Some(stored) = self.inner.cache.get(&key).await? else {
            return Ok(None);
        };

        self.loaded.insert(
            key,
            Slot::Present {
                entity: stored.value.clone(),
                version: Some(stored.version),
            },
        );
        Ok(Some(stored.value))
    }

    /// Loads an entity through the transaction's identity map.
    pub(crate) async fn load<E: ReplicatedEntity>(&mut self, id: Uuid) -> SessionResult<Option<E>> {
        let entity = self.load_entity(E::KIND.cache_key(id)).await?;
        Ok(entity.and_then(E::from_entity))
    }

    async fn load_in_realm<E: ReplicatedEntity>(
        &mut self,
        realm_id: Uuid,
        id: Uuid,
    ) -> SessionResult<Option<E>> {
        Ok(self
            .load::<E>(id)
            .await?
            .filter(|e| e.realm_id() == realm_id))
    }

    fn insert_new(&mut self, entity: SessionEntity) {
        let key = entity.cache_key();
        self.staged.put(key.clone(), entity.clone());
        self.loaded.insert(
            key,
            Slot::Present {
                entity,
                version: None,
            },
        );
    }

    /// Stages a replace of `entity` and makes it the transaction's copy.
    pub(crate) fn stage(&mut self, entity: SessionEntity) {
        let key = entity.cache_key();
        let version = match self.loaded.get(&key) {
            Some(Slot::Present { version, .. }) => *version,
            _ => None,
        };

        match version {
            Some(version) => self.staged.replace(key.clone(), entity.clone(), version),
            None => self.staged.put(key.clone(), entity.clone()),
        }
        tracing::trace!(key = %key, "session write staged");

        self.loaded.insert(key, Slot::Present { entity, version });
    }

    fn stage_remove(&mut self, key: &str) {
        let expected = match self.loaded.get(key) {
            Some(Slot::Present { version, .. }) => *version,
            _ => None,
        };
        self.staged.remove(key, expected);
        self.loaded.insert(key.to_string(), Slot::Removed);
    }

    // === Transaction control ===

    /// Marks the transaction so that it can only roll back.
    pub fn set_rollback_only(&mut self) {
        self.rollback_only = true;
    }

    /// Returns whether the transaction is marked rollback-only.
    #[must_use]
    pub const fn is_rollback_only(&self) -> bool {
        self.rollback_only
    }

    /// Number of keys with a pending write.
    #[must_use]
    pub fn pending_writes(&self) -> usize {
        self.staged.len()
    }

    /// Commits every staged write atomically and publishes the buffered events.
    ///
    /// ## Errors
    ///
    /// - `SessionError::TransactionAborted` if the transaction is rollback-only
    /// - `SessionError::StaleWrite` if another writer changed an entity read here
    /// - `SessionError::Cache` if the store failed
    pub async fn commit(mut self) -> SessionResult<()> {
        self.finished = true;

        if self.rollback_only {
            tracing::debug!(
                writes = self.staged.len(),
                "rollback-only session transaction discarded on commit"
            );
            return Err(SessionError::TransactionAborted);
        }

        let staged = std::mem::take(&mut self.staged);
        let events = std::mem::take(&mut self.events);
        let writes = staged.len();

        match self.inner.cache.commit(staged).await {
            Ok(()) => {}
            Err(CacheError::StaleWrite { key, .. }) => {
                return Err(SessionError::StaleWrite { key, attempts: 1 });
            }
            Err(err) => return Err(err.into()),
        }

        tracing::debug!(writes, events = events.len(), "session transaction committed");
        self.inner.publish(&events);
        Ok(())
    }

    /// Discards every staged write and buffered event.
    pub fn rollback(mut self) {
        self.finished = true;
        tracing::debug!(
            writes = self.staged.len(),
            "session transaction rolled back"
        );
    }
}

impl Drop for SessionTransaction {
    fn drop(&mut self) {
        if !self.finished && !self.staged.is_empty() {
            tracing::debug!(
                writes = self.staged.len(),
                "uncommitted session transaction dropped, discarding writes"
            );
        }
    }
}
