//! Session provider.
//!
//! The provider owns the cache, the realm directory and the configuration,
//! hands out [`SessionTransaction`]s, and runs the realm-wide queries and
//! sweeps (expiry, realm/user/client removal).

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use futures::future::BoxFuture;
use kc_cache::ReplicatedCache;
use kc_core::event::{Event, EventType};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::client_session::ClientSessionEntity;
use crate::config::SessionConfig;
use crate::directory::DirectoryProvider;
use crate::entity::SessionEntity;
use crate::error::{SessionError, SessionResult};
use crate::transaction::SessionTransaction;
use crate::user_session::UserSessionEntity;

/// Receives session events after the transaction that produced them commits.
pub trait SessionEventListener: Send + Sync {
    /// Called once per event, in the order the events were produced.
    fn on_event(&self, event: &Event);
}

pub(crate) struct ProviderInner {
    pub(crate) cache: Arc<dyn ReplicatedCache<SessionEntity>>,
    pub(crate) directory: Arc<dyn DirectoryProvider>,
    pub(crate) config: SessionConfig,
    listeners: RwLock<Vec<Arc<dyn SessionEventListener>>>,
}

impl ProviderInner {
    pub(crate) fn publish(&self, events: &[Event]) {
        if events.is_empty() {
            return;
        }
        let listeners = self.listeners.read().clone();
        for event in events {
            for listener in &listeners {
                listener.on_event(event);
            }
        }
    }
}

/// Entry point of the session store.
///
/// Cheap to clone; clones share the cache, directory and listeners.
#[derive(Clone)]
pub struct SessionProvider {
    inner: Arc<ProviderInner>,
}

impl std::fmt::Debug for SessionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionProvider")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl SessionProvider {
    /// Creates a provider.
    ///
    /// ## Errors
    ///
    /// Returns `SessionError::Configuration` if the configuration is invalid.
    pub fn new(
        cache: Arc<dyn ReplicatedCache<SessionEntity>>,
        directory: Arc<dyn DirectoryProvider>,
        config: SessionConfig,
    ) -> SessionResult<Self> {
        config.validate()?;
        tracing::info!(
            idle_timeout_secs = config.idle_timeout_secs,
            max_lifespan_secs = config.max_lifespan_secs,
            max_commit_attempts = config.max_commit_attempts,
            "session provider initialized"
        );
        Ok(Self {
            inner: Arc::new(ProviderInner {
                cache,
                directory,
                config,
                listeners: RwLock::new(Vec::new()),
            }),
        })
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Registers a listener for committed session events.
    pub fn register_listener(&self, listener: Arc<dyn SessionEventListener>) {
        self.inner.listeners.write().push(listener);
    }

    /// Starts a transaction.
    #[must_use]
    pub fn begin(&self) -> SessionTransaction {
        SessionTransaction::new(Arc::clone(&self.inner))
    }

    /// Runs `work` in a transaction and commits it.
    ///
    /// If the commit fails because another writer changed a session this
    /// unit of work read, `work` runs again in a fresh transaction, up to
    /// `max_commit_attempts` times in total. An error from `work` rolls back.
    /// A transaction marked rollback-only rolls back and still yields the value.
    ///
    /// ## Errors
    ///
    /// - The error returned by `work`
    /// - `SessionError::StaleWrite` once every attempt went stale
    /// - `SessionError::Cache` if the store failed
    pub async fn with_transaction<T, F>(&self, mut work: F) -> SessionResult<T>
    where
        F: for<'t> FnMut(&'t mut SessionTransaction) -> BoxFuture<'t, SessionResult<T>>,
    {
        let max_attempts = self.inner.config.max_commit_attempts.max(1);
        let mut attempt = 1;

        loop {
            let mut tx = self.begin();
            let value = match work(&mut tx).await {
                Ok(value) => value,
                Err(err) => {
                    tx.rollback();
                    return Err(err);
                }
            };

            if tx.is_rollback_only() {
                tx.rollback();
                return Ok(value);
            }

            match tx.commit().await {
                Ok(()) => return Ok(value),
                Err(SessionError::StaleWrite { key, .. }) if attempt < max_attempts => {
                    tracing::warn!(attempt, key = %key, "stale session write, retrying");
                    attempt += 1;
                }
                Err(SessionError::StaleWrite { key, .. }) => {
                    return Err(SessionError::StaleWrite {
                        key,
                        attempts: attempt,
                    });
                }
                Err(err) => return Err(err),
            }
        }
    }

    // === Queries ===

    /// Committed entities of a realm.
    ///
    /// Sweeps only take candidate ids from here and re-load each one in its
    /// own transaction, so removals are checked against the version read.
    async fn realm_entities(&self, realm_id: Uuid) -> SessionResult<Vec<SessionEntity>> {
        Ok(self
            .inner
            .cache
            .scan()
            .await?
            .into_iter()
            .map(|(_, stored)| stored.value)
            .filter(|e| e.realm_id() == realm_id)
            .collect())
    }

    /// Ids of a user's sessions in a realm, sorted.
    pub async fn get_user_sessions(
        &self,
        realm_id: Uuid,
        user_id: Uuid,
    ) -> SessionResult<Vec<Uuid>> {
        let ids: BTreeSet<Uuid> = self
            .realm_entities(realm_id)
            .await?
            .into_iter()
            .filter_map(|e| match e {
                SessionEntity::User(u) if u.user_id == user_id => Some(u.id),
                _ => None,
            })
            .collect();
        Ok(ids.into_iter().collect())
    }

    /// Ids of the user sessions holding a client session for `client_id`, sorted.
    pub async fn get_user_sessions_by_client(
        &self,
        realm_id: Uuid,
        client_id: Uuid,
    ) -> SessionResult<Vec<Uuid>> {
        let ids: BTreeSet<Uuid> = self
            .realm_entities(realm_id)
            .await?
            .into_iter()
            .filter_map(|e| match e {
                SessionEntity::Client(c) if c.client_id == client_id => c.user_session,
                _ => None,
            })
            .collect();
        Ok(ids.into_iter().collect())
    }

    /// Number of user sessions holding a client session for `client_id`.
    pub async fn active_user_session_count(
        &self,
        realm_id: Uuid,
        client_id: Uuid,
    ) -> SessionResult<u64> {
        let ids = self.get_user_sessions_by_client(realm_id, client_id).await?;
        Ok(ids.len() as u64)
    }

    /// Finds the user session created for an identity broker session.
    pub async fn get_user_session_by_broker_session_id(
        &self,
        realm_id: Uuid,
        broker_session_id: &str,
    ) -> SessionResult<Option<Uuid>> {
        Ok(self
            .realm_entities(realm_id)
            .await?
            .into_iter()
            .find_map(|e| match e {
                SessionEntity::User(u)
                    if u.broker_session_id.as_deref() == Some(broker_session_id) =>
                {
                    Some(u.id)
                }
                _ => None,
            }))
    }

    // === Sweeps ===

    /// Runs `remove` once per id in its own retried transaction and counts
    /// the ids it removed. An id still contended after every attempt is
    /// skipped; the next sweep picks it up again.
    async fn remove_each<F>(&self, ids: Vec<Uuid>, mut remove: F) -> SessionResult<u64>
    where
        F: for<'t> FnMut(&'t mut SessionTransaction, Uuid) -> BoxFuture<'t, SessionResult<bool>>,
    {
        let mut removed = 0u64;
        for id in ids {
            match self.with_transaction(|tx| remove(tx, id)).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(SessionError::StaleWrite { key, attempts }) => {
                    tracing::warn!(key = %key, attempts, "contended session skipped by sweep");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(removed)
    }

    /// Removes expired sessions in a realm. Returns how many were removed.
    ///
    /// User sessions expire by idle timeout or lifespan and take their client
    /// sessions with them. Unattached client sessions expire by idle timeout.
    pub async fn remove_expired(&self, realm_id: Uuid) -> SessionResult<u64> {
        let now = Utc::now();
        let entities = self.realm_entities(realm_id).await?;

        let user_sessions = ids_of(&entities, |e| matches!(e, SessionEntity::User(_)));
        let mut removed = self
            .remove_each(user_sessions, move |tx, id| {
                Box::pin(async move {
                    let Some(user) = tx.load::<UserSessionEntity>(id).await? else {
                        return Ok(false);
                    };
                    if !tx.config().is_user_session_expired(
                        user.started,
                        user.last_session_refresh,
                        user.remember_me,
                        now,
                    ) {
                        return Ok(false);
                    }
                    tx.remove_user_session_as(realm_id, id, EventType::SessionExpired)
                        .await
                })
            })
            .await?;

        let client_sessions = ids_of(&entities, |e| {
            matches!(e, SessionEntity::Client(c) if c.user_session.is_none())
        });
        removed += self
            .remove_each(client_sessions, move |tx, id| {
                Box::pin(async move {
                    let Some(client) = tx.load::<ClientSessionEntity>(id).await? else {
                        return Ok(false);
                    };
                    if client.user_session.is_some()
                        || !tx.config().is_client_session_expired(client.timestamp, now)
                    {
                        return Ok(false);
                    }
                    tx.remove_client_session_as(realm_id, id, EventType::SessionExpired)
                        .await
                })
            })
            .await?;

        tracing::info!(realm_id = %realm_id, removed, "expired sessions removed");
        Ok(removed)
    }

    /// Removes every session of a realm. Returns how many were removed.
    pub async fn on_realm_removed(&self, realm_id: Uuid) -> SessionResult<u64> {
        let entities = self.realm_entities(realm_id).await?;

        let user_sessions = ids_of(&entities, |e| matches!(e, SessionEntity::User(_)));
        let mut removed = self
            .remove_each(user_sessions, move |tx, id| {
                Box::pin(async move { tx.remove_user_session(realm_id, id).await })
            })
            .await?;

        // Client sessions cascaded above are already gone and not counted twice.
        let client_sessions = ids_of(&entities, |e| matches!(e, SessionEntity::Client(_)));
        removed += self
            .remove_each(client_sessions, move |tx, id| {
                Box::pin(async move { tx.remove_client_session(realm_id, id).await })
            })
            .await?;

        tracing::info!(realm_id = %realm_id, removed, "realm sessions removed");
        Ok(removed)
    }

    /// Removes every session of a user. Returns how many user sessions were removed.
    pub async fn on_user_removed(&self, realm_id: Uuid, user_id: Uuid) -> SessionResult<u64> {
        let entities = self.realm_entities(realm_id).await?;
        let user_sessions = ids_of(&entities, |e| {
            matches!(e, SessionEntity::User(u) if u.user_id == user_id)
        });

        let removed = self
            .remove_each(user_sessions, move |tx, id| {
                Box::pin(async move { tx.remove_user_session(realm_id, id).await })
            })
            .await?;

        tracing::info!(realm_id = %realm_id, user_id = %user_id, removed, "user sessions removed");
        Ok(removed)
    }

    /// Removes every client session of a client. Returns how many were removed.
    pub async fn on_client_removed(&self, realm_id: Uuid, client_id: Uuid) -> SessionResult<u64> {
        let entities = self.realm_entities(realm_id).await?;
        let client_sessions = ids_of(&entities, |e| {
            matches!(e, SessionEntity::Client(c) if c.client_id == client_id)
        });

        let removed = self
            .remove_each(client_sessions, move |tx, id| {
                Box::pin(async move { tx.remove_client_session(realm_id, id).await })
            })
            .await?;

        tracing::info!(realm_id = %realm_id, client_id = %client_id, removed, "client sessions removed");
        Ok(removed)
    }
}

/// Sorted ids of the entities matching `pred`.
fn ids_of(entities: &[SessionEntity], pred: impl Fn(&SessionEntity) -> bool) -> Vec<Uuid> {
    let ids: BTreeSet<Uuid> = entities.iter().filter(|e| pred(e)).map(SessionEntity::id).collect();
    ids.into_iter().collect()
}
