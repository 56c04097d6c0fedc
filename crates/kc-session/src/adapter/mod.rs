//! Session adapters.
//!
//! An adapter is the handle through which a single session is read and
//! changed inside a [`SessionTransaction`]. Every setter updates the
//! in-transaction copy and stages a replace of the whole entity, so nothing
//! reaches the cache until the transaction commits.
//!
//! Getters that return collections return copies; changing a copy never
//! changes the session.

mod client;
mod user;

use uuid::Uuid;

use crate::client_session::ClientSessionEntity;
use crate::entity::{ReplicatedEntity, SessionKind};
use crate::transaction::SessionTransaction;
use crate::user_session::UserSessionEntity;

/// Handle to one session inside a transaction.
pub struct SessionAdapter<'tx, E: ReplicatedEntity> {
    tx: &'tx mut SessionTransaction,
    entity: E,
}

/// Adapter over a user session.
pub type UserSessionAdapter<'tx> = SessionAdapter<'tx, UserSessionEntity>;

/// Adapter over a client session.
pub type ClientSessionAdapter<'tx> = SessionAdapter<'tx, ClientSessionEntity>;

impl<'tx, E: ReplicatedEntity> SessionAdapter<'tx, E> {
    pub(crate) fn new(tx: &'tx mut SessionTransaction, entity: E) -> Self {
        Self { tx, entity }
    }

    /// Session id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.entity.id()
    }

    /// Realm the session belongs to.
    #[must_use]
    pub fn realm_id(&self) -> Uuid {
        self.entity.realm_id()
    }

    /// Kind of session behind this adapter.
    #[must_use]
    pub const fn kind(&self) -> SessionKind {
        E::KIND
    }

    /// Returns a copy of the current in-transaction state.
    #[must_use]
    pub fn snapshot(&self) -> E {
        self.entity.clone()
    }

    /// Stages the current state as a replace of the stored entity.
    fn update(&mut self) {
        self.tx.stage(self.entity.clone().into_entity());
    }
}

impl<E: ReplicatedEntity + std::fmt::Debug> std::fmt::Debug for SessionAdapter<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionAdapter")
            .field("entity", &self.entity)
            .finish_non_exhaustive()
    }
}
