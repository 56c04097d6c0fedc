use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::SessionAdapter;
use crate::directory::DirectoryUser;
use crate::error::SessionResult;
use crate::user_session::{SessionState, UserSessionEntity};

impl SessionAdapter<'_, UserSessionEntity> {
    /// Id of the authenticated user.
    #[must_use]
    pub const fn user_id(&self) -> Uuid {
        self.entity.user_id
    }

    /// Resolves the authenticated user from the directory.
    ///
    /// Returns `None` if the user has since been deleted.
    pub async fn user(&self) -> SessionResult<Option<DirectoryUser>> {
        self.tx
            .directory()
            .get_user(self.entity.realm_id, self.entity.user_id)
            .await
    }

    /// Username used at login.
    #[must_use]
    pub fn login_username(&self) -> &str {
        &self.entity.login_username
    }

    /// IP address the session was started from.
    #[must_use]
    pub fn ip_address(&self) -> Option<&str> {
        self.entity.ip_address.as_deref()
    }

    /// Authentication method used.
    #[must_use]
    pub fn auth_method(&self) -> Option<&str> {
        self.entity.auth_method.as_deref()
    }

    /// Whether "Remember Me" was selected.
    #[must_use]
    pub const fn is_remember_me(&self) -> bool {
        self.entity.remember_me
    }

    /// Broker session id, for brokered logins.
    #[must_use]
    pub fn broker_session_id(&self) -> Option<&str> {
        self.entity.broker_session_id.as_deref()
    }

    /// User id at the identity broker.
    #[must_use]
    pub fn broker_user_id(&self) -> Option<&str> {
        self.entity.broker_user_id.as_deref()
    }

    /// When the session started.
    #[must_use]
    pub const fn started(&self) -> DateTime<Utc> {
        self.entity.started
    }

    /// Last time the session was refreshed.
    #[must_use]
    pub const fn last_session_refresh(&self) -> DateTime<Utc> {
        self.entity.last_session_refresh
    }

    /// Sets the last refresh time as an administrative override.
    ///
    /// Unlike [`touch`](Self::touch) this may move the time back, which can make
    /// the session immediately eligible for expiry.
    pub fn set_last_session_refresh(&mut self, at: DateTime<Utc>) {
        self.entity.last_session_refresh = at;
        self.update();
    }

    /// Marks the session as refreshed now. Never moves the refresh time back.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.entity.last_session_refresh {
            self.entity.last_session_refresh = now;
            self.update();
        }
    }

    /// Lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.entity.state
    }

    /// Sets the lifecycle state.
    pub fn set_state(&mut self, state: SessionState) {
        self.entity.state = state;
        self.update();
    }

    /// Gets a note.
    #[must_use]
    pub fn note(&self, name: &str) -> Option<&str> {
        self.entity.notes.get(name).map(String::as_str)
    }

    /// Sets a note.
    pub fn set_note(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entity.notes.insert(name.into(), value.into());
        self.update();
    }

    /// Removes a note. Removing an absent note changes nothing.
    pub fn remove_note(&mut self, name: &str) {
        if self.entity.notes.remove(name).is_some() {
            self.update();
        }
    }

    /// Returns a copy of all notes.
    #[must_use]
    pub fn notes(&self) -> HashMap<String, String> {
        self.entity.notes.clone()
    }

    /// Ids of the attached client sessions, sorted.
    #[must_use]
    pub fn client_session_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.entity.client_sessions.iter().copied().collect();
        ids.sort_unstable();
        ids
    }
}
