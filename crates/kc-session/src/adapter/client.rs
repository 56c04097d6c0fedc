use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::SessionAdapter;
use crate::client_session::{AuthenticatorStatus, ClientSessionEntity};
use crate::directory::{DirectoryClient, DirectoryUser};
use crate::error::SessionResult;

impl SessionAdapter<'_, ClientSessionEntity> {
    /// Id of the client this session is for.
    #[must_use]
    pub const fn client_id(&self) -> Uuid {
        self.entity.client_id
    }

    /// Resolves the client from the directory.
    ///
    /// Returns `None` if the client has since been deleted.
    pub async fn client(&self) -> SessionResult<Option<DirectoryClient>> {
        self.tx
            .directory()
            .get_client(self.entity.realm_id, self.entity.client_id)
            .await
    }

    /// Id of the user session this client session is attached to.
    #[must_use]
    pub const fn user_session_id(&self) -> Option<Uuid> {
        self.entity.user_session
    }

    /// Attaches to, moves to, or (with `None`) detaches from a user session.
    ///
    /// Both sides of the relationship are staged in the same transaction.
    /// Setting the current value again changes nothing.
    ///
    /// ## Errors
    ///
    /// Returns `SessionError::NotFound` if `user_session` does not exist in
    /// this session's realm. Nothing is changed in that case.
    pub async fn set_user_session(&mut self, user_session: Option<Uuid>) -> SessionResult<()> {
        match (self.entity.user_session, user_session) {
            (None, None) => return Ok(()),
            (Some(current), Some(requested)) if current == requested => return Ok(()),
            (Some(current), None) => {
                self.tx.detach_session(current, &mut self.entity).await?;
            }
            (Some(current), Some(requested)) => {
                self.tx
                    .require_user_session(self.entity.realm_id, requested)
                    .await?;
                self.tx.detach_session(current, &mut self.entity).await?;
                self.tx.attach_session(requested, &mut self.entity).await?;
            }
            (None, Some(requested)) => {
                self.tx.attach_session(requested, &mut self.entity).await?;
            }
        }

        self.update();
        Ok(())
    }

    /// Redirect URI.
    #[must_use]
    pub fn redirect_uri(&self) -> Option<&str> {
        self.entity.redirect_uri.as_deref()
    }

    /// Sets the redirect URI.
    pub fn set_redirect_uri(&mut self, uri: impl Into<String>) {
        self.entity.redirect_uri = Some(uri.into());
        self.update();
    }

    /// Pending action.
    #[must_use]
    pub fn action(&self) -> Option<&str> {
        self.entity.action.as_deref()
    }

    /// Sets or clears the pending action.
    pub fn set_action(&mut self, action: Option<String>) {
        self.entity.action = action;
        self.update();
    }

    /// Protocol used by this session.
    #[must_use]
    pub fn auth_method(&self) -> Option<&str> {
        self.entity.auth_method.as_deref()
    }

    /// Sets the protocol.
    pub fn set_auth_method(&mut self, method: impl Into<String>) {
        self.entity.auth_method = Some(method.into());
        self.update();
    }

    /// Last activity time.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.entity.timestamp
    }

    /// Sets the last activity time.
    pub fn set_timestamp(&mut self, timestamp: DateTime<Utc>) {
        self.entity.timestamp = timestamp;
        self.update();
    }

    /// Returns a copy of the granted role ids.
    #[must_use]
    pub fn roles(&self) -> HashSet<String> {
        self.entity.roles.clone()
    }

    /// Replaces the granted role ids.
    pub fn set_roles(&mut self, roles: HashSet<String>) {
        self.entity.roles = roles;
        self.update();
    }

    /// Returns a copy of the protocol mapper ids.
    #[must_use]
    pub fn protocol_mappers(&self) -> HashSet<String> {
        self.entity.protocol_mappers.clone()
    }

    /// Replaces the protocol mapper ids.
    pub fn set_protocol_mappers(&mut self, mappers: HashSet<String>) {
        self.entity.protocol_mappers = mappers;
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

    /// Sets a note destined for the user session once authentication completes.
    ///
    /// Kept apart from [`notes`](Self::notes).
    pub fn set_user_session_note(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entity
            .user_session_notes
            .insert(name.into(), value.into());
        self.update();
    }

    /// Returns a copy of the user session notes.
    #[must_use]
    pub fn user_session_notes(&self) -> HashMap<String, String> {
        self.entity.user_session_notes.clone()
    }

    /// Clears the user session notes.
    pub fn clear_user_session_notes(&mut self) {
        if !self.entity.user_session_notes.is_empty() {
            self.entity.user_session_notes.clear();
            self.update();
        }
    }

    /// Returns a copy of the authenticator statuses.
    #[must_use]
    pub fn authenticators(&self) -> HashMap<String, AuthenticatorStatus> {
        self.entity.authenticator_status.clone()
    }

    /// Sets the status of one authenticator.
    pub fn set_authenticator_status(
        &mut self,
        authenticator: impl Into<String>,
        status: AuthenticatorStatus,
    ) {
        self.entity
            .authenticator_status
            .insert(authenticator.into(), status);
        self.update();
    }

    /// Replaces all authenticator statuses.
    pub fn set_authenticators(&mut self, statuses: HashMap<String, AuthenticatorStatus>) {
        self.entity.authenticator_status = statuses;
        self.update();
    }

    /// Id of the user authenticated so far, if any.
    #[must_use]
    pub const fn authenticated_user_id(&self) -> Option<Uuid> {
        self.entity.auth_user_id
    }

    /// Resolves the authenticated user from the directory.
    pub async fn authenticated_user(&self) -> SessionResult<Option<DirectoryUser>> {
        match self.entity.auth_user_id {
            Some(user_id) => {
                self.tx
                    .directory()
                    .get_user(self.entity.realm_id, user_id)
                    .await
            }
            None => Ok(None),
        }
    }

    /// Sets or clears the authenticated user.
    pub fn set_authenticated_user(&mut self, user_id: Option<Uuid>) {
        self.entity.auth_user_id = user_id;
        self.update();
    }
}
