//! Session events.
//!
//! Events describe session lifecycle and relationship changes. They are
//! produced by the session provider once a unit of work has committed, so a
//! listener never observes a change that was rolled back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// User session created.
    UserSessionStarted,
    /// Client session created.
    ClientSessionStarted,
    /// Client session attached to a user session.
    ClientSessionAttached,
    /// Client session detached from a user session.
    ClientSessionDetached,
    /// User session removed (logout, user or realm removal).
    UserSessionRemoved,
    /// Client session removed.
    ClientSessionRemoved,
    /// Session removed because it expired.
    SessionExpired,
}

/// A session event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub id: Uuid,

    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,

    /// Type of event.
    pub event_type: EventType,

    /// Realm the sessions belong to.
    pub realm_id: Uuid,

    /// User session involved, if any.
    pub user_session_id: Option<Uuid>,

    /// Client session involved, if any.
    pub client_session_id: Option<Uuid>,

    /// User owning the session, when known.
    pub user_id: Option<Uuid>,

    /// Client of the client session, when known.
    pub client_id: Option<Uuid>,
}

impl Event {
    /// Creates a new event builder.
    #[must_use]
    pub const fn builder(event_type: EventType, realm_id: Uuid) -> EventBuilder {
        EventBuilder::new(event_type, realm_id)
    }
}

/// Builder for creating events.
#[derive(Debug)]
pub struct EventBuilder {
    event_type: EventType,
    realm_id: Uuid,
    user_session_id: Option<Uuid>,
    client_session_id: Option<Uuid>,
    user_id: Option<Uuid>,
    client_id: Option<Uuid>,
}

impl EventBuilder {
    /// Creates a new event builder.
    #[must_use]
    pub const fn new(event_type: EventType, realm_id: Uuid) -> Self {
        Self {
            event_type,
            realm_id,
            user_session_id: None,
            client_session_id: None,
            user_id: None,
            client_id: None,
        }
    }

    /// Sets the user session ID.
    #[must_use]
    pub const fn user_session(mut self, id: Uuid) -> Self {
        self.user_session_id = Some(id);
        self
    }

    /// Sets the client session ID.
    #[must_use]
    pub const fn client_session(mut self, id: Uuid) -> Self {
        self.client_session_id = Some(id);
        self
    }

    /// Sets the user ID.
    #[must_use]
    pub const fn user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Sets the client ID.
    #[must_use]
    pub const fn client(mut self, client_id: Uuid) -> Self {
        self.client_id = Some(client_id);
        self
    }

    /// Builds the event.
    #[must_use]
    pub fn build(self) -> Event {
        Event {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            event_type: self.event_type,
            realm_id: self.realm_id,
            user_session_id: self.user_session_id,
            client_session_id: self.client_session_id,
            user_id: self.user_id,
            client_id: self.client_id,
        }
    }
}
