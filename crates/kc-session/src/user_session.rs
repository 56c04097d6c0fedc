//! User session (SSO session) entity.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// State of a user session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// Authentication is still in progress.
    #[default]
    LoggingIn,
    /// User is logged in.
    LoggedIn,
    /// Logout has started but not every client has been notified.
    LoggingOut,
    /// User is logged out.
    LoggedOut,
}

/// A user session (SSO session) as stored in the cache.
///
/// Plain data: invariants are maintained by the adapter and the session
/// transaction, never by the entity itself. `client_sessions` holds
/// back-references only; the client sessions are separate entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSessionEntity {
    // === Identity ===
    /// Unique session identifier.
    pub id: Uuid,
    /// Realm this session belongs to.
    pub realm_id: Uuid,
    /// User who owns this session.
    pub user_id: Uuid,
    /// Username the user logged in with.
    pub login_username: String,

    // === Authentication Info ===
    /// IP address of the client.
    pub ip_address: Option<String>,
    /// Authentication method used.
    pub auth_method: Option<String>,
    /// Whether this session used "Remember Me".
    pub remember_me: bool,
    /// Broker session ID (for federated logins).
    pub broker_session_id: Option<String>,
    /// User ID at the identity broker.
    pub broker_user_id: Option<String>,

    // === State ===
    /// Current state of the session.
    pub state: SessionState,
    /// When the session was created.
    pub started: DateTime<Utc>,
    /// Last activity timestamp.
    pub last_session_refresh: DateTime<Utc>,

    // === Relationships ===
    /// Ids of the client sessions attached to this session.
    #[serde(default)]
    pub client_sessions: HashSet<Uuid>,

    // === Notes ===
    /// Session notes (key-value pairs for custom data).
    #[serde(default)]
    pub notes: HashMap<String, String>,
}

impl UserSessionEntity {
    /// Creates a new user session entity with a fresh id.
    #[must_use]
    pub fn new(realm_id: Uuid, user_id: Uuid, login_username: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            realm_id,
            user_id,
            login_username: login_username.into(),
            ip_address: None,
            auth_method: None,
            remember_me: false,
            broker_session_id: None,
            broker_user_id: None,
            state: SessionState::default(),
            started: now,
            last_session_refresh: now,
            client_sessions: HashSet::new(),
            notes: HashMap::new(),
        }
    }
}

/// Well-known user session note keys.
pub mod notes {
    /// The identity provider alias used.
    pub const IDENTITY_PROVIDER: &str = "IDENTITY_PROVIDER";
    /// The authentication context class reference.
    pub const ACR: &str = "ACR";
}
