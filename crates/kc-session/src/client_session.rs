//! Client session entity.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of one authenticator in a client's login flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthenticatorStatus {
    /// Authenticator failed.
    Failed,
    /// Authenticator succeeded.
    Success,
    /// User must set up the authenticator first.
    SetupRequired,
    /// User attempted but did not complete the authenticator.
    Attempted,
    /// Authenticator was skipped.
    Skipped,
    /// Authenticator challenged the user and awaits input.
    Challenged,
}

/// A client session as stored in the cache.
///
/// Represents one client's login flow. It references at most one user
/// session through `user_session`; exclusivity of that reference is enforced
/// by the attach/detach protocol, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSessionEntity {
    // === Identity ===
    /// Unique client session identifier.
    pub id: Uuid,
    /// Realm ID.
    pub realm_id: Uuid,
    /// Client ID (internal `UUID`).
    pub client_id: Uuid,

    // === Relationship ===
    /// User session this client session is attached to.
    pub user_session: Option<Uuid>,

    // === Flow State ===
    /// Redirect URI used for this session.
    pub redirect_uri: Option<String>,
    /// Authentication method (protocol) used.
    pub auth_method: Option<String>,
    /// Action being performed (if any).
    pub action: Option<String>,
    /// Last time the flow progressed.
    pub timestamp: DateTime<Utc>,
    /// User the flow authenticated, once known.
    pub auth_user_id: Option<Uuid>,

    // === Roles and Mappers ===
    /// Granted role ids.
    #[serde(default)]
    pub roles: HashSet<String>,
    /// Protocol mapper ids applied to tokens.
    #[serde(default)]
    pub protocol_mappers: HashSet<String>,

    // === Notes ===
    /// Client session notes.
    #[serde(default)]
    pub notes: HashMap<String, String>,
    /// Notes to copy onto the user session when it is established.
    #[serde(default)]
    pub user_session_notes: HashMap<String, String>,
    /// Status of each authenticator in the flow.
    #[serde(default)]
    pub authenticator_status: HashMap<String, AuthenticatorStatus>,
}

impl ClientSessionEntity {
    /// Creates a new unattached client session with a fresh id.
    #[must_use]
    pub fn new(realm_id: Uuid, client_id: Uuid) -> Self {
        Self {
            id: Uuid::now_v7(),
            realm_id,
            client_id,
            user_session: None,
            redirect_uri: None,
            auth_method: None,
            action: None,
            timestamp: Utc::now(),
            auth_user_id: None,
            roles: HashSet::new(),
            protocol_mappers: HashSet::new(),
            notes: HashMap::new(),
            user_session_notes: HashMap::new(),
            authenticator_status: HashMap::new(),
        }
    }
}

/// Well-known client session note keys.
pub mod notes {
    /// The nonce used in the authentication request.
    pub const NONCE: &str = "nonce";
    /// The state parameter from the authentication request.
    pub const STATE: &str = "state";
}
