//! Session store configuration.
//!
//! Values come from `KC_SESSION_*` environment variables (a `.env` file is
//! honoured) with sensible defaults.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};

/// Session store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle timeout for user sessions, in seconds.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: i64,

    /// Maximum lifespan of a user session, in seconds.
    #[serde(default = "default_max_lifespan")]
    pub max_lifespan_secs: i64,

    /// Idle timeout for "remember me" sessions. Falls back to the idle timeout.
    #[serde(default)]
    pub remember_me_idle_timeout_secs: Option<i64>,

    /// Maximum lifespan for "remember me" sessions. Falls back to the max lifespan.
    #[serde(default)]
    pub remember_me_max_lifespan_secs: Option<i64>,

    /// How many times a unit of work is attempted when commits go stale.
    #[serde(default = "default_max_commit_attempts")]
    pub max_commit_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
            max_lifespan_secs: default_max_lifespan(),
            remember_me_idle_timeout_secs: None,
            remember_me_max_lifespan_secs: None,
            max_commit_attempts: default_max_commit_attempts(),
        }
    }
}

impl SessionConfig {
    /// Loads configuration from environment variables.
    ///
    /// Unset or unparsable variables keep their default.
    #[must_use]
    pub fn from_env() -> Self {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let defaults = Self::default();
        Self {
            idle_timeout_secs: env_or("KC_SESSION_IDLE_TIMEOUT", defaults.idle_timeout_secs),
            max_lifespan_secs: env_or("KC_SESSION_MAX_LIFESPAN", defaults.max_lifespan_secs),
            remember_me_idle_timeout_secs: env_parse("KC_SESSION_REMEMBER_ME_IDLE_TIMEOUT"),
            remember_me_max_lifespan_secs: env_parse("KC_SESSION_REMEMBER_ME_MAX_LIFESPAN"),
            max_commit_attempts: env_or(
                "KC_SESSION_MAX_COMMIT_ATTEMPTS",
                defaults.max_commit_attempts,
            ),
        }
    }

    /// Sets the idle timeout.
    #[must_use]
    pub const fn with_idle_timeout(mut self, secs: i64) -> Self {
        self.idle_timeout_secs = secs;
        self
    }

    /// Sets the maximum lifespan.
    #[must_use]
    pub const fn with_max_lifespan(mut self, secs: i64) -> Self {
        self.max_lifespan_secs = secs;
        self
    }

    /// Sets the "remember me" timeouts.
    #[must_use]
    pub const fn with_remember_me(mut self, idle_secs: i64, max_lifespan_secs: i64) -> Self {
        self.remember_me_idle_timeout_secs = Some(idle_secs);
        self.remember_me_max_lifespan_secs = Some(max_lifespan_secs);
        self
    }

    /// Sets the number of commit attempts.
    #[must_use]
    pub const fn with_max_commit_attempts(mut self, attempts: u32) -> Self {
        self.max_commit_attempts = attempts;
        self
    }

    /// Validates the configuration.
    ///
    /// ## Errors
    ///
    /// Returns `SessionError::Configuration` for non-positive timeouts or
    /// zero commit attempts.
    pub fn validate(&self) -> SessionResult<()> {
        if self.max_commit_attempts == 0 {
            return Err(SessionError::Configuration(
                "max_commit_attempts must be at least 1".to_string(),
            ));
        }
        let timeouts = [
            Some(self.idle_timeout_secs),
            Some(self.max_lifespan_secs),
            self.remember_me_idle_timeout_secs,
            self.remember_me_max_lifespan_secs,
        ];
        if timeouts.into_iter().flatten().any(|t| t <= 0) {
            return Err(SessionError::Configuration(
                "session timeouts must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Checks whether a user session has expired at `now`.
    #[must_use]
    pub fn is_user_session_expired(
        &self,
        started: DateTime<Utc>,
        last_refresh: DateTime<Utc>,
        remember_me: bool,
        now: DateTime<Utc>,
    ) -> bool {
        let (idle, max) = if remember_me {
            (
                self.remember_me_idle_timeout_secs
                    .unwrap_or(self.idle_timeout_secs),
                self.remember_me_max_lifespan_secs
                    .unwrap_or(self.max_lifespan_secs),
            )
        } else {
            (self.idle_timeout_secs, self.max_lifespan_secs)
        };

        (now - last_refresh).num_seconds() > idle || (now - started).num_seconds() > max
    }

    /// Checks whether an unattached client session has expired at `now`.
    #[must_use]
    pub fn is_client_session_expired(&self, timestamp: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        (now - timestamp).num_seconds() > self.idle_timeout_secs
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env_parse(name).unwrap_or(default)
}

const fn default_idle_timeout() -> i64 {
    1800 // 30 minutes
}

const fn default_max_lifespan() -> i64 {
    36000 // 10 hours
}

const fn default_max_commit_attempts() -> u32 {
    3
}
