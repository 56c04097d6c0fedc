//! Redis connection settings for the session cache.
//!
//! Values come from `KC_SESSION_REDIS_*` environment variables (a `.env`
//! file is honoured). Every session key is stored under a namespace so that
//! several deployments can share one Redis database.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Where and how the session cache reaches Redis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Server host name.
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Optional `AUTH` password.
    #[serde(default)]
    pub password: Option<String>,
    /// Logical database index.
    #[serde(default)]
    pub database: u8,
    /// Connect with `rediss://`.
    #[serde(default)]
    pub tls: bool,
    /// Namespace every session key is stored under.
    ///
    /// Nodes sharing a namespace share sessions.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            password: None,
            database: 0,
            tls: false,
            key_prefix: default_key_prefix(),
        }
    }
}

impl RedisConfig {
    /// Reads the settings from the environment.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `KC_SESSION_REDIS_HOST` | `localhost` |
    /// | `KC_SESSION_REDIS_PORT` | `6379` |
    /// | `KC_SESSION_REDIS_PASSWORD` | unset |
    /// | `KC_SESSION_REDIS_DATABASE` | `0` |
    /// | `KC_SESSION_REDIS_TLS` | `false` |
    /// | `KC_SESSION_REDIS_KEY_PREFIX` | `kc:sessions` |
    ///
    /// Unparsable values keep their default.
    #[must_use]
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let defaults = Self::default();
        Self {
            host: env_or("KC_SESSION_REDIS_HOST", defaults.host),
            port: env_or("KC_SESSION_REDIS_PORT", defaults.port),
            password: std::env::var("KC_SESSION_REDIS_PASSWORD")
                .ok()
                .filter(|p| !p.is_empty()),
            database: env_or("KC_SESSION_REDIS_DATABASE", defaults.database),
            tls: env_or("KC_SESSION_REDIS_TLS", defaults.tls),
            key_prefix: env_or("KC_SESSION_REDIS_KEY_PREFIX", defaults.key_prefix),
        }
    }

    /// Points at another server.
    #[must_use]
    pub fn with_server(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    /// Sets the `AUTH` password.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Selects the logical database.
    #[must_use]
    pub const fn with_database(mut self, database: u8) -> Self {
        self.database = database;
        self
    }

    /// Turns TLS on or off.
    #[must_use]
    pub const fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// Stores sessions under another namespace.
    #[must_use]
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// URL handed to the Redis client.
    #[must_use]
    pub fn connection_url(&self) -> String {
        let scheme = if self.tls { "rediss" } else { "redis" };
        match &self.password {
            Some(password) => format!(
                "{scheme}://:{password}@{}:{}/{}",
                self.host, self.port, self.database
            ),
            None => format!("{scheme}://{}:{}/{}", self.host, self.port, self.database),
        }
    }

    /// Redis key for a session key.
    #[must_use]
    pub fn prefixed_key(&self, key: &str) -> String {
        if self.key_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{key}", self.key_prefix)
        }
    }

    /// Session key for a Redis key, `None` outside the namespace.
    #[must_use]
    pub fn unprefixed_key<'a>(&self, key: &'a str) -> Option<&'a str> {
        if self.key_prefix.is_empty() {
            return Some(key);
        }
        key.strip_prefix(self.key_prefix.as_str())?.strip_prefix(':')
    }

    /// Pattern matching every key in the namespace.
    #[must_use]
    pub fn scan_pattern(&self) -> String {
        self.prefixed_key("*")
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn default_host() -> String {
    "localhost".to_string()
}

const fn default_port() -> u16 {
    6379
}

fn default_key_prefix() -> String {
    "kc:sessions".to_string()
}
