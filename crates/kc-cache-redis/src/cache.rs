//! Redis implementation of the replicated cache.
//!
//! Each key is stored as a hash with a `version` and a JSON `value` field.
//! Commits run as a single Lua script, so the version checks and the writes
//! happen atomically on the server.

use std::collections::HashMap;
use std::marker::PhantomData;

use async_trait::async_trait;
use fred::prelude::*;
use fred::types::scan::Scanner;
use futures::TryStreamExt;
use kc_cache::{CacheError, CacheResult, CacheTransaction, ReplicatedCache, Versioned, WriteOp};
use serde::{de::DeserializeOwned, Serialize};

use crate::config::RedisConfig;
use crate::error::{from_redis_error, from_serde_error, parse_commit_reply};

/// Checks every precondition, then applies every write.
///
/// `ARGV` holds one `(op, expected, payload)` triple per key.
const COMMIT_SCRIPT: &str = r"
local n = #KEYS
for i = 1, n do
  local expected = ARGV[(i - 1) * 3 + 2]
  if expected ~= '' then
    local current = redis.call('HGET', KEYS[i], 'version')
    if current ~= expected then
      if current then
        return 'STALE:' .. i .. ':' .. current
      end
      return 'STALE:' .. i .. ':'
    end
  end
end
for i = 1, n do
  if ARGV[(i - 1) * 3 + 1] == 'del' then
    redis.call('DEL', KEYS[i])
  else
    redis.call('HINCRBY', KEYS[i], 'version', 1)
    redis.call('HSET', KEYS[i], 'value', ARGV[(i - 1) * 3 + 3])
  end
end
return 'OK'
";

/// Unconditional write returning the new version.
const PUT_SCRIPT: &str = r"
local version = redis.call('HINCRBY', KEYS[1], 'version', 1)
redis.call('HSET', KEYS[1], 'value', ARGV[1])
return version
";

/// Redis-based replicated cache.
pub struct RedisCache<V> {
    client: Client,
    config: RedisConfig,
    _value: PhantomData<fn() -> V>,
}

impl<V> RedisCache<V> {
    /// Connects to Redis.
    ///
    /// ## Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub async fn connect(config: RedisConfig) -> CacheResult<Self> {
        let redis_config = Config::from_url(&config.connection_url())
            .map_err(|e| CacheError::Configuration(e.to_string()))?;

        let client = Client::new(
            redis_config,
            None,
            None,
            Some(ReconnectPolicy::new_exponential(0, 1000, 30_000, 2)),
        );

        client.init().await.map_err(from_redis_error)?;
        tracing::debug!(host = %config.host, prefix = %config.key_prefix, "redis session cache connected");

        Ok(Self::with_client(client, config))
    }

    /// Wraps an already initialised client.
    #[must_use]
    pub const fn with_client(client: Client, config: RedisConfig) -> Self {
        Self {
            client,
            config,
            _value: PhantomData,
        }
    }

    /// Returns the underlying Redis client.
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    fn key(&self, key: &str) -> String {
        self.config.prefixed_key(key)
    }

    /// Collects keys from a scan pattern.
    async fn scan_keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let mut scanner = self.client.scan(pattern, None, None);
        let mut keys = Vec::new();

        while let Some(result) = scanner.try_next().await.map_err(from_redis_error)? {
            if let Some(page) = result.results() {
                for value in page {
                    if let Some(s) = value.as_str() {
                        keys.push(s.to_string());
                    }
                }
            }
        }

        Ok(keys)
    }
}

impl<V: DeserializeOwned> RedisCache<V> {
    async fn read(&self, full_key: &str) -> CacheResult<Option<Versioned<V>>> {
        let fields: HashMap<String, String> = self
            .client
            .hgetall(full_key)
            .await
            .map_err(from_redis_error)?;

        let (Some(version), Some(value)) = (fields.get("version"), fields.get("value")) else {
            return Ok(None);
        };

        let version = version
            .parse()
            .map_err(|_| CacheError::Serialization(format!("bad version '{version}'")))?;
        let value = serde_json::from_str(value).map_err(from_serde_error)?;

        Ok(Some(Versioned::new(value, version)))
    }
}

#[async_trait]
impl<V> ReplicatedCache<V> for RedisCache<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> CacheResult<Option<Versioned<V>>> {
        self.read(&self.key(key)).await
    }

    async fn put(&self, key: &str, value: V) -> CacheResult<u64> {
        let payload = serde_json::to_string(&value).map_err(from_serde_error)?;
        let version: i64 = self
            .client
            .eval(PUT_SCRIPT, vec![self.key(key)], vec![payload])
            .await
            .map_err(from_redis_error)?;

        u64::try_from(version)
            .map_err(|_| CacheError::Internal(format!("negative version {version}")))
    }

    async fn remove(&self, key: &str) -> CacheResult<()> {
        let key = self.key(key);
        self.client
            .del::<(), _>(&key)
            .await
            .map_err(from_redis_error)
    }

    async fn commit(&self, tx: CacheTransaction<V>) -> CacheResult<()> {
        if tx.is_empty() {
            return Ok(());
        }

        let mut keys = Vec::with_capacity(tx.len());
        let mut full_keys = Vec::with_capacity(tx.len());
        let mut expected = Vec::with_capacity(tx.len());
        let mut args = Vec::with_capacity(tx.len() * 3);

        for (key, staged) in tx.into_writes() {
            let (op, payload) = match &staged.op {
                WriteOp::Set(value) => (
                    "set",
                    serde_json::to_string(value).map_err(from_serde_error)?,
                ),
                WriteOp::Remove => ("del", String::new()),
            };
            args.push(op.to_string());
            args.push(staged.expected.map(|v| v.to_string()).unwrap_or_default());
            args.push(payload);

            full_keys.push(self.key(&key));
            expected.push(staged.expected);
            keys.push(key);
        }

        let reply: String = self
            .client
            .eval(COMMIT_SCRIPT, full_keys, args)
            .await
            .map_err(from_redis_error)?;

        parse_commit_reply(&reply, &keys, &expected)?;
        tracing::trace!(writes = keys.len(), "redis cache commit applied");
        Ok(())
    }

    async fn scan(&self) -> CacheResult<Vec<(String, Versioned<V>)>> {
        let pattern = self.config.scan_pattern();
        let full_keys = self.scan_keys(&pattern).await?;

        let mut entries = Vec::with_capacity(full_keys.len());
        for full_key in full_keys {
            let Some(key) = self.config.unprefixed_key(&full_key) else {
                continue;
            };
            // Keys can disappear between the scan and the read.
            if let Some(entry) = self.read(&full_key).await? {
                entries.push((key.to_string(), entry));
            }
        }

        Ok(entries)
    }
}
