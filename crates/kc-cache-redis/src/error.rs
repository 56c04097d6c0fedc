//! Redis cache error conversion.

use kc_cache::CacheError;

/// Converts a `fred` Redis error to a `CacheError`.
#[allow(clippy::needless_pass_by_value)]
pub fn from_redis_error(err: fred::error::Error) -> CacheError {
    match err.kind() {
        fred::error::ErrorKind::IO => CacheError::Connection(err.to_string()),
        fred::error::ErrorKind::Timeout => CacheError::Timeout,
        fred::error::ErrorKind::Config => CacheError::Configuration(err.to_string()),
        _ => CacheError::Internal(err.to_string()),
    }
}

/// Converts a serialization error to a `CacheError`.
#[allow(clippy::needless_pass_by_value)]
pub fn from_serde_error(err: serde_json::Error) -> CacheError {
    CacheError::Serialization(err.to_string())
}

/// Parses the reply of the commit script.
///
/// The script answers `OK`, or `STALE:<index>:<version>` naming the first
/// key (1-based) whose precondition failed and its current version, empty
/// when the key is gone.
pub(crate) fn parse_commit_reply(
    reply: &str,
    keys: &[String],
    expected: &[Option<u64>],
) -> Result<(), CacheError> {
    if reply == "OK" {
        return Ok(());
    }

    let Some(rest) = reply.strip_prefix("STALE:") else {
        return Err(CacheError::Internal(format!(
            "unexpected commit reply: {reply}"
        )));
    };

    let mut parts = rest.splitn(2, ':');
    let index: usize = parts
        .next()
        .and_then(|i| i.parse().ok())
        .filter(|i| (1..=keys.len()).contains(i))
        .ok_or_else(|| CacheError::Internal(format!("malformed stale reply: {reply}")))?;
    let actual = parts.next().and_then(|v| v.parse().ok());

    Err(CacheError::StaleWrite {
        key: keys[index - 1].clone(),
        expected: expected[index - 1].unwrap_or_default(),
        actual,
    })
}
