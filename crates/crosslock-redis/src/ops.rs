//! Shared Redis plumbing for the key-value and pub/sub backends.

use std::time::Duration;

use fred::prelude::*;
use fred::types::CustomCommand;

use crosslock_core::error::{LockError, LockResult};

/// Lua: delete the key only while the token still owns it.
const RELEASE_IF_OWNER: &str = r#"
if redis.call('get', KEYS[1]) == ARGV[1] then
    return redis.call('del', KEYS[1])
end
return 0
"#;

/// Lua: push the TTL out only while the token still owns it.
const RENEW_IF_OWNER: &str = r#"
if redis.call('get', KEYS[1]) == ARGV[1] then
    return redis.call('pexpire', KEYS[1], ARGV[2])
end
return 0
"#;

/// Key the lease for `name` is stored under.
pub(crate) fn lock_key(prefix: &str, name: &str) -> String {
    format!("{prefix}{name}")
}

/// Channel release notifications for `name` are published on.
pub(crate) fn released_channel(prefix: &str, name: &str) -> String {
    format!("{prefix}released:{name}")
}

/// Connects a new client to `url` and waits until it is usable.
pub(crate) async fn connect(url: &str) -> LockResult<RedisClient> {
    let config = RedisConfig::from_url(url)
        .map_err(|e| LockError::InvalidConfig(format!("invalid Redis URL: {e}")))?;
    let client = RedisClient::new(config, None, None, None);
    let _ = client.connect();
    client.wait_for_connect().await.map_err(classify)?;
    Ok(client)
}

/// `SET key token PX ttl NX`: the whole acquisition in one command.
/// Redis answers `OK` when the key was written and nil while someone else
/// holds it.
pub(crate) async fn set_if_absent(
    client: &RedisClient,
    key: &str,
    token: &str,
    ttl: Duration,
) -> LockResult<bool> {
    if ttl.is_zero() {
        return Err(LockError::InvalidConfig(
            "lease_ttl must be positive for Redis-backed locks".to_string(),
        ));
    }
    let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    let result: Option<String> = client
        .set(
            key,
            token,
            Some(Expiration::PX(ttl_millis)),
            Some(SetOptions::NX),
            false,
        )
        .await
        .map_err(classify)?;
    Ok(result.is_some())
}

/// Compare-and-delete, atomic on the server.
pub(crate) async fn delete_if_owner(
    client: &RedisClient,
    key: &str,
    token: &str,
) -> LockResult<bool> {
    let args: Vec<RedisValue> = vec![
        RELEASE_IF_OWNER.into(),
        1_i64.into(), // numkeys
        key.into(),
        token.into(),
    ];
    let cmd = CustomCommand::new_static("EVAL", None, false);
    let deleted: i64 = client.custom(cmd, args).await.map_err(classify)?;
    Ok(deleted == 1)
}

/// Compare-and-extend, atomic on the server.
pub(crate) async fn extend_if_owner(
    client: &RedisClient,
    key: &str,
    token: &str,
    extension: Duration,
) -> LockResult<bool> {
    if extension.is_zero() {
        return Err(LockError::InvalidConfig(
            "lease extension must be positive for Redis-backed locks".to_string(),
        ));
    }
    let extension_millis = i64::try_from(extension.as_millis()).unwrap_or(i64::MAX);
    let args: Vec<RedisValue> = vec![
        RENEW_IF_OWNER.into(),
        1_i64.into(), // numkeys
        key.into(),
        token.into(),
        extension_millis.into(),
    ];
    let cmd = CustomCommand::new_static("EVAL", None, false);
    let extended: i64 = client.custom(cmd, args).await.map_err(classify)?;
    Ok(extended == 1)
}

/// Whether the lease key currently exists.
pub(crate) async fn key_exists(client: &RedisClient, key: &str) -> LockResult<bool> {
    let count: i64 = client.exists(key).await.map_err(classify)?;
    Ok(count > 0)
}

/// Splits connectivity failures from store-side errors.
pub(crate) fn classify(e: RedisError) -> LockError {
    use fred::error::RedisErrorKind;

    match e.kind() {
        RedisErrorKind::IO | RedisErrorKind::Timeout | RedisErrorKind::Canceled => {
            LockError::Unavailable(Box::new(e))
        }
        _ => LockError::Backend(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_and_channels_are_prefixed() {
        assert_eq!(lock_key("crosslock:", "nightly-report"), "crosslock:nightly-report");
        assert_eq!(
            released_channel("crosslock:", "nightly-report"),
            "crosslock:released:nightly-report"
        );
        assert_eq!(lock_key("", "bare"), "bare");
    }

    #[test]
    fn scripts_guard_on_ownership() {
        for script in [RELEASE_IF_OWNER, RENEW_IF_OWNER] {
            assert!(script.contains("redis.call('get', KEYS[1]) == ARGV[1]"));
            assert!(script.trim().ends_with("return 0"));
        }
        assert!(RELEASE_IF_OWNER.contains("'del'"));
        assert!(RENEW_IF_OWNER.contains("'pexpire'"));
    }

    #[tokio::test]
    async fn zero_ttl_is_rejected_before_hitting_the_server() {
        // An unconnected client is enough: validation fires first.
        let client = RedisClient::new(RedisConfig::default(), None, None, None);
        let result = set_if_absent(&client, "k", "t", Duration::ZERO).await;
        assert!(matches!(result, Err(LockError::InvalidConfig(_))));
    }
}
