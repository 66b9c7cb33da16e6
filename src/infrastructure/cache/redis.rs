//! Redis store implementation

use std::fmt;
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use crate::domain::cache::{QueryContext, Store};
use crate::domain::CacheError;

/// Deletes every member of the tag set and the set itself in one step
const REMOVE_FROM_TAG_SCRIPT: &str = r#"
local keys = redis.call('SMEMBERS', KEYS[1])
for i = 1, #keys, 500 do
    redis.call('DEL', unpack(keys, i, math.min(i + 499, #keys)))
end
redis.call('DEL', KEYS[1])
return #keys
"#;

/// `PX` argument for a TTL; `None` stores the key without expiry
///
/// Redis keeps the absolute expiry as signed milliseconds since the epoch, so
/// TTLs that would overflow it are stored without expiry instead of being
/// rejected by the server.
fn expire_millis(ttl: Duration) -> Option<u64> {
    if ttl.is_zero() {
        return None;
    }

    let millis = i64::try_from(ttl.as_millis().max(1)).ok()?;
    let now = i64::try_from(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis(),
    )
    .ok()?;

    now.checked_add(millis)?;
    u64::try_from(millis).ok()
}

/// Configuration for the Redis store
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub url: String,
    /// Connection timeout
    pub connection_timeout: Duration,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            connection_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisStoreConfig {
    /// Creates a new configuration with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Sets the connection timeout
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }
}

/// Redis store implementation
///
/// Entries are plain string keys, tags are Redis sets of keys. Every
/// operation is abandoned as soon as the context is cancelled.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    config: RedisStoreConfig,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("config", &self.config)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisStore {
    /// Connects to Redis
    pub async fn new(config: RedisStoreConfig) -> Result<Self, CacheError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| CacheError::store(format!("Failed to create Redis client: {}", e)))?;

        let connection =
            tokio::time::timeout(config.connection_timeout, ConnectionManager::new(client))
                .await
                .map_err(|_| {
                    CacheError::store(format!(
                        "Timed out connecting to Redis after {:?}",
                        config.connection_timeout
                    ))
                })?
                .map_err(|e| CacheError::store(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self { connection, config })
    }

    /// Connects to Redis with default settings
    pub async fn with_url(url: impl Into<String>) -> Result<Self, CacheError> {
        Self::new(RedisStoreConfig::new(url)).await
    }

    async fn run<T, F>(ctx: &QueryContext, operation: F) -> Result<T, CacheError>
    where
        F: Future<Output = Result<T, CacheError>>,
    {
        tokio::select! {
            _ = ctx.cancellation().cancelled() => Err(CacheError::Cancelled),
            result = operation => result,
        }
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn set(
        &self,
        ctx: &QueryContext,
        key: &str,
        payload: &[u8],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();

        Self::run(ctx, async move {
            let mut cmd = redis::cmd("SET");
            cmd.arg(key).arg(payload);

            if let Some(millis) = expire_millis(ttl) {
                cmd.arg("PX").arg(millis);
            }

            cmd.query_async::<()>(&mut conn)
                .await
                .map_err(|e| CacheError::store(format!("Failed to set key '{}': {}", key, e)))
        })
        .await
    }

    async fn get(&self, ctx: &QueryContext, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.connection.clone();

        Self::run(ctx, async move {
            let result: Option<Vec<u8>> = conn
                .get(key)
                .await
                .map_err(|e| CacheError::store(format!("Failed to get key '{}': {}", key, e)))?;

            Ok(result)
        })
        .await
    }

    async fn save_tag_key(
        &self,
        ctx: &QueryContext,
        tag: &str,
        key: &str,
    ) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();

        Self::run(ctx, async move {
            let _: () = conn.sadd(tag, key).await.map_err(|e| {
                CacheError::store(format!("Failed to add key '{}' to tag '{}': {}", key, tag, e))
            })?;

            Ok(())
        })
        .await
    }

    async fn remove_from_tag(&self, ctx: &QueryContext, tag: &str) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();

        Self::run(ctx, async move {
            let removed: usize = redis::cmd("EVAL")
                .arg(REMOVE_FROM_TAG_SCRIPT)
                .arg(1)
                .arg(tag)
                .query_async(&mut conn)
                .await
                .map_err(|e| {
                    CacheError::store(format!("Failed to remove tag '{}': {}", tag, e))
                })?;

            tracing::debug!(tag = %tag, removed, "Removed tagged keys from Redis");
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Note: These tests require a running Redis instance
    // Run with: cargo test -- --ignored

    fn get_test_config() -> RedisStoreConfig {
        RedisStoreConfig::new("redis://127.0.0.1:6379")
            .with_connection_timeout(Duration::from_secs(2))
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_set_and_get() {
        let store = RedisStore::new(get_test_config()).await.unwrap();
        let ctx = QueryContext::new();

        store
            .set(&ctx, "test:key1", b"value1", Duration::from_secs(60))
            .await
            .unwrap();

        let result = store.get(&ctx, "test:key1").await.unwrap();
        assert_eq!(result, Some(b"value1".to_vec()));
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_get_missing() {
        let store = RedisStore::new(get_test_config()).await.unwrap();

        let result = store
            .get(&QueryContext::new(), "test:missing")
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_remove_from_tag() {
        let store = RedisStore::new(get_test_config()).await.unwrap();
        let ctx = QueryContext::new();
        let ttl = Duration::from_secs(60);

        store.set(&ctx, "test:t1", b"a", ttl).await.unwrap();
        store.set(&ctx, "test:t2", b"b", ttl).await.unwrap();
        store.save_tag_key(&ctx, "test:tag1", "test:t1").await.unwrap();
        store.save_tag_key(&ctx, "test:tag2", "test:t2").await.unwrap();

        store.remove_from_tag(&ctx, "test:tag1").await.unwrap();

        assert!(store.get(&ctx, "test:t1").await.unwrap().is_none());
        assert!(store.get(&ctx, "test:t2").await.unwrap().is_some());

        // Cleanup
        store.remove_from_tag(&ctx, "test:tag2").await.unwrap();
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_cancelled_context() {
        let store = RedisStore::new(get_test_config()).await.unwrap();
        let ctx = QueryContext::new();
        ctx.cancellation().cancel();

        let result = store.get(&ctx, "test:key1").await;
        assert!(matches!(result, Err(CacheError::Cancelled)));
    }

    #[test]
    fn test_expire_millis() {
        assert_eq!(expire_millis(Duration::ZERO), None);
        assert_eq!(expire_millis(Duration::from_millis(1500)), Some(1500));
        assert_eq!(expire_millis(Duration::from_micros(300)), Some(1));
        assert_eq!(expire_millis(Duration::MAX), None);
        assert_eq!(expire_millis(Duration::from_millis(i64::MAX as u64)), None);
    }

    #[test]
    fn test_config() {
        let config = RedisStoreConfig::new("redis://localhost")
            .with_connection_timeout(Duration::from_secs(1));

        assert_eq!(config.url, "redis://localhost");
        assert_eq!(config.connection_timeout, Duration::from_secs(1));
    }
}
