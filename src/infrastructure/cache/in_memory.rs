//! In-memory store implementation using moka

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use moka::notification::{ListenerFuture, RemovalCause};
use tokio::sync::RwLock;

use crate::domain::cache::{QueryContext, Store};
use crate::domain::CacheError;

/// Configuration for the in-memory store
#[derive(Debug, Clone)]
pub struct InMemoryStoreConfig {
    /// Maximum number of entries
    pub max_capacity: u64,
    /// Time to idle - entries not accessed for this duration are evicted
    pub time_to_idle: Option<Duration>,
}

impl Default for InMemoryStoreConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            time_to_idle: None,
        }
    }
}

impl InMemoryStoreConfig {
    /// Sets the maximum number of entries
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }

    /// Sets the time-to-idle duration
    pub fn with_time_to_idle(mut self, tti: Duration) -> Self {
        self.time_to_idle = Some(tti);
        self
    }
}

/// Payload stored in moka
#[derive(Debug, Clone)]
struct StoredEntry {
    payload: Vec<u8>,
    /// Expiration timestamp (millis since epoch), `None` for entries without expiry
    expires_at: Option<u64>,
}

type TagIndex = Arc<RwLock<HashMap<String, HashSet<String>>>>;

/// Drops a key from every tag, removing tags that become empty
async fn forget_key(tags: &TagIndex, key: &str) {
    tags.write().await.retain(|_, keys| {
        keys.remove(key);
        !keys.is_empty()
    });
}

/// Thread-safe in-memory store
///
/// Entries live in a moka cache which handles capacity eviction; expiry is
/// tracked per entry so each write can carry its own TTL. Tag membership is
/// kept in a separate index guarded by an async lock. Keys leave the index
/// when their entry expires or is evicted, so tags that are never
/// invalidated do not grow without bound.
#[derive(Debug)]
pub struct InMemoryStore {
    entries: MokaCache<String, StoredEntry>,
    tags: TagIndex,
    config: InMemoryStoreConfig,
}

impl InMemoryStore {
    /// Creates a new in-memory store with default configuration
    pub fn new() -> Self {
        Self::with_config(InMemoryStoreConfig::default())
    }

    /// Creates a new in-memory store with the given configuration
    pub fn with_config(config: InMemoryStoreConfig) -> Self {
        let tags: TagIndex = Arc::new(RwLock::new(HashMap::new()));
        let evicted_from = Arc::clone(&tags);

        let mut builder = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .async_eviction_listener(
                move |key: Arc<String>, _entry: StoredEntry, cause: RemovalCause| -> ListenerFuture {
                    let tags = Arc::clone(&evicted_from);

                    Box::pin(async move {
                        // Explicit removals maintain the index themselves
                        if cause.was_evicted() {
                            forget_key(&tags, &key).await;
                        }
                    })
                },
            );

        if let Some(tti) = config.time_to_idle {
            builder = builder.time_to_idle(tti);
        }

        Self {
            entries: builder.build(),
            tags,
            config,
        }
    }

    pub fn config(&self) -> &InMemoryStoreConfig {
        &self.config
    }

    /// Returns the number of live entries
    pub async fn entry_count(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }

    /// Returns the keys registered under a tag, sorted
    pub async fn tag_members(&self, tag: &str) -> Vec<String> {
        let tags = self.tags.read().await;
        let mut members: Vec<String> = tags
            .get(tag)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();

        members.sort();
        members
    }

    fn current_time_millis() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    /// Absolute expiry for a TTL; `None` when the entry never expires
    ///
    /// TTLs too large to represent are treated as no expiry.
    fn expiry_for(ttl: Duration) -> Option<u64> {
        if ttl.is_zero() {
            return None;
        }

        u64::try_from(ttl.as_millis().max(1))
            .ok()
            .and_then(|millis| Self::current_time_millis().checked_add(millis))
    }

    fn is_expired(entry: &StoredEntry) -> bool {
        entry
            .expires_at
            .is_some_and(|expires_at| Self::current_time_millis() > expires_at)
    }

    fn ensure_active(ctx: &QueryContext) -> Result<(), CacheError> {
        if ctx.is_cancelled() {
            return Err(CacheError::Cancelled);
        }

        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn set(
        &self,
        ctx: &QueryContext,
        key: &str,
        payload: &[u8],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        Self::ensure_active(ctx)?;

        let entry = StoredEntry {
            payload: payload.to_vec(),
            expires_at: Self::expiry_for(ttl),
        };

        self.entries.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn get(&self, ctx: &QueryContext, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Self::ensure_active(ctx)?;

        match self.entries.get(key).await {
            Some(entry) => {
                if Self::is_expired(&entry) {
                    self.entries.invalidate(key).await;

                    // A concurrent write may already have re-registered the key
                    if !self.entries.contains_key(key) {
                        forget_key(&self.tags, key).await;
                    }
                    return Ok(None);
                }

                Ok(Some(entry.payload))
            }
            None => Ok(None),
        }
    }

    async fn save_tag_key(
        &self,
        ctx: &QueryContext,
        tag: &str,
        key: &str,
    ) -> Result<(), CacheError> {
        Self::ensure_active(ctx)?;

        self.tags
            .write()
            .await
            .entry(tag.to_string())
            .or_default()
            .insert(key.to_string());

        Ok(())
    }

    async fn remove_from_tag(&self, ctx: &QueryContext, tag: &str) -> Result<(), CacheError> {
        Self::ensure_active(ctx)?;

        // Detach the member set first; the lock is not held while invalidating
        let keys = self.tags.write().await.remove(tag).unwrap_or_default();

        for key in &keys {
            self.entries.invalidate(key).await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> QueryContext {
        QueryContext::new()
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let store = InMemoryStore::new();

        store
            .set(&ctx(), "key1", b"value1", Duration::from_secs(60))
            .await
            .unwrap();

        let result = store.get(&ctx(), "key1").await.unwrap();
        assert_eq!(result, Some(b"value1".to_vec()));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = InMemoryStore::new();

        let result = store.get(&ctx(), "missing").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_overwrite_keeps_last_write() {
        let store = InMemoryStore::new();

        store
            .set(&ctx(), "key1", b"first", Duration::from_secs(60))
            .await
            .unwrap();
        store
            .set(&ctx(), "key1", b"second", Duration::from_secs(60))
            .await
            .unwrap();

        let result = store.get(&ctx(), "key1").await.unwrap();
        assert_eq!(result, Some(b"second".to_vec()));
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let store = InMemoryStore::new();

        store
            .set(&ctx(), "key1", b"value1", Duration::from_millis(50))
            .await
            .unwrap();

        assert!(store.get(&ctx(), "key1").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(store.get(&ctx(), "key1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_zero_ttl_never_expires() {
        let store = InMemoryStore::new();

        store
            .set(&ctx(), "key1", b"value1", Duration::ZERO)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(
            store.get(&ctx(), "key1").await.unwrap(),
            Some(b"value1".to_vec())
        );
    }

    #[tokio::test]
    async fn test_huge_ttl_is_kept_without_expiry() {
        let store = InMemoryStore::new();

        store
            .set(&ctx(), "key1", b"value1", Duration::MAX)
            .await
            .unwrap();

        assert_eq!(
            store.get(&ctx(), "key1").await.unwrap(),
            Some(b"value1".to_vec())
        );
    }

    #[test]
    fn test_expiry_for() {
        assert_eq!(InMemoryStore::expiry_for(Duration::ZERO), None);
        assert_eq!(InMemoryStore::expiry_for(Duration::MAX), None);

        let now = InMemoryStore::current_time_millis();
        let expires_at = InMemoryStore::expiry_for(Duration::from_secs(60)).unwrap();
        assert!(expires_at >= now + 60_000);
    }

    #[tokio::test]
    async fn test_expired_key_leaves_its_tag() {
        let store = InMemoryStore::new();

        store
            .set(&ctx(), "key1", b"a", Duration::from_millis(20))
            .await
            .unwrap();
        store
            .set(&ctx(), "key2", b"b", Duration::from_secs(60))
            .await
            .unwrap();
        store.save_tag_key(&ctx(), "users", "key1").await.unwrap();
        store.save_tag_key(&ctx(), "users", "key2").await.unwrap();
        store.save_tag_key(&ctx(), "stale", "key1").await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(store.get(&ctx(), "key1").await.unwrap().is_none());
        assert_eq!(store.tag_members("users").await, vec!["key2"]);
        assert!(store.tag_members("stale").await.is_empty());
    }

    #[tokio::test]
    async fn test_capacity_eviction_leaves_tag() {
        let store =
            InMemoryStore::with_config(InMemoryStoreConfig::default().with_max_capacity(1));

        for i in 0..20 {
            let key = format!("key{}", i);
            store.save_tag_key(&ctx(), "bulk", &key).await.unwrap();
            store.set(&ctx(), &key, b"v", Duration::ZERO).await.unwrap();
        }

        // Flushes pending evictions and their listener calls
        let live = store.entry_count().await;

        assert!(live <= 1);
        assert!(store.tag_members("bulk").await.len() as u64 <= live);
    }

    #[tokio::test]
    async fn test_save_tag_key_is_idempotent() {
        let store = InMemoryStore::new();

        store.save_tag_key(&ctx(), "users", "key1").await.unwrap();
        store.save_tag_key(&ctx(), "users", "key1").await.unwrap();
        store.save_tag_key(&ctx(), "users", "key2").await.unwrap();

        assert_eq!(store.tag_members("users").await, vec!["key1", "key2"]);
    }

    #[tokio::test]
    async fn test_remove_from_tag_deletes_members_and_tag() {
        let store = InMemoryStore::new();
        let ttl = Duration::from_secs(60);

        store.set(&ctx(), "key1", b"a", ttl).await.unwrap();
        store.set(&ctx(), "key2", b"b", ttl).await.unwrap();
        store.save_tag_key(&ctx(), "users", "key1").await.unwrap();
        store.save_tag_key(&ctx(), "users", "key2").await.unwrap();

        store.remove_from_tag(&ctx(), "users").await.unwrap();

        assert!(store.get(&ctx(), "key1").await.unwrap().is_none());
        assert!(store.get(&ctx(), "key2").await.unwrap().is_none());
        assert!(store.tag_members("users").await.is_empty());
        assert_eq!(store.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_remove_from_tag_leaves_other_tags() {
        let store = InMemoryStore::new();
        let ttl = Duration::from_secs(60);

        store.set(&ctx(), "key1", b"a", ttl).await.unwrap();
        store.set(&ctx(), "key2", b"b", ttl).await.unwrap();
        store.save_tag_key(&ctx(), "t1", "key1").await.unwrap();
        store.save_tag_key(&ctx(), "t2", "key2").await.unwrap();

        store.remove_from_tag(&ctx(), "t1").await.unwrap();

        assert!(store.get(&ctx(), "key1").await.unwrap().is_none());
        assert_eq!(store.get(&ctx(), "key2").await.unwrap(), Some(b"b".to_vec()));
        assert_eq!(store.tag_members("t2").await, vec!["key2"]);
    }

    #[tokio::test]
    async fn test_remove_unknown_tag() {
        let store = InMemoryStore::new();

        assert!(store.remove_from_tag(&ctx(), "missing").await.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_context_is_rejected() {
        let store = InMemoryStore::new();
        let ctx = QueryContext::new();
        ctx.cancellation().cancel();

        let result = store.get(&ctx, "key1").await;
        assert!(matches!(result, Err(CacheError::Cancelled)));

        let result = store.set(&ctx, "key1", b"a", Duration::ZERO).await;
        assert!(matches!(result, Err(CacheError::Cancelled)));
    }

    #[tokio::test]
    async fn test_config() {
        let config = InMemoryStoreConfig::default()
            .with_max_capacity(100)
            .with_time_to_idle(Duration::from_secs(60));

        let store = InMemoryStore::with_config(config);

        assert_eq!(store.config().max_capacity, 100);
        assert_eq!(store.config().time_to_idle, Some(Duration::from_secs(60)));
    }
}
