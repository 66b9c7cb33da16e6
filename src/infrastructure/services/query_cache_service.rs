//! Read-through query caching service

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::domain::cache::{derive_key, JsonSerializer, QueryContext, Serializer, Store};
use crate::domain::query::{Query, QueryExecutor};
use crate::domain::CacheError;
use crate::infrastructure::observability::{
    record_cache_invalidation, record_cache_lookup, record_cache_write_failure, CacheOutcome,
    WriteStage,
};

/// Construction settings for the query cache
pub struct QueryCacheConfig<S = JsonSerializer> {
    /// Backing store (required)
    pub store: Option<Arc<dyn Store>>,
    /// Namespace prepended to derived keys
    pub prefix: String,
    /// Payload codec
    pub serializer: S,
}

impl Default for QueryCacheConfig {
    fn default() -> Self {
        Self {
            store: None,
            prefix: String::new(),
            serializer: JsonSerializer,
        }
    }
}

impl QueryCacheConfig {
    /// Creates a config with the JSON serializer and no prefix
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: Serializer> QueryCacheConfig<S> {
    /// Sets the backing store
    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the key prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Replaces the serializer
    pub fn with_serializer<T: Serializer>(self, serializer: T) -> QueryCacheConfig<T> {
        QueryCacheConfig {
            store: self.store,
            prefix: self.prefix,
            serializer,
        }
    }
}

impl<S: Serializer> fmt::Debug for QueryCacheConfig<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCacheConfig")
            .field("store", &self.store.as_ref().map(|_| "<dyn Store>"))
            .field("prefix", &self.prefix)
            .field("serializer", &self.serializer)
            .finish()
    }
}

/// Read-through cache in front of a query executor
///
/// Each call is independent: the service keeps no per-key state and does
/// not de-duplicate concurrent misses, so two cold reads of the same key
/// both hit the database and the last write wins.
pub struct QueryCacheService<S = JsonSerializer> {
    store: Arc<dyn Store>,
    prefix: String,
    serializer: S,
}

impl<S: Serializer> fmt::Debug for QueryCacheService<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCacheService")
            .field("store", &"<dyn Store>")
            .field("prefix", &self.prefix)
            .field("serializer", &self.serializer)
            .finish()
    }
}

impl<S: Serializer> QueryCacheService<S> {
    /// Creates the service, failing when no store was configured
    pub fn new(config: QueryCacheConfig<S>) -> Result<Self, CacheError> {
        let store = config.store.ok_or_else(|| {
            CacheError::configuration("A store is required to build the query cache")
        })?;

        Ok(Self {
            store,
            prefix: config.prefix,
            serializer: config.serializer,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Resolves the cache key for a call
    ///
    /// A custom key from the context is used verbatim; otherwise the key is
    /// derived from the query fingerprint.
    pub fn cache_key(&self, ctx: &QueryContext, query: &Query) -> String {
        match ctx.key() {
            Some(key) => key.to_string(),
            None => derive_key(&self.prefix, &query.fingerprint()),
        }
    }

    /// Runs a query through the cache and returns the decoded result
    pub async fn query<T, E>(
        &self,
        ctx: &QueryContext,
        query: &Query,
        executor: &E,
    ) -> Result<T, E::Error>
    where
        T: Serialize + DeserializeOwned + Default + Send,
        E: QueryExecutor,
    {
        let mut dest = T::default();
        self.query_into(ctx, query, executor, &mut dest).await?;
        Ok(dest)
    }

    /// Runs a query through the cache, writing the result into `dest`
    ///
    /// Only executor errors are returned. Store and codec failures degrade to
    /// a plain database read and are logged.
    pub async fn query_into<T, E>(
        &self,
        ctx: &QueryContext,
        query: &Query,
        executor: &E,
        dest: &mut T,
    ) -> Result<(), E::Error>
    where
        T: Serialize + DeserializeOwned + Default + Send,
        E: QueryExecutor,
    {
        let Some(ttl) = ctx.expiration() else {
            record_cache_lookup(CacheOutcome::Bypass);
            *dest = executor.fetch(ctx, query).await?;
            return Ok(());
        };

        let key = self.cache_key(ctx, query);

        if self.load(ctx, &key, dest).await {
            debug!(key = %key, "Query cache hit");
            record_cache_lookup(CacheOutcome::Hit);
            return Ok(());
        }

        debug!(key = %key, "Query cache miss");
        record_cache_lookup(CacheOutcome::Miss);

        // A rejected payload may have been partially decoded
        *dest = T::default();
        *dest = executor.fetch(ctx, query).await?;

        self.save(ctx, &key, &*dest, ttl).await;

        Ok(())
    }

    /// Removes every entry registered under the tag
    pub async fn remove_from_tag(&self, ctx: &QueryContext, tag: &str) -> Result<(), CacheError> {
        match self.store.remove_from_tag(ctx, tag).await {
            Ok(()) => {
                info!(tag = %tag, "Invalidated query cache tag");
                record_cache_invalidation(true);
                Ok(())
            }
            Err(e) => {
                warn!(tag = %tag, error = %e, "Failed to invalidate query cache tag");
                record_cache_invalidation(false);
                Err(e)
            }
        }
    }

    async fn load<T>(&self, ctx: &QueryContext, key: &str, dest: &mut T) -> bool
    where
        T: DeserializeOwned + Default,
    {
        let payload = match self.store.get(ctx, key).await {
            Ok(Some(payload)) => payload,
            Ok(None) => return false,
            Err(e) => {
                warn!(key = %key, error = %e, "Query cache read failed, falling back to database");
                return false;
            }
        };

        *dest = T::default();

        match self.serializer.deserialize(&payload, dest) {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding undecodable query cache entry");
                false
            }
        }
    }

    async fn save<T>(&self, ctx: &QueryContext, key: &str, value: &T, ttl: Duration)
    where
        T: Serialize,
    {
        let payload = match self.serializer.serialize(value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to encode query result for caching");
                record_cache_write_failure(WriteStage::Serialize);
                return;
            }
        };

        if let Err(e) = self.store.set(ctx, key, &payload, ttl).await {
            warn!(key = %key, error = %e, "Failed to write query cache entry");
            record_cache_write_failure(WriteStage::Set);
            return;
        }

        if let Some(tag) = ctx.tag() {
            if let Err(e) = self.store.save_tag_key(ctx, tag, key).await {
                warn!(key = %key, tag = %tag, error = %e, "Failed to register query cache key under tag");
                record_cache_write_failure(WriteStage::Tag);
            }
        }
    }
}
