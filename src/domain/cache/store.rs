//! Store trait definition

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::domain::cache::QueryContext;
use crate::domain::CacheError;

/// Byte-oriented key/value persistence with a tag membership index
///
/// Implementations must be safe to call concurrently. Eviction is entirely
/// their concern; the query cache only relies on the four operations below.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Store: Send + Sync {
    /// Persists a payload under a key
    ///
    /// A zero TTL keeps the entry until it is explicitly removed.
    async fn set(
        &self,
        ctx: &QueryContext,
        key: &str,
        payload: &[u8],
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// Reads a payload; `Ok(None)` means there is no entry for the key
    async fn get(&self, ctx: &QueryContext, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Adds a key to the tag's membership set (idempotent)
    async fn save_tag_key(&self, ctx: &QueryContext, tag: &str, key: &str)
    -> Result<(), CacheError>;

    /// Deletes every entry registered under the tag and clears the tag itself
    async fn remove_from_tag(&self, ctx: &QueryContext, tag: &str) -> Result<(), CacheError>;
}
