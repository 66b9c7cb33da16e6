//! Per-call cache options and the call-scoped query context

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Cache settings for a single read
///
/// Every setting is optional. Without a TTL the read bypasses the cache.
/// A TTL of `Duration::ZERO` caches the result without expiry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheOptions {
    /// Time-to-live of the written entry
    pub ttl: Option<Duration>,
    /// Key used verbatim instead of the derived one
    pub key: Option<String>,
    /// Tag the written key is registered under
    pub tag: Option<String>,
}

impl CacheOptions {
    /// Creates options with caching disabled
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables caching with the given TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Overrides key derivation
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Registers the written entry under a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Returns true when a TTL is present
    pub fn is_enabled(&self) -> bool {
        self.ttl.is_some()
    }
}

/// Call-scoped context threaded through every store and executor call
///
/// Builders consume the context and return a new one, so once a context is
/// handed to the cache its options can no longer change. The cancellation
/// token lets the caller abort both cache and database work.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    options: CacheOptions,
    cancellation: CancellationToken,
}

impl QueryContext {
    /// Creates a context with no cache options
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables caching for the call
    pub fn with_expiration(mut self, ttl: Duration) -> Self {
        self.options.ttl = Some(ttl);
        self
    }

    /// Uses a custom cache key for the call
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.options.key = Some(key.into());
        self
    }

    /// Tags the entry written by the call
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.options.tag = Some(tag.into());
        self
    }

    /// Replaces all cache options at once
    pub fn with_options(mut self, options: CacheOptions) -> Self {
        self.options = options;
        self
    }

    /// Links the call to a caller-owned cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn expiration(&self) -> Option<Duration> {
        self.options.ttl
    }

    pub fn key(&self) -> Option<&str> {
        self.options.key.as_deref()
    }

    pub fn tag(&self) -> Option<&str> {
        self.options.tag.as_deref()
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}
