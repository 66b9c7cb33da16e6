//! PMP Query Cache
//!
//! A read-through cache for database queries with support for:
//! - Deterministic cache keys derived from the rendered query
//! - Per-call TTL, custom keys and tags
//! - Tag-based bulk invalidation
//! - In-memory (moka) and Redis stores

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use crate::config::AppConfig;
pub use domain::{
    derive_key, CacheError, CacheOptions, JsonSerializer, Query, QueryContext, QueryExecutor,
    QueryParam, Serializer, Store,
};
pub use infrastructure::cache::{InMemoryStore, RedisStore, StoreConfig, StoreFactory};
pub use infrastructure::services::{QueryCacheConfig, QueryCacheService};
