//! Infrastructure services

mod query_cache_service;

pub use query_cache_service::{QueryCacheConfig, QueryCacheService};
