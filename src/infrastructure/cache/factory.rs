//! Store factory for runtime selection

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::cache::Store;
use crate::domain::CacheError;

use super::in_memory::{InMemoryStore, InMemoryStoreConfig};
use super::redis::{RedisStore, RedisStoreConfig};

/// Supported store types
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// In-memory store using moka
    #[default]
    InMemory,
    /// Redis store
    Redis,
}

impl StoreType {
    /// Returns true when entries outlive the process that wrote them
    pub fn is_shared(&self) -> bool {
        match self {
            StoreType::InMemory => false,
            StoreType::Redis => true,
        }
    }
}

impl std::fmt::Display for StoreType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreType::InMemory => write!(f, "in_memory"),
            StoreType::Redis => write!(f, "redis"),
        }
    }
}

impl std::str::FromStr for StoreType {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_memory" | "inmemory" | "memory" => Ok(StoreType::InMemory),
            "redis" => Ok(StoreType::Redis),
            _ => Err(CacheError::configuration(format!(
                "Unknown store type: {}. Valid types: in_memory, redis",
                s
            ))),
        }
    }
}

/// Configuration for the store factory
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Type of store to create
    #[serde(rename = "type")]
    pub store_type: StoreType,
    /// Redis URL (required for Redis type)
    pub redis_url: Option<String>,
    /// Maximum capacity (for in-memory store)
    pub max_capacity: Option<u64>,
    /// Time to idle in seconds (for in-memory store)
    pub time_to_idle_secs: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::InMemory,
            redis_url: None,
            max_capacity: Some(10_000),
            time_to_idle_secs: None,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration for the in-memory store
    pub fn in_memory() -> Self {
        Self {
            store_type: StoreType::InMemory,
            ..Default::default()
        }
    }

    /// Creates a new configuration for the Redis store
    pub fn redis(url: impl Into<String>) -> Self {
        Self {
            store_type: StoreType::Redis,
            redis_url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Sets the maximum capacity (in-memory only)
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = Some(capacity);
        self
    }

    /// Sets the time-to-idle (in-memory only)
    pub fn with_time_to_idle(mut self, tti: Duration) -> Self {
        self.time_to_idle_secs = Some(tti.as_secs());
        self
    }
}

/// Factory for creating store instances
#[derive(Debug, Default)]
pub struct StoreFactory;

impl StoreFactory {
    /// Creates a new store factory
    pub fn new() -> Self {
        Self
    }

    /// Creates a store based on configuration
    pub async fn create(&self, config: &StoreConfig) -> Result<Arc<dyn Store>, CacheError> {
        match config.store_type {
            StoreType::InMemory => {
                let mut in_memory_config = InMemoryStoreConfig::default();

                if let Some(capacity) = config.max_capacity {
                    in_memory_config = in_memory_config.with_max_capacity(capacity);
                }

                if let Some(secs) = config.time_to_idle_secs {
                    in_memory_config =
                        in_memory_config.with_time_to_idle(Duration::from_secs(secs));
                }

                tracing::debug!(
                    max_capacity = in_memory_config.max_capacity,
                    "Creating in-memory query cache store"
                );

                Ok(Arc::new(InMemoryStore::with_config(in_memory_config)))
            }
            StoreType::Redis => {
                let url = config.redis_url.clone().ok_or_else(|| {
                    CacheError::configuration("Redis URL is required for Redis store type")
                })?;

                tracing::debug!("Creating Redis query cache store");

                let store = RedisStore::new(RedisStoreConfig::new(url)).await?;
                Ok(Arc::new(store))
            }
        }
    }

    /// Creates an in-memory store with default settings
    pub fn create_in_memory(&self) -> Arc<dyn Store> {
        Arc::new(InMemoryStore::new())
    }
}
