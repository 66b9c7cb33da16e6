use std::time::Duration;

use serde::Deserialize;

use crate::infrastructure::cache::StoreConfig;
use crate::infrastructure::executor::PostgresExecutorConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub store: StoreConfig,
    pub cache: CacheSettings,
    pub database: DatabaseSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    /// Single-line events without timestamps
    Compact,
}

/// Query cache behaviour
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Namespace prepended to derived keys
    pub prefix: String,
    /// TTL applied when a command asks for caching without its own value;
    /// zero means entries never expire
    pub default_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            connect_timeout_secs: 30,
        }
    }
}

impl CacheSettings {
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl_secs.map(Duration::from_secs)
    }
}

impl DatabaseSettings {
    /// Builds executor settings, falling back to the given URL
    pub fn executor_config(&self, url: Option<String>) -> Option<PostgresExecutorConfig> {
        let url = url.or_else(|| self.url.clone())?;

        Some(
            PostgresExecutorConfig::new(url)
                .with_max_connections(self.max_connections)
                .with_connect_timeout(self.connect_timeout_secs),
        )
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
