//! CLI module for the query cache
//!
//! Provides subcommands for working with a cache deployment:
//! - `key`: print the cache key a query resolves to
//! - `query`: run a query through the cache
//! - `invalidate`: drop every entry registered under a tag

pub mod invalidate;
pub mod key;
pub mod query;

use std::convert::Infallible;
use std::sync::Arc;

use anyhow::bail;
use clap::{Parser, Subcommand};
use tracing::warn;

use crate::config::AppConfig;
use crate::domain::cache::Store;
use crate::domain::query::QueryParam;
use crate::infrastructure::cache::StoreFactory;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::services::{QueryCacheConfig, QueryCacheService};

/// PMP Query Cache - read-through caching for SQL queries
#[derive(Parser)]
#[command(name = "pmp-query-cache")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the cache key for a query
    Key(key::KeyArgs),

    /// Run a query through the cache
    Query(query::QueryArgs),

    /// Remove every cached entry under a tag
    Invalidate(invalidate::InvalidateArgs),
}

/// Parses a command line parameter into a bound value
///
/// `null`, booleans, integers and floats are recognised; anything else binds
/// as text. Quote with `'...'` to force text.
pub fn parse_param(raw: &str) -> Result<QueryParam, Infallible> {
    if let Some(text) = raw
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    {
        return Ok(QueryParam::Text(text.to_string()));
    }

    if raw.eq_ignore_ascii_case("null") {
        return Ok(QueryParam::Null);
    }

    if let Ok(value) = raw.parse::<bool>() {
        return Ok(QueryParam::Bool(value));
    }

    if let Ok(value) = raw.parse::<i64>() {
        return Ok(QueryParam::Int(value));
    }

    if let Ok(value) = raw.parse::<f64>() {
        return Ok(QueryParam::Float(value));
    }

    Ok(QueryParam::Text(raw.to_string()))
}

/// Loads configuration and installs logging
fn bootstrap() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_default();
    init_logging(&config.logging)?;
    Ok(config)
}

/// Rejects stores whose contents die with this process
///
/// Invalidating such a store from a one-shot command can never reach the
/// entries written by other processes.
fn require_shared_store(config: &AppConfig) -> anyhow::Result<()> {
    if !config.store.store_type.is_shared() {
        bail!(
            "The '{}' store is local to this process; configure a shared store (store.type = \"redis\")",
            config.store.store_type
        );
    }

    Ok(())
}

async fn build_service(
    config: &AppConfig,
    prefix: Option<String>,
) -> anyhow::Result<QueryCacheService> {
    if !config.store.store_type.is_shared() {
        warn!(
            store = %config.store.store_type,
            "Cached entries will not outlive this command"
        );
    }

    let store: Arc<dyn Store> = StoreFactory::new().create(&config.store).await?;

    let service = QueryCacheService::new(
        QueryCacheConfig::new()
            .with_store(store)
            .with_prefix(prefix.unwrap_or_else(|| config.cache.prefix.clone())),
    )?;

    Ok(service)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param() {
        assert_eq!(parse_param("null").unwrap(), QueryParam::Null);
        assert_eq!(parse_param("true").unwrap(), QueryParam::Bool(true));
        assert_eq!(parse_param("42").unwrap(), QueryParam::Int(42));
        assert_eq!(parse_param("1.5").unwrap(), QueryParam::Float(1.5));
        assert_eq!(
            parse_param("alice").unwrap(),
            QueryParam::Text("alice".to_string())
        );
        assert_eq!(
            parse_param("'42'").unwrap(),
            QueryParam::Text("42".to_string())
        );
    }

    #[test]
    fn test_cli_parses_key_command() {
        let cli = Cli::try_parse_from([
            "pmp-query-cache",
            "key",
            "--prefix",
            "app:",
            "SELECT username FROM users WHERE id = ?",
            "--param",
            "1",
        ])
        .unwrap();

        match cli.command {
            Command::Key(args) => {
                assert_eq!(args.prefix.as_deref(), Some("app:"));
                assert_eq!(args.params, vec![QueryParam::Int(1)]);
            }
            _ => panic!("expected key command"),
        }
    }

    #[test]
    fn test_require_shared_store() {
        let mut config = AppConfig::default();
        assert!(require_shared_store(&config).is_err());

        config.store = crate::infrastructure::cache::StoreConfig::redis("redis://cache:6379");
        assert!(require_shared_store(&config).is_ok());
    }

    #[test]
    fn test_cli_requires_tag_for_invalidate() {
        assert!(Cli::try_parse_from(["pmp-query-cache", "invalidate"]).is_err());
    }
}
