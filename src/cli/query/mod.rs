//! Query command - runs a query through the cache

use std::time::Duration;

use anyhow::Context;
use clap::Args;
use tracing::info;

use crate::domain::cache::QueryContext;
use crate::domain::query::{Query, QueryParam};
use crate::infrastructure::executor::PostgresQueryExecutor;

/// Arguments for the query command
#[derive(Args, Clone, Debug)]
pub struct QueryArgs {
    /// SQL statement with `?` or `$N` placeholders
    pub sql: String,

    /// Bound parameter, repeat once per placeholder
    #[arg(long = "param", short = 'p', value_parser = super::parse_param)]
    pub params: Vec<QueryParam>,

    /// PostgreSQL connection URL (overrides config)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Cache TTL in seconds, 0 caches without expiry; omit to bypass the cache
    #[arg(long)]
    pub ttl_secs: Option<u64>,

    /// Custom cache key, used verbatim
    #[arg(long)]
    pub key: Option<String>,

    /// Tag to register the cached entry under
    #[arg(long)]
    pub tag: Option<String>,

    /// Key prefix (overrides config)
    #[arg(long)]
    pub prefix: Option<String>,
}

/// Run the query and print the rows as JSON
pub async fn run(args: QueryArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;

    let executor_config = config
        .database
        .executor_config(args.database_url.clone())
        .context("A database URL is required (--database-url, DATABASE_URL or database.url)")?;
    let executor = PostgresQueryExecutor::connect(&executor_config).await?;
    let service = super::build_service(&config, args.prefix.clone()).await?;

    let mut ctx = QueryContext::new();
    let ttl = args
        .ttl_secs
        .map(Duration::from_secs)
        .or_else(|| config.cache.default_ttl());

    if let Some(ttl) = ttl {
        ctx = ctx.with_expiration(ttl);
    }
    if let Some(key) = args.key {
        ctx = ctx.with_key(key);
    }
    if let Some(tag) = args.tag {
        ctx = ctx.with_tag(tag);
    }

    let query = args
        .params
        .into_iter()
        .fold(Query::new(args.sql), |query, param| query.bind(param));

    let cancellation = ctx.cancellation().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, cancelling query");
            cancellation.cancel();
        }
    });

    let rows: Vec<serde_json::Value> = service.query(&ctx, &query, &executor).await?;

    println!("{}", serde_json::to_string_pretty(&rows)?);

    Ok(())
}
