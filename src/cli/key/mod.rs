//! Key command - prints the cache key a query resolves to

use clap::Args;

use crate::config::AppConfig;
use crate::domain::cache::derive_key;
use crate::domain::query::{Query, QueryParam};

/// Arguments for the key command
#[derive(Args, Clone, Debug)]
pub struct KeyArgs {
    /// SQL statement with `?` or `$N` placeholders
    pub sql: String,

    /// Bound parameter, repeat once per placeholder
    #[arg(long = "param", short = 'p', value_parser = super::parse_param)]
    pub params: Vec<QueryParam>,

    /// Key prefix (overrides config)
    #[arg(long)]
    pub prefix: Option<String>,

    /// Also print the rendered fingerprint
    #[arg(long)]
    pub show_fingerprint: bool,
}

/// Print the derived cache key
pub async fn run(args: KeyArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_default();
    let prefix = args.prefix.unwrap_or(config.cache.prefix);

    let query = args
        .params
        .into_iter()
        .fold(Query::new(args.sql), |query, param| query.bind(param));
    let fingerprint = query.fingerprint();

    if args.show_fingerprint {
        println!("{}", fingerprint);
    }

    println!("{}", derive_key(&prefix, &fingerprint));

    Ok(())
}
