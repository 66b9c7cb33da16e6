use clap::Parser;
use pmp_query_cache::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Key(args) => cli::key::run(args).await,
        Command::Query(args) => cli::query::run(args).await,
        Command::Invalidate(args) => cli::invalidate::run(args).await,
    }
}
