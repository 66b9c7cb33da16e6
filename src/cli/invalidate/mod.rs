//! Invalidate command - drops every entry registered under a tag

use clap::Args;

use crate::domain::cache::QueryContext;

/// Arguments for the invalidate command
#[derive(Args, Clone, Debug)]
pub struct InvalidateArgs {
    /// Tag whose entries should be removed
    #[arg(long)]
    pub tag: String,
}

/// Remove the tagged entries
pub async fn run(args: InvalidateArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    super::require_shared_store(&config)?;

    let service = super::build_service(&config, None).await?;

    service
        .remove_from_tag(&QueryContext::new(), &args.tag)
        .await?;

    println!("Invalidated tag '{}'", args.tag);

    Ok(())
}
