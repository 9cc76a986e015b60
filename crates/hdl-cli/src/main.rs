//! hdl - runtime dependency loader CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use hdl_cli::cmd;
use hdl_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let base_dir = cli.base_dir;

    match cli.command {
        Commands::Fetch { manifest } => cmd::fetch::fetch(&manifest, base_dir).await,
        Commands::List => cmd::list::list(base_dir),
        Commands::Clean { dry_run } => cmd::clean::clean(base_dir, dry_run).await,
        Commands::Hash { files } => cmd::hash::hash(&files).await,
    }
}
