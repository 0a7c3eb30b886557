//! Command-line entry point for the cooker.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cooker::{Cooker, CookerConfig};

/// Consolidate an MO2 load order into packed archives plus a loose-file
/// overlay.
#[derive(Debug, Parser)]
#[command(name = "cooker", version)]
struct Args {
    /// Path to the source profile's modlist.txt.
    modlist: PathBuf,

    /// Cap on the byte size of one output archive.
    #[arg(long)]
    max_archive_size: Option<u64>,

    /// Maximum number of files per loose-file partition directory.
    #[arg(long)]
    partition_size: Option<usize>,

    /// Concurrency limit for parallel pipeline stages.
    #[arg(long)]
    concurrency: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = CookerConfig::from_mod_list(&args.modlist)
        .with_context(|| format!("deriving layout from {}", args.modlist.display()))?;
    if let Some(cap) = args.max_archive_size {
        config.max_batch_size = cap;
    }
    if let Some(size) = args.partition_size {
        config.loose_partition_size = size;
    }
    if let Some(limit) = args.concurrency {
        config.concurrency = limit;
    }

    info!("cooking profile '{}'", config.profile_name);
    Cooker::new(config).run().await?;
    Ok(())
}
