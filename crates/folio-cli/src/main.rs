//! `folio`: command-line access to a Folio content store.
//!
//! Reads `folio.toml` (or the path given with `--config`), opens every
//! partition it names, runs one subcommand and prints the result as JSON.
//!
//! # Usage
//!
//! ```text
//! folio tag create rust
//! folio post create --author <uuid> --topic intro --preview "hi" --text "hello"
//! folio post assign-tags <uuid> 1 2
//! folio post get <uuid>
//! ```

mod commands;
mod settings;

use std::{io, path::PathBuf};

use anyhow::Context as _;
use clap::Parser;
use commands::Command;
use folio_content::{CacheBackend, ContentService, InMemoryCache};
use folio_store_sqlite::SqliteCluster;
use settings::Settings;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "folio", version, about = "Sharded storage for posts, comments and tags")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "folio.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Logs go to stderr so stdout stays valid JSON.
  tracing_subscriber::fmt()
    .with_writer(io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let settings = Settings::load(&cli.config)?;

  let cluster = SqliteCluster::open(&settings.cluster)
    .await
    .context("failed to open partitions")?;
  tracing::debug!(
    partitions = settings.cluster.partitions.len(),
    buckets = settings.cluster.bucket_count,
    "opened cluster"
  );

  dispatch(cli.command, cluster, &settings).await
}

/// Pick the cache backend and run the command.
#[cfg(feature = "redis")]
async fn dispatch(
  command: Command,
  cluster: SqliteCluster,
  settings: &Settings,
) -> anyhow::Result<()> {
  match &settings.cache.redis_url {
    Some(url) => {
      let cache = folio_content::RedisCache::connect(url)
        .with_context(|| format!("failed to set up redis at {url}"))?;
      execute(command, cluster, cache, settings).await
    }
    None => execute(command, cluster, InMemoryCache::new(), settings).await,
  }
}

#[cfg(not(feature = "redis"))]
async fn dispatch(
  command: Command,
  cluster: SqliteCluster,
  settings: &Settings,
) -> anyhow::Result<()> {
  if settings.cache.redis_url.is_some() {
    tracing::warn!("redis_url is set but this build has no redis support, using the in-process cache");
  }
  execute(command, cluster, InMemoryCache::new(), settings).await
}

async fn execute<C: CacheBackend>(
  command: Command,
  cluster: SqliteCluster,
  cache: C,
  settings: &Settings,
) -> anyhow::Result<()> {
  let router = cluster.router().clone();
  let service = ContentService::new(cluster, cache).with_ttl(settings.cache.ttl());

  let mut stdout = io::stdout().lock();
  commands::run(command, &service, |id| router.bucket_for(id), &mut stdout).await
}
