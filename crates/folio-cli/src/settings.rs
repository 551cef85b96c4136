//! Layered configuration: `folio.toml` overridden by `FOLIO_*` variables.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use folio_content::DEFAULT_CACHE_TTL;
use folio_store_sqlite::ClusterConfig;
use serde::Deserialize;

/// Cache settings, read from the same sources as [`ClusterConfig`].
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  #[serde(default = "default_cache_ttl_secs")]
  pub cache_ttl_secs: u64,
  /// Only honoured when built with the `redis` feature.
  #[serde(default)]
  pub redis_url:      Option<String>,
}

fn default_cache_ttl_secs() -> u64 { DEFAULT_CACHE_TTL.as_secs() }

impl CacheConfig {
  pub fn ttl(&self) -> Duration { Duration::from_secs(self.cache_ttl_secs) }
}

pub struct Settings {
  pub cluster: ClusterConfig,
  pub cache:   CacheConfig,
}

impl Settings {
  /// Read `path` (optional) and the environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let source = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(environment());
    Self::from_builder(source)
  }

  fn from_builder(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
  ) -> anyhow::Result<Self> {
    let settings = builder.build().context("failed to read config file")?;

    let mut cluster: ClusterConfig = settings
      .clone()
      .try_deserialize()
      .context("failed to deserialise cluster settings")?;
    let cache: CacheConfig = settings
      .try_deserialize()
      .context("failed to deserialise cache settings")?;

    cluster.tag_partition = expand_tilde(&cluster.tag_partition);
    for path in &mut cluster.partitions {
      *path = expand_tilde(path);
    }

    Ok(Self { cluster, cache })
  }
}

fn environment() -> config::Environment {
  config::Environment::with_prefix("FOLIO")
    .try_parsing(true)
    .list_separator(",")
    .with_list_parse_key("partitions")
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
