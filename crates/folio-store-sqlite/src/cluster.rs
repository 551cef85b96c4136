//! [`SqliteCluster`]: the post partitions, the tag partition, and the router
//! that places posts on them.

use std::{path::PathBuf, sync::Arc, time::Duration};

use folio_core::routing::{
  AssignmentTable, BucketAssignment, BucketHasher, DEFAULT_BUCKET_COUNT,
  Sha256Hasher, ShardRouter,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  Error, Partition, Result,
  schema::{POSTS_SCHEMA, TAGS_SCHEMA},
};

/// Default per-operation transaction timeout.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Configuration ───────────────────────────────────────────────────────────

/// Where the partitions live and how posts are spread across them.
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterConfig {
  #[serde(default = "default_bucket_count")]
  pub bucket_count:  u32,
  #[serde(default = "default_op_timeout_ms")]
  pub op_timeout_ms: u64,
  /// Database file of the dedicated tag partition.
  pub tag_partition: PathBuf,
  /// Database files of the post partitions, in partition-index order.
  pub partitions:    Vec<PathBuf>,
}

fn default_bucket_count() -> u32 { DEFAULT_BUCKET_COUNT }

fn default_op_timeout_ms() -> u64 { DEFAULT_OP_TIMEOUT.as_millis() as u64 }

impl ClusterConfig {
  pub fn op_timeout(&self) -> Duration { Duration::from_millis(self.op_timeout_ms) }
}

// ─── Cluster ─────────────────────────────────────────────────────────────────

/// All partitions of a Folio deployment.
///
/// Cloning is cheap. Partitions and the router are reference-counted.
#[derive(Clone)]
pub struct SqliteCluster<H = Sha256Hasher, A = AssignmentTable> {
  pub(crate) router:     Arc<ShardRouter<H, A>>,
  pub(crate) partitions: Arc<[Partition]>,
  pub(crate) tags:       Partition,
  pub(crate) op_timeout: Duration,
}

impl SqliteCluster {
  /// Open every partition named in `config` with a uniform assignment table.
  pub async fn open(config: &ClusterConfig) -> Result<Self> {
    let router =
      ShardRouter::uniform(config.bucket_count, config.partitions.len())?;

    let mut partitions = Vec::with_capacity(config.partitions.len());
    for (index, path) in config.partitions.iter().enumerate() {
      partitions.push(Partition::open(index, path, POSTS_SCHEMA).await?);
    }
    let tags = Partition::open(0, &config.tag_partition, TAGS_SCHEMA).await?;

    Ok(
      Self::from_parts(router, partitions, tags)?
        .with_op_timeout(config.op_timeout()),
    )
  }

  /// `partitions` in-memory post partitions plus an in-memory tag partition,
  /// useful for testing.
  pub async fn open_in_memory(partitions: usize, bucket_count: u32) -> Result<Self> {
    let router = ShardRouter::uniform(bucket_count, partitions)?;

    let mut opened = Vec::with_capacity(partitions);
    for index in 0..partitions {
      opened.push(Partition::open_in_memory(index, POSTS_SCHEMA).await?);
    }
    let tags = Partition::open_in_memory(0, TAGS_SCHEMA).await?;

    Self::from_parts(router, opened, tags)
  }
}

impl<H: BucketHasher, A: BucketAssignment> SqliteCluster<H, A> {
  /// Assemble a cluster from an already-built router and open partitions.
  ///
  /// `partitions[i]` must be the partition with index `i`, and the router
  /// must address exactly `partitions.len()` partitions.
  pub fn from_parts(
    router: ShardRouter<H, A>,
    partitions: Vec<Partition>,
    tags: Partition,
  ) -> Result<Self> {
    if router.partition_count() != partitions.len() {
      return Err(Error::Core(folio_core::Error::Routing {
        index: router.partition_count(),
        count: partitions.len(),
      }));
    }
    if let Some((position, p)) =
      partitions.iter().enumerate().find(|(i, p)| p.index() != *i)
    {
      return Err(Error::MisplacedPartition { index: p.index(), position });
    }

    Ok(Self {
      router: Arc::new(router),
      partitions: partitions.into(),
      tags,
      op_timeout: DEFAULT_OP_TIMEOUT,
    })
  }

  /// Bound every subsequent operation by `timeout`.
  pub fn with_op_timeout(mut self, timeout: Duration) -> Self {
    self.op_timeout = timeout;
    self
  }

  pub fn router(&self) -> &ShardRouter<H, A> { &self.router }

  pub fn op_timeout(&self) -> Duration { self.op_timeout }

  /// The partition that owns the post `uuid`.
  pub(crate) fn post_partition(&self, uuid: Uuid) -> folio_core::Result<&Partition> {
    let index = self.router.partition_for(&uuid)?;
    tracing::trace!(%uuid, partition = index, "routed post");
    self.partition(index)
  }

  /// A post partition by index.
  pub(crate) fn partition(&self, index: usize) -> folio_core::Result<&Partition> {
    self.partitions.get(index).ok_or(folio_core::Error::Routing {
      index,
      count: self.partitions.len(),
    })
  }
}
