//! Two-stage shard routing: `uuid → bucket → partition`.
//!
//! Buckets vastly outnumber partitions. Re-partitioning moves a contiguous
//! range of buckets to another partition by editing the assignment table; no
//! identifier is ever rehashed. Routing is pure: it never consults a database.

use std::ops::Range;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{Error, Result};

/// Default number of buckets when the configuration does not name one.
pub const DEFAULT_BUCKET_COUNT: u32 = 1024;

// ─── Strategies ──────────────────────────────────────────────────────────────

/// Maps an identifier onto `0..bucket_count`.
///
/// Implementations must be deterministic across processes and restarts;
/// `std::hash` hashers with random keys are not suitable.
pub trait BucketHasher: Send + Sync {
  fn bucket_of(&self, id: &Uuid, bucket_count: u32) -> u32;
}

/// Maps a bucket onto a partition index.
pub trait BucketAssignment: Send + Sync {
  fn bucket_count(&self) -> u32;
  fn partition_count(&self) -> usize;
  /// `None` if `bucket` is outside `0..bucket_count`.
  fn partition_of(&self, bucket: u32) -> Option<usize>;
}

/// Buckets by the first eight bytes of the SHA-256 digest of the uuid.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl BucketHasher for Sha256Hasher {
  fn bucket_of(&self, id: &Uuid, bucket_count: u32) -> u32 {
    let digest = Sha256::digest(id.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % u64::from(bucket_count.max(1))) as u32
  }
}

// ─── Assignment table ────────────────────────────────────────────────────────

/// Static `bucket → partition` table, sized at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentTable {
  slots:      Vec<usize>,
  partitions: usize,
}

impl AssignmentTable {
  /// Split `bucket_count` buckets into `partitions` contiguous, near-equal
  /// ranges.
  pub fn uniform(bucket_count: u32, partitions: usize) -> Result<Self> {
    if partitions == 0 || (bucket_count as usize) < partitions {
      return Err(Error::Routing { index: 0, count: partitions });
    }
    let slots = (0..u64::from(bucket_count))
      .map(|b| (b * partitions as u64 / u64::from(bucket_count)) as usize)
      .collect();
    Ok(Self { slots, partitions })
  }

  /// Build a table from explicit slots. Every slot must name a partition in
  /// `0..partitions`.
  pub fn from_slots(slots: Vec<usize>, partitions: usize) -> Result<Self> {
    if let Some(&bad) = slots.iter().find(|&&p| p >= partitions) {
      return Err(Error::Routing { index: bad, count: partitions });
    }
    if slots.is_empty() || u32::try_from(slots.len()).is_err() {
      return Err(Error::Routing { index: 0, count: partitions });
    }
    Ok(Self { slots, partitions })
  }

  /// Point a contiguous bucket range at `partition`.
  pub fn reassign(&mut self, buckets: Range<u32>, partition: usize) -> Result<()> {
    if partition >= self.partitions {
      return Err(Error::Routing { index: partition, count: self.partitions });
    }
    let end = (buckets.end as usize).min(self.slots.len());
    let start = (buckets.start as usize).min(end);
    self.slots[start..end].fill(partition);
    Ok(())
  }

  /// Buckets currently owned by `partition`.
  pub fn buckets_of(&self, partition: usize) -> impl Iterator<Item = u32> + '_ {
    self
      .slots
      .iter()
      .enumerate()
      .filter(move |(_, p)| **p == partition)
      .map(|(b, _)| b as u32)
  }
}

impl BucketAssignment for AssignmentTable {
  fn bucket_count(&self) -> u32 { self.slots.len() as u32 }

  fn partition_count(&self) -> usize { self.partitions }

  fn partition_of(&self, bucket: u32) -> Option<usize> {
    self.slots.get(bucket as usize).copied()
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Resolves the partition owning a post. Comments and tag links always route
/// through their parent post's uuid.
#[derive(Debug, Clone)]
pub struct ShardRouter<H = Sha256Hasher, A = AssignmentTable> {
  hasher:     H,
  assignment: A,
}

impl ShardRouter {
  /// SHA-256 bucketing over a uniform assignment table.
  pub fn uniform(bucket_count: u32, partitions: usize) -> Result<Self> {
    Ok(Self::new(
      Sha256Hasher,
      AssignmentTable::uniform(bucket_count, partitions)?,
    ))
  }
}

impl<H: BucketHasher, A: BucketAssignment> ShardRouter<H, A> {
  pub fn new(hasher: H, assignment: A) -> Self { Self { hasher, assignment } }

  pub fn bucket_for(&self, id: &Uuid) -> u32 {
    self.hasher.bucket_of(id, self.assignment.bucket_count())
  }

  pub fn partition_for(&self, id: &Uuid) -> Result<usize> {
    let bucket = self.bucket_for(id);
    let count = self.partition_count();
    match self.assignment.partition_of(bucket) {
      Some(index) if index < count => Ok(index),
      Some(index) => Err(Error::Routing { index, count }),
      None => Err(Error::Routing { index: bucket as usize, count }),
    }
  }

  pub fn partition_count(&self) -> usize { self.assignment.partition_count() }

  /// Validate a caller-supplied partition index.
  pub fn check_partition(&self, index: usize) -> Result<usize> {
    let count = self.partition_count();
    if index < count {
      Ok(index)
    } else {
      Err(Error::Routing { index, count })
    }
  }

  pub fn assignment(&self) -> &A { &self.assignment }
}
