//! SQLite backend for the Folio content store.
//!
//! Every partition is an independent SQLite database wrapped in
//! [`tokio_rusqlite`], so all database access runs on a dedicated thread per
//! partition without blocking the async runtime. Posts and comments are spread
//! across the post partitions by the shard router; tags live in one extra
//! partition of their own.

mod cluster;
mod comments;
mod encode;
mod partition;
mod posts;
mod tags;

pub mod error;
pub mod schema;

pub use cluster::{ClusterConfig, DEFAULT_OP_TIMEOUT, SqliteCluster};
pub use error::{Error, Result};
pub use partition::Partition;

#[cfg(test)]
mod tests;
