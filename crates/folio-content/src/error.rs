//! Error type for the cache layer.
//!
//! Cache errors never reach callers of [`crate::ContentService`]; they are
//! logged and the lookup is treated as a miss.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
  #[error("cache payload error: {0}")]
  Payload(#[from] serde_json::Error),

  #[cfg(feature = "redis")]
  #[error("redis error: {0}")]
  Redis(#[from] deadpool_redis::redis::RedisError),

  #[cfg(feature = "redis")]
  #[error("redis pool error: {0}")]
  Pool(#[from] deadpool_redis::PoolError),

  #[cfg(feature = "redis")]
  #[error("redis pool setup error: {0}")]
  CreatePool(#[from] deadpool_redis::CreatePoolError),

  /// A backend-specific failure without a richer type.
  #[error("cache backend error: {0}")]
  Backend(String),
}

pub type Result<T, E = CacheError> = std::result::Result<T, E>;
