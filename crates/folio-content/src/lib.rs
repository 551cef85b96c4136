//! Read models and caching on top of the Folio stores.
//!
//! [`aggregate`] joins a post with the tags it links to across two
//! partitions. [`cache`] defines the cache backends, and [`ContentService`]
//! ties stores and cache together behind one facade.

pub mod aggregate;
pub mod cache;
pub mod error;
pub mod service;

#[cfg(feature = "redis")]
pub use cache::RedisCache;
pub use cache::{CacheBackend, CacheKey, InMemoryCache, View};
pub use error::{CacheError, Result};
pub use service::{ContentService, DEFAULT_CACHE_TTL};
