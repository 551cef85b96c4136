//! Cache backends and keys.
//!
//! Values are opaque strings (the service stores JSON). Backends expire
//! entries on their own; the service never scans for stale keys.

use std::{
  fmt,
  future::Future,
  hash::{BuildHasher, RandomState},
  sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
  },
  time::Duration,
};

use dashmap::DashMap;
use folio_core::Entity;
use tokio::time::Instant;
use uuid::Uuid;

use crate::Result;

// ─── Keys ────────────────────────────────────────────────────────────────────

/// Which rendering of an entity a cache entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
  Full,
  Preview,
}

impl View {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Full => "full",
      Self::Preview => "preview",
    }
  }
}

/// Key of a cache entry, rendered as `{entity}:{uuid}:{view}`.
///
/// Comments are only reachable through their post, so their keys carry the
/// post uuid as well: `comment:{post}/{comment}:full`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
  pub entity: Entity,
  pub parent: Option<Uuid>,
  pub uuid:   Uuid,
  pub view:   View,
}

impl CacheKey {
  pub fn post(uuid: Uuid, view: View) -> Self {
    Self { entity: Entity::Post, parent: None, uuid, view }
  }

  pub fn comment(post_uuid: Uuid, comment_uuid: Uuid) -> Self {
    Self {
      entity: Entity::Comment,
      parent: Some(post_uuid),
      uuid:   comment_uuid,
      view:   View::Full,
    }
  }

  /// Every key a post can occupy.
  pub fn post_views(uuid: Uuid) -> [Self; 2] {
    [Self::post(uuid, View::Full), Self::post(uuid, View::Preview)]
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.parent {
      Some(parent) => {
        write!(f, "{}:{parent}/{}:{}", self.entity, self.uuid, self.view.as_str())
      }
      None => write!(f, "{}:{}:{}", self.entity, self.uuid, self.view.as_str()),
    }
  }
}

// ─── Invalidation generations ────────────────────────────────────────────────

const GENERATION_STRIPES: usize = 256;

/// Per-key invalidation counters, striped by key hash.
///
/// A reader notes the generation of its key before loading and only fills
/// the cache if it is unchanged afterwards. Keys sharing a stripe can only
/// cause a skipped fill, never a stale one.
pub(crate) struct Generations {
  hasher:  RandomState,
  stripes: Box<[AtomicU64]>,
}

impl Generations {
  pub fn new() -> Self {
    Self {
      hasher:  RandomState::new(),
      stripes: (0..GENERATION_STRIPES).map(|_| AtomicU64::new(0)).collect(),
    }
  }

  fn stripe(&self, key: &str) -> &AtomicU64 {
    let index = self.hasher.hash_one(key) as usize % self.stripes.len();
    &self.stripes[index]
  }

  pub fn current(&self, key: &str) -> u64 { self.stripe(key).load(Ordering::Acquire) }

  pub fn bump(&self, key: &str) { self.stripe(key).fetch_add(1, Ordering::AcqRel); }
}

impl Default for Generations {
  fn default() -> Self { Self::new() }
}

// ─── Backend contract ────────────────────────────────────────────────────────

/// A key/value cache with per-entry expiry.
pub trait CacheBackend: Send + Sync {
  fn get<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<String>>> + Send + 'a;

  /// Store `value` under `key`, replacing any previous entry, for `ttl`.
  fn set<'a>(
    &'a self,
    key: &'a str,
    value: String,
    ttl: Duration,
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  /// Remove `key`. Removing an absent key is not an error.
  fn delete<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<()>> + Send + 'a;
}

// ─── In-memory backend ───────────────────────────────────────────────────────

struct Entry {
  value:      String,
  expires_at: Instant,
}

/// Process-local cache on a concurrent map. Expired entries are dropped
/// lazily when read.
///
/// Cloning is cheap and clones share their entries.
#[derive(Clone, Default)]
pub struct InMemoryCache {
  entries: Arc<DashMap<String, Entry>>,
}

impl InMemoryCache {
  pub fn new() -> Self { Self::default() }

  /// Number of stored entries, including expired ones not yet read.
  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl CacheBackend for InMemoryCache {
  async fn get<'a>(&'a self, key: &'a str) -> Result<Option<String>> {
    let now = Instant::now();
    match self.entries.get(key) {
      Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
      Some(_) => {}
      None => return Ok(None),
    };

    self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
    Ok(None)
  }

  async fn set<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> Result<()> {
    let expires_at = Instant::now() + ttl;
    self.entries.insert(key.to_owned(), Entry { value, expires_at });
    Ok(())
  }

  async fn delete<'a>(&'a self, key: &'a str) -> Result<()> {
    self.entries.remove(key);
    Ok(())
  }
}

// ─── Redis backend ───────────────────────────────────────────────────────────

/// Shared cache on a Redis server, using `GET`, `SET ... EX` and `DEL`.
#[cfg(feature = "redis")]
#[derive(Clone)]
pub struct RedisCache {
  pool: deadpool_redis::Pool,
}

#[cfg(feature = "redis")]
impl RedisCache {
  /// Build a connection pool for `url`. No connection is made until the
  /// first command.
  pub fn connect(url: &str) -> Result<Self> {
    let pool = deadpool_redis::Config::from_url(url)
      .create_pool(Some(deadpool_redis::Runtime::Tokio1))?;
    Ok(Self { pool })
  }
}

#[cfg(feature = "redis")]
impl CacheBackend for RedisCache {
  async fn get<'a>(&'a self, key: &'a str) -> Result<Option<String>> {
    let mut conn = self.pool.get().await?;
    let value: Option<String> = deadpool_redis::redis::cmd("GET")
      .arg(key)
      .query_async(&mut conn)
      .await?;
    Ok(value)
  }

  async fn set<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> Result<()> {
    let mut conn = self.pool.get().await?;
    // EX rejects zero.
    let secs = ttl.as_secs().max(1);
    deadpool_redis::redis::cmd("SET")
      .arg(key)
      .arg(value)
      .arg("EX")
      .arg(secs)
      .query_async::<()>(&mut conn)
      .await?;
    Ok(())
  }

  async fn delete<'a>(&'a self, key: &'a str) -> Result<()> {
    let mut conn = self.pool.get().await?;
    deadpool_redis::redis::cmd("DEL")
      .arg(key)
      .query_async::<()>(&mut conn)
      .await?;
    Ok(())
  }
}
