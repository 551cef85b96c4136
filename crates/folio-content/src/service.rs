//! [`ContentService`]: the stores and the cache behind one facade.
//!
//! Reads of posts and comments go through the cache. Only `PUBLISHED`
//! content is ever written to it, and every write that can change a cached
//! rendering deletes the affected keys once the store has accepted it.
//!
//! A post entry holds what the post's own partition returns: the row and
//! its linked tag ids. Tag names are resolved on every read, so a rename is
//! visible at once without touching the cache.

use std::{future::Future, time::Duration};

use folio_core::{
  comment::{Comment, CommentPatch, NewComment},
  post::{NewPost, Post, PostPatch, PostPreview, PostWithTags},
  store::{CommentStore, PostStore, TagStore},
  tag::{Tag, TagId},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::{
  aggregate,
  cache::{CacheBackend, CacheKey, Generations, View},
};

/// Default lifetime of a cache entry.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(10 * 60);

/// Page size used when collecting a post's comments for invalidation.
const COMMENT_SWEEP_PAGE: u32 = 500;

/// A cached post rendering without its tag names.
#[derive(Serialize, Deserialize)]
struct PostEntry<T> {
  view:    T,
  tag_ids: Vec<TagId>,
}

/// A value read through the cache.
enum Read<T> {
  Hit(T),
  /// Loaded from the store after a miss. The ticket allows caching it.
  Loaded(T, Ticket),
}

/// The key a loaded value belongs to and its generation before the load.
struct Ticket {
  key:        String,
  generation: u64,
}

pub struct ContentService<S, C> {
  store:       S,
  cache:       C,
  ttl:         Duration,
  generations: Generations,
}

impl<S, C> ContentService<S, C>
where
  S: PostStore + CommentStore + TagStore,
  C: CacheBackend,
{
  pub fn new(store: S, cache: C) -> Self {
    Self { store, cache, ttl: DEFAULT_CACHE_TTL, generations: Generations::new() }
  }

  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = ttl;
    self
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn cache(&self) -> &C { &self.cache }

  pub fn ttl(&self) -> Duration { self.ttl }

  /// Partition that owns `uuid`.
  pub fn shard(&self, uuid: Uuid) -> folio_core::Result<usize> {
    let partition = self.store.partition_of(uuid)?;
    trace!(%uuid, partition, "routed");
    Ok(partition)
  }

  // ── Posts ─────────────────────────────────────────────────────────────────

  pub async fn create_post(&self, input: NewPost) -> folio_core::Result<Post> {
    let post = self.store.create_post(input).await?;
    debug!(uuid = %post.uuid, "post created");
    Ok(post)
  }

  /// The bare post row, read straight from its partition.
  pub async fn get_post(&self, uuid: Uuid) -> folio_core::Result<Post> {
    self.store.get_post(uuid).await
  }

  pub async fn list_posts(
    &self,
    partition: usize,
    offset: u32,
    limit: u32,
  ) -> folio_core::Result<Vec<Post>> {
    self.store.list_posts(partition, offset, limit).await
  }

  pub async fn update_post(&self, uuid: Uuid, patch: PostPatch) -> folio_core::Result<()> {
    self.store.update_post(uuid, patch).await?;
    self.invalidate_post(uuid).await;
    debug!(%uuid, "post updated");
    Ok(())
  }

  /// Soft-delete a post. Cached renderings of the post and of its comments
  /// are dropped.
  pub async fn delete_post(&self, uuid: Uuid) -> folio_core::Result<()> {
    let comments = self.comment_uuids(uuid).await?;
    self.store.delete_post(uuid).await?;

    self.invalidate_post(uuid).await;
    for comment in comments {
      self.invalidate(CacheKey::comment(uuid, comment)).await;
    }
    debug!(%uuid, "post deleted");
    Ok(())
  }

  pub async fn assign_tags(&self, uuid: Uuid, tag_ids: Vec<TagId>) -> folio_core::Result<()> {
    self.store.assign_tags(uuid, tag_ids).await?;
    self.invalidate_post(uuid).await;
    Ok(())
  }

  pub async fn remove_tags(&self, uuid: Uuid, tag_ids: Vec<TagId>) -> folio_core::Result<()> {
    self.store.remove_tags(uuid, tag_ids).await?;
    self.invalidate_post(uuid).await;
    Ok(())
  }

  pub async fn clear_tags(&self, uuid: Uuid) -> folio_core::Result<()> {
    self.store.remove_all_tags(uuid).await?;
    self.invalidate_post(uuid).await;
    Ok(())
  }

  /// The full post with its resolved tags.
  pub async fn get_post_with_tags(&self, uuid: Uuid) -> folio_core::Result<PostWithTags> {
    let read = self
      .read(CacheKey::post(uuid, View::Full), || async {
        let (post, tag_ids) = self.store.get_post_with_tag_ids(uuid).await?;
        Ok::<_, folio_core::Error>(PostEntry { view: post, tag_ids })
      })
      .await?;

    let tags = aggregate::linked_tags(&self.store, uuid, &read.value().tag_ids).await?;
    let PostEntry { view: post, tag_ids } =
      self.keep(read, |entry| entry.view.state.is_published()).await;
    Ok(PostWithTags { post, tag_ids, tags })
  }

  /// The preview rendering. The cached entry never holds the full text.
  pub async fn get_post_preview(&self, uuid: Uuid) -> folio_core::Result<PostPreview> {
    let read = self
      .read(CacheKey::post(uuid, View::Preview), || async {
        let (post, tag_ids) = self.store.get_post_with_tag_ids(uuid).await?;
        Ok::<_, folio_core::Error>(PostEntry {
          view: PostPreview::new(post, Vec::new()),
          tag_ids,
        })
      })
      .await?;

    let tags = aggregate::linked_tags(&self.store, uuid, &read.value().tag_ids).await?;
    let PostEntry { view: mut preview, .. } =
      self.keep(read, |entry| entry.view.state.is_published()).await;
    preview.tags = tags;
    Ok(preview)
  }

  // ── Comments ──────────────────────────────────────────────────────────────

  pub async fn create_comment(
    &self,
    post_uuid: Uuid,
    input: NewComment,
  ) -> folio_core::Result<Comment> {
    let comment = self.store.create_comment(post_uuid, input).await?;
    debug!(%post_uuid, uuid = %comment.uuid, "comment created");
    Ok(comment)
  }

  pub async fn get_comment(
    &self,
    post_uuid: Uuid,
    comment_uuid: Uuid,
  ) -> folio_core::Result<Comment> {
    let read = self
      .read(CacheKey::comment(post_uuid, comment_uuid), || {
        self.store.get_comment(post_uuid, comment_uuid)
      })
      .await?;
    Ok(self.keep(read, |comment| comment.state.is_published()).await)
  }

  pub async fn list_comments(
    &self,
    post_uuid: Uuid,
    offset: u32,
    limit: u32,
  ) -> folio_core::Result<Vec<Comment>> {
    self.store.list_comments(post_uuid, offset, limit).await
  }

  pub async fn update_comment(
    &self,
    post_uuid: Uuid,
    comment_uuid: Uuid,
    patch: CommentPatch,
  ) -> folio_core::Result<()> {
    self.store.update_comment(post_uuid, comment_uuid, patch).await?;
    self.invalidate(CacheKey::comment(post_uuid, comment_uuid)).await;
    debug!(%post_uuid, %comment_uuid, "comment updated");
    Ok(())
  }

  pub async fn delete_comment(
    &self,
    post_uuid: Uuid,
    comment_uuid: Uuid,
  ) -> folio_core::Result<()> {
    self.store.delete_comment(post_uuid, comment_uuid).await?;
    self.invalidate(CacheKey::comment(post_uuid, comment_uuid)).await;
    debug!(%post_uuid, %comment_uuid, "comment deleted");
    Ok(())
  }

  // ── Tags ──────────────────────────────────────────────────────────────────

  pub async fn create_tag(&self, name: String) -> folio_core::Result<Tag> {
    self.store.create_tag(name).await
  }

  /// Rename a tag. Post entries hold tag ids only, so nothing is invalidated.
  pub async fn rename_tag(&self, id: TagId, name: String) -> folio_core::Result<()> {
    self.store.update_tag(id, name).await
  }

  pub async fn get_tag(&self, id: TagId) -> folio_core::Result<Tag> {
    self.store.get_tag(id).await
  }

  pub async fn list_tags(&self, offset: u32, limit: u32) -> folio_core::Result<Vec<Tag>> {
    self.store.list_tags(offset, limit).await
  }

  // ── Cache plumbing ────────────────────────────────────────────────────────

  /// Look `key` up, loading from the store on a miss or an unusable entry.
  async fn read<T, F, Fut>(&self, key: CacheKey, load: F) -> folio_core::Result<Read<T>>
  where
    T: DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = folio_core::Result<T>>,
  {
    let key = key.to_string();

    match self.cache.get(&key).await {
      Ok(Some(raw)) => match serde_json::from_str(&raw) {
        Ok(hit) => {
          trace!(%key, "cache hit");
          return Ok(Read::Hit(hit));
        }
        Err(error) => warn!(%key, %error, "undecodable cache entry, treating as miss"),
      },
      Ok(None) => trace!(%key, "cache miss"),
      Err(error) => warn!(%key, %error, "cache read failed, treating as miss"),
    }

    let generation = self.generations.current(&key);
    let value = load().await?;
    Ok(Read::Loaded(value, Ticket { key, generation }))
  }

  /// Unwrap a read, caching a freshly loaded value if `cacheable` allows.
  async fn keep<T: Serialize>(&self, read: Read<T>, cacheable: impl FnOnce(&T) -> bool) -> T {
    match read {
      Read::Hit(value) => value,
      Read::Loaded(value, ticket) => {
        if cacheable(&value) {
          self.fill(ticket, &value).await;
        }
        value
      }
    }
  }

  /// Store `value` unless its key was invalidated since it was loaded.
  async fn fill<T: Serialize>(&self, ticket: Ticket, value: &T) {
    let Ticket { key, generation } = ticket;
    if self.generations.current(&key) != generation {
      trace!(%key, "invalidated while loading, not caching");
      return;
    }

    let raw = match serde_json::to_string(value) {
      Ok(raw) => raw,
      Err(error) => {
        warn!(%key, %error, "could not encode cache entry");
        return;
      }
    };
    if let Err(error) = self.cache.set(&key, raw, self.ttl).await {
      warn!(%key, %error, "cache write failed");
      return;
    }

    // An invalidation that ran while the entry was being stored may have
    // missed it.
    if self.generations.current(&key) != generation {
      trace!(%key, "invalidated while storing, dropping entry");
      if let Err(error) = self.cache.delete(&key).await {
        warn!(%key, %error, "cache invalidation failed");
      }
    }
  }

  async fn invalidate(&self, key: CacheKey) {
    let key = key.to_string();
    self.generations.bump(&key);
    if let Err(error) = self.cache.delete(&key).await {
      warn!(%key, %error, "cache invalidation failed");
    }
  }

  async fn invalidate_post(&self, uuid: Uuid) {
    for key in CacheKey::post_views(uuid) {
      self.invalidate(key).await;
    }
  }

  /// Uuids of every live comment under `post_uuid`.
  async fn comment_uuids(&self, post_uuid: Uuid) -> folio_core::Result<Vec<Uuid>> {
    let mut uuids = Vec::new();
    let mut offset = 0;
    loop {
      let page = self
        .store
        .list_comments(post_uuid, offset, COMMENT_SWEEP_PAGE)
        .await?;
      let len = page.len() as u32;
      uuids.extend(page.into_iter().map(|c| c.uuid));
      if len < COMMENT_SWEEP_PAGE {
        return Ok(uuids);
      }
      offset += len;
    }
  }
}

impl<T> Read<T> {
  fn value(&self) -> &T {
    match self {
      Self::Hit(value) | Self::Loaded(value, _) => value,
    }
  }
}
