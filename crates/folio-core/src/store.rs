//! The store traits implemented by storage backends (e.g.
//! `folio-store-sqlite`).
//!
//! Higher layers (`folio-content`, `folio-cli`) depend on these abstractions,
//! not on any concrete backend. Every operation runs inside a single
//! transaction on a single partition; nothing here spans partitions.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes.

use std::future::Future;

use uuid::Uuid;

use crate::{
  Result,
  comment::{Comment, CommentPatch, NewComment},
  post::{NewPost, Post, PostPatch},
  tag::{Tag, TagId},
};

// ─── Posts ───────────────────────────────────────────────────────────────────

/// Per-partition storage for posts and their tag links.
pub trait PostStore: Send + Sync {
  /// Number of post partitions behind this store.
  fn partition_count(&self) -> usize;

  /// Partition that owns `uuid`.
  fn partition_of(&self, uuid: Uuid) -> Result<usize>;

  /// Insert a post in state `NEW`. The uuid is generated by the store and
  /// decides the partition.
  fn create_post(
    &self,
    input: NewPost,
  ) -> impl Future<Output = Result<Post>> + Send + '_;

  /// Fetch a non-deleted post.
  fn get_post(&self, uuid: Uuid)
  -> impl Future<Output = Result<Post>> + Send + '_;

  /// Page through the non-deleted posts of one partition, ordered by local id.
  fn list_posts(
    &self,
    partition: usize,
    offset: u32,
    limit: u32,
  ) -> impl Future<Output = Result<Vec<Post>>> + Send + '_;

  /// Apply a partial update. Fails with `NotFound` if the post is missing or
  /// deleted and with `InvalidState` for a forbidden target state.
  fn update_post(
    &self,
    uuid: Uuid,
    patch: PostPatch,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Soft-delete. A second call reports `NotFound`.
  fn delete_post(&self, uuid: Uuid)
  -> impl Future<Output = Result<()>> + Send + '_;

  /// Link tags to a post. Already-linked ids are ignored.
  fn assign_tags(
    &self,
    uuid: Uuid,
    tag_ids: Vec<TagId>,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Unlink the given tags. Ids that were not linked are ignored.
  fn remove_tags(
    &self,
    uuid: Uuid,
    tag_ids: Vec<TagId>,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Unlink every tag. A post without tags is not an error.
  fn remove_all_tags(
    &self,
    uuid: Uuid,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Read a post and its linked tag ids in one partition transaction.
  fn get_post_with_tag_ids(
    &self,
    uuid: Uuid,
  ) -> impl Future<Output = Result<(Post, Vec<TagId>)>> + Send + '_;
}

// ─── Comments ────────────────────────────────────────────────────────────────

/// Comments, addressed through the parent post's uuid so that they always
/// resolve to the post's partition.
pub trait CommentStore: Send + Sync {
  /// Insert a comment in state `NEW` under a non-deleted post.
  fn create_comment(
    &self,
    post_uuid: Uuid,
    input: NewComment,
  ) -> impl Future<Output = Result<Comment>> + Send + '_;

  fn get_comment(
    &self,
    post_uuid: Uuid,
    comment_uuid: Uuid,
  ) -> impl Future<Output = Result<Comment>> + Send + '_;

  fn list_comments(
    &self,
    post_uuid: Uuid,
    offset: u32,
    limit: u32,
  ) -> impl Future<Output = Result<Vec<Comment>>> + Send + '_;

  fn update_comment(
    &self,
    post_uuid: Uuid,
    comment_uuid: Uuid,
    patch: CommentPatch,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  fn delete_comment(
    &self,
    post_uuid: Uuid,
    comment_uuid: Uuid,
  ) -> impl Future<Output = Result<()>> + Send + '_;
}

// ─── Tags ────────────────────────────────────────────────────────────────────

/// The global tag catalog. There is deliberately no delete: other partitions
/// hold logical references that a delete would leave dangling.
pub trait TagStore: Send + Sync {
  /// Fails with `DuplicateName` if the name is taken.
  fn create_tag(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Tag>> + Send + '_;

  /// Fails with `DuplicateName` if another tag already has `name`.
  fn update_tag(
    &self,
    id: TagId,
    name: String,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  fn get_tag(&self, id: TagId) -> impl Future<Output = Result<Tag>> + Send + '_;

  fn list_tags(
    &self,
    offset: u32,
    limit: u32,
  ) -> impl Future<Output = Result<Vec<Tag>>> + Send + '_;

  /// Batch lookup. Unknown ids are absent from the result.
  fn resolve_tags(
    &self,
    ids: Vec<TagId>,
  ) -> impl Future<Output = Result<Vec<Tag>>> + Send + '_;
}
