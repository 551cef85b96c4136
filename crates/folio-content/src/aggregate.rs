//! Cross-partition read models.

use folio_core::{
  Entity, Error,
  post::PostWithTags,
  store::{PostStore, TagStore},
  tag::{Tag, TagId},
};
use tracing::trace;
use uuid::Uuid;

/// Load a post with its linked tags.
///
/// Reads the post and its tag ids on the post's partition, then resolves the
/// ids on the tag partition. The two reads are separate transactions. Tag ids
/// the tag partition does not know are left out of `tags`.
pub async fn post_with_tags<S>(store: &S, uuid: Uuid) -> folio_core::Result<PostWithTags>
where
  S: PostStore + TagStore,
{
  let (post, tag_ids) = store.get_post_with_tag_ids(uuid).await?;
  let tags = linked_tags(store, uuid, &tag_ids).await?;
  Ok(PostWithTags { post, tag_ids, tags })
}

/// The second half of [`post_with_tags`]: resolve the ids linked to post
/// `uuid` on the tag partition.
///
/// Any failure is reported as a `Persistence` error on [`Entity::Tag`].
pub async fn linked_tags<S: TagStore>(
  store: &S,
  uuid: Uuid,
  tag_ids: &[TagId],
) -> folio_core::Result<Vec<Tag>> {
  let tags = store
    .resolve_tags(tag_ids.to_vec())
    .await
    .map_err(|e| match e {
      Error::Persistence { entity: Entity::Tag, .. } => e,
      other => Error::persistence(Entity::Tag, uuid, other),
    })?;

  if tags.len() < tag_ids.len() {
    trace!(%uuid, linked = tag_ids.len(), resolved = tags.len(), "dangling tag links");
  }
  Ok(tags)
}
