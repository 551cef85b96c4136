//! Posts and their tag-resolved read models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{lifecycle::ContentState, tag::{Tag, TagId}};

/// Partition-local row id. Meaningless outside the partition that issued it.
pub type LocalId = i64;

/// A post row. `uuid` is the global identity and decides the owning
/// partition; `id` is only unique within that partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
  pub id:           LocalId,
  pub uuid:         Uuid,
  pub author_id:    Uuid,
  pub text:         String,
  pub preview_text: String,
  pub topic:        String,
  pub state:        ContentState,
  /// Set once on insert.
  pub created_at:   DateTime<Utc>,
  /// Stamped by every mutation.
  pub updated_at:   DateTime<Utc>,
}

/// Input to [`crate::store::PostStore::create_post`]. The uuid, state and
/// timestamps are always assigned by the store.
#[derive(Debug, Clone)]
pub struct NewPost {
  pub author_id:    Uuid,
  pub text:         String,
  pub preview_text: String,
  pub topic:        String,
}

/// A partial update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct PostPatch {
  pub author_id:    Option<Uuid>,
  pub text:         Option<String>,
  pub preview_text: Option<String>,
  pub topic:        Option<String>,
  pub state:        Option<ContentState>,
}

impl PostPatch {
  pub fn is_empty(&self) -> bool {
    self.author_id.is_none()
      && self.text.is_none()
      && self.preview_text.is_none()
      && self.topic.is_none()
      && self.state.is_none()
  }
}

// ─── Aggregates ──────────────────────────────────────────────────────────────

/// A post together with its linked tag ids and whichever of those tags the
/// tag partition could resolve. Never stored.
///
/// `tags` may be shorter than `tag_ids`: links are logical references into
/// another database and can point at ids the tag partition does not know.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostWithTags {
  pub post:    Post,
  pub tag_ids: Vec<TagId>,
  pub tags:    Vec<Tag>,
}

/// The preview view of a post: everything except the full text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostPreview {
  pub uuid:         Uuid,
  pub author_id:    Uuid,
  pub preview_text: String,
  pub topic:        String,
  pub state:        ContentState,
  pub created_at:   DateTime<Utc>,
  pub tags:         Vec<Tag>,
}

impl PostPreview {
  pub fn new(post: Post, tags: Vec<Tag>) -> Self {
    Self {
      uuid: post.uuid,
      author_id: post.author_id,
      preview_text: post.preview_text,
      topic: post.topic,
      state: post.state,
      created_at: post.created_at,
      tags,
    }
  }
}
