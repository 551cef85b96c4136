//! Threaded comments. A comment always lives in its parent post's partition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{lifecycle::ContentState, post::LocalId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
  pub id:                LocalId,
  pub uuid:              Uuid,
  pub author_id:         Uuid,
  /// Local id of the parent post in the same partition.
  pub post_id:           LocalId,
  /// Reply target within the same post. Not checked for existence.
  pub linked_comment_id: Option<LocalId>,
  pub text:              String,
  pub state:             ContentState,
  pub created_at:        DateTime<Utc>,
  pub updated_at:        DateTime<Utc>,
}

/// Input to [`crate::store::CommentStore::create_comment`].
#[derive(Debug, Clone)]
pub struct NewComment {
  pub author_id:         Uuid,
  pub text:              String,
  pub linked_comment_id: Option<LocalId>,
}

/// A partial update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct CommentPatch {
  pub author_id:         Option<Uuid>,
  pub text:              Option<String>,
  /// New reply target. A patch can move a reply but cannot turn it back
  /// into a top-level comment: `None` keeps the stored link.
  pub linked_comment_id: Option<LocalId>,
  pub state:             Option<ContentState>,
}
