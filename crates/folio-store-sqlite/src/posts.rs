//! [`PostStore`] for [`SqliteCluster`]: post CRUD, the soft-delete state
//! machine, and per-partition tag links.

use chrono::Utc;
use folio_core::{
  ContentState, Entity,
  post::{NewPost, Post, PostPatch},
  routing::{BucketAssignment, BucketHasher},
  store::PostStore,
  tag::TagId,
};
use rusqlite::OptionalExtension as _;
use tracing::debug;
use uuid::Uuid;

use crate::{
  SqliteCluster,
  encode::{DELETED, RawPost, encode_dt, encode_uuid},
  error::Context as _,
  partition::{Outcome, guard_transition},
};

const SELECT_LIVE_POST: &str = "
  SELECT id, uuid, author_id, text, preview_text, topic, state, create_date, last_update_date
  FROM posts
  WHERE uuid = ?1 AND state != ?2";

const SELECT_LIVE_POST_ID: &str =
  "SELECT id FROM posts WHERE uuid = ?1 AND state != ?2";

const SELECT_LIVE_POST_STATE: &str =
  "SELECT state FROM posts WHERE uuid = ?1 AND state != ?2";

const SELECT_TAG_IDS: &str =
  "SELECT tag_id FROM posts_and_tags WHERE post_id = ?1 ORDER BY tag_id";

const TOUCH_POST: &str = "UPDATE posts SET last_update_date = ?2 WHERE id = ?1";

/// Resolve the local id of a live post and stamp it as modified.
fn touch_live_post(
  tx: &rusqlite::Transaction<'_>,
  uuid: &str,
  now: &str,
) -> rusqlite::Result<Option<i64>> {
  let id: Option<i64> = tx
    .query_row(SELECT_LIVE_POST_ID, rusqlite::params![uuid, DELETED], |r| r.get(0))
    .optional()?;
  if let Some(id) = id {
    tx.execute(TOUCH_POST, rusqlite::params![id, now])?;
  }
  Ok(id)
}

impl<H: BucketHasher, A: BucketAssignment> PostStore for SqliteCluster<H, A> {
  fn partition_count(&self) -> usize { self.router.partition_count() }

  fn partition_of(&self, uuid: Uuid) -> folio_core::Result<usize> {
    self.router.partition_for(&uuid)
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn create_post(&self, input: NewPost) -> folio_core::Result<Post> {
    let now = Utc::now();
    let mut post = Post {
      id:           0,
      uuid:         Uuid::new_v4(),
      author_id:    input.author_id,
      text:         input.text,
      preview_text: input.preview_text,
      topic:        input.topic,
      state:        ContentState::New,
      created_at:   now,
      updated_at:   now,
    };
    let partition = self.post_partition(post.uuid)?;

    let uuid_str      = encode_uuid(post.uuid);
    let author_str    = encode_uuid(post.author_id);
    let text          = post.text.clone();
    let preview_text  = post.preview_text.clone();
    let topic         = post.topic.clone();
    let state_str     = post.state.as_str();
    let now_str       = encode_dt(now);

    post.id = partition
      .transact(self.op_timeout, move |tx| {
        tx.execute(
          "INSERT INTO posts (
             uuid, author_id, text, preview_text, topic, state,
             create_date, last_update_date
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
          rusqlite::params![
            uuid_str,
            author_str,
            text,
            preview_text,
            topic,
            state_str,
            now_str,
          ],
        )?;
        Ok(tx.last_insert_rowid())
      })
      .await
      .context(Entity::Post, post.uuid)?;

    debug!(uuid = %post.uuid, partition = partition.index(), id = post.id, "created post");
    Ok(post)
  }

  async fn update_post(&self, uuid: Uuid, patch: PostPatch) -> folio_core::Result<()> {
    if patch.state == Some(ContentState::Deleted) {
      return Err(folio_core::Error::InvalidState(
        "DELETED can only be set through delete".into(),
      ));
    }
    let partition = self.post_partition(uuid)?;

    let target       = patch.state;
    let uuid_str     = encode_uuid(uuid);
    let author_str   = patch.author_id.map(encode_uuid);
    let state_str    = patch.state.map(ContentState::as_str);
    let now_str      = encode_dt(Utc::now());

    let outcome = partition
      .transact(self.op_timeout, move |tx| {
        if let Some(stop) = guard_transition(
          tx,
          SELECT_LIVE_POST_STATE,
          rusqlite::params![uuid_str, DELETED],
          target,
        )? {
          return Ok(stop);
        }

        let rows = tx.execute(
          "UPDATE posts SET
             author_id        = COALESCE(?2, author_id),
             text             = COALESCE(?3, text),
             preview_text     = COALESCE(?4, preview_text),
             topic            = COALESCE(?5, topic),
             state            = COALESCE(?6, state),
             last_update_date = ?7
           WHERE uuid = ?1 AND state != ?8",
          rusqlite::params![
            uuid_str,
            author_str,
            patch.text,
            patch.preview_text,
            patch.topic,
            state_str,
            now_str,
            DELETED,
          ],
        )?;
        Ok(Outcome::from_affected(rows))
      })
      .await
      .context(Entity::Post, uuid)?;

    outcome.into_result(Entity::Post, uuid, target)?;
    debug!(%uuid, state = ?target, "updated post");
    Ok(())
  }

  async fn delete_post(&self, uuid: Uuid) -> folio_core::Result<()> {
    let partition = self.post_partition(uuid)?;
    let uuid_str  = encode_uuid(uuid);
    let now_str   = encode_dt(Utc::now());

    let rows = partition
      .transact(self.op_timeout, move |tx| {
        tx.execute(
          "UPDATE posts SET state = ?2, last_update_date = ?3
           WHERE uuid = ?1 AND state != ?2",
          rusqlite::params![uuid_str, DELETED, now_str],
        )
      })
      .await
      .context(Entity::Post, uuid)?;

    Outcome::from_affected(rows).into_result(Entity::Post, uuid, None)?;
    debug!(%uuid, "deleted post");
    Ok(())
  }

  // ── Tag links ─────────────────────────────────────────────────────────────

  async fn assign_tags(&self, uuid: Uuid, tag_ids: Vec<TagId>) -> folio_core::Result<()> {
    let partition = self.post_partition(uuid)?;
    let uuid_str  = encode_uuid(uuid);
    let now_str   = encode_dt(Utc::now());
    let count     = tag_ids.len();

    let found = partition
      .transact(self.op_timeout, move |tx| {
        let Some(post_id) = touch_live_post(tx, &uuid_str, &now_str)? else {
          return Ok(false);
        };
        let mut stmt = tx.prepare_cached(
          "INSERT OR IGNORE INTO posts_and_tags (post_id, tag_id) VALUES (?1, ?2)",
        )?;
        for tag_id in tag_ids {
          stmt.execute(rusqlite::params![post_id, tag_id])?;
        }
        Ok(true)
      })
      .await
      .context(Entity::Post, uuid)?;

    if !found {
      return Err(folio_core::Error::not_found(Entity::Post, uuid));
    }
    debug!(%uuid, count, "assigned tags");
    Ok(())
  }

  async fn remove_tags(&self, uuid: Uuid, tag_ids: Vec<TagId>) -> folio_core::Result<()> {
    let partition = self.post_partition(uuid)?;
    let uuid_str  = encode_uuid(uuid);
    let now_str   = encode_dt(Utc::now());
    let count     = tag_ids.len();

    let found = partition
      .transact(self.op_timeout, move |tx| {
        let Some(post_id) = touch_live_post(tx, &uuid_str, &now_str)? else {
          return Ok(false);
        };
        let mut stmt = tx.prepare_cached(
          "DELETE FROM posts_and_tags WHERE post_id = ?1 AND tag_id = ?2",
        )?;
        for tag_id in tag_ids {
          stmt.execute(rusqlite::params![post_id, tag_id])?;
        }
        Ok(true)
      })
      .await
      .context(Entity::Post, uuid)?;

    if !found {
      return Err(folio_core::Error::not_found(Entity::Post, uuid));
    }
    debug!(%uuid, count, "removed tags");
    Ok(())
  }

  async fn remove_all_tags(&self, uuid: Uuid) -> folio_core::Result<()> {
    let partition = self.post_partition(uuid)?;
    let uuid_str  = encode_uuid(uuid);
    let now_str   = encode_dt(Utc::now());

    let removed = partition
      .transact(self.op_timeout, move |tx| {
        let Some(post_id) = touch_live_post(tx, &uuid_str, &now_str)? else {
          return Ok(None);
        };
        let rows = tx.execute(
          "DELETE FROM posts_and_tags WHERE post_id = ?1",
          rusqlite::params![post_id],
        )?;
        Ok(Some(rows))
      })
      .await
      .context(Entity::Post, uuid)?;

    let Some(removed) = removed else {
      return Err(folio_core::Error::not_found(Entity::Post, uuid));
    };
    debug!(%uuid, removed, "removed all tags");
    Ok(())
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn get_post(&self, uuid: Uuid) -> folio_core::Result<Post> {
    let partition = self.post_partition(uuid)?;
    let uuid_str  = encode_uuid(uuid);

    let raw: Option<RawPost> = partition
      .transact(self.op_timeout, move |tx| {
        tx.query_row(
          SELECT_LIVE_POST,
          rusqlite::params![uuid_str, DELETED],
          RawPost::from_row,
        )
        .optional()
      })
      .await
      .context(Entity::Post, uuid)?;

    raw
      .ok_or_else(|| folio_core::Error::not_found(Entity::Post, uuid))?
      .into_post()
      .context(Entity::Post, uuid)
  }

  async fn list_posts(
    &self,
    partition: usize,
    offset: u32,
    limit: u32,
  ) -> folio_core::Result<Vec<Post>> {
    let index = self.router.check_partition(partition)?;
    let partition = self.partition(index)?;

    let raws: Vec<RawPost> = partition
      .transact(self.op_timeout, move |tx| {
        let mut stmt = tx.prepare(
          "SELECT id, uuid, author_id, text, preview_text, topic, state, create_date, last_update_date
           FROM posts
           WHERE state != ?1
           ORDER BY id ASC
           LIMIT ?2 OFFSET ?3",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![DELETED, limit, offset], RawPost::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .context(Entity::Post, format!("partition {index}"))?;

    raws
      .into_iter()
      .map(|raw| {
        let id = raw.uuid.clone();
        raw.into_post().context(Entity::Post, id)
      })
      .collect()
  }

  async fn get_post_with_tag_ids(
    &self,
    uuid: Uuid,
  ) -> folio_core::Result<(Post, Vec<TagId>)> {
    let partition = self.post_partition(uuid)?;
    let uuid_str  = encode_uuid(uuid);

    let found: Option<(RawPost, Vec<TagId>)> = partition
      .transact(self.op_timeout, move |tx| {
        let Some(raw) = tx
          .query_row(
            SELECT_LIVE_POST,
            rusqlite::params![uuid_str, DELETED],
            RawPost::from_row,
          )
          .optional()?
        else {
          return Ok(None);
        };

        let mut stmt = tx.prepare(SELECT_TAG_IDS)?;
        let tag_ids = stmt
          .query_map(rusqlite::params![raw.id], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<TagId>>>()?;
        Ok(Some((raw, tag_ids)))
      })
      .await
      .context(Entity::Post, uuid)?;

    let (raw, tag_ids) =
      found.ok_or_else(|| folio_core::Error::not_found(Entity::Post, uuid))?;
    Ok((raw.into_post().context(Entity::Post, uuid)?, tag_ids))
  }
}
