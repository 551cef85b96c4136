//! [`CommentStore`] for [`SqliteCluster`].
//!
//! Every query joins through the parent post so that comments of a missing or
//! deleted post are neither readable nor writable.

use chrono::Utc;
use folio_core::{
  ContentState, Entity,
  comment::{Comment, CommentPatch, NewComment},
  routing::{BucketAssignment, BucketHasher},
  store::CommentStore,
};
use rusqlite::OptionalExtension as _;
use tracing::debug;
use uuid::Uuid;

use crate::{
  SqliteCluster,
  encode::{DELETED, RawComment, encode_dt, encode_uuid},
  error::Context as _,
  partition::{Outcome, guard_transition},
};

const SELECT_LIVE_COMMENT: &str = "
  SELECT c.id, c.uuid, c.author_id, c.post_id, c.linked_comment_id, c.text,
         c.state, c.create_date, c.last_update_date
  FROM comments c
  JOIN posts p ON p.id = c.post_id
  WHERE p.uuid = ?1 AND p.state != ?3
    AND c.uuid = ?2 AND c.state != ?3";

const SELECT_LIVE_COMMENT_STATE: &str = "
  SELECT c.state
  FROM comments c
  JOIN posts p ON p.id = c.post_id
  WHERE p.uuid = ?1 AND p.state != ?3
    AND c.uuid = ?2 AND c.state != ?3";

const LIVE_PARENT_ID: &str =
  "(SELECT id FROM posts WHERE uuid = ?1 AND state != ?3)";

impl<H: BucketHasher, A: BucketAssignment> CommentStore for SqliteCluster<H, A> {
  async fn create_comment(
    &self,
    post_uuid: Uuid,
    input: NewComment,
  ) -> folio_core::Result<Comment> {
    let partition = self.post_partition(post_uuid)?;
    let now = Utc::now();
    let uuid = Uuid::new_v4();

    let post_str    = encode_uuid(post_uuid);
    let uuid_str    = encode_uuid(uuid);
    let author_str  = encode_uuid(input.author_id);
    let text        = input.text.clone();
    let linked      = input.linked_comment_id;
    let now_str     = encode_dt(now);

    let ids: Option<(i64, i64)> = partition
      .transact(self.op_timeout, move |tx| {
        let post_id: Option<i64> = tx
          .query_row(
            "SELECT id FROM posts WHERE uuid = ?1 AND state != ?2",
            rusqlite::params![post_str, DELETED],
            |row| row.get(0),
          )
          .optional()?;
        let Some(post_id) = post_id else {
          return Ok(None);
        };

        tx.execute(
          "INSERT INTO comments (
             uuid, author_id, post_id, linked_comment_id, text, state,
             create_date, last_update_date
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
          rusqlite::params![
            uuid_str,
            author_str,
            post_id,
            linked,
            text,
            ContentState::New.as_str(),
            now_str,
          ],
        )?;
        Ok(Some((post_id, tx.last_insert_rowid())))
      })
      .await
      .context(Entity::Comment, uuid)?;

    let Some((post_id, id)) = ids else {
      return Err(folio_core::Error::not_found(Entity::Post, post_uuid));
    };

    debug!(%post_uuid, %uuid, post_id, id, "created comment");
    Ok(Comment {
      id,
      uuid,
      author_id: input.author_id,
      post_id,
      linked_comment_id: input.linked_comment_id,
      text: input.text,
      state: ContentState::New,
      created_at: now,
      updated_at: now,
    })
  }

  async fn get_comment(
    &self,
    post_uuid: Uuid,
    comment_uuid: Uuid,
  ) -> folio_core::Result<Comment> {
    let partition = self.post_partition(post_uuid)?;
    let post_str  = encode_uuid(post_uuid);
    let uuid_str  = encode_uuid(comment_uuid);

    let raw: Option<RawComment> = partition
      .transact(self.op_timeout, move |tx| {
        tx.query_row(
          SELECT_LIVE_COMMENT,
          rusqlite::params![post_str, uuid_str, DELETED],
          RawComment::from_row,
        )
        .optional()
      })
      .await
      .context(Entity::Comment, comment_uuid)?;

    raw
      .ok_or_else(|| folio_core::Error::not_found(Entity::Comment, comment_uuid))?
      .into_comment()
      .context(Entity::Comment, comment_uuid)
  }

  async fn list_comments(
    &self,
    post_uuid: Uuid,
    offset: u32,
    limit: u32,
  ) -> folio_core::Result<Vec<Comment>> {
    let partition = self.post_partition(post_uuid)?;
    let post_str  = encode_uuid(post_uuid);

    let raws: Vec<RawComment> = partition
      .transact(self.op_timeout, move |tx| {
        let mut stmt = tx.prepare(
          "SELECT c.id, c.uuid, c.author_id, c.post_id, c.linked_comment_id,
                  c.text, c.state, c.create_date, c.last_update_date
           FROM comments c
           JOIN posts p ON p.id = c.post_id
           WHERE p.uuid = ?1 AND p.state != ?2 AND c.state != ?2
           ORDER BY c.id ASC
           LIMIT ?3 OFFSET ?4",
        )?;
        let rows = stmt
          .query_map(
            rusqlite::params![post_str, DELETED, limit, offset],
            RawComment::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .context(Entity::Comment, format!("post {post_uuid}"))?;

    raws
      .into_iter()
      .map(|raw| {
        let id = raw.uuid.clone();
        raw.into_comment().context(Entity::Comment, id)
      })
      .collect()
  }

  async fn update_comment(
    &self,
    post_uuid: Uuid,
    comment_uuid: Uuid,
    patch: CommentPatch,
  ) -> folio_core::Result<()> {
    if patch.state == Some(ContentState::Deleted) {
      return Err(folio_core::Error::InvalidState(
        "DELETED can only be set through delete".into(),
      ));
    }
    let partition = self.post_partition(post_uuid)?;

    let target     = patch.state;
    let post_str   = encode_uuid(post_uuid);
    let uuid_str   = encode_uuid(comment_uuid);
    let author_str = patch.author_id.map(encode_uuid);
    let state_str  = patch.state.map(ContentState::as_str);
    let now_str    = encode_dt(Utc::now());

    let outcome = partition
      .transact(self.op_timeout, move |tx| {
        if let Some(stop) = guard_transition(
          tx,
          SELECT_LIVE_COMMENT_STATE,
          rusqlite::params![post_str, uuid_str, DELETED],
          target,
        )? {
          return Ok(stop);
        }

        let rows = tx.execute(
          &format!(
            "UPDATE comments SET
               author_id         = COALESCE(?4, author_id),
               text              = COALESCE(?5, text),
               linked_comment_id = COALESCE(?6, linked_comment_id),
               state             = COALESCE(?7, state),
               last_update_date  = ?8
             WHERE uuid = ?2 AND state != ?3 AND post_id = {LIVE_PARENT_ID}"
          ),
          rusqlite::params![
            post_str,
            uuid_str,
            DELETED,
            author_str,
            patch.text,
            patch.linked_comment_id,
            state_str,
            now_str,
          ],
        )?;
        Ok(Outcome::from_affected(rows))
      })
      .await
      .context(Entity::Comment, comment_uuid)?;

    outcome.into_result(Entity::Comment, comment_uuid, target)?;
    debug!(%post_uuid, %comment_uuid, state = ?target, "updated comment");
    Ok(())
  }

  async fn delete_comment(
    &self,
    post_uuid: Uuid,
    comment_uuid: Uuid,
  ) -> folio_core::Result<()> {
    let partition = self.post_partition(post_uuid)?;
    let post_str  = encode_uuid(post_uuid);
    let uuid_str  = encode_uuid(comment_uuid);
    let now_str   = encode_dt(Utc::now());

    let rows = partition
      .transact(self.op_timeout, move |tx| {
        tx.execute(
          &format!(
            "UPDATE comments SET state = ?3, last_update_date = ?4
             WHERE uuid = ?2 AND state != ?3 AND post_id = {LIVE_PARENT_ID}"
          ),
          rusqlite::params![post_str, uuid_str, DELETED, now_str],
        )
      })
      .await
      .context(Entity::Comment, comment_uuid)?;

    Outcome::from_affected(rows).into_result(Entity::Comment, comment_uuid, None)?;
    debug!(%post_uuid, %comment_uuid, "deleted comment");
    Ok(())
  }
}
