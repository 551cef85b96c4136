//! [`TagStore`] for [`SqliteCluster`], backed by the dedicated tag partition.

use folio_core::{
  Entity,
  routing::{BucketAssignment, BucketHasher},
  store::TagStore,
  tag::{Tag, TagId},
};
use rusqlite::OptionalExtension as _;
use tracing::debug;

use crate::{SqliteCluster, error::Context as _};

fn is_unique_violation(err: &rusqlite::Error) -> bool {
  matches!(
    err,
    rusqlite::Error::SqliteFailure(e, _)
      if e.code == rusqlite::ErrorCode::ConstraintViolation
  )
}

/// Most ids bound into one `IN (...)` lookup.
pub(crate) const RESOLVE_CHUNK: usize = 500;

/// Outcome of a rename.
enum Rename {
  Done,
  Taken,
  Missing,
}

impl<H: BucketHasher, A: BucketAssignment> TagStore for SqliteCluster<H, A> {
  async fn create_tag(&self, name: String) -> folio_core::Result<Tag> {
    let insert_name = name.clone();

    let id: Option<TagId> = self
      .tags
      .transact(self.op_timeout, move |tx| {
        match tx.execute(
          "INSERT INTO tags (name) VALUES (?1)",
          rusqlite::params![insert_name],
        ) {
          Ok(_) => Ok(Some(tx.last_insert_rowid())),
          Err(e) if is_unique_violation(&e) => Ok(None),
          Err(e) => Err(e),
        }
      })
      .await
      .context(Entity::Tag, &name)?;

    let Some(id) = id else {
      return Err(folio_core::Error::DuplicateName(name));
    };
    debug!(id, %name, "created tag");
    Ok(Tag { id, name })
  }

  async fn update_tag(&self, id: TagId, name: String) -> folio_core::Result<()> {
    let new_name = name.clone();

    let written = self
      .tags
      .transact(self.op_timeout, move |tx| {
        match tx.execute(
          "UPDATE tags SET name = ?2 WHERE id = ?1",
          rusqlite::params![id, new_name],
        ) {
          Ok(0) => Ok(Rename::Missing),
          Ok(_) => Ok(Rename::Done),
          Err(e) if is_unique_violation(&e) => Ok(Rename::Taken),
          Err(e) => Err(e),
        }
      })
      .await
      .context(Entity::Tag, id)?;

    match written {
      Rename::Done => {
        debug!(id, %name, "renamed tag");
        Ok(())
      }
      Rename::Taken => Err(folio_core::Error::DuplicateName(name)),
      Rename::Missing => Err(folio_core::Error::not_found(Entity::Tag, id)),
    }
  }

  async fn get_tag(&self, id: TagId) -> folio_core::Result<Tag> {
    let tag: Option<Tag> = self
      .tags
      .transact(self.op_timeout, move |tx| {
        tx.query_row(
          "SELECT id, name FROM tags WHERE id = ?1",
          rusqlite::params![id],
          |row| Ok(Tag { id: row.get(0)?, name: row.get(1)? }),
        )
        .optional()
      })
      .await
      .context(Entity::Tag, id)?;

    tag.ok_or_else(|| folio_core::Error::not_found(Entity::Tag, id))
  }

  async fn list_tags(&self, offset: u32, limit: u32) -> folio_core::Result<Vec<Tag>> {
    self
      .tags
      .transact(self.op_timeout, move |tx| {
        let mut stmt = tx.prepare(
          "SELECT id, name FROM tags ORDER BY id ASC LIMIT ?1 OFFSET ?2",
        )?;
        let tags = stmt
          .query_map(rusqlite::params![limit, offset], |row| {
            Ok(Tag { id: row.get(0)?, name: row.get(1)? })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
      })
      .await
      .context(Entity::Tag, "catalog")
  }

  async fn resolve_tags(&self, mut ids: Vec<TagId>) -> folio_core::Result<Vec<Tag>> {
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
      return Ok(Vec::new());
    }
    let key = match (ids.first(), ids.last()) {
      (Some(first), Some(last)) => format!("{} ids in {first}..={last}", ids.len()),
      _ => String::new(),
    };

    self
      .tags
      .transact(self.op_timeout, move |tx| {
        let mut tags = Vec::with_capacity(ids.len());
        // Stay well under SQLite's bound-parameter limit.
        for chunk in ids.chunks(RESOLVE_CHUNK) {
          let placeholders = vec!["?"; chunk.len()].join(", ");
          let mut stmt = tx.prepare(&format!(
            "SELECT id, name FROM tags WHERE id IN ({placeholders}) ORDER BY id ASC"
          ))?;
          let rows = stmt.query_map(rusqlite::params_from_iter(chunk.iter()), |row| {
            Ok(Tag { id: row.get(0)?, name: row.get(1)? })
          })?;
          for tag in rows {
            tags.push(tag?);
          }
        }
        Ok(tags)
      })
      .await
      .context(Entity::Tag, key)
  }
}
