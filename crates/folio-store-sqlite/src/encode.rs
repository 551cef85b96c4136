//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, uuids as hyphenated lowercase
//! strings, and lifecycle states by their upper-case names.

use chrono::{DateTime, Utc};
use folio_core::{
  ContentState,
  comment::Comment,
  post::{LocalId, Post},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── ContentState ─────────────────────────────────────────────────────────────

pub const DELETED: &str = "DELETED";

pub fn decode_state(s: &str) -> Result<ContentState> {
  s.parse().map_err(|_| Error::UnknownState(s.to_owned()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `posts` row, selected in declaration
/// order.
pub struct RawPost {
  pub id:               LocalId,
  pub uuid:             String,
  pub author_id:        String,
  pub text:             String,
  pub preview_text:     String,
  pub topic:            String,
  pub state:            String,
  pub create_date:      String,
  pub last_update_date: String,
}

impl RawPost {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:               row.get(0)?,
      uuid:             row.get(1)?,
      author_id:        row.get(2)?,
      text:             row.get(3)?,
      preview_text:     row.get(4)?,
      topic:            row.get(5)?,
      state:            row.get(6)?,
      create_date:      row.get(7)?,
      last_update_date: row.get(8)?,
    })
  }

  pub fn into_post(self) -> Result<Post> {
    Ok(Post {
      id:           self.id,
      uuid:         decode_uuid(&self.uuid)?,
      author_id:    decode_uuid(&self.author_id)?,
      text:         self.text,
      preview_text: self.preview_text,
      topic:        self.topic,
      state:        decode_state(&self.state)?,
      created_at:   decode_dt(&self.create_date)?,
      updated_at:   decode_dt(&self.last_update_date)?,
    })
  }
}

/// Raw values read directly from a `comments` row.
pub struct RawComment {
  pub id:                LocalId,
  pub uuid:              String,
  pub author_id:         String,
  pub post_id:           LocalId,
  pub linked_comment_id: Option<LocalId>,
  pub text:              String,
  pub state:             String,
  pub create_date:       String,
  pub last_update_date:  String,
}

impl RawComment {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                row.get(0)?,
      uuid:              row.get(1)?,
      author_id:         row.get(2)?,
      post_id:           row.get(3)?,
      linked_comment_id: row.get(4)?,
      text:              row.get(5)?,
      state:             row.get(6)?,
      create_date:       row.get(7)?,
      last_update_date:  row.get(8)?,
    })
  }

  pub fn into_comment(self) -> Result<Comment> {
    Ok(Comment {
      id:                self.id,
      uuid:              decode_uuid(&self.uuid)?,
      author_id:         decode_uuid(&self.author_id)?,
      post_id:           self.post_id,
      linked_comment_id: self.linked_comment_id,
      text:              self.text,
      state:             decode_state(&self.state)?,
      created_at:        decode_dt(&self.create_date)?,
      updated_at:        decode_dt(&self.last_update_date)?,
    })
  }
}
