//! Error types for `folio-core`.
//!
//! `NotFound` and `InvalidState` are expected outcomes a caller can act on;
//! `Persistence` wraps whatever the backend failed with, tagged with the entity
//! and identifier the operation was working on.

use std::fmt;

use thiserror::Error;

/// The kind of entity an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
  Post,
  Comment,
  Tag,
}

impl fmt::Display for Entity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Post => "post",
      Self::Comment => "comment",
      Self::Tag => "tag",
    })
  }
}

#[derive(Debug, Error)]
pub enum Error {
  /// No non-deleted row matches. Also returned when updating or deleting a
  /// row that is already deleted.
  #[error("{entity} not found: {key}")]
  NotFound { entity: Entity, key: String },

  /// A state outside the enumeration, a forbidden transition, or an attempt
  /// to reach `DELETED` through a generic update.
  #[error("invalid state: {0}")]
  InvalidState(String),

  #[error("tag name already exists: {0:?}")]
  DuplicateName(String),

  #[error("partition {index} is outside the configured range of {count}")]
  Routing { index: usize, count: usize },

  #[error("persistence error on {entity} {key}: {source}")]
  Persistence {
    entity: Entity,
    key:    String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },
}

impl Error {
  pub fn not_found(entity: Entity, key: impl ToString) -> Self {
    Self::NotFound { entity, key: key.to_string() }
  }

  pub fn persistence(
    entity: Entity,
    key: impl ToString,
    source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
  ) -> Self {
    Self::Persistence { entity, key: key.to_string(), source: source.into() }
  }

  pub fn is_not_found(&self) -> bool { matches!(self, Self::NotFound { .. }) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
