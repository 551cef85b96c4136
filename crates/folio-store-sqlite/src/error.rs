//! Error type for `folio-store-sqlite`.
//!
//! These are the low-level failures of the backend. Store operations never
//! return them directly; they are wrapped into
//! [`folio_core::Error::Persistence`] together with the entity and identifier
//! the operation was working on.

use std::time::Duration;

use folio_core::Entity;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] folio_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown state in row: {0:?}")]
  UnknownState(String),

  #[error("partition {index} was opened at position {position}")]
  MisplacedPartition { index: usize, position: usize },

  /// The transaction did not finish inside its deadline and was rolled back.
  #[error("transaction exceeded its {0:?} deadline")]
  TimedOut(Duration),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Attach operation context to a backend result.
pub(crate) trait Context<T> {
  fn context(self, entity: Entity, key: impl ToString) -> folio_core::Result<T>;
}

impl<T> Context<T> for Result<T> {
  fn context(self, entity: Entity, key: impl ToString) -> folio_core::Result<T> {
    self.map_err(|e| match e {
      Error::Core(core) => core,
      other => folio_core::Error::persistence(entity, key, other),
    })
  }
}
