//! [`Partition`]: one independently addressable SQLite database.

use std::{
  path::Path,
  sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
  },
  time::{Duration, Instant},
};

use folio_core::{ContentState, Entity};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{Error, Result, encode::decode_state};

/// A single database with its own connection thread.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct Partition {
  index: usize,
  conn:  tokio_rusqlite::Connection,
}

impl Partition {
  /// Open (or create) a partition at `path` and run `schema` on it.
  pub async fn open(
    index: usize,
    path: impl AsRef<Path>,
    schema: &'static str,
  ) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let partition = Self { index, conn };
    partition.init_schema(schema).await?;
    Ok(partition)
  }

  /// Open an in-memory partition, useful for testing.
  pub async fn open_in_memory(index: usize, schema: &'static str) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let partition = Self { index, conn };
    partition.init_schema(schema).await?;
    Ok(partition)
  }

  async fn init_schema(&self, schema: &'static str) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(schema)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub fn index(&self) -> usize { self.index }

  /// Run `f` inside one transaction on this partition.
  ///
  /// The transaction commits only if it finished before `timeout` elapsed
  /// and the caller is still waiting for it. Otherwise it is dropped, which
  /// rolls it back, and the caller gets [`Error::TimedOut`]. A caller whose
  /// timer fires after the commit has started waits for the commit and
  /// reports its result.
  pub(crate) async fn transact<T, F>(&self, timeout: Duration, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Transaction<'_>) -> rusqlite::Result<T> + Send + 'static,
  {
    let deadline = Instant::now() + timeout;
    let gate = CommitGate::default();
    let claim = gate.clone();

    let call = self.conn.call(move |conn| {
      let tx = conn.transaction()?;
      let out = f(&tx)?;
      if Instant::now() > deadline || !claim.claim_commit() {
        return Ok(None);
      }
      tx.commit()?;
      Ok(Some(out))
    });
    tokio::pin!(call);

    match tokio::time::timeout(timeout, &mut call).await {
      Ok(result) => result?.ok_or(Error::TimedOut(timeout)),
      Err(_) if gate.abandon() => Err(Error::TimedOut(timeout)),
      Err(_) => call.await?.ok_or(Error::TimedOut(timeout)),
    }
  }
}

// ─── Commit gate ─────────────────────────────────────────────────────────────

const PENDING: u8 = 0;
const COMMITTING: u8 = 1;
const ABANDONED: u8 = 2;

/// Settles, exactly once, whether a transaction commits or its caller gives
/// up on it. Whichever side moves first wins.
#[derive(Clone, Default)]
pub(crate) struct CommitGate(Arc<AtomicU8>);

impl CommitGate {
  /// Called on the connection thread right before `COMMIT`. False means the
  /// caller already left and the transaction must roll back.
  pub fn claim_commit(&self) -> bool {
    self
      .0
      .compare_exchange(PENDING, COMMITTING, Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
  }

  /// Called by a caller whose timer fired. False means the commit is
  /// already under way and its outcome must be awaited.
  pub fn abandon(&self) -> bool {
    self
      .0
      .compare_exchange(PENDING, ABANDONED, Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
  }
}

// ─── Guarded writes ──────────────────────────────────────────────────────────

/// What a guarded write (`... WHERE state != 'DELETED'`) did.
pub(crate) enum Outcome {
  Applied,
  /// No live row matched.
  Missing,
  /// The requested state is not reachable from the current one.
  Rejected(ContentState),
  /// The stored state could not be parsed.
  Corrupt(String),
}

impl Outcome {
  pub fn from_affected(rows: usize) -> Self {
    if rows == 0 { Self::Missing } else { Self::Applied }
  }

  pub fn into_result(
    self,
    entity: Entity,
    key: Uuid,
    target: Option<ContentState>,
  ) -> folio_core::Result<()> {
    match self {
      Self::Applied => Ok(()),
      Self::Missing => Err(folio_core::Error::not_found(entity, key)),
      Self::Rejected(current) => match target {
        Some(target) => current.check_update(target),
        None => Ok(()),
      },
      Self::Corrupt(raw) => {
        Err(folio_core::Error::persistence(entity, key, Error::UnknownState(raw)))
      }
    }
  }
}

/// Check a requested state change against the row's current state.
///
/// `sql` selects the single `state` column of the live row. Returns
/// `Some(outcome)` when the write must not proceed.
pub(crate) fn guard_transition<P: rusqlite::Params>(
  tx: &rusqlite::Transaction<'_>,
  sql: &str,
  params: P,
  target: Option<ContentState>,
) -> rusqlite::Result<Option<Outcome>> {
  let Some(target) = target else {
    return Ok(None);
  };

  let current: Option<String> =
    tx.query_row(sql, params, |row| row.get(0)).optional()?;
  let Some(current) = current else {
    return Ok(Some(Outcome::Missing));
  };

  Ok(match decode_state(&current) {
    Ok(state) if state.can_transition_to(target) => None,
    Ok(state) => Some(Outcome::Rejected(state)),
    Err(_) => Some(Outcome::Corrupt(current)),
  })
}
