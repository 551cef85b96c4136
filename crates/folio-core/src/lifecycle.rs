//! The lifecycle state shared by posts and comments.
//!
//! Content moves forward through moderation and can be blocked from any live
//! state. `Deleted` is terminal and only the dedicated delete operation may
//! set it; a generic update that asks for it is rejected.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentState {
  #[default]
  New,
  OnModeration,
  Published,
  Blocked,
  Deleted,
}

impl ContentState {
  pub const ALL: [Self; 5] = [
    Self::New,
    Self::OnModeration,
    Self::Published,
    Self::Blocked,
    Self::Deleted,
  ];

  /// The string stored in the `state` column.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::New => "NEW",
      Self::OnModeration => "ON_MODERATION",
      Self::Published => "PUBLISHED",
      Self::Blocked => "BLOCKED",
      Self::Deleted => "DELETED",
    }
  }

  pub fn is_terminal(self) -> bool { matches!(self, Self::Deleted) }

  pub fn is_published(self) -> bool { matches!(self, Self::Published) }

  /// Whether a generic update may move content from `self` to `target`.
  ///
  /// Staying in place is always allowed for live states so that a partial
  /// update repeating the current state is not an error.
  pub fn can_transition_to(self, target: Self) -> bool {
    use ContentState::*;
    match (self, target) {
      (_, Deleted) | (Deleted, _) => false,
      (from, to) if from == to => true,
      (New, OnModeration) => true,
      (OnModeration, Published) => true,
      (_, Blocked) => true,
      _ => false,
    }
  }

  /// Validate `target` as the requested state of a generic update whose row
  /// currently sits in `self`.
  pub fn check_update(self, target: Self) -> crate::Result<()> {
    if target == Self::Deleted {
      return Err(Error::InvalidState(
        "DELETED can only be set through delete".into(),
      ));
    }
    if !self.can_transition_to(target) {
      return Err(Error::InvalidState(format!(
        "cannot move from {self} to {target}"
      )));
    }
    Ok(())
  }
}

impl fmt::Display for ContentState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ContentState {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|state| state.as_str() == s)
      .ok_or_else(|| Error::InvalidState(format!("unknown state: {s:?}")))
  }
}
