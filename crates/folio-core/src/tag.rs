//! Tags live in a single dedicated partition and are referenced from post
//! partitions by id only.

use serde::{Deserialize, Serialize};

pub type TagId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
  pub id:   TagId,
  pub name: String,
}
