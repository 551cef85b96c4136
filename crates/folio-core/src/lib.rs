//! Core types and trait definitions for the Folio content store.
//!
//! This crate has no database or cache dependencies. It owns
//! the entity model, the lifecycle state machine, the error taxonomy, the
//! shard router, and the store traits every backend implements.

pub mod comment;
pub mod error;
pub mod lifecycle;
pub mod post;
pub mod routing;
pub mod store;
pub mod tag;

pub use error::{Entity, Error, Result};
pub use lifecycle::ContentState;
