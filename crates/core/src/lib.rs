//! Forum domain building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the domain error model and the record vocabulary shared by the
//! runner and the mention indexer.

pub mod error;
pub mod id;
pub mod record;

pub use error::DomainError;
pub use id::{CategoryId, CommentId, DiscussionId, UserId};
pub use record::{ForumRecord, ParentRef, RecordKind};
