//! The user-mention index and the job that rebuilds it.
//!
//! - `parser`: extracts mentioned names from record bodies
//! - `forum` / `store`: storage seams with in-memory implementations
//! - `postgres`: sqlx implementations of both seams
//! - `indexer`: reconciles the index for one record; `MentionAction` exposes it
//!   to the runner
//! - `job`: the `user_mentions.reindex` job table

pub mod error;
pub mod forum;
pub mod indexer;
pub mod job;
pub mod model;
pub mod parser;
pub mod postgres;
pub mod store;

pub use error::MentionStoreError;
pub use forum::{ForumRepository, InMemoryForumRepository};
pub use indexer::{ForumRecordSource, IndexReport, MentionAction, MentionIndexer};
pub use job::{mention_runner, reindex_job, reindex_registry, REINDEX_JOB};
pub use model::{Comment, Discussion, MentionStatus, NewComment, NewDiscussion, User, UserMention};
pub use parser::parse_mentions;
pub use postgres::{ensure_schema, PostgresForumRepository, PostgresUserMentionStore};
pub use store::{InMemoryUserMentionStore, UserMentionStore};
