//! The mention reindex job table.

use std::sync::Arc;

use threadline_core::RecordKind;
use threadline_runner::{JobKind, RecordRegistry, Runner, RunnerConfig};

use crate::indexer::{ForumRecordSource, MentionAction, MentionIndexer};

/// Job kind that rebuilds the mention index.
pub const REINDEX_JOB: &str = "user_mentions.reindex";

pub fn reindex_job() -> JobKind {
    JobKind::new(REINDEX_JOB)
}

/// Record table walked by the reindex job: discussions, then comments.
pub fn reindex_registry(indexer: Arc<MentionIndexer>) -> RecordRegistry {
    let forum = indexer.forum().clone();
    RecordRegistry::new()
        .register(
            RecordKind::Discussion.as_str(),
            ForumRecordSource::new(forum.clone(), RecordKind::Discussion),
            MentionAction::Discussion(indexer.clone()),
        )
        .register(
            RecordKind::Comment.as_str(),
            ForumRecordSource::new(forum, RecordKind::Comment),
            MentionAction::Comment(indexer),
        )
}

/// Runner with the reindex job registered.
pub fn mention_runner(config: RunnerConfig, indexer: Arc<MentionIndexer>) -> Runner {
    Runner::new(config).register_job(reindex_job(), reindex_registry(indexer))
}
