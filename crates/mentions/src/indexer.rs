//! Writes the mention index for forum records.
//!
//! Indexing is an upsert keyed on `(user, record)`, so indexing the same record
//! any number of times converges on the same rows. That is what lets the runner
//! re-deliver the last item of an interrupted invocation.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use threadline_core::{CommentId, DiscussionId, ForumRecord, RecordKind, UserId};
use threadline_runner::{Disposition, ItemAction, ItemActionError, RecordSource, SourceError, WorkItem};

use crate::error::MentionStoreError;
use crate::forum::ForumRepository;
use crate::model::{MentionStatus, UserMention};
use crate::parser::parse_mentions;
use crate::store::UserMentionStore;

/// What indexing one record changed.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    /// Active rows written for users mentioned now.
    pub active: usize,
    /// Rows flipped to removed for users no longer mentioned.
    pub removed: usize,
}

#[derive(Clone)]
pub struct MentionIndexer {
    forum: Arc<dyn ForumRepository>,
    mentions: Arc<dyn UserMentionStore>,
}

impl core::fmt::Debug for MentionIndexer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MentionIndexer").finish_non_exhaustive()
    }
}

impl MentionIndexer {
    pub fn new(forum: Arc<dyn ForumRepository>, mentions: Arc<dyn UserMentionStore>) -> Self {
        Self { forum, mentions }
    }

    pub fn forum(&self) -> &Arc<dyn ForumRepository> {
        &self.forum
    }

    pub fn mentions(&self) -> &Arc<dyn UserMentionStore> {
        &self.mentions
    }

    /// Reconcile the index with the mentions currently in `record`'s body.
    ///
    /// Names that match no user are ignored.
    pub async fn index_record<R>(&self, record: &R) -> Result<IndexReport, MentionStoreError>
    where
        R: ForumRecord + Sync,
    {
        let names = parse_mentions(record.body());
        let users = if names.is_empty() {
            Vec::new()
        } else {
            self.forum.users_by_names(&names).await?
        };

        let mut report = IndexReport::default();
        let mut mentioned: HashSet<UserId> = HashSet::new();
        for user in &users {
            if !mentioned.insert(user.id) {
                continue;
            }
            let written = names
                .iter()
                .find(|n| n.to_lowercase() == user.name.to_lowercase())
                .map(String::as_str)
                .unwrap_or(user.name.as_str());
            self.mentions
                .upsert(UserMention::active(record, user.id, written))
                .await?;
            report.active += 1;
        }

        for stale in self
            .mentions
            .for_record(R::KIND, record.record_id())
            .await?
            .into_iter()
            .filter(|m| m.is_active() && !mentioned.contains(&m.user_id))
        {
            self.mentions
                .upsert(UserMention {
                    status: MentionStatus::Removed,
                    ..stale
                })
                .await?;
            report.removed += 1;
        }

        debug!(
            record_type = %R::KIND,
            record_id = record.record_id(),
            active = report.active,
            removed = report.removed,
            "record indexed"
        );
        Ok(report)
    }

    /// Index a discussion by id; `None` when the row no longer exists.
    pub async fn index_discussion(
        &self,
        id: DiscussionId,
    ) -> Result<Option<IndexReport>, MentionStoreError> {
        match self.forum.discussion(id).await? {
            Some(discussion) => self.index_record(&discussion).await.map(Some),
            None => Ok(None),
        }
    }

    /// Index a comment by id; `None` when the row no longer exists.
    pub async fn index_comment(
        &self,
        id: CommentId,
    ) -> Result<Option<IndexReport>, MentionStoreError> {
        match self.forum.comment(id).await? {
            Some(comment) => self.index_record(&comment).await.map(Some),
            None => Ok(None),
        }
    }
}

/// Per-record-type reindex action.
#[derive(Debug, Clone)]
pub enum MentionAction {
    Discussion(Arc<MentionIndexer>),
    Comment(Arc<MentionIndexer>),
}

impl MentionAction {
    pub fn kind(&self) -> RecordKind {
        match self {
            MentionAction::Discussion(_) => RecordKind::Discussion,
            MentionAction::Comment(_) => RecordKind::Comment,
        }
    }
}

#[async_trait::async_trait]
impl ItemAction for MentionAction {
    async fn apply(&self, item: &WorkItem) -> Result<Disposition, ItemActionError> {
        let indexed = match self {
            MentionAction::Discussion(indexer) => {
                indexer
                    .index_discussion(DiscussionId::from_raw(item.record_id))
                    .await
            }
            MentionAction::Comment(indexer) => {
                indexer
                    .index_comment(CommentId::from_raw(item.record_id))
                    .await
            }
        }
        .map_err(|e| ItemActionError::new(e.to_string()))?;

        Ok(match indexed {
            Some(_) => Disposition::Applied,
            None => Disposition::Skipped,
        })
    }
}

/// Pages one record kind's ids out of the forum repository.
#[derive(Clone)]
pub struct ForumRecordSource {
    forum: Arc<dyn ForumRepository>,
    kind: RecordKind,
}

impl ForumRecordSource {
    pub fn new(forum: Arc<dyn ForumRepository>, kind: RecordKind) -> Self {
        Self { forum, kind }
    }
}

#[async_trait::async_trait]
impl RecordSource for ForumRecordSource {
    async fn ids_after(&self, after: Option<i64>, limit: usize) -> Result<Vec<i64>, SourceError> {
        self.forum
            .ids_after(self.kind, after, limit)
            .await
            .map_err(|e| SourceError::new(e.to_string()))
    }

    async fn count_after(&self, after: Option<i64>) -> Result<u64, SourceError> {
        self.forum
            .count_after(self.kind, after)
            .await
            .map_err(|e| SourceError::new(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::forum::InMemoryForumRepository;
    use crate::model::{NewComment, NewDiscussion};
    use crate::store::InMemoryUserMentionStore;

    struct Fixture {
        forum: Arc<InMemoryForumRepository>,
        store: Arc<InMemoryUserMentionStore>,
        indexer: MentionIndexer,
    }

    fn fixture() -> Fixture {
        let forum = Arc::new(InMemoryForumRepository::new());
        let store = Arc::new(InMemoryUserMentionStore::new());
        let indexer = MentionIndexer::new(forum.clone(), store.clone());
        Fixture {
            forum,
            store,
            indexer,
        }
    }

    async fn discussion(forum: &InMemoryForumRepository, body: &str) -> crate::model::Discussion {
        forum
            .insert_discussion(NewDiscussion {
                category_id: None,
                body: body.to_string(),
                inserted_at: Utc::now(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn indexes_known_users_only() {
        let fx = fixture();
        let alice = fx.forum.insert_user("Alice").await.unwrap();
        let d = discussion(&fx.forum, r#"@alice meet @"Nobody Here""#).await;

        let report = fx.indexer.index_record(&d).await.unwrap();

        assert_eq!(report, IndexReport { active: 1, removed: 0 });
        let rows = fx.store.for_user(alice.id, None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].mentioned_name, "alice");
        assert_eq!(rows[0].parent_record_id, -1);
    }

    #[tokio::test]
    async fn reindexing_is_idempotent() {
        let fx = fixture();
        fx.forum.insert_user("alice").await.unwrap();
        fx.forum.insert_user("bob").await.unwrap();
        let d = discussion(&fx.forum, "@alice @bob").await;

        fx.indexer.index_record(&d).await.unwrap();
        let first = fx.store.for_record(RecordKind::Discussion, d.id.get()).await.unwrap();
        fx.indexer.index_record(&d).await.unwrap();
        let second = fx.store.for_record(RecordKind::Discussion, d.id.get()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(fx.store.len(), 2);
    }

    #[tokio::test]
    async fn dropped_mentions_are_marked_removed() {
        let fx = fixture();
        let alice = fx.forum.insert_user("alice").await.unwrap();
        let bob = fx.forum.insert_user("bob").await.unwrap();
        let mut d = discussion(&fx.forum, "@alice @bob").await;
        fx.indexer.index_record(&d).await.unwrap();

        d.body = "only @bob now".into();
        let report = fx.indexer.index_record(&d).await.unwrap();

        assert_eq!(report, IndexReport { active: 1, removed: 1 });
        let alice_rows = fx.store.for_user(alice.id, None).await.unwrap();
        assert_eq!(alice_rows[0].status, MentionStatus::Removed);
        let bob_rows = fx
            .store
            .for_user(bob.id, Some(MentionStatus::Active))
            .await
            .unwrap();
        assert_eq!(bob_rows.len(), 1);
    }

    #[tokio::test]
    async fn comment_mentions_point_at_discussion() {
        let fx = fixture();
        let alice = fx.forum.insert_user("alice").await.unwrap();
        let d = discussion(&fx.forum, "no mentions").await;
        let c = fx
            .forum
            .insert_comment(NewComment {
                discussion_id: d.id,
                body: "cc @alice".into(),
                inserted_at: Utc::now(),
            })
            .await
            .unwrap();

        assert!(fx.indexer.index_comment(c.id).await.unwrap().is_some());

        let rows = fx.store.for_user(alice.id, None).await.unwrap();
        assert_eq!(rows[0].record_type, RecordKind::Comment);
        assert_eq!(rows[0].parent_record_type, RecordKind::Discussion);
        assert_eq!(rows[0].parent_record_id, d.id.get());
    }

    #[tokio::test]
    async fn missing_record_is_skipped_by_action() {
        let fx = fixture();
        let d = discussion(&fx.forum, "@alice").await;
        fx.forum.delete_discussion(d.id);

        let action = MentionAction::Discussion(Arc::new(fx.indexer.clone()));
        let disposition = action
            .apply(&WorkItem::new("discussion", d.id.get()))
            .await
            .unwrap();

        assert_eq!(disposition, Disposition::Skipped);
        assert_eq!(action.kind(), RecordKind::Discussion);
    }

    #[tokio::test]
    async fn record_source_pages_forum_ids() {
        let fx = fixture();
        for _ in 0..3 {
            discussion(&fx.forum, "x").await;
        }
        let source = ForumRecordSource::new(fx.forum.clone(), RecordKind::Discussion);

        assert_eq!(source.ids_after(Some(1), 10).await.unwrap(), vec![2, 3]);
        assert_eq!(source.count_after(None).await.unwrap(), 3);
    }
}
