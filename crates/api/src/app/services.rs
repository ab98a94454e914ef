//! Store, indexer and runner wiring shared by the handlers.

use std::sync::Arc;

use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use threadline_core::{CategoryId, DiscussionId, ForumRecord, UserId};
use threadline_mentions::{
    ensure_schema, mention_runner, reindex_job, Comment, Discussion, ForumRepository,
    InMemoryForumRepository, InMemoryUserMentionStore, MentionIndexer, MentionStatus,
    MentionStoreError, NewComment, NewDiscussion, PostgresForumRepository,
    PostgresUserMentionStore, User, UserMention, UserMentionStore,
};
use threadline_runner::{CheckpointToken, Job, RecordFilter, RunOutcome, Runner, RunnerConfig, RunnerError};

use crate::config::ApiConfig;

/// Failure of a service call, mapped to HTTP in `errors`.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Runner(#[from] RunnerError),
    #[error(transparent)]
    Store(#[from] MentionStoreError),
}

#[derive(Clone)]
pub struct AppServices {
    forum: Arc<dyn ForumRepository>,
    mentions: Arc<dyn UserMentionStore>,
    indexer: Arc<MentionIndexer>,
    runner: Arc<Runner>,
}

impl AppServices {
    pub fn new(
        forum: Arc<dyn ForumRepository>,
        mentions: Arc<dyn UserMentionStore>,
        config: RunnerConfig,
    ) -> Self {
        let indexer = Arc::new(MentionIndexer::new(forum.clone(), mentions.clone()));
        let runner = Arc::new(mention_runner(config, indexer.clone()));
        Self {
            forum,
            mentions,
            indexer,
            runner,
        }
    }

    /// In-memory stores (dev/test).
    pub fn in_memory(config: RunnerConfig) -> Self {
        Self::new(
            Arc::new(InMemoryForumRepository::new()),
            Arc::new(InMemoryUserMentionStore::new()),
            config,
        )
    }

    pub fn runner(&self) -> &Runner {
        &self.runner
    }

    pub async fn create_user(&self, name: &str) -> Result<User, ServiceError> {
        Ok(self.forum.insert_user(name).await?)
    }

    /// Insert a discussion and index its mentions.
    ///
    /// The insert and the indexing are separate writes: an indexing failure is
    /// logged and the saved row is still returned.
    pub async fn create_discussion(
        &self,
        category_id: Option<CategoryId>,
        body: String,
    ) -> Result<Discussion, ServiceError> {
        let discussion = self
            .forum
            .insert_discussion(NewDiscussion {
                category_id,
                body,
                inserted_at: Utc::now(),
            })
            .await?;
        self.index_saved(&discussion).await;
        Ok(discussion)
    }

    /// Insert a comment and index its mentions. Same failure handling as
    /// `create_discussion`.
    pub async fn create_comment(
        &self,
        discussion_id: DiscussionId,
        body: String,
    ) -> Result<Comment, ServiceError> {
        let comment = self
            .forum
            .insert_comment(NewComment {
                discussion_id,
                body,
                inserted_at: Utc::now(),
            })
            .await?;
        self.index_saved(&comment).await;
        Ok(comment)
    }

    async fn index_saved<R: ForumRecord + Sync>(&self, record: &R) {
        if let Err(e) = self.indexer.index_record(record).await {
            let kind = R::KIND;
            tracing::warn!(
                record_type = %kind,
                record_id = record.record_id(),
                error = %e,
                "mention indexing failed; row saved, reindex to repair"
            );
        }
    }

    /// Start the reindex job over `filter`.
    pub async fn start_reindex(
        &self,
        filter: RecordFilter,
        max_iterations: Option<u64>,
    ) -> Result<RunOutcome, ServiceError> {
        let budget = self.runner.config().budget(max_iterations);
        Ok(self
            .runner
            .start(Job::new(reindex_job(), filter), budget)
            .await?)
    }

    /// Continue any registered job from its callback payload.
    pub async fn resume(
        &self,
        token: &CheckpointToken,
        max_iterations: Option<u64>,
    ) -> Result<RunOutcome, ServiceError> {
        let budget = self.runner.config().budget(max_iterations);
        Ok(self.runner.resume(token, budget).await?)
    }

    pub async fn active_mentions(&self, user_id: UserId) -> Result<Vec<UserMention>, ServiceError> {
        Ok(self
            .mentions
            .for_user(user_id, Some(MentionStatus::Active))
            .await?)
    }

    pub async fn reset_mentions(&self) -> Result<u64, ServiceError> {
        Ok(self.mentions.clear().await?)
    }
}

/// Build services from configuration: Postgres when a database URL is set,
/// in-memory otherwise.
pub async fn build_services(config: &ApiConfig) -> anyhow::Result<AppServices> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::info!("no database configured; using in-memory stores");
        return Ok(AppServices::in_memory(config.runner.clone()));
    };

    let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
    ensure_schema(&pool).await?;
    tracing::info!("using postgres stores");

    Ok(AppServices::new(
        Arc::new(PostgresForumRepository::new(pool.clone())),
        Arc::new(PostgresUserMentionStore::new(pool)),
        config.runner.clone(),
    ))
}
