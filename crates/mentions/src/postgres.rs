//! Postgres-backed forum repository and mention index.
//!
//! ## Schema
//!
//! `ensure_schema` creates the tables when missing:
//!
//! | Table | Key | Notes |
//! |-------|-----|-------|
//! | `users` | `user_id BIGSERIAL` | unique index on `lower(name)` |
//! | `discussions` | `discussion_id BIGSERIAL` | `category_id` nullable |
//! | `comments` | `comment_id BIGSERIAL` | FK to `discussions` |
//! | `user_mentions` | `(user_id, record_type, record_id)` | upserted with `ON CONFLICT` |
//!
//! ## Error Mapping
//!
//! Unique violations (`23505`) become `DomainError::Conflict`, foreign-key
//! violations (`23503`) become `DomainError::NotFound`, everything else is
//! `MentionStoreError::Storage`.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use threadline_core::{CategoryId, CommentId, DiscussionId, DomainError, RecordKind, UserId};

use crate::error::MentionStoreError;
use crate::forum::{validate_user_name, ForumRepository};
use crate::model::{Comment, Discussion, MentionStatus, NewComment, NewDiscussion, User, UserMention};
use crate::store::UserMentionStore;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        user_id BIGSERIAL PRIMARY KEY,
        name    TEXT NOT NULL
    )
    "#,
    r#"CREATE UNIQUE INDEX IF NOT EXISTS users_lower_name_idx ON users (lower(name))"#,
    r#"
    CREATE TABLE IF NOT EXISTS discussions (
        discussion_id BIGSERIAL PRIMARY KEY,
        category_id   BIGINT NULL,
        body          TEXT NOT NULL,
        date_inserted TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS comments (
        comment_id    BIGSERIAL PRIMARY KEY,
        discussion_id BIGINT NOT NULL REFERENCES discussions (discussion_id),
        body          TEXT NOT NULL,
        date_inserted TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_mentions (
        user_id            BIGINT NOT NULL,
        record_type        TEXT NOT NULL,
        record_id          BIGINT NOT NULL,
        mentioned_name     TEXT NOT NULL,
        parent_record_type TEXT NOT NULL,
        parent_record_id   BIGINT NOT NULL,
        date_inserted      TIMESTAMPTZ NOT NULL,
        status             TEXT NOT NULL,
        PRIMARY KEY (user_id, record_type, record_id)
    )
    "#,
    r#"CREATE INDEX IF NOT EXISTS user_mentions_record_idx ON user_mentions (record_type, record_id)"#,
];

/// Create the forum and mention tables if they do not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), MentionStoreError> {
    for statement in SCHEMA {
        sqlx::query(*statement).execute(pool).await?;
    }
    Ok(())
}

fn table_for(kind: RecordKind) -> Result<(&'static str, &'static str), MentionStoreError> {
    match kind {
        RecordKind::Discussion => Ok(("discussions", "discussion_id")),
        RecordKind::Comment => Ok(("comments", "comment_id")),
        RecordKind::Category => Err(DomainError::UnknownRecordType(kind.to_string()).into()),
    }
}

fn discussion_from_row(row: &PgRow) -> Result<Discussion, sqlx::Error> {
    Ok(Discussion {
        id: DiscussionId::from_raw(row.try_get("discussion_id")?),
        category_id: row
            .try_get::<Option<i64>, _>("category_id")?
            .map(CategoryId::from_raw),
        body: row.try_get("body")?,
        inserted_at: row.try_get::<DateTime<Utc>, _>("date_inserted")?,
    })
}

fn comment_from_row(row: &PgRow) -> Result<Comment, sqlx::Error> {
    Ok(Comment {
        id: CommentId::from_raw(row.try_get("comment_id")?),
        discussion_id: DiscussionId::from_raw(row.try_get("discussion_id")?),
        body: row.try_get("body")?,
        inserted_at: row.try_get::<DateTime<Utc>, _>("date_inserted")?,
    })
}

fn mention_from_row(row: &PgRow) -> Result<UserMention, MentionStoreError> {
    let record_type: String = row.try_get("record_type")?;
    let parent_record_type: String = row.try_get("parent_record_type")?;
    let status: String = row.try_get("status")?;
    Ok(UserMention {
        user_id: UserId::from_raw(row.try_get("user_id")?),
        record_type: record_type.parse()?,
        record_id: row.try_get("record_id")?,
        mentioned_name: row.try_get("mentioned_name")?,
        parent_record_type: parent_record_type.parse()?,
        parent_record_id: row.try_get("parent_record_id")?,
        date_inserted: row.try_get("date_inserted")?,
        status: status.parse()?,
    })
}

/// Forum tables in Postgres.
#[derive(Debug, Clone)]
pub struct PostgresForumRepository {
    pool: PgPool,
}

impl PostgresForumRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ForumRepository for PostgresForumRepository {
    #[instrument(skip(self), err)]
    async fn insert_user(&self, name: &str) -> Result<User, MentionStoreError> {
        let name = validate_user_name(name)?;
        let row = sqlx::query("INSERT INTO users (name) VALUES ($1) RETURNING user_id, name")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(User {
            id: UserId::from_raw(row.try_get("user_id")?),
            name: row.try_get("name")?,
        })
    }

    async fn users_by_names(&self, names: &[String]) -> Result<Vec<User>, MentionStoreError> {
        let lowered: Vec<String> = names.iter().map(|n| n.to_lowercase()).collect();
        let rows = sqlx::query(
            "SELECT user_id, name FROM users WHERE lower(name) = ANY($1) ORDER BY user_id",
        )
        .bind(&lowered)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<User, MentionStoreError> {
                Ok(User {
                    id: UserId::from_raw(row.try_get("user_id")?),
                    name: row.try_get("name")?,
                })
            })
            .collect()
    }

    #[instrument(skip(self, new), err)]
    async fn insert_discussion(&self, new: NewDiscussion) -> Result<Discussion, MentionStoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO discussions (category_id, body, date_inserted)
            VALUES ($1, $2, $3)
            RETURNING discussion_id, category_id, body, date_inserted
            "#,
        )
        .bind(new.category_id.map(|c| c.get()))
        .bind(&new.body)
        .bind(new.inserted_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(discussion_from_row(&row)?)
    }

    #[instrument(skip(self, new), fields(discussion_id = %new.discussion_id), err)]
    async fn insert_comment(&self, new: NewComment) -> Result<Comment, MentionStoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO comments (discussion_id, body, date_inserted)
            VALUES ($1, $2, $3)
            RETURNING comment_id, discussion_id, body, date_inserted
            "#,
        )
        .bind(new.discussion_id.get())
        .bind(&new.body)
        .bind(new.inserted_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(comment_from_row(&row)?)
    }

    async fn discussion(&self, id: DiscussionId) -> Result<Option<Discussion>, MentionStoreError> {
        let row = sqlx::query(
            "SELECT discussion_id, category_id, body, date_inserted FROM discussions WHERE discussion_id = $1",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(discussion_from_row).transpose()?)
    }

    async fn comment(&self, id: CommentId) -> Result<Option<Comment>, MentionStoreError> {
        let row = sqlx::query(
            "SELECT comment_id, discussion_id, body, date_inserted FROM comments WHERE comment_id = $1",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(comment_from_row).transpose()?)
    }

    async fn ids_after(
        &self,
        kind: RecordKind,
        after: Option<i64>,
        limit: usize,
    ) -> Result<Vec<i64>, MentionStoreError> {
        let (table, key) = table_for(kind)?;
        let sql = format!(
            "SELECT {key} FROM {table} WHERE $1::BIGINT IS NULL OR {key} > $1 ORDER BY {key} ASC LIMIT $2"
        );
        let ids = sqlx::query_scalar::<_, i64>(&sql)
            .bind(after)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn count_after(
        &self,
        kind: RecordKind,
        after: Option<i64>,
    ) -> Result<u64, MentionStoreError> {
        let (table, key) = table_for(kind)?;
        let sql = format!("SELECT COUNT(*) FROM {table} WHERE $1::BIGINT IS NULL OR {key} > $1");
        let count = sqlx::query_scalar::<_, i64>(&sql)
            .bind(after)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}

/// `user_mentions` table in Postgres.
#[derive(Debug, Clone)]
pub struct PostgresUserMentionStore {
    pool: PgPool,
}

impl PostgresUserMentionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const MENTION_COLUMNS: &str = "user_id, record_type, record_id, mentioned_name, \
     parent_record_type, parent_record_id, date_inserted, status";

#[async_trait::async_trait]
impl UserMentionStore for PostgresUserMentionStore {
    async fn upsert(&self, mention: UserMention) -> Result<(), MentionStoreError> {
        sqlx::query(
            r#"
            INSERT INTO user_mentions
                (user_id, record_type, record_id, mentioned_name,
                 parent_record_type, parent_record_id, date_inserted, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id, record_type, record_id) DO UPDATE SET
                mentioned_name     = EXCLUDED.mentioned_name,
                parent_record_type = EXCLUDED.parent_record_type,
                parent_record_id   = EXCLUDED.parent_record_id,
                date_inserted      = EXCLUDED.date_inserted,
                status             = EXCLUDED.status
            "#,
        )
        .bind(mention.user_id.get())
        .bind(mention.record_type.as_str())
        .bind(mention.record_id)
        .bind(&mention.mentioned_name)
        .bind(mention.parent_record_type.as_str())
        .bind(mention.parent_record_id)
        .bind(mention.date_inserted)
        .bind(mention.status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn for_record(
        &self,
        record_type: RecordKind,
        record_id: i64,
    ) -> Result<Vec<UserMention>, MentionStoreError> {
        let sql = format!(
            "SELECT {MENTION_COLUMNS} FROM user_mentions \
             WHERE record_type = $1 AND record_id = $2 ORDER BY user_id"
        );
        let rows = sqlx::query(&sql)
            .bind(record_type.as_str())
            .bind(record_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(mention_from_row).collect()
    }

    async fn for_user(
        &self,
        user_id: UserId,
        status: Option<MentionStatus>,
    ) -> Result<Vec<UserMention>, MentionStoreError> {
        let sql = format!(
            "SELECT {MENTION_COLUMNS} FROM user_mentions \
             WHERE user_id = $1 AND ($2::TEXT IS NULL OR status = $2) \
             ORDER BY date_inserted, record_type, record_id"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.get())
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(mention_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn clear(&self) -> Result<u64, MentionStoreError> {
        let result = sqlx::query("DELETE FROM user_mentions")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
