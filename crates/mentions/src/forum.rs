//! Forum rows the indexer reads: users, discussions and comments.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::{Arc, RwLock};

use threadline_core::{CommentId, DiscussionId, DomainError, RecordKind, UserId};

use crate::error::MentionStoreError;
use crate::model::{Comment, Discussion, NewComment, NewDiscussion, User};

/// Forum storage.
///
/// Ids are assigned on insert and increase monotonically per record kind, so
/// `ids_after` pages are stable across calls.
#[async_trait::async_trait]
pub trait ForumRepository: Send + Sync {
    /// Insert a user. Names are unique case-insensitively.
    async fn insert_user(&self, name: &str) -> Result<User, MentionStoreError>;

    /// Users whose name matches one of `names`, ignoring case.
    async fn users_by_names(&self, names: &[String]) -> Result<Vec<User>, MentionStoreError>;

    async fn insert_discussion(&self, new: NewDiscussion) -> Result<Discussion, MentionStoreError>;

    /// Insert a comment; its discussion must exist.
    async fn insert_comment(&self, new: NewComment) -> Result<Comment, MentionStoreError>;

    async fn discussion(&self, id: DiscussionId) -> Result<Option<Discussion>, MentionStoreError>;

    async fn comment(&self, id: CommentId) -> Result<Option<Comment>, MentionStoreError>;

    /// Up to `limit` ids of `kind` strictly greater than `after`, ascending.
    async fn ids_after(
        &self,
        kind: RecordKind,
        after: Option<i64>,
        limit: usize,
    ) -> Result<Vec<i64>, MentionStoreError>;

    /// Number of ids of `kind` strictly greater than `after`.
    async fn count_after(&self, kind: RecordKind, after: Option<i64>)
    -> Result<u64, MentionStoreError>;
}

#[async_trait::async_trait]
impl<F> ForumRepository for Arc<F>
where
    F: ForumRepository + ?Sized,
{
    async fn insert_user(&self, name: &str) -> Result<User, MentionStoreError> {
        (**self).insert_user(name).await
    }

    async fn users_by_names(&self, names: &[String]) -> Result<Vec<User>, MentionStoreError> {
        (**self).users_by_names(names).await
    }

    async fn insert_discussion(&self, new: NewDiscussion) -> Result<Discussion, MentionStoreError> {
        (**self).insert_discussion(new).await
    }

    async fn insert_comment(&self, new: NewComment) -> Result<Comment, MentionStoreError> {
        (**self).insert_comment(new).await
    }

    async fn discussion(&self, id: DiscussionId) -> Result<Option<Discussion>, MentionStoreError> {
        (**self).discussion(id).await
    }

    async fn comment(&self, id: CommentId) -> Result<Option<Comment>, MentionStoreError> {
        (**self).comment(id).await
    }

    async fn ids_after(
        &self,
        kind: RecordKind,
        after: Option<i64>,
        limit: usize,
    ) -> Result<Vec<i64>, MentionStoreError> {
        (**self).ids_after(kind, after, limit).await
    }

    async fn count_after(
        &self,
        kind: RecordKind,
        after: Option<i64>,
    ) -> Result<u64, MentionStoreError> {
        (**self).count_after(kind, after).await
    }
}

pub(crate) fn validate_user_name(name: &str) -> Result<&str, MentionStoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("user name must not be empty").into());
    }
    Ok(name)
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    discussions: BTreeMap<i64, Discussion>,
    comments: BTreeMap<i64, Comment>,
    users_by_lower_name: HashMap<String, i64>,
    next_user: i64,
    next_discussion: i64,
    next_comment: i64,
}

impl Tables {
    /// Ids of `kind` strictly greater than `after`, ascending.
    fn ids_after(&self, kind: RecordKind, after: Option<i64>) -> Box<dyn Iterator<Item = i64> + '_> {
        let range = (after.map_or(Bound::Unbounded, Bound::Excluded), Bound::Unbounded);
        match kind {
            RecordKind::Discussion => Box::new(self.discussions.range(range).map(|(id, _)| *id)),
            RecordKind::Comment => Box::new(self.comments.range(range).map(|(id, _)| *id)),
            RecordKind::Category => Box::new(std::iter::empty()),
        }
    }
}

/// In-memory forum for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryForumRepository {
    inner: RwLock<Tables>,
}

impl InMemoryForumRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delete a discussion row (used to exercise skipped items).
    pub fn delete_discussion(&self, id: DiscussionId) -> bool {
        self.inner
            .write()
            .map(|mut t| t.discussions.remove(&id.get()).is_some())
            .unwrap_or(false)
    }

    /// Delete a comment row.
    pub fn delete_comment(&self, id: CommentId) -> bool {
        self.inner
            .write()
            .map(|mut t| t.comments.remove(&id.get()).is_some())
            .unwrap_or(false)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, MentionStoreError> {
        self.inner
            .read()
            .map_err(|_| MentionStoreError::storage("forum lock poisoned"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>, MentionStoreError> {
        self.inner
            .write()
            .map_err(|_| MentionStoreError::storage("forum lock poisoned"))
    }
}

#[async_trait::async_trait]
impl ForumRepository for InMemoryForumRepository {
    async fn insert_user(&self, name: &str) -> Result<User, MentionStoreError> {
        let name = validate_user_name(name)?;
        let mut tables = self.write()?;
        let lower = name.to_lowercase();
        if tables.users_by_lower_name.contains_key(&lower) {
            return Err(DomainError::conflict(format!("user `{name}` already exists")).into());
        }

        tables.next_user += 1;
        let user = User {
            id: UserId::from_raw(tables.next_user),
            name: name.to_string(),
        };
        tables.users_by_lower_name.insert(lower, user.id.get());
        tables.users.insert(user.id.get(), user.clone());
        Ok(user)
    }

    async fn users_by_names(&self, names: &[String]) -> Result<Vec<User>, MentionStoreError> {
        let tables = self.read()?;
        Ok(names
            .iter()
            .filter_map(|name| tables.users_by_lower_name.get(&name.to_lowercase()))
            .filter_map(|id| tables.users.get(id).cloned())
            .collect())
    }

    async fn insert_discussion(&self, new: NewDiscussion) -> Result<Discussion, MentionStoreError> {
        let mut tables = self.write()?;
        tables.next_discussion += 1;
        let discussion = Discussion {
            id: DiscussionId::from_raw(tables.next_discussion),
            category_id: new.category_id,
            body: new.body,
            inserted_at: new.inserted_at,
        };
        tables
            .discussions
            .insert(discussion.id.get(), discussion.clone());
        Ok(discussion)
    }

    async fn insert_comment(&self, new: NewComment) -> Result<Comment, MentionStoreError> {
        let mut tables = self.write()?;
        if !tables.discussions.contains_key(&new.discussion_id.get()) {
            return Err(DomainError::not_found(format!("discussion {}", new.discussion_id)).into());
        }
        tables.next_comment += 1;
        let comment = Comment {
            id: CommentId::from_raw(tables.next_comment),
            discussion_id: new.discussion_id,
            body: new.body,
            inserted_at: new.inserted_at,
        };
        tables.comments.insert(comment.id.get(), comment.clone());
        Ok(comment)
    }

    async fn discussion(&self, id: DiscussionId) -> Result<Option<Discussion>, MentionStoreError> {
        Ok(self.read()?.discussions.get(&id.get()).cloned())
    }

    async fn comment(&self, id: CommentId) -> Result<Option<Comment>, MentionStoreError> {
        Ok(self.read()?.comments.get(&id.get()).cloned())
    }

    async fn ids_after(
        &self,
        kind: RecordKind,
        after: Option<i64>,
        limit: usize,
    ) -> Result<Vec<i64>, MentionStoreError> {
        let tables = self.read()?;
        Ok(tables.ids_after(kind, after).take(limit).collect())
    }

    async fn count_after(
        &self,
        kind: RecordKind,
        after: Option<i64>,
    ) -> Result<u64, MentionStoreError> {
        let tables = self.read()?;
        Ok(tables.ids_after(kind, after).count() as u64)
    }
}
