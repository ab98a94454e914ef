//! User-mention index storage.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use threadline_core::{RecordKind, UserId};

use crate::error::MentionStoreError;
use crate::model::{MentionStatus, UserMention};

/// Mention index keyed by `(user_id, record_type, record_id)`.
#[async_trait::async_trait]
pub trait UserMentionStore: Send + Sync {
    /// Insert or replace the row with the same key.
    async fn upsert(&self, mention: UserMention) -> Result<(), MentionStoreError>;

    /// Every row (any status) written for one record.
    async fn for_record(
        &self,
        record_type: RecordKind,
        record_id: i64,
    ) -> Result<Vec<UserMention>, MentionStoreError>;

    /// Rows mentioning `user_id`, oldest record first. `None` returns every status.
    async fn for_user(
        &self,
        user_id: UserId,
        status: Option<MentionStatus>,
    ) -> Result<Vec<UserMention>, MentionStoreError>;

    /// Drop every row (forces a full reindex). Returns the number removed.
    async fn clear(&self) -> Result<u64, MentionStoreError>;
}

#[async_trait::async_trait]
impl<S> UserMentionStore for Arc<S>
where
    S: UserMentionStore + ?Sized,
{
    async fn upsert(&self, mention: UserMention) -> Result<(), MentionStoreError> {
        (**self).upsert(mention).await
    }

    async fn for_record(
        &self,
        record_type: RecordKind,
        record_id: i64,
    ) -> Result<Vec<UserMention>, MentionStoreError> {
        (**self).for_record(record_type, record_id).await
    }

    async fn for_user(
        &self,
        user_id: UserId,
        status: Option<MentionStatus>,
    ) -> Result<Vec<UserMention>, MentionStoreError> {
        (**self).for_user(user_id, status).await
    }

    async fn clear(&self) -> Result<u64, MentionStoreError> {
        (**self).clear().await
    }
}

/// In-memory mention index for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryUserMentionStore {
    inner: RwLock<HashMap<(UserId, RecordKind, i64), UserMention>>,
}

impl InMemoryUserMentionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock_poisoned<T>(_: T) -> MentionStoreError {
    MentionStoreError::storage("mention index lock poisoned")
}

#[async_trait::async_trait]
impl UserMentionStore for InMemoryUserMentionStore {
    async fn upsert(&self, mention: UserMention) -> Result<(), MentionStoreError> {
        let mut map = self.inner.write().map_err(lock_poisoned)?;
        map.insert(mention.key(), mention);
        Ok(())
    }

    async fn for_record(
        &self,
        record_type: RecordKind,
        record_id: i64,
    ) -> Result<Vec<UserMention>, MentionStoreError> {
        let map = self.inner.read().map_err(lock_poisoned)?;
        let mut rows: Vec<UserMention> = map
            .values()
            .filter(|m| m.record_type == record_type && m.record_id == record_id)
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.user_id);
        Ok(rows)
    }

    async fn for_user(
        &self,
        user_id: UserId,
        status: Option<MentionStatus>,
    ) -> Result<Vec<UserMention>, MentionStoreError> {
        let map = self.inner.read().map_err(lock_poisoned)?;
        let mut rows: Vec<UserMention> = map
            .values()
            .filter(|m| m.user_id == user_id && status.is_none_or(|s| m.status == s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (a.date_inserted, a.record_type.as_str(), a.record_id).cmp(&(
                b.date_inserted,
                b.record_type.as_str(),
                b.record_id,
            ))
        });
        Ok(rows)
    }

    async fn clear(&self) -> Result<u64, MentionStoreError> {
        let mut map = self.inner.write().map_err(lock_poisoned)?;
        let removed = map.len() as u64;
        map.clear();
        Ok(removed)
    }
}
