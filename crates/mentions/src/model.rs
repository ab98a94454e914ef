//! Forum rows and the user-mention index row.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use threadline_core::{
    CategoryId, CommentId, DiscussionId, DomainError, ForumRecord, ParentRef, RecordKind, UserId,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discussion {
    pub id: DiscussionId,
    pub category_id: Option<CategoryId>,
    pub body: String,
    pub inserted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub discussion_id: DiscussionId,
    pub body: String,
    pub inserted_at: DateTime<Utc>,
}

/// Discussion to insert; the id is assigned by the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDiscussion {
    pub category_id: Option<CategoryId>,
    pub body: String,
    pub inserted_at: DateTime<Utc>,
}

/// Comment to insert; the id is assigned by the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub discussion_id: DiscussionId,
    pub body: String,
    pub inserted_at: DateTime<Utc>,
}

impl ForumRecord for Discussion {
    const KIND: RecordKind = RecordKind::Discussion;

    fn record_id(&self) -> i64 {
        self.id.get()
    }

    fn body(&self) -> &str {
        &self.body
    }

    fn parent(&self) -> ParentRef {
        match self.category_id {
            Some(category) => ParentRef::new(RecordKind::Category, category.get()),
            None => ParentRef::UNCATEGORIZED,
        }
    }

    fn inserted_at(&self) -> DateTime<Utc> {
        self.inserted_at
    }
}

impl ForumRecord for Comment {
    const KIND: RecordKind = RecordKind::Comment;

    fn record_id(&self) -> i64 {
        self.id.get()
    }

    fn body(&self) -> &str {
        &self.body
    }

    fn parent(&self) -> ParentRef {
        ParentRef::new(RecordKind::Discussion, self.discussion_id.get())
    }

    fn inserted_at(&self) -> DateTime<Utc> {
        self.inserted_at
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentionStatus {
    Active,
    Removed,
}

impl MentionStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MentionStatus::Active => "active",
            MentionStatus::Removed => "removed",
        }
    }
}

impl core::fmt::Display for MentionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MentionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(MentionStatus::Active),
            "removed" => Ok(MentionStatus::Removed),
            other => Err(DomainError::validation(format!("unknown mention status `{other}`"))),
        }
    }
}

/// One user mentioned by one record.
///
/// Unique on `(user_id, record_type, record_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMention {
    pub user_id: UserId,
    pub record_type: RecordKind,
    pub record_id: i64,
    /// The name as written in the body.
    pub mentioned_name: String,
    pub parent_record_type: RecordKind,
    pub parent_record_id: i64,
    /// Insertion time of the mentioning record.
    pub date_inserted: DateTime<Utc>,
    pub status: MentionStatus,
}

impl UserMention {
    /// Active mention of `user` by `record`.
    pub fn active<R: ForumRecord>(record: &R, user: UserId, mentioned_name: &str) -> Self {
        let parent = record.parent();
        Self {
            user_id: user,
            record_type: R::KIND,
            record_id: record.record_id(),
            mentioned_name: mentioned_name.to_string(),
            parent_record_type: parent.kind,
            parent_record_id: parent.id,
            date_inserted: record.inserted_at(),
            status: MentionStatus::Active,
        }
    }

    /// Index key.
    pub fn key(&self) -> (UserId, RecordKind, i64) {
        (self.user_id, self.record_type, self.record_id)
    }

    pub fn is_active(&self) -> bool {
        self.status == MentionStatus::Active
    }
}
