use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use threadline_mentions::{Comment, Discussion, User, UserMention};
use threadline_runner::{RunOutcome, RunSummary};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerStartRequest {
    pub record_type: String,
    pub max_iterations: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRequest {
    pub callback_payload: String,
    pub max_iterations: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateDiscussionRequest {
    #[serde(rename = "categoryID")]
    pub category_id: Option<i64>,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    #[serde(rename = "discussionID")]
    pub discussion_id: i64,
    pub body: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_payload: Option<String>,
    /// Records still to walk after `callbackPayload`, when countable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u64>,
    pub summary: RunSummary,
}

impl From<RunOutcome> for RunResponse {
    fn from(outcome: RunOutcome) -> Self {
        let status = outcome.status().as_str();
        match outcome {
            RunOutcome::Complete { summary } => Self {
                status,
                callback_payload: None,
                remaining: None,
                summary,
            },
            RunOutcome::Paused {
                checkpoint,
                summary,
                remaining,
            } => Self {
                status,
                callback_payload: Some(checkpoint.into_string()),
                remaining,
                summary,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    #[serde(rename = "userID")]
    pub user_id: i64,
    pub name: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id.get(),
            name: user.name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DiscussionResponse {
    #[serde(rename = "discussionID")]
    pub discussion_id: i64,
    #[serde(rename = "categoryID")]
    pub category_id: Option<i64>,
    pub body: String,
    #[serde(rename = "dateInserted")]
    pub date_inserted: DateTime<Utc>,
}

impl From<Discussion> for DiscussionResponse {
    fn from(d: Discussion) -> Self {
        Self {
            discussion_id: d.id.get(),
            category_id: d.category_id.map(|c| c.get()),
            body: d.body,
            date_inserted: d.inserted_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    #[serde(rename = "commentID")]
    pub comment_id: i64,
    #[serde(rename = "discussionID")]
    pub discussion_id: i64,
    pub body: String,
    #[serde(rename = "dateInserted")]
    pub date_inserted: DateTime<Utc>,
}

impl From<Comment> for CommentResponse {
    fn from(c: Comment) -> Self {
        Self {
            comment_id: c.id.get(),
            discussion_id: c.discussion_id.get(),
            body: c.body,
            date_inserted: c.inserted_at,
        }
    }
}

/// Mention row in the forum's wire naming.
#[derive(Debug, Serialize)]
pub struct UserMentionResponse {
    #[serde(rename = "userID")]
    pub user_id: i64,
    #[serde(rename = "recordType")]
    pub record_type: String,
    #[serde(rename = "recordID")]
    pub record_id: i64,
    #[serde(rename = "mentionedName")]
    pub mentioned_name: String,
    #[serde(rename = "parentRecordType")]
    pub parent_record_type: String,
    #[serde(rename = "parentRecordID")]
    pub parent_record_id: i64,
    #[serde(rename = "dateInserted")]
    pub date_inserted: DateTime<Utc>,
    pub status: String,
}

impl From<UserMention> for UserMentionResponse {
    fn from(m: UserMention) -> Self {
        Self {
            user_id: m.user_id.get(),
            record_type: m.record_type.to_string(),
            record_id: m.record_id,
            mentioned_name: m.mentioned_name,
            parent_record_type: m.parent_record_type.to_string(),
            parent_record_id: m.parent_record_id,
            date_inserted: m.date_inserted,
            status: m.status.to_string(),
        }
    }
}
