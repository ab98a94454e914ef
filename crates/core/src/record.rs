//! Forum record vocabulary: which kinds of rows exist and how they nest.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Kind of a forum row, as stored in `recordType` / `parentRecordType` columns.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Discussion,
    Comment,
    Category,
}

impl RecordKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Discussion => "discussion",
            RecordKind::Comment => "comment",
            RecordKind::Category => "category",
        }
    }
}

impl core::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discussion" => Ok(RecordKind::Discussion),
            "comment" => Ok(RecordKind::Comment),
            "category" => Ok(RecordKind::Category),
            other => Err(DomainError::UnknownRecordType(other.to_string())),
        }
    }
}

/// Reference to the row a record belongs to.
///
/// Discussions without a category point at `category / -1`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParentRef {
    pub kind: RecordKind,
    pub id: i64,
}

impl ParentRef {
    pub const UNCATEGORIZED: ParentRef = ParentRef {
        kind: RecordKind::Category,
        id: -1,
    };

    pub fn new(kind: RecordKind, id: i64) -> Self {
        Self { kind, id }
    }
}

/// A row that carries user-authored text which may mention other users.
pub trait ForumRecord {
    /// Kind of row this type represents.
    const KIND: RecordKind;

    /// Primary key of the row.
    fn record_id(&self) -> i64;

    /// Authored body (raw markup).
    fn body(&self) -> &str;

    /// Containing row.
    fn parent(&self) -> ParentRef;

    /// When the row was first inserted.
    fn inserted_at(&self) -> DateTime<Utc>;
}
