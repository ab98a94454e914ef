//! Job definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::RecordFilter;

/// Job kind used to look up the record registry a job runs against
/// (e.g. `user_mentions.reindex`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobKind(String);

impl JobKind {
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for JobKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A logical request to process a filtered set of records.
///
/// Immutable once started. A job has no identity of its own beyond the
/// checkpoint that carries it between invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub kind: JobKind,
    pub filter: RecordFilter,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(kind: JobKind, filter: RecordFilter) -> Self {
        Self {
            kind,
            filter,
            created_at: Utc::now(),
        }
    }

    /// Pin the creation time (tests, replays).
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    /// Whether `other` describes the same work (creation time aside).
    pub fn same_work_as(&self, other: &Job) -> bool {
        self.kind == other.kind && self.filter == other.filter
    }
}
