//! Runner error taxonomy.
//!
//! Invocation-level failures (`RunnerError`) abort the call and are surfaced to
//! the caller. Item-level failures (`ItemActionError`) are recorded in the run
//! summary and never abort a batch. Running out of budget is not an error.

use thiserror::Error;

use crate::record::RecordType;

/// Failure of a whole runner invocation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RunnerError {
    /// The filter names a record type the job does not know about.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// A resume token is malformed, tampered with, from an unsupported version,
    /// or references a job kind / record type this runner does not know.
    #[error("corrupt checkpoint: {0}")]
    CorruptCheckpoint(String),

    /// `start` was called with a job kind that has no registry.
    #[error("unknown job kind: {0}")]
    UnknownJob(String),

    /// Enumerating records failed before this invocation attempted any item.
    /// Later failures pause the run instead.
    #[error("record source error for {record_type}: {source}")]
    Source {
        record_type: RecordType,
        #[source]
        source: SourceError,
    },

    /// A checkpoint could not be serialized.
    #[error("checkpoint encoding failed: {0}")]
    Encode(String),
}

impl RunnerError {
    pub fn invalid_filter(msg: impl Into<String>) -> Self {
        Self::InvalidFilter(msg.into())
    }

    pub fn corrupt_checkpoint(msg: impl Into<String>) -> Self {
        Self::CorruptCheckpoint(msg.into())
    }
}

/// Failure while paging ids out of a record source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct SourceError(String);

impl SourceError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Failure of a single item action. Recorded, never fatal to the batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{reason}")]
pub struct ItemActionError {
    reason: String,
}

impl ItemActionError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn into_reason(self) -> String {
        self.reason
    }
}
