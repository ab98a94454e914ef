//! Storage-facing error type for forum rows and the mention index.

use thiserror::Error;

use threadline_core::DomainError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MentionStoreError {
    /// A domain rule rejected the write (missing parent, duplicate user, ...).
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The backing store failed (lock poisoned, database error, bad row).
    #[error("storage error: {0}")]
    Storage(String),
}

impl MentionStoreError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}

impl From<sqlx::Error> for MentionStoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                Self::Domain(DomainError::conflict(db_err.message().to_string()))
            }
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23503") => {
                Self::Domain(DomainError::not_found(db_err.message().to_string()))
            }
            sqlx::Error::PoolClosed => Self::storage("connection pool closed"),
            other => Self::storage(other.to_string()),
        }
    }
}
