//! Seams between the runner and the records it walks.

use std::sync::Arc;

use crate::error::{ItemActionError, SourceError};
use crate::record::WorkItem;

/// Pages record ids of one record type in ascending primary-key order.
///
/// Implementations must be deterministic: the same `after` always yields the
/// same ids, in strictly ascending order, all greater than `after`.
#[async_trait::async_trait]
pub trait RecordSource: Send + Sync {
    /// Up to `limit` ids strictly greater than `after` (or from the start).
    async fn ids_after(&self, after: Option<i64>, limit: usize) -> Result<Vec<i64>, SourceError>;

    /// Number of ids strictly greater than `after`.
    async fn count_after(&self, after: Option<i64>) -> Result<u64, SourceError>;
}

/// What an action did with an item it did not fail on.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// The item was processed.
    Applied,
    /// The item needed no work (e.g. the row was deleted since paging).
    Skipped,
}

/// Per-item work applied by the runner.
///
/// The runner may re-deliver the last item of an interrupted invocation, so
/// implementations must tolerate at-least-once delivery.
#[async_trait::async_trait]
pub trait ItemAction: Send + Sync {
    async fn apply(&self, item: &WorkItem) -> Result<Disposition, ItemActionError>;
}

#[async_trait::async_trait]
impl<S> RecordSource for Arc<S>
where
    S: RecordSource + ?Sized,
{
    async fn ids_after(&self, after: Option<i64>, limit: usize) -> Result<Vec<i64>, SourceError> {
        (**self).ids_after(after, limit).await
    }

    async fn count_after(&self, after: Option<i64>) -> Result<u64, SourceError> {
        (**self).count_after(after).await
    }
}

#[async_trait::async_trait]
impl<A> ItemAction for Arc<A>
where
    A: ItemAction + ?Sized,
{
    async fn apply(&self, item: &WorkItem) -> Result<Disposition, ItemActionError> {
        (**self).apply(item).await
    }
}
