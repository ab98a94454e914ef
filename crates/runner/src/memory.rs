//! In-memory record source for tests/dev.

use std::collections::BTreeSet;
use std::sync::RwLock;

use crate::error::SourceError;
use crate::source::RecordSource;

/// Record source backed by an ordered id set.
#[derive(Debug, Default)]
pub struct InMemoryRecordSource {
    ids: RwLock<BTreeSet<i64>>,
}

impl InMemoryRecordSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            ids: RwLock::new(ids.into_iter().collect()),
        }
    }

    pub fn insert(&self, id: i64) {
        if let Ok(mut ids) = self.ids.write() {
            ids.insert(id);
        }
    }

    pub fn remove(&self, id: i64) {
        if let Ok(mut ids) = self.ids.write() {
            ids.remove(&id);
        }
    }

    pub fn len(&self) -> usize {
        self.ids.read().map(|ids| ids.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl RecordSource for InMemoryRecordSource {
    async fn ids_after(&self, after: Option<i64>, limit: usize) -> Result<Vec<i64>, SourceError> {
        let ids = self
            .ids
            .read()
            .map_err(|_| SourceError::new("record set lock poisoned"))?;

        let page = match after {
            Some(after) => ids
                .range((std::ops::Bound::Excluded(after), std::ops::Bound::Unbounded))
                .take(limit)
                .copied()
                .collect(),
            None => ids.iter().take(limit).copied().collect(),
        };
        Ok(page)
    }

    async fn count_after(&self, after: Option<i64>) -> Result<u64, SourceError> {
        let ids = self
            .ids
            .read()
            .map_err(|_| SourceError::new("record set lock poisoned"))?;

        let count = match after {
            Some(after) => ids
                .range((std::ops::Bound::Excluded(after), std::ops::Bound::Unbounded))
                .count(),
            None => ids.len(),
        };
        Ok(count as u64)
    }
}
