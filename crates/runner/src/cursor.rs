//! Resumable enumeration of work items.
//!
//! A cursor walks one "lane" per record type covered by the job filter, in
//! registry order, paging each lane's ids in ascending order. The pair
//! (lane position, record id) is a total order built only from persisted
//! attributes, so reopening a cursor after a key yields exactly the items that
//! followed it in the original walk.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::debug;

use crate::error::{RunnerError, SourceError};
use crate::record::{OrderingKey, RecordFilter, RecordType, WorkItem};
use crate::registry::RecordRegistry;
use crate::source::RecordSource;

struct Lane {
    record_type: RecordType,
    source: Arc<dyn RecordSource>,
}

/// Lazy, resumable item enumerator. Owned by a single runner invocation.
pub struct Cursor {
    lanes: Vec<Lane>,
    lane: usize,
    /// Last id paged out of the current lane (paging position, not progress).
    paged_after: Option<i64>,
    lane_drained: bool,
    buffer: VecDeque<i64>,
    /// Key of the last item handed out by `next`.
    current: Option<OrderingKey>,
    page_size: usize,
}

impl Cursor {
    /// Open a cursor over the types covered by `filter`.
    ///
    /// With `resume_from`, the cursor is positioned strictly after that key.
    /// Fails with `InvalidFilter` for unknown types and `CorruptCheckpoint` when
    /// the resume key's type is not covered by the filter.
    pub fn open(
        registry: &RecordRegistry,
        filter: &RecordFilter,
        resume_from: Option<&OrderingKey>,
        page_size: usize,
    ) -> Result<Self, RunnerError> {
        let lanes: Vec<Lane> = registry
            .resolve(filter)?
            .into_iter()
            .map(|h| Lane {
                record_type: h.record_type().clone(),
                source: h.source().clone(),
            })
            .collect();

        let (lane, paged_after) = match resume_from {
            None => (0, None),
            Some(key) => {
                let lane = lanes
                    .iter()
                    .position(|l| l.record_type == key.record_type)
                    .ok_or_else(|| {
                        RunnerError::corrupt_checkpoint(format!(
                            "resume key `{key}` is outside filter `{filter}`"
                        ))
                    })?;
                (lane, Some(key.record_id))
            }
        };

        Ok(Self {
            lanes,
            lane,
            paged_after,
            lane_drained: false,
            buffer: VecDeque::new(),
            current: resume_from.cloned(),
            page_size: page_size.max(1),
        })
    }

    /// Next item in order, or `None` once every lane is exhausted.
    pub async fn next(&mut self) -> Result<Option<WorkItem>, RunnerError> {
        if !self.fill().await? {
            return Ok(None);
        }

        let (Some(id), Some(lane)) = (self.buffer.pop_front(), self.lanes.get(self.lane)) else {
            return Ok(None);
        };

        let item = WorkItem::new(lane.record_type.clone(), id);
        self.current = Some(item.key());
        Ok(Some(item))
    }

    /// Whether another item follows, paging ahead if needed.
    pub async fn has_next(&mut self) -> Result<bool, RunnerError> {
        self.fill().await
    }

    /// Key of the last item returned by `next` (or the resume key).
    pub fn current_key(&self) -> Option<&OrderingKey> {
        self.current.as_ref()
    }

    /// Record type of the lane currently being walked.
    pub fn record_type(&self) -> Option<&RecordType> {
        self.lanes.get(self.lane).map(|l| &l.record_type)
    }

    /// Number of items not yet handed out.
    pub async fn remaining(&self) -> Result<u64, RunnerError> {
        let start = self
            .current
            .as_ref()
            .and_then(|key| self.lanes.iter().position(|l| l.record_type == key.record_type))
            .unwrap_or(0);

        let mut total = 0u64;
        for lane in &self.lanes[start..] {
            let after = self
                .current
                .as_ref()
                .filter(|key| key.record_type == lane.record_type)
                .map(|key| key.record_id);
            total += lane
                .source
                .count_after(after)
                .await
                .map_err(|e| source_error(&lane.record_type, e))?;
        }
        Ok(total)
    }

    /// Ensure the buffer holds at least one id, moving across lanes as they
    /// drain. Returns `false` when the whole walk is exhausted.
    async fn fill(&mut self) -> Result<bool, RunnerError> {
        loop {
            if !self.buffer.is_empty() {
                return Ok(true);
            }

            let Some(lane) = self.lanes.get(self.lane) else {
                return Ok(false);
            };

            if self.lane_drained {
                self.lane += 1;
                self.paged_after = None;
                self.lane_drained = false;
                continue;
            }

            let page = lane
                .source
                .ids_after(self.paged_after, self.page_size)
                .await
                .map_err(|e| source_error(&lane.record_type, e))?;

            debug!(
                record_type = %lane.record_type,
                after = ?self.paged_after,
                fetched = page.len(),
                "paged record ids"
            );

            let mut last = self.paged_after;
            for &id in &page {
                if last.is_some_and(|prev| id <= prev) {
                    return Err(source_error(
                        &lane.record_type,
                        SourceError::new(format!(
                            "non-monotonic ids: {id} returned after {}",
                            last.unwrap_or_default()
                        )),
                    ));
                }
                last = Some(id);
            }

            if page.len() < self.page_size {
                self.lane_drained = true;
            }
            self.paged_after = last;
            self.buffer.extend(page);
        }
    }
}

impl core::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Cursor")
            .field("record_type", &self.record_type())
            .field("current", &self.current)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

fn source_error(record_type: &RecordType, source: SourceError) -> RunnerError {
    RunnerError::Source {
        record_type: record_type.clone(),
        source,
    }
}
