//! Explicit record-type table for a job.
//!
//! Each entry pairs the source that enumerates a record type with the action
//! applied to its items. Registration order is significant: it is the order in
//! which a job covering several types walks them, and therefore part of the
//! ordering key's total order.

use std::sync::Arc;

use crate::error::RunnerError;
use crate::record::{RecordFilter, RecordType};
use crate::source::{ItemAction, RecordSource};

/// Source + action for one record type.
#[derive(Clone)]
pub struct RecordHandler {
    record_type: RecordType,
    source: Arc<dyn RecordSource>,
    action: Arc<dyn ItemAction>,
}

impl RecordHandler {
    pub fn record_type(&self) -> &RecordType {
        &self.record_type
    }

    pub fn source(&self) -> &Arc<dyn RecordSource> {
        &self.source
    }

    pub fn action(&self) -> &Arc<dyn ItemAction> {
        &self.action
    }
}

impl core::fmt::Debug for RecordHandler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RecordHandler")
            .field("record_type", &self.record_type)
            .finish_non_exhaustive()
    }
}

/// Ordered record-type table.
#[derive(Debug, Clone, Default)]
pub struct RecordRegistry {
    handlers: Vec<RecordHandler>,
}

impl RecordRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace, keeping its position) the handler for a type.
    pub fn register<S, A>(mut self, record_type: impl Into<RecordType>, source: S, action: A) -> Self
    where
        S: RecordSource + 'static,
        A: ItemAction + 'static,
    {
        let handler = RecordHandler {
            record_type: record_type.into(),
            source: Arc::new(source),
            action: Arc::new(action),
        };

        match self
            .handlers
            .iter_mut()
            .find(|h| h.record_type == handler.record_type)
        {
            Some(existing) => *existing = handler,
            None => self.handlers.push(handler),
        }
        self
    }

    pub fn get(&self, record_type: &RecordType) -> Option<&RecordHandler> {
        self.handlers.iter().find(|h| &h.record_type == record_type)
    }

    pub fn record_types(&self) -> impl Iterator<Item = &RecordType> {
        self.handlers.iter().map(|h| &h.record_type)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Handlers covered by `filter`, in walk order.
    ///
    /// Fails with `InvalidFilter` when the filter names an unregistered type.
    pub fn resolve(&self, filter: &RecordFilter) -> Result<Vec<&RecordHandler>, RunnerError> {
        match filter {
            RecordFilter::All => Ok(self.handlers.iter().collect()),
            RecordFilter::Only(record_type) => self
                .get(record_type)
                .map(|h| vec![h])
                .ok_or_else(|| {
                    let known: Vec<&str> = self.record_types().map(RecordType::as_str).collect();
                    RunnerError::invalid_filter(format!(
                        "unknown record type `{record_type}` (expected `all` or one of: {})",
                        known.join(", ")
                    ))
                }),
        }
    }
}
