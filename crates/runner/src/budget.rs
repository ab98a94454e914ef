//! Per-invocation limits on a runner call.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

/// Shared cancellation signal, honored between items only.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the run pause at the next item boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Limits for one runner invocation.
///
/// Exhausting any of them is not an error: the run pauses and returns a
/// checkpoint.
#[derive(Debug, Clone)]
pub struct RunBudget {
    /// Maximum number of items attempted in this invocation (0 pauses without touching the source).
    pub max_iterations: u64,
    /// Wall-clock limit, checked after each item.
    pub timeout: Option<Duration>,
    /// Caller-held cancellation signal.
    pub cancel: Option<CancelFlag>,
}

impl RunBudget {
    pub fn iterations(max_iterations: u64) -> Self {
        Self {
            max_iterations,
            timeout: None,
            cancel: None,
        }
    }

    pub fn unbounded() -> Self {
        Self::iterations(u64::MAX)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
    }
}
