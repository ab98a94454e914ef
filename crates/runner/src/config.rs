//! Runner configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::budget::RunBudget;

/// Runner-wide settings. Per-invocation limits are derived from these unless
/// the caller passes an explicit `RunBudget`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// How many ids to page from a record source at a time.
    pub page_size: usize,
    /// Default iteration budget per invocation.
    pub max_iterations: u64,
    /// Default wall-clock limit per invocation.
    pub timeout: Option<Duration>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_iterations: 100,
            timeout: Some(Duration::from_secs(10)),
        }
    }
}

impl RunnerConfig {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Budget built from the defaults, optionally overriding the iteration count.
    pub fn budget(&self, max_iterations: Option<u64>) -> RunBudget {
        let budget = RunBudget::iterations(max_iterations.unwrap_or(self.max_iterations));
        match self.timeout {
            Some(timeout) => budget.with_timeout(timeout),
            None => budget,
        }
    }
}
