//! Per-item results and run outcomes.

use serde::{Deserialize, Serialize};

use crate::checkpoint::CheckpointToken;
use crate::record::{OrderingKey, WorkItem};

/// Cap on failure details carried in a summary (counts are always exact).
pub const MAX_TRACKED_FAILURES: usize = 100;

/// Outcome of applying the action to one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Success,
    Skipped,
    Failed { reason: String },
}

/// One attempted item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub item: WorkItem,
    pub outcome: StepOutcome,
}

/// A recorded item failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub key: OrderingKey,
    pub reason: String,
}

/// Aggregate over every item attempted by a job, across all invocations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Items attempted (succeeded + skipped + failed).
    pub processed: u64,
    pub succeeded: u64,
    pub skipped: u64,
    pub failed: u64,
    /// First `MAX_TRACKED_FAILURES` failures, in walk order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ItemFailure>,
}

impl RunSummary {
    pub fn record(&mut self, step: &StepResult) {
        self.processed += 1;
        match &step.outcome {
            StepOutcome::Success => self.succeeded += 1,
            StepOutcome::Skipped => self.skipped += 1,
            StepOutcome::Failed { reason } => {
                self.failed += 1;
                if self.failures.len() < MAX_TRACKED_FAILURES {
                    self.failures.push(ItemFailure {
                        key: step.item.key(),
                        reason: reason.clone(),
                    });
                }
            }
        }
    }
}

/// Completion status as exposed to callers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Complete,
    Incomplete,
}

impl RunStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Complete => "complete",
            RunStatus::Incomplete => "incomplete",
        }
    }
}

/// Terminal artifact of one runner invocation. Not persisted by the runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The item sequence is exhausted.
    Complete { summary: RunSummary },
    /// Budget, timeout, cancellation or a record source failure stopped the
    /// run; resume with `checkpoint`.
    #[serde(rename = "incomplete")]
    Paused {
        checkpoint: CheckpointToken,
        summary: RunSummary,
        /// Items left after the checkpoint, when they could be counted.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        remaining: Option<u64>,
    },
}

impl RunOutcome {
    pub fn status(&self) -> RunStatus {
        match self {
            RunOutcome::Complete { .. } => RunStatus::Complete,
            RunOutcome::Paused { .. } => RunStatus::Incomplete,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, RunOutcome::Complete { .. })
    }

    pub fn summary(&self) -> &RunSummary {
        match self {
            RunOutcome::Complete { summary } | RunOutcome::Paused { summary, .. } => summary,
        }
    }

    /// Items left to walk; `None` once complete or when uncounted.
    pub fn remaining(&self) -> Option<u64> {
        match self {
            RunOutcome::Complete { .. } => None,
            RunOutcome::Paused { remaining, .. } => *remaining,
        }
    }

    pub fn checkpoint(&self) -> Option<&CheckpointToken> {
        match self {
            RunOutcome::Complete { .. } => None,
            RunOutcome::Paused { checkpoint, .. } => Some(checkpoint),
        }
    }
}
