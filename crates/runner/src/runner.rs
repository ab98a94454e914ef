//! Drives a cursor under a budget and produces a `RunOutcome`.

use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::budget::RunBudget;
use crate::checkpoint::{self, Checkpoint, CheckpointToken};
use crate::config::RunnerConfig;
use crate::cursor::Cursor;
use crate::error::RunnerError;
use crate::job::{Job, JobKind};
use crate::outcome::{RunOutcome, StepOutcome, StepResult};
use crate::registry::RecordRegistry;
use crate::source::Disposition;

/// Why an invocation stopped before the item sequence was exhausted.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum PauseReason {
    Budget,
    Timeout,
    Cancelled,
    /// Paging failed after this invocation had already attempted items.
    SourceFailure,
}

/// Turn a cursor error into a pause once the invocation has made progress, so
/// the caller gets a token past every item attempted so far. Before any
/// progress the error is returned as-is.
fn pause_on_source_failure(err: RunnerError, attempted: u64) -> Result<PauseReason, RunnerError> {
    match err {
        e @ RunnerError::Source { .. } if attempted > 0 => {
            warn!(error = %e, attempted, "record source failed; pausing after the last attempted item");
            Ok(PauseReason::SourceFailure)
        }
        e => Err(e),
    }
}

/// Checkpointed batch runner.
///
/// Holds an explicit table of job kinds → record registries. Items of one
/// invocation are processed strictly in order; each action is awaited before
/// the cursor advances, and budget, timeout and cancellation are only checked
/// between items.
#[derive(Debug, Clone, Default)]
pub struct Runner {
    jobs: HashMap<JobKind, RecordRegistry>,
    config: RunnerConfig,
}

impl Runner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            jobs: HashMap::new(),
            config,
        }
    }

    /// Register the record table a job kind runs against.
    pub fn register_job(mut self, kind: JobKind, registry: RecordRegistry) -> Self {
        self.jobs.insert(kind, registry);
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Start a job from the beginning.
    pub async fn start(&self, job: Job, budget: RunBudget) -> Result<RunOutcome, RunnerError> {
        let registry = self
            .jobs
            .get(&job.kind)
            .ok_or_else(|| RunnerError::UnknownJob(job.kind.to_string()))?;
        registry.resolve(&job.filter)?;

        self.drive(registry, Checkpoint::initial(job), None, budget).await
    }

    /// Continue a job from a token returned by an earlier invocation.
    pub async fn resume(
        &self,
        token: &CheckpointToken,
        budget: RunBudget,
    ) -> Result<RunOutcome, RunnerError> {
        let checkpoint = checkpoint::decode(token)?;
        let registry = self.jobs.get(&checkpoint.job.kind).ok_or_else(|| {
            RunnerError::corrupt_checkpoint(format!("unknown job kind `{}`", checkpoint.job.kind))
        })?;
        registry
            .resolve(&checkpoint.job.filter)
            .map_err(|e| RunnerError::corrupt_checkpoint(e.to_string()))?;

        self.drive(registry, checkpoint, Some(token), budget).await
    }

    /// Run `job`, resuming from `resume_from` when given.
    ///
    /// A token that belongs to a different job is a `CorruptCheckpoint`.
    pub async fn run(
        &self,
        job: Job,
        budget: RunBudget,
        resume_from: Option<&CheckpointToken>,
    ) -> Result<RunOutcome, RunnerError> {
        let Some(token) = resume_from else {
            return self.start(job, budget).await;
        };

        let carried = checkpoint::decode(token)?;
        if !carried.job.same_work_as(&job) {
            return Err(RunnerError::corrupt_checkpoint(format!(
                "checkpoint is for job `{}` over `{}`, not `{}` over `{}`",
                carried.job.kind, carried.job.filter, job.kind, job.filter
            )));
        }
        self.resume(token, budget).await
    }

    async fn drive(
        &self,
        registry: &RecordRegistry,
        checkpoint: Checkpoint,
        original: Option<&CheckpointToken>,
        budget: RunBudget,
    ) -> Result<RunOutcome, RunnerError> {
        let run_id = Uuid::now_v7();
        let span = info_span!(
            "batch_run",
            %run_id,
            job = %checkpoint.job.kind,
            filter = %checkpoint.job.filter
        );

        self.drive_in_span(registry, checkpoint, original, budget)
            .instrument(span)
            .await
    }

    async fn drive_in_span(
        &self,
        registry: &RecordRegistry,
        mut checkpoint: Checkpoint,
        original: Option<&CheckpointToken>,
        budget: RunBudget,
    ) -> Result<RunOutcome, RunnerError> {
        info!(
            resumed = original.is_some(),
            position = ?checkpoint.position,
            max_iterations = budget.max_iterations,
            "batch run started"
        );

        if budget.max_iterations == 0 {
            let token = match original {
                Some(token) => token.clone(),
                None => checkpoint::encode(&checkpoint)?,
            };
            info!("zero budget; paused without advancing");
            return Ok(RunOutcome::Paused {
                checkpoint: token,
                summary: checkpoint.summary,
                remaining: None,
            });
        }

        let mut cursor = Cursor::open(
            registry,
            &checkpoint.job.filter,
            checkpoint.position.as_ref(),
            self.config.page_size,
        )?;

        let started = Instant::now();
        let mut attempted = 0u64;

        let pause = loop {
            if attempted >= budget.max_iterations {
                break Some(PauseReason::Budget);
            }
            if budget.is_cancelled() {
                break Some(PauseReason::Cancelled);
            }
            // At least one item per invocation so a short timeout still
            // makes progress.
            if attempted > 0 && budget.timeout.is_some_and(|t| started.elapsed() >= t) {
                break Some(PauseReason::Timeout);
            }

            let item = match cursor.next().await {
                Ok(Some(item)) => item,
                Ok(None) => break None,
                Err(e) => break Some(pause_on_source_failure(e, attempted)?),
            };

            let handler = registry.get(&item.record_type).ok_or_else(|| {
                RunnerError::invalid_filter(format!("no handler for `{}`", item.record_type))
            })?;

            let outcome = match handler.action().apply(&item).await {
                Ok(Disposition::Applied) => StepOutcome::Success,
                Ok(Disposition::Skipped) => StepOutcome::Skipped,
                Err(e) => {
                    warn!(item = %item, error = %e, "item action failed");
                    StepOutcome::Failed {
                        reason: e.into_reason(),
                    }
                }
            };
            debug!(item = %item, outcome = ?outcome, "item attempted");

            checkpoint.summary.record(&StepResult { item, outcome });
            checkpoint.position = cursor.current_key().cloned();
            attempted += 1;
        };

        let pause = match pause {
            Some(PauseReason::SourceFailure) => Some(PauseReason::SourceFailure),
            Some(reason) => match cursor.has_next().await {
                Ok(more) => more.then_some(reason),
                Err(e) => Some(pause_on_source_failure(e, attempted)?),
            },
            None => None,
        };
        let outcome = match pause {
            Some(reason) => {
                let token = match original {
                    Some(token) if attempted == 0 => token.clone(),
                    _ => checkpoint::encode(&checkpoint)?,
                };
                let remaining = match reason {
                    PauseReason::SourceFailure => None,
                    _ => match cursor.remaining().await {
                        Ok(count) => Some(count),
                        Err(e) => {
                            warn!(error = %e, "could not count remaining items");
                            None
                        }
                    },
                };
                info!(
                    ?reason,
                    attempted,
                    ?remaining,
                    processed = checkpoint.summary.processed,
                    failed = checkpoint.summary.failed,
                    "batch run paused"
                );
                RunOutcome::Paused {
                    checkpoint: token,
                    summary: checkpoint.summary,
                    remaining,
                }
            }
            _ => {
                info!(
                    attempted,
                    processed = checkpoint.summary.processed,
                    failed = checkpoint.summary.failed,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "batch run complete"
                );
                RunOutcome::Complete {
                    summary: checkpoint.summary,
                }
            }
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use proptest::prelude::*;

    use super::*;
    use crate::budget::CancelFlag;
    use crate::error::{ItemActionError, SourceError};
    use crate::memory::InMemoryRecordSource;
    use crate::record::{RecordFilter, WorkItem};
    use crate::source::{ItemAction, RecordSource};

    /// Records every item it sees; fails the ids in `failing`, skips `skipping`.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
        failing: HashSet<i64>,
        skipping: HashSet<i64>,
        cancel_after: Option<(usize, CancelFlag)>,
    }

    impl Recorder {
        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ItemAction for Recorder {
        async fn apply(&self, item: &WorkItem) -> Result<Disposition, ItemActionError> {
            let count = {
                let mut seen = self.seen.lock().unwrap();
                seen.push(item.to_string());
                seen.len()
            };
            if let Some((after, flag)) = &self.cancel_after {
                if count >= *after {
                    flag.cancel();
                }
            }
            if self.failing.contains(&item.record_id) {
                return Err(ItemActionError::new(format!("cannot index {item}")));
            }
            if self.skipping.contains(&item.record_id) {
                return Ok(Disposition::Skipped);
            }
            Ok(Disposition::Applied)
        }
    }

    /// In-memory ids whose `fail_on`-th page request (1-based) errors once.
    struct FlakySource {
        inner: InMemoryRecordSource,
        calls: AtomicUsize,
        fail_on: usize,
    }

    impl FlakySource {
        fn new(ids: &[i64], fail_on: usize) -> Self {
            Self {
                inner: InMemoryRecordSource::with_ids(ids.iter().copied()),
                calls: AtomicUsize::new(0),
                fail_on,
            }
        }
    }

    #[async_trait::async_trait]
    impl RecordSource for FlakySource {
        async fn ids_after(&self, after: Option<i64>, limit: usize) -> Result<Vec<i64>, SourceError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call == self.fail_on {
                return Err(SourceError::new("connection reset"));
            }
            self.inner.ids_after(after, limit).await
        }

        async fn count_after(&self, after: Option<i64>) -> Result<u64, SourceError> {
            self.inner.count_after(after).await
        }
    }

    fn flaky_runner(recorder: Arc<Recorder>, discussions: FlakySource) -> Runner {
        let registry = RecordRegistry::new()
            .register("discussion", discussions, recorder.clone())
            .register("comment", InMemoryRecordSource::new(), recorder);
        Runner::new(RunnerConfig::default().with_page_size(2)).register_job(kind(), registry)
    }

    fn kind() -> JobKind {
        JobKind::new("user_mentions.reindex")
    }

    fn forum_runner(recorder: Arc<Recorder>, discussions: &[i64], comments: &[i64]) -> Runner {
        let registry = RecordRegistry::new()
            .register(
                "discussion",
                InMemoryRecordSource::with_ids(discussions.iter().copied()),
                recorder.clone(),
            )
            .register(
                "comment",
                InMemoryRecordSource::with_ids(comments.iter().copied()),
                recorder,
            );
        Runner::new(RunnerConfig::default().with_page_size(2)).register_job(kind(), registry)
    }

    fn job(filter: RecordFilter) -> Job {
        Job::new(kind(), filter)
    }

    #[tokio::test]
    async fn budget_one_then_resume_reaches_complete() {
        let recorder = Arc::new(Recorder::default());
        let runner = forum_runner(recorder.clone(), &[1, 2], &[1, 2]);

        let first = runner
            .start(job(RecordFilter::All), RunBudget::iterations(1))
            .await
            .unwrap();
        assert_eq!(first.status(), crate::outcome::RunStatus::Incomplete);
        assert_eq!(first.summary().processed, 1);
        assert_eq!(first.remaining(), Some(3));

        let done = runner
            .resume(first.checkpoint().unwrap(), RunBudget::iterations(100))
            .await
            .unwrap();
        assert!(done.is_complete());
        assert_eq!(done.summary().processed, 4);
        assert_eq!(
            recorder.seen(),
            vec!["discussion:1", "discussion:2", "comment:1", "comment:2"]
        );
    }

    #[tokio::test]
    async fn single_step_resumes_complete_on_the_last_item() {
        let recorder = Arc::new(Recorder::default());
        let runner = forum_runner(recorder.clone(), &[1, 2], &[1, 2]);

        let mut outcome = runner
            .start(job(RecordFilter::All), RunBudget::iterations(1))
            .await
            .unwrap();
        let mut invocations = 1;
        while let Some(token) = outcome.checkpoint().cloned() {
            outcome = runner.resume(&token, RunBudget::iterations(1)).await.unwrap();
            invocations += 1;
        }

        assert_eq!(invocations, 4);
        assert_eq!(outcome.summary().processed, 4);
        assert_eq!(recorder.seen().len(), 4);
    }

    #[tokio::test]
    async fn zero_budget_pauses_without_touching_items() {
        let recorder = Arc::new(Recorder::default());
        let runner = forum_runner(recorder.clone(), &[1, 2], &[]);

        let paused = runner
            .start(job(RecordFilter::All), RunBudget::iterations(0))
            .await
            .unwrap();
        assert!(!paused.is_complete());
        assert_eq!(paused.summary().processed, 0);

        let token = paused.checkpoint().unwrap().clone();
        let again = runner.resume(&token, RunBudget::iterations(0)).await.unwrap();
        assert_eq!(again.checkpoint(), Some(&token));
        assert!(recorder.seen().is_empty());
    }

    #[tokio::test]
    async fn empty_sequence_is_complete() {
        let recorder = Arc::new(Recorder::default());
        let runner = forum_runner(recorder, &[], &[]);

        let outcome = runner
            .start(job(RecordFilter::All), RunBudget::iterations(10))
            .await
            .unwrap();
        assert!(outcome.is_complete());
        assert_eq!(outcome.summary().processed, 0);
    }

    #[tokio::test]
    async fn budget_ending_on_last_item_is_complete() {
        let recorder = Arc::new(Recorder::default());
        let runner = forum_runner(recorder, &[1, 2, 3], &[]);

        let outcome = runner
            .start(job(RecordFilter::All), RunBudget::iterations(3))
            .await
            .unwrap();
        assert!(outcome.is_complete());
    }

    #[tokio::test]
    async fn item_failures_are_recorded_and_skipped_past() {
        let recorder = Arc::new(Recorder {
            failing: HashSet::from([2]),
            skipping: HashSet::from([3]),
            ..Default::default()
        });
        let runner = forum_runner(recorder.clone(), &[1, 2, 3, 4], &[]);

        let outcome = runner
            .start(job(RecordFilter::only("discussion")), RunBudget::unbounded())
            .await
            .unwrap();

        let summary = outcome.summary();
        assert!(outcome.is_complete());
        assert_eq!(summary.processed, 4);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures[0].reason, "cannot index discussion:2");
        assert_eq!(recorder.seen().len(), 4);
    }

    #[tokio::test]
    async fn confirmed_failures_are_not_retried_on_resume() {
        let recorder = Arc::new(Recorder {
            failing: HashSet::from([1]),
            ..Default::default()
        });
        let runner = forum_runner(recorder.clone(), &[1, 2], &[]);

        let first = runner
            .start(job(RecordFilter::All), RunBudget::iterations(1))
            .await
            .unwrap();
        runner
            .resume(first.checkpoint().unwrap(), RunBudget::unbounded())
            .await
            .unwrap();

        assert_eq!(recorder.seen(), vec!["discussion:1", "discussion:2"]);
    }

    #[tokio::test]
    async fn paging_failure_after_progress_pauses_at_the_last_attempted_item() {
        let recorder = Arc::new(Recorder::default());
        let runner = flaky_runner(recorder.clone(), FlakySource::new(&[1, 2, 3, 4], 2));

        let first = runner
            .start(job(RecordFilter::All), RunBudget::iterations(3))
            .await
            .unwrap();
        assert!(!first.is_complete());
        assert_eq!(first.summary().processed, 2);
        assert_eq!(first.remaining(), None);
        assert_eq!(recorder.seen(), vec!["discussion:1", "discussion:2"]);

        let done = runner
            .resume(first.checkpoint().unwrap(), RunBudget::unbounded())
            .await
            .unwrap();
        assert!(done.is_complete());
        assert_eq!(done.summary().processed, 4);
        assert_eq!(
            recorder.seen(),
            vec!["discussion:1", "discussion:2", "discussion:3", "discussion:4"]
        );
    }

    #[tokio::test]
    async fn paging_failure_before_any_item_is_an_error() {
        let recorder = Arc::new(Recorder::default());
        let runner = flaky_runner(recorder.clone(), FlakySource::new(&[1, 2], 1));

        let err = runner
            .start(job(RecordFilter::All), RunBudget::iterations(3))
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Source { .. }));
        assert!(recorder.seen().is_empty());
    }

    #[tokio::test]
    async fn unknown_filter_fails_before_any_item() {
        let recorder = Arc::new(Recorder::default());
        let runner = forum_runner(recorder.clone(), &[1], &[1]);

        let err = runner
            .start(job(RecordFilter::only("poll")), RunBudget::iterations(10))
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::InvalidFilter(_)));
        assert!(recorder.seen().is_empty());
    }

    #[tokio::test]
    async fn unknown_job_kind() {
        let runner = Runner::default();
        let err = runner
            .start(job(RecordFilter::All), RunBudget::iterations(1))
            .await
            .unwrap_err();
        assert_eq!(err, RunnerError::UnknownJob("user_mentions.reindex".into()));
    }

    #[tokio::test]
    async fn checkpoint_for_unregistered_job_is_corrupt() {
        let recorder = Arc::new(Recorder::default());
        let runner = forum_runner(recorder, &[1, 2], &[]);
        let paused = runner
            .start(job(RecordFilter::All), RunBudget::iterations(1))
            .await
            .unwrap();

        let other = Runner::default();
        let err = other
            .resume(paused.checkpoint().unwrap(), RunBudget::iterations(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::CorruptCheckpoint(_)));
    }

    #[tokio::test]
    async fn run_rejects_checkpoint_of_another_job() {
        let recorder = Arc::new(Recorder::default());
        let runner = forum_runner(recorder, &[1, 2], &[1, 2]);
        let paused = runner
            .start(job(RecordFilter::All), RunBudget::iterations(1))
            .await
            .unwrap();

        let err = runner
            .run(
                job(RecordFilter::only("comment")),
                RunBudget::iterations(1),
                paused.checkpoint(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::CorruptCheckpoint(_)));
    }

    #[tokio::test]
    async fn cancellation_is_honored_between_items() {
        let flag = CancelFlag::new();
        let recorder = Arc::new(Recorder {
            cancel_after: Some((2, flag.clone())),
            ..Default::default()
        });
        let runner = forum_runner(recorder.clone(), &[1, 2, 3, 4], &[]);

        let outcome = runner
            .start(
                job(RecordFilter::All),
                RunBudget::unbounded().with_cancel(flag),
            )
            .await
            .unwrap();

        assert!(!outcome.is_complete());
        assert_eq!(outcome.summary().processed, 2);
        assert_eq!(recorder.seen().len(), 2);
    }

    #[tokio::test]
    async fn zero_timeout_still_makes_one_step_of_progress() {
        let recorder = Arc::new(Recorder::default());
        let runner = forum_runner(recorder, &[1, 2, 3], &[]);

        let outcome = runner
            .start(
                job(RecordFilter::All),
                RunBudget::unbounded().with_timeout(Duration::ZERO),
            )
            .await
            .unwrap();

        assert!(!outcome.is_complete());
        assert_eq!(outcome.summary().processed, 1);
    }

    #[tokio::test]
    async fn replaying_from_an_older_checkpoint_repeats_only_the_tail() {
        let recorder = Arc::new(Recorder::default());
        let runner = forum_runner(recorder.clone(), &[1, 2, 3], &[]);

        let first = runner
            .start(job(RecordFilter::All), RunBudget::iterations(1))
            .await
            .unwrap();
        let stale = first.checkpoint().unwrap().clone();
        let second = runner.resume(&stale, RunBudget::iterations(1)).await.unwrap();
        assert_eq!(second.summary().processed, 2);

        // The second invocation's checkpoint was "lost": resume from the first again.
        let done = runner.resume(&stale, RunBudget::unbounded()).await.unwrap();
        assert!(done.is_complete());
        assert_eq!(done.summary().processed, 3);
        assert_eq!(
            recorder.seen(),
            vec!["discussion:1", "discussion:2", "discussion:2", "discussion:3"]
        );
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(future)
    }

    fn ids() -> impl Strategy<Value = Vec<i64>> {
        prop::collection::btree_set(1i64..500, 0..25).prop_map(|s| s.into_iter().collect())
    }

    proptest! {
        #[test]
        fn larger_budgets_process_a_superset_in_the_same_order(
            discussions in ids(),
            comments in ids(),
            b1 in 0u64..30,
            extra in 0u64..30,
        ) {
            let b2 = b1 + extra;
            let small = Arc::new(Recorder::default());
            let large = Arc::new(Recorder::default());

            block_on(async {
                forum_runner(small.clone(), &discussions, &comments)
                    .start(job(RecordFilter::All), RunBudget::iterations(b1))
                    .await
                    .unwrap();
                forum_runner(large.clone(), &discussions, &comments)
                    .start(job(RecordFilter::All), RunBudget::iterations(b2))
                    .await
                    .unwrap();
            });

            let small = small.seen();
            let large = large.seen();
            prop_assert!(small.len() <= large.len());
            prop_assert_eq!(&large[..small.len()], &small[..]);
        }

        #[test]
        fn chunked_resumes_match_a_single_pass(
            discussions in ids(),
            comments in ids(),
            step in 1u64..7,
        ) {
            let one_pass = Arc::new(Recorder::default());
            let chunked = Arc::new(Recorder::default());

            let (expected, actual) = block_on(async {
                let expected = forum_runner(one_pass.clone(), &discussions, &comments)
                    .start(job(RecordFilter::All), RunBudget::unbounded())
                    .await
                    .unwrap();

                let runner = forum_runner(chunked.clone(), &discussions, &comments);
                let mut outcome = runner
                    .start(job(RecordFilter::All), RunBudget::iterations(step))
                    .await
                    .unwrap();
                while let Some(token) = outcome.checkpoint().cloned() {
                    outcome = runner.resume(&token, RunBudget::iterations(step)).await.unwrap();
                }
                (expected, outcome)
            });

            prop_assert!(actual.is_complete());
            prop_assert_eq!(expected.summary(), actual.summary());
            prop_assert_eq!(one_pass.seen(), chunked.seen());
        }
    }
}
