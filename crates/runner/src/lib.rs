//! Checkpointed, resumable batch runner.
//!
//! A job walks a filtered set of records in a stable order, applies a per-record
//! action, and stops after an iteration budget. When it stops early it hands
//! back an opaque checkpoint token; submitting that token resumes exactly after
//! the last attempted record.
//!
//! ## Components
//!
//! - `RecordRegistry`: explicit table of record types → (source, action)
//! - `Cursor`: lazy, resumable enumeration over the registry's sources
//! - `Checkpoint`: versioned resume state, encoded by `checkpoint::encode`/`decode`
//! - `Runner`: drives a cursor under a `RunBudget` and reports a `RunOutcome`

pub mod budget;
pub mod checkpoint;
pub mod config;
pub mod cursor;
pub mod error;
pub mod job;
pub mod memory;
pub mod outcome;
pub mod record;
pub mod registry;
pub mod runner;
pub mod source;

pub use budget::{CancelFlag, RunBudget};
pub use checkpoint::{Checkpoint, CheckpointToken, CHECKPOINT_VERSION};
pub use config::RunnerConfig;
pub use cursor::Cursor;
pub use error::{ItemActionError, RunnerError, SourceError};
pub use job::{Job, JobKind};
pub use memory::InMemoryRecordSource;
pub use outcome::{ItemFailure, RunOutcome, RunStatus, RunSummary, StepOutcome, StepResult};
pub use record::{OrderingKey, RecordFilter, RecordType, WorkItem};
pub use registry::{RecordHandler, RecordRegistry};
pub use runner::Runner;
pub use source::{Disposition, ItemAction, RecordSource};
