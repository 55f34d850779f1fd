//! Job abstraction, filesystem jobs and the operation catalog for conveyor.
//!
//! Every filesystem mutation runs as a [`Job`]: an opaque, cancellable unit
//! of async work that reports progress over a channel and resolves to a
//! single [`JobOutcome`]. The [`OperationCatalog`] decides which job kind a
//! user request maps to, and a [`JobFactory`] builds the job itself.

mod catalog;
mod conflict;
mod create;
mod factory;
mod job;
mod progress;
mod remove;
mod transfer;

pub use catalog::{
    Action, ConfirmKind, Confirmation, Decision, OperationCatalog, PolicyContext, TargetMode,
};
pub use conflict::{ConflictKind, ConflictPolicy, auto_rename_path};
pub use create::{creat_job, mkdir_job, validate_filename};
pub use factory::{FsJobs, JobConstructor, JobFactory};
pub use job::{
    Job, JobContext, JobError, JobId, JobKind, JobOptions, JobOutcome, JobState, RunningJob,
};
pub use progress::{ItemError, JobProgress, JobReport};
pub use remove::{restore_job, trash_contents, trash_job, unlink_job};
pub use transfer::{copy_job, link_job, move_job};

/// Default channel buffer size for job progress updates.
pub const JOB_CHANNEL_SIZE: usize = 100;
