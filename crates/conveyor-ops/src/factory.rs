//! Job construction seam.

use conveyor_core::Locator;

use crate::create::{creat_job, mkdir_job};
use crate::job::{Job, JobKind, JobOptions};
use crate::remove::{restore_job, trash_job, unlink_job};
use crate::transfer::{copy_job, link_job, move_job};

/// Signature shared by every job constructor.
pub type JobConstructor = fn(Vec<Locator>, Vec<Locator>, &JobOptions) -> Job;

/// Builds jobs for the launcher.
pub trait JobFactory {
    fn create(&self, kind: JobKind, sources: Vec<Locator>, targets: Vec<Locator>) -> Job;
}

/// The filesystem job backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsJobs {
    pub options: JobOptions,
}

impl FsJobs {
    pub fn new(options: JobOptions) -> Self {
        Self { options }
    }

    /// The constructor for a job kind.
    pub fn constructor(kind: JobKind) -> JobConstructor {
        match kind {
            JobKind::Copy => copy_job,
            JobKind::Move => move_job,
            JobKind::Link => link_job,
            JobKind::Trash => trash_job,
            JobKind::Unlink => unlink_job,
            JobKind::Creat => creat_job,
            JobKind::Mkdir => mkdir_job,
            JobKind::Restore => restore_job,
        }
    }
}

impl JobFactory for FsJobs {
    fn create(&self, kind: JobKind, sources: Vec<Locator>, targets: Vec<Locator>) -> Job {
        tracing::debug!(
            target: "conveyor::jobs",
            %kind,
            sources = sources.len(),
            targets = targets.len(),
            "constructing job"
        );
        Self::constructor(kind)(sources, targets, &self.options)
    }
}
