//! The job abstraction.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use conveyor_core::Locator;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::conflict::ConflictPolicy;
use crate::progress::{JobProgress, JobReport};
use crate::JOB_CHANNEL_SIZE;

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl JobId {
    fn next() -> Self {
        Self(NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind of filesystem mutation a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    Copy,
    Move,
    Link,
    Trash,
    Unlink,
    Creat,
    Mkdir,
    Restore,
}

impl JobKind {
    /// Whether sources and targets must correspond one to one.
    pub fn is_pairwise(self) -> bool {
        matches!(self, Self::Copy | Self::Move | Self::Link | Self::Restore)
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Options shared by the filesystem job constructors.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobOptions {
    /// What to do when a target already exists.
    pub conflict: ConflictPolicy,
}

/// A job-level failure.
#[derive(Debug, Error)]
pub enum JobError {
    /// The job was cancelled.
    #[error("Operation was cancelled")]
    Cancelled,

    /// I/O error that stopped the whole job.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The job cannot handle this kind of location.
    #[error("Unsupported location: {location}")]
    Unsupported { location: String },

    /// The system trash refused the request.
    #[error("Trash operation failed: {message}")]
    Trash { message: String },

    /// The job task itself failed.
    #[error("Job task failed: {message}")]
    Task { message: String },
}

/// How a job ended.
#[derive(Debug)]
pub enum JobOutcome {
    /// The job ran to the end; individual items may still have failed.
    Completed(JobReport),
    /// The job stopped with an error.
    Failed(JobError),
    /// The job was cancelled.
    Cancelled,
}

impl JobOutcome {
    fn from_result(result: Result<JobReport, JobError>) -> Self {
        match result {
            Ok(report) => Self::Completed(report),
            Err(JobError::Cancelled) => Self::Cancelled,
            Err(e) => Self::Failed(e),
        }
    }

    /// Terminal state matching this outcome.
    pub fn state(&self) -> JobState {
        match self {
            Self::Completed(_) => JobState::Completed,
            Self::Failed(_) => JobState::Failed,
            Self::Cancelled => JobState::Cancelled,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Files created by the job (empty unless it completed).
    pub fn new_files(&self) -> &[Locator] {
        match self {
            Self::Completed(report) => &report.new_files,
            _ => &[],
        }
    }

    /// The report, if the job completed.
    pub fn report(&self) -> Option<&JobReport> {
        match self {
            Self::Completed(report) => Some(report),
            _ => None,
        }
    }
}

/// Handed to a job body while it runs.
#[derive(Debug, Clone)]
pub struct JobContext {
    cancel: CancellationToken,
    progress: mpsc::Sender<JobProgress>,
}

impl JobContext {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Return `Err(JobError::Cancelled)` once cancellation was requested.
    pub fn check_cancelled(&self) -> Result<(), JobError> {
        if self.cancel.is_cancelled() {
            Err(JobError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Send a progress update. Dropped silently if nobody listens.
    pub async fn report(&self, progress: JobProgress) {
        let _ = self.progress.send(progress).await;
    }
}

type JobBody =
    Box<dyn FnOnce(JobContext) -> BoxFuture<'static, Result<JobReport, JobError>> + Send>;

/// A unit of asynchronous work that has not been started yet.
pub struct Job {
    id: JobId,
    kind: JobKind,
    sources: Vec<Locator>,
    targets: Vec<Locator>,
    cancel: CancellationToken,
    body: JobBody,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("sources", &self.sources)
            .field("targets", &self.targets)
            .finish()
    }
}

impl Job {
    /// Create a job from an async body.
    pub fn new<F, Fut>(kind: JobKind, sources: Vec<Locator>, targets: Vec<Locator>, body: F) -> Self
    where
        F: FnOnce(JobContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<JobReport, JobError>> + Send + 'static,
    {
        Self {
            id: JobId::next(),
            kind,
            sources,
            targets,
            cancel: CancellationToken::new(),
            body: Box::new(move |ctx| Box::pin(body(ctx))),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn sources(&self) -> &[Locator] {
        &self.sources
    }

    pub fn targets(&self) -> &[Locator] {
        &self.targets
    }

    /// Token that cancels this job once started.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawn the job on the tokio runtime.
    pub fn start(self) -> RunningJob {
        let (progress_tx, progress_rx) = mpsc::channel(JOB_CHANNEL_SIZE);
        let (done_tx, done_rx) = oneshot::channel();

        let ctx = JobContext {
            cancel: self.cancel.clone(),
            progress: progress_tx,
        };
        let cancel = self.cancel.clone();
        let body = (self.body)(ctx);

        tracing::debug!(target: "conveyor::jobs", id = %self.id, kind = %self.kind, "job started");

        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => Err(JobError::Cancelled),
                result = body => result,
            };
            let _ = done_tx.send(JobOutcome::from_result(result));
        });

        RunningJob {
            id: self.id,
            kind: self.kind,
            cancel: self.cancel,
            progress: progress_rx,
            completion: done_rx,
        }
    }
}

/// A started job.
#[derive(Debug)]
pub struct RunningJob {
    pub id: JobId,
    pub kind: JobKind,
    cancel: CancellationToken,
    progress: mpsc::Receiver<JobProgress>,
    completion: oneshot::Receiver<JobOutcome>,
}

impl RunningJob {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Split into the progress stream and the completion notification.
    pub fn into_parts(self) -> (mpsc::Receiver<JobProgress>, oneshot::Receiver<JobOutcome>) {
        (self.progress, self.completion)
    }

    /// Wait for the outcome, discarding progress updates.
    pub async fn wait(self) -> JobOutcome {
        let (mut progress, completion) = self.into_parts();
        while progress.recv().await.is_some() {}
        completion.await.unwrap_or_else(|_| {
            JobOutcome::Failed(JobError::Task {
                message: "job task dropped its completion".to_string(),
            })
        })
    }
}
