//! Seams between the orchestrator and the outside world.
//!
//! The orchestrator never talks to a terminal, a display server or the
//! process table directly. Hosts hand it implementations of these traits;
//! [`crate::system`] has the ones used by the `conveyor` binary.

use std::io;

use conveyor_core::{DisplayContext, Locator, ResolutionError, SpawnError};
use conveyor_ops::{Confirmation, JobId, JobKind, JobOutcome, JobProgress};
use futures::future::BoxFuture;

/// What the progress surface learns about a job when it is added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    pub id: JobId,
    pub kind: JobKind,
    pub sources: Vec<Locator>,
    pub targets: Vec<Locator>,
}

/// The single shared progress UI.
pub trait ProgressSurface {
    fn add_job(&mut self, job: &JobSummary, icon: &str, title: &str);

    fn update_job(&mut self, id: JobId, progress: &JobProgress);

    fn finish_job(&mut self, id: JobId, outcome: &JobOutcome);

    /// Make the surface visible. Must tolerate being called while visible.
    fn present(&mut self);

    fn hide(&mut self);
}

/// Creates the progress surface on first use.
pub type SurfaceFactory = Box<dyn FnMut() -> Box<dyn ProgressSurface>>;

/// Resolves a locator and mounts its enclosing volume if needed.
pub trait FileResolver {
    fn resolve_and_mount(
        &self,
        locator: &Locator,
        display: &DisplayContext,
    ) -> BoxFuture<'static, Result<Locator, ResolutionError>>;
}

/// Opens a resolved file or directory.
///
/// The returned process is the opener helper; it is watched until it exits
/// and a non-zero exit is reported as a failure to open.
pub trait FileOpener {
    fn open(
        &self,
        locator: &Locator,
        display: &DisplayContext,
        startup_id: Option<&str>,
    ) -> io::Result<SpawnedProcess>;
}

/// How a watched process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    /// Exit code, `None` if killed by a signal or the wait failed.
    pub code: Option<i32>,
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// A started child process.
pub struct SpawnedProcess {
    pub pid: Option<u32>,
    /// Resolves when the process exits.
    pub exit: BoxFuture<'static, ExitOutcome>,
}

impl std::fmt::Debug for SpawnedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnedProcess").field("pid", &self.pid).finish()
    }
}

/// Starts external handler processes.
pub trait ProcessSpawner {
    fn spawn(
        &self,
        argv: &[String],
        display: &DisplayContext,
    ) -> Result<SpawnedProcess, SpawnError>;
}

/// Asks the user a yes/no question.
pub trait ConfirmPrompt {
    fn confirm(&self, parent: &DisplayContext, confirmation: &Confirmation) -> bool;
}

/// Shows an error to the user.
pub trait ErrorReporter {
    fn report(&self, title: &str, error: &dyn std::error::Error);
}
