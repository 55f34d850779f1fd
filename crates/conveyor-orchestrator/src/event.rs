//! Events delivered to the coordinating task.

use conveyor_core::{Locator, ResolutionError};
use conveyor_ops::{JobId, JobOutcome, JobProgress};
use tokio::sync::mpsc;

use crate::collaborators::ExitOutcome;
use crate::schedule::TaskId;

/// An asynchronous completion, handled by [`crate::Orchestrator::handle_event`].
#[derive(Debug)]
pub enum OrchestratorEvent {
    /// The debounced show timer fired.
    ShowProgress { task: TaskId },
    /// A job reported progress.
    JobProgress { id: JobId, progress: JobProgress },
    /// A job reached a terminal state.
    JobFinished { id: JobId, outcome: JobOutcome },
    /// The low-priority device dispatch task ran.
    DeviceIdle { task: TaskId },
    /// The device handler process exited.
    HandlerExited { task: TaskId, status: ExitOutcome },
    /// The head of the launch queue was resolved (or failed to).
    ResolveFinished {
        task: TaskId,
        result: Result<Locator, ResolutionError>,
    },
    /// An opener started by the launch queue exited.
    OpenerExited { task: TaskId, status: ExitOutcome },
}

pub type EventSender = mpsc::UnboundedSender<OrchestratorEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<OrchestratorEvent>;
