//! Coordination of file-manager jobs, device hot-plug events and deferred
//! file launches.
//!
//! The [`Orchestrator`] is owned by one task. Long-running work (jobs, timers,
//! child-process watches, resolve/mount steps) runs in spawned tokio tasks
//! that report back through [`OrchestratorEvent`]s, so all state changes
//! happen in one place and in a well-defined order.
//!
//! # Components
//!
//! - [`ProgressAggregator`]: the shared progress surface and the active job set
//! - launcher methods on [`Orchestrator`]: `copy_into`, `move_into`, `unlink_files`, ...
//! - [`DeviceCoalescer`]: deduplicated, serialized volume handler runs
//! - [`LaunchQueue`]: resolve, mount and open files one after another
//! - [`WindowRegistry`]: live windows and the daemon flag

mod collaborators;
mod devices;
mod event;
mod launch_queue;
mod launcher;
mod orchestrator;
mod progress;
mod schedule;
pub mod system;
mod windows;

pub use collaborators::{
    ConfirmPrompt, ErrorReporter, ExitOutcome, FileOpener, FileResolver, JobSummary,
    ProcessSpawner, ProgressSurface, SpawnedProcess, SurfaceFactory,
};
pub use devices::{DeviceCoalescer, DispatchState};
pub use event::{EventSender, OrchestratorEvent};
pub use launch_queue::{LaunchEntry, LaunchQueue};
pub use launcher::JobRequest;
pub use orchestrator::{Collaborators, Orchestrator};
pub use progress::{ActiveJob, CompletionSink, ProgressAggregator};
pub use schedule::{ScheduledTask, TaskId};
pub use windows::{Lifecycle, WindowId, WindowKind, WindowRegistry};
