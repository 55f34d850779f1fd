//! Cancellable deferred work.
//!
//! A [`ScheduledTask`] is a spawned tokio task that ends by sending exactly
//! one [`OrchestratorEvent`] tagged with its [`TaskId`]. Dropping the handle
//! aborts the task. The owner compares the id of an incoming event with the
//! handle it holds, so an event queued by a task that was aborted afterwards
//! is recognised as stale.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::event::{EventSender, OrchestratorEvent};

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        Self(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Handle to a scheduled task; aborts it on drop.
pub struct ScheduledTask {
    id: TaskId,
    handle: JoinHandle<()>,
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask").field("id", &self.id).finish()
    }
}

impl ScheduledTask {
    /// Spawn `make(id)` and deliver its event when it completes.
    pub fn spawn<F, Fut>(events: &EventSender, make: F) -> Self
    where
        F: FnOnce(TaskId) -> Fut,
        Fut: Future<Output = OrchestratorEvent> + Send + 'static,
    {
        let id = TaskId::next();
        let events = events.clone();
        let work = make(id);
        let handle = tokio::spawn(async move {
            let event = work.await;
            let _ = events.send(event);
        });
        Self { id, handle }
    }

    /// Deliver `make(id)` after `delay`.
    pub fn after<F>(delay: Duration, events: &EventSender, make: F) -> Self
    where
        F: FnOnce(TaskId) -> OrchestratorEvent + Send + 'static,
    {
        Self::spawn(events, move |id| async move {
            tokio::time::sleep(delay).await;
            make(id)
        })
    }

    /// Deliver `make(id)` once the runtime has nothing more urgent to do.
    pub fn idle<F>(events: &EventSender, make: F) -> Self
    where
        F: FnOnce(TaskId) -> OrchestratorEvent + Send + 'static,
    {
        Self::spawn(events, move |id| async move {
            tokio::task::yield_now().await;
            make(id)
        })
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Whether an event carrying `task` came from this task.
    pub fn owns(&self, task: TaskId) -> bool {
        self.id == task
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
