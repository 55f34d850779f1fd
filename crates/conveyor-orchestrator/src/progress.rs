//! The progress aggregator: one shared surface for every running job.

use std::time::Duration;

use conveyor_ops::{Job, JobError, JobId, JobKind, JobOutcome, JobProgress, JobState};
use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;

use crate::collaborators::{JobSummary, ProgressSurface, SurfaceFactory};
use crate::event::{EventSender, OrchestratorEvent};
use crate::schedule::{ScheduledTask, TaskId};
use crate::windows::{Lifecycle, WindowId, WindowKind, WindowRegistry};

/// Invoked exactly once with the terminal outcome of a job.
pub type CompletionSink = Box<dyn FnOnce(&JobOutcome)>;

/// A started job tracked by the aggregator.
pub struct ActiveJob {
    pub id: JobId,
    pub kind: JobKind,
    pub title: String,
    pub icon: &'static str,
    pub state: JobState,
    cancel: CancellationToken,
    on_complete: Option<CompletionSink>,
}

impl std::fmt::Debug for ActiveJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveJob")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("title", &self.title)
            .field("state", &self.state)
            .finish()
    }
}

pub struct ProgressAggregator {
    jobs: IndexMap<JobId, ActiveJob>,
    surface: Option<(Box<dyn ProgressSurface>, WindowId)>,
    factory: SurfaceFactory,
    visible: bool,
    show_timer: Option<ScheduledTask>,
    show_delay: Duration,
    events: EventSender,
}

impl ProgressAggregator {
    pub fn new(factory: SurfaceFactory, show_delay: Duration, events: EventSender) -> Self {
        Self {
            jobs: IndexMap::new(),
            surface: None,
            factory,
            visible: false,
            show_timer: None,
            show_delay,
            events,
        }
    }

    /// Start `job` and track it until it reaches a terminal state.
    pub fn add(
        &mut self,
        job: Job,
        icon: &'static str,
        title: String,
        on_complete: Option<CompletionSink>,
        windows: &mut WindowRegistry,
    ) -> JobId {
        let summary = JobSummary {
            id: job.id(),
            kind: job.kind(),
            sources: job.sources().to_vec(),
            targets: job.targets().to_vec(),
        };
        let had_active = !self.jobs.is_empty();

        self.surface_mut(windows).add_job(&summary, icon, &title);

        let running = job.start();
        let cancel = running.cancel_token();
        let id = running.id;
        let (mut progress, completion) = running.into_parts();
        let events = self.events.clone();
        tokio::spawn(async move {
            while let Some(progress) = progress.recv().await {
                let _ = events.send(OrchestratorEvent::JobProgress { id, progress });
            }
            let outcome = completion.await.unwrap_or_else(|_| {
                JobOutcome::Failed(JobError::Task {
                    message: "job task ended without an outcome".to_string(),
                })
            });
            let _ = events.send(OrchestratorEvent::JobFinished { id, outcome });
        });

        tracing::debug!(
            target: "conveyor::progress",
            %id,
            kind = %summary.kind,
            %title,
            "job added"
        );
        self.jobs.insert(
            id,
            ActiveJob {
                id,
                kind: summary.kind,
                title,
                icon,
                state: JobState::Running,
                cancel,
                on_complete,
            },
        );

        if had_active {
            self.present();
        } else if !self.visible && self.show_timer.is_none() {
            self.show_timer = Some(ScheduledTask::after(self.show_delay, &self.events, |task| {
                OrchestratorEvent::ShowProgress { task }
            }));
        }

        id
    }

    fn surface_mut(&mut self, windows: &mut WindowRegistry) -> &mut dyn ProgressSurface {
        let factory = &mut self.factory;
        let (surface, _) = self.surface.get_or_insert_with(|| {
            let window = windows.register(WindowKind::Progress);
            tracing::debug!(target: "conveyor::progress", %window, "progress surface created");
            (factory(), window)
        });
        surface.as_mut()
    }

    /// The show timer fired.
    pub fn handle_show(&mut self, task: TaskId) {
        if !self.show_timer.as_ref().is_some_and(|timer| timer.owns(task)) {
            tracing::trace!(target: "conveyor::progress", %task, "stale show timer");
            return;
        }
        self.show_timer = None;
        if !self.jobs.is_empty() {
            self.present();
        }
    }

    /// Show the surface now. Idempotent.
    pub fn present(&mut self) {
        self.show_timer = None;
        if let Some((surface, _)) = self.surface.as_mut() {
            surface.present();
            if !self.visible {
                tracing::debug!(
                    target: "conveyor::progress",
                    jobs = self.jobs.len(),
                    "progress surface shown"
                );
            }
            self.visible = true;
        }
    }

    pub fn update(&mut self, id: JobId, progress: &JobProgress) {
        if let Some(job) = self.jobs.get_mut(&id) {
            job.state = JobState::Running;
            if let Some((surface, _)) = self.surface.as_mut() {
                surface.update_job(id, progress);
            }
        }
    }

    /// Remove a terminal job and hand its outcome to the completion sink.
    ///
    /// Returns the removed job, `None` if `id` was not active.
    pub fn finish(&mut self, id: JobId, outcome: &JobOutcome) -> Option<ActiveJob> {
        let mut job = self.jobs.shift_remove(&id)?;
        job.state = outcome.state();

        if let Some((surface, _)) = self.surface.as_mut() {
            surface.finish_job(id, outcome);
        }
        if let Some(sink) = job.on_complete.take() {
            sink(outcome);
        }
        if self.jobs.is_empty() {
            self.show_timer = None;
        }

        tracing::debug!(
            target: "conveyor::progress",
            %id,
            state = ?job.state,
            remaining = self.jobs.len(),
            "job finished"
        );
        Some(job)
    }

    /// Request cancellation of an active job.
    pub fn cancel(&self, id: JobId) -> bool {
        match self.jobs.get(&id) {
            Some(job) => {
                job.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Close the surface. It is disposed when no jobs are active.
    pub fn dismiss(&mut self, windows: &mut WindowRegistry) -> Lifecycle {
        self.visible = false;
        self.show_timer = None;
        if !self.jobs.is_empty() {
            if let Some((surface, _)) = self.surface.as_mut() {
                surface.hide();
            }
            return Lifecycle::Continue;
        }

        match self.surface.take() {
            Some((mut surface, window)) => {
                surface.hide();
                tracing::debug!(target: "conveyor::progress", %window, "progress surface disposed");
                windows.unregister(window)
            }
            None => Lifecycle::Continue,
        }
    }

    /// Abort the show timer and cancel every active job.
    pub fn shutdown(&mut self) {
        self.show_timer = None;
        for job in self.jobs.values() {
            job.cancel.cancel();
        }
    }

    pub fn job(&self, id: JobId) -> Option<&ActiveJob> {
        self.jobs.get(&id)
    }

    /// Active jobs in start order.
    pub fn active_jobs(&self) -> impl Iterator<Item = &ActiveJob> {
        self.jobs.values()
    }

    pub fn active_count(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn has_surface(&self) -> bool {
        self.surface.is_some()
    }

    /// Whether the debounced show is still pending.
    pub fn has_pending_show(&self) -> bool {
        self.show_timer.is_some()
    }
}
