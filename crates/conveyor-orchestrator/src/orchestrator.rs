//! The orchestrator context and its event loop.

use std::path::Path;

use conveyor_core::{DeviceEvent, DisplayContext, OrchestratorConfig, ResolutionError};
use conveyor_ops::{JobFactory, JobOutcome};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::collaborators::{
    ConfirmPrompt, ErrorReporter, FileOpener, FileResolver, ProcessSpawner, SurfaceFactory,
};
use crate::devices::DeviceCoalescer;
use crate::event::{EventReceiver, EventSender, OrchestratorEvent};
use crate::launch_queue::LaunchQueue;
use crate::progress::ProgressAggregator;
use crate::windows::{Lifecycle, WindowRegistry};

/// Everything the orchestrator needs from its host.
pub struct Collaborators {
    pub surface_factory: SurfaceFactory,
    pub jobs: Box<dyn JobFactory>,
    pub spawner: Box<dyn ProcessSpawner>,
    pub resolver: Box<dyn FileResolver>,
    pub opener: Box<dyn FileOpener>,
    pub prompt: Box<dyn ConfirmPrompt>,
    pub reporter: Box<dyn ErrorReporter>,
}

/// Application-wide coordination state.
///
/// Owned by a single task. Every asynchronous completion comes back as an
/// [`OrchestratorEvent`] and is applied through [`Orchestrator::handle_event`].
pub struct Orchestrator {
    config: OrchestratorConfig,
    pub(crate) progress: ProgressAggregator,
    devices: DeviceCoalescer,
    launch_queue: LaunchQueue,
    pub(crate) windows: WindowRegistry,
    pub(crate) jobs: Box<dyn JobFactory>,
    pub(crate) prompt: Box<dyn ConfirmPrompt>,
    pub(crate) reporter: Box<dyn ErrorReporter>,
    events_rx: EventReceiver,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig, collaborators: Collaborators) -> Self {
        let (events_tx, events_rx): (EventSender, EventReceiver) = mpsc::unbounded_channel();

        let progress = ProgressAggregator::new(
            collaborators.surface_factory,
            config.show_delay(),
            events_tx.clone(),
        );
        let devices = DeviceCoalescer::new(
            config.volume_management,
            config.volume_handler.clone(),
            collaborators.spawner,
            events_tx.clone(),
        );
        let launch_queue =
            LaunchQueue::new(collaborators.resolver, collaborators.opener, events_tx);

        Self {
            windows: WindowRegistry::new(config.daemon),
            config,
            progress,
            devices,
            launch_queue,
            jobs: collaborators.jobs,
            prompt: collaborators.prompt,
            reporter: collaborators.reporter,
            events_rx,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn progress(&self) -> &ProgressAggregator {
        &self.progress
    }

    pub fn devices(&self) -> &DeviceCoalescer {
        &self.devices
    }

    pub fn devices_mut(&mut self) -> &mut DeviceCoalescer {
        &mut self.devices
    }

    pub fn launch_queue(&self) -> &LaunchQueue {
        &self.launch_queue
    }

    pub fn windows(&self) -> &WindowRegistry {
        &self.windows
    }

    pub fn windows_mut(&mut self) -> &mut WindowRegistry {
        &mut self.windows
    }

    /// Apply one asynchronous completion.
    pub fn handle_event(&mut self, event: OrchestratorEvent) {
        match event {
            OrchestratorEvent::ShowProgress { task } => self.progress.handle_show(task),
            OrchestratorEvent::JobProgress { id, progress } => self.progress.update(id, &progress),
            OrchestratorEvent::JobFinished { id, outcome } => {
                if let JobOutcome::Failed(e) = &outcome
                    && let Some(job) = self.progress.job(id)
                {
                    tracing::warn!(target: "conveyor::jobs", %id, "{}: {e}", job.title);
                    self.reporter.report(&job.title, e);
                }
                self.progress.finish(id, &outcome);
            }
            OrchestratorEvent::DeviceIdle { task } => self.devices.handle_idle(task),
            OrchestratorEvent::HandlerExited { task, status } => {
                self.devices.handle_exit(task, status)
            }
            OrchestratorEvent::ResolveFinished { task, result } => {
                self.launch_queue
                    .handle_resolved(task, result, self.reporter.as_ref())
            }
            OrchestratorEvent::OpenerExited { task, status } => {
                self.launch_queue
                    .handle_opener_exit(task, status, self.reporter.as_ref())
            }
        }
    }

    pub fn handle_device_event(&mut self, event: &DeviceEvent) {
        self.devices.handle_event(event);
    }

    /// Queue files for opening. See [`LaunchQueue::process_filenames`].
    pub fn process_filenames(
        &mut self,
        working_dir: &Path,
        names: &[String],
        display: &DisplayContext,
        startup_id: Option<&str>,
    ) -> Result<(), ResolutionError> {
        self.launch_queue.process_filenames(
            working_dir,
            names,
            display,
            startup_id,
            self.reporter.as_ref(),
        )
    }

    /// Close the progress surface.
    pub fn dismiss_progress(&mut self) -> Lifecycle {
        self.progress.dismiss(&mut self.windows)
    }

    /// Wait for the next event and handle it.
    pub async fn step(&mut self) {
        // The receiver never closes: every scheduler holds a sender clone.
        if let Some(event) = self.events_rx.recv().await {
            self.handle_event(event);
        }
    }

    /// Handle every event that is already queued. Returns how many ran.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// No job, launch entry or device dispatch is outstanding.
    pub fn is_idle(&self) -> bool {
        self.progress.active_count() == 0
            && !self.launch_queue.is_processing()
            && self.devices.is_idle()
    }

    /// Step until [`Orchestrator::is_idle`] holds.
    pub async fn run_until_idle(&mut self) {
        while !self.is_idle() {
            self.step().await;
        }
    }

    /// Drive the orchestrator until `shutdown` is cancelled.
    ///
    /// Device notifications are read from `devices` until it closes.
    pub async fn run(
        &mut self,
        mut devices: mpsc::Receiver<DeviceEvent>,
        shutdown: CancellationToken,
    ) {
        let mut devices_open = true;

        loop {
            tokio::select! {
                biased;

                () = shutdown.cancelled() => break,

                Some(event) = self.events_rx.recv() => self.handle_event(event),

                device = devices.recv(), if devices_open => match device {
                    Some(event) => self.handle_device_event(&event),
                    None => {
                        tracing::debug!(target: "conveyor::devices", "device source closed");
                        devices_open = false;
                    }
                },
            }
        }

        self.shutdown();
    }

    /// Abort all scheduled work, drop queued requests and cancel jobs.
    pub fn shutdown(&mut self) {
        tracing::debug!(
            target: "conveyor::orchestrator",
            jobs = self.progress.active_count(),
            "shutting down"
        );
        self.progress.shutdown();
        self.devices.shutdown();
        self.launch_queue.shutdown();
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
