//! Coalescing of device hot-plug events into serialized handler runs.
//!
//! Newly added devices are queued (most recent first, no duplicates) and
//! handed one at a time to an external handler process. At most one of the
//! low-priority dispatch task and the handler exit watch exists at any time.

use std::collections::VecDeque;

use conveyor_core::{DeviceAction, DeviceEvent, DeviceId, DisplayContext};

use crate::collaborators::{ExitOutcome, ProcessSpawner};
use crate::event::{EventSender, OrchestratorEvent};
use crate::schedule::{ScheduledTask, TaskId};

/// Observable dispatch state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    IdleScheduled,
    HandlerRunning,
}

#[derive(Debug)]
enum Dispatch {
    Idle,
    IdleScheduled(ScheduledTask),
    HandlerRunning(ScheduledTask),
}

pub struct DeviceCoalescer {
    pending: VecDeque<DeviceId>,
    dispatch: Dispatch,
    volume_management: bool,
    handler: Vec<String>,
    display: DisplayContext,
    spawner: Box<dyn ProcessSpawner>,
    events: EventSender,
}

impl DeviceCoalescer {
    pub fn new(
        volume_management: bool,
        handler: Vec<String>,
        spawner: Box<dyn ProcessSpawner>,
        events: EventSender,
    ) -> Self {
        Self {
            pending: VecDeque::new(),
            dispatch: Dispatch::Idle,
            volume_management,
            handler,
            display: DisplayContext::default(),
            spawner,
            events,
        }
    }

    /// Display on which handlers are spawned.
    pub fn set_display(&mut self, display: DisplayContext) {
        self.display = display;
    }

    pub fn set_volume_management(&mut self, enabled: bool) {
        self.volume_management = enabled;
    }

    pub fn handle_event(&mut self, event: &DeviceEvent) {
        match &event.action {
            DeviceAction::Add => self.device_added(&event.id),
            DeviceAction::Remove => self.device_removed(&event.id),
            action => {
                tracing::trace!(target: "conveyor::devices", id = %event.id, ?action, "ignored");
            }
        }
    }

    pub fn device_added(&mut self, id: &DeviceId) {
        if self.pending.contains(id) {
            return;
        }
        tracing::debug!(target: "conveyor::devices", %id, "device added");
        self.pending.push_front(id.clone());

        if matches!(self.dispatch, Dispatch::Idle) {
            self.schedule_idle();
        }
    }

    pub fn device_removed(&mut self, id: &DeviceId) {
        if let Some(index) = self.pending.iter().position(|pending| pending == id) {
            tracing::debug!(target: "conveyor::devices", %id, "pending device removed");
            self.pending.remove(index);
        }
    }

    fn schedule_idle(&mut self) {
        self.dispatch = Dispatch::IdleScheduled(ScheduledTask::idle(&self.events, |task| {
            OrchestratorEvent::DeviceIdle { task }
        }));
    }

    /// The low-priority dispatch task ran.
    pub fn handle_idle(&mut self, task: TaskId) {
        if !matches!(&self.dispatch, Dispatch::IdleScheduled(scheduled) if scheduled.owns(task)) {
            tracing::trace!(target: "conveyor::devices", %task, "stale idle task");
            return;
        }
        self.dispatch = Dispatch::Idle;

        if !self.volume_management {
            if !self.pending.is_empty() {
                tracing::debug!(
                    target: "conveyor::devices",
                    dropped = self.pending.len(),
                    "volume management disabled"
                );
            }
            self.pending.clear();
            return;
        }

        if let Some(id) = self.pending.pop_front() {
            self.spawn_handler(id);
        }

        if matches!(self.dispatch, Dispatch::Idle) && !self.pending.is_empty() {
            self.schedule_idle();
        }
    }

    fn spawn_handler(&mut self, id: DeviceId) {
        let mut argv = self.handler.clone();
        argv.push(id.0.clone());

        match self.spawner.spawn(&argv, &self.display) {
            Ok(process) => {
                tracing::info!(
                    target: "conveyor::devices",
                    %id,
                    pid = ?process.pid,
                    "volume handler started"
                );
                let exit = process.exit;
                self.dispatch = Dispatch::HandlerRunning(ScheduledTask::spawn(
                    &self.events,
                    move |task| async move {
                        let status = exit.await;
                        OrchestratorEvent::HandlerExited { task, status }
                    },
                ));
            }
            Err(e) => {
                let program = self.handler.first().map(String::as_str).unwrap_or_default();
                tracing::warn!(
                    target: "conveyor::devices",
                    %id,
                    "Failed to launch the volume handler ({e}), \
                     make sure \"{program}\" is installed"
                );
            }
        }
    }

    /// The handler process exited.
    pub fn handle_exit(&mut self, task: TaskId, status: ExitOutcome) {
        if !matches!(&self.dispatch, Dispatch::HandlerRunning(watch) if watch.owns(task)) {
            tracing::trace!(target: "conveyor::devices", %task, "stale exit watch");
            return;
        }
        self.dispatch = Dispatch::Idle;

        if status.success() {
            tracing::debug!(target: "conveyor::devices", "volume handler finished");
        } else {
            tracing::debug!(
                target: "conveyor::devices",
                code = ?status.code,
                "volume handler failed"
            );
        }

        if !self.pending.is_empty() {
            self.schedule_idle();
        }
    }

    /// Abort scheduled work and forget pending devices.
    pub fn shutdown(&mut self) {
        self.dispatch = Dispatch::Idle;
        self.pending.clear();
    }

    /// Pending devices, next to be dispatched first.
    pub fn pending_devices(&self) -> Vec<&DeviceId> {
        self.pending.iter().collect()
    }

    pub fn dispatch_state(&self) -> DispatchState {
        match self.dispatch {
            Dispatch::Idle => DispatchState::Idle,
            Dispatch::IdleScheduled(_) => DispatchState::IdleScheduled,
            Dispatch::HandlerRunning(_) => DispatchState::HandlerRunning,
        }
    }

    /// Nothing pending and nothing scheduled.
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && matches!(self.dispatch, Dispatch::Idle)
    }
}
