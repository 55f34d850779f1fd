//! Serial queue of deferred "open this file" requests.
//!
//! Each entry is resolved and mounted before it is opened. Only the head of
//! the queue is ever in flight; a resolve failure discards the whole queue.
//! Started openers are watched until they exit.

use std::collections::VecDeque;
use std::io;
use std::path::Path;

use conveyor_core::{DisplayContext, Locator, ResolutionError};

use crate::collaborators::{ErrorReporter, ExitOutcome, FileOpener, FileResolver};
use crate::event::{EventSender, OrchestratorEvent};
use crate::schedule::{ScheduledTask, TaskId};

/// One deferred request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchEntry {
    pub locator: Locator,
    pub display: DisplayContext,
    pub startup_id: Option<String>,
}

pub struct LaunchQueue {
    entries: VecDeque<LaunchEntry>,
    in_flight: Option<ScheduledTask>,
    /// Running openers with the name of the file each one opens.
    openers: Vec<(ScheduledTask, String)>,
    resolver: Box<dyn FileResolver>,
    opener: Box<dyn FileOpener>,
    events: EventSender,
}

impl LaunchQueue {
    pub fn new(
        resolver: Box<dyn FileResolver>,
        opener: Box<dyn FileOpener>,
        events: EventSender,
    ) -> Self {
        Self {
            entries: VecDeque::new(),
            in_flight: None,
            openers: Vec::new(),
            resolver,
            opener,
            events,
        }
    }

    /// Parse `names` and queue them for opening.
    ///
    /// A name that cannot be parsed aborts the whole batch before anything
    /// is queued.
    pub fn process_filenames(
        &mut self,
        working_dir: &Path,
        names: &[String],
        display: &DisplayContext,
        startup_id: Option<&str>,
        reporter: &dyn ErrorReporter,
    ) -> Result<(), ResolutionError> {
        let mut batch = Vec::with_capacity(names.len());
        for name in names {
            match Locator::parse(working_dir, name) {
                Ok(locator) => batch.push(locator),
                Err(e) => {
                    reporter.report(&format!("Failed to open \"{name}\""), &e);
                    return Err(e);
                }
            }
        }

        let startup_id = startup_id.filter(|id| !id.is_empty()).map(str::to_string);
        self.entries.extend(batch.into_iter().map(|locator| LaunchEntry {
            locator,
            display: display.clone(),
            startup_id: startup_id.clone(),
        }));
        tracing::debug!(
            target: "conveyor::launch_queue",
            queued = self.entries.len(),
            "files queued"
        );

        if self.in_flight.is_none() {
            self.process_next();
        }
        Ok(())
    }

    fn process_next(&mut self) {
        let Some(head) = self.entries.front() else {
            return;
        };
        let resolving = self.resolver.resolve_and_mount(&head.locator, &head.display);
        self.in_flight = Some(ScheduledTask::spawn(&self.events, move |task| async move {
            let result = resolving.await;
            OrchestratorEvent::ResolveFinished { task, result }
        }));
    }

    /// The head entry finished resolving.
    pub fn handle_resolved(
        &mut self,
        task: TaskId,
        result: Result<Locator, ResolutionError>,
        reporter: &dyn ErrorReporter,
    ) {
        if !self.in_flight.as_ref().is_some_and(|t| t.owns(task)) {
            tracing::trace!(target: "conveyor::launch_queue", %task, "stale resolve");
            return;
        }
        self.in_flight = None;

        match result {
            Ok(target) => {
                let Some(entry) = self.entries.pop_front() else {
                    return;
                };
                let startup_id = entry.startup_id.as_deref();
                match self.opener.open(&target, &entry.display, startup_id) {
                    Ok(process) => {
                        let exit = process.exit;
                        let watcher = ScheduledTask::spawn(&self.events, move |task| async move {
                            let status = exit.await;
                            OrchestratorEvent::OpenerExited { task, status }
                        });
                        self.openers.push((watcher, target.display_name()));
                    }
                    Err(e) => {
                        let name = target.display_name();
                        tracing::warn!(
                            target: "conveyor::launch_queue",
                            %name,
                            "failed to open: {e}"
                        );
                        reporter.report(&format!("Failed to open \"{name}\""), &e);
                    }
                }
                self.process_next();
            }
            Err(e) => {
                let dropped = self.entries.len();
                let head = self.entries.front().map(|entry| entry.locator.display_name());
                self.entries.clear();

                if e.is_cancelled() {
                    tracing::debug!(target: "conveyor::launch_queue", dropped, "launch cancelled");
                } else {
                    let name = head.unwrap_or_default();
                    tracing::warn!(
                        target: "conveyor::launch_queue",
                        %name,
                        dropped,
                        "resolve failed: {e}"
                    );
                    reporter.report(&format!("Failed to open \"{name}\""), &e);
                }
            }
        }
    }

    /// An opener started for a resolved entry exited.
    pub fn handle_opener_exit(
        &mut self,
        task: TaskId,
        status: ExitOutcome,
        reporter: &dyn ErrorReporter,
    ) {
        let Some(idx) = self.openers.iter().position(|(t, _)| t.owns(task)) else {
            tracing::trace!(target: "conveyor::launch_queue", %task, "stale opener exit");
            return;
        };
        let (_, name) = self.openers.remove(idx);
        if status.success() {
            return;
        }

        let error = match status.code {
            Some(code) => io::Error::other(format!("opener exited with status {code}")),
            None => io::Error::other("opener was terminated"),
        };
        tracing::warn!(target: "conveyor::launch_queue", %name, code = ?status.code, "{error}");
        reporter.report(&format!("Failed to open \"{name}\""), &error);
    }

    /// Abort the in-flight resolve, stop watching openers and drop all entries.
    pub fn shutdown(&mut self) {
        self.in_flight = None;
        self.openers.clear();
        self.entries.clear();
    }

    /// Whether any entry is queued or in flight, or an opener is still running.
    pub fn is_processing(&self) -> bool {
        !self.entries.is_empty() || !self.openers.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &LaunchEntry> {
        self.entries.iter()
    }
}
