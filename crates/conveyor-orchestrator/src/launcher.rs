//! Job launcher: request validation, target collection and job start.

use conveyor_core::{DisplayContext, Locator, ValidationError};
use conveyor_ops::{
    Action, Confirmation, Decision, JobId, JobKind, OperationCatalog, PolicyContext, TargetMode,
};

use crate::orchestrator::Orchestrator;
use crate::progress::CompletionSink;

/// A fully described job, ready to be started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub kind: JobKind,
    pub sources: Vec<Locator>,
    pub targets: Vec<Locator>,
    pub icon: &'static str,
    pub title: String,
}

impl Orchestrator {
    /// Construct and start a job, then hand it to the progress aggregator.
    pub fn launch(
        &mut self,
        parent: &DisplayContext,
        request: JobRequest,
        on_complete: Option<CompletionSink>,
    ) -> Result<JobId, ValidationError> {
        if request.kind.is_pairwise() && request.sources.len() != request.targets.len() {
            return Err(ValidationError::MismatchedTargets {
                sources: request.sources.len(),
                targets: request.targets.len(),
            });
        }

        tracing::debug!(
            target: "conveyor::launcher",
            kind = %request.kind,
            display = ?parent.display,
            "launching job"
        );
        let job = self
            .jobs
            .create(request.kind, request.sources, request.targets);
        Ok(self
            .progress
            .add(job, request.icon, request.title, on_complete, &mut self.windows))
    }

    /// Copy each source onto the target at the same position.
    pub fn copy_to(
        &mut self,
        parent: &DisplayContext,
        sources: Vec<Locator>,
        targets: Vec<Locator>,
        on_complete: Option<CompletionSink>,
    ) -> Result<Option<JobId>, ValidationError> {
        if sources.is_empty() {
            return Ok(None);
        }
        let decision =
            OperationCatalog::decide(Action::CopyTo, &PolicyContext::for_sources(&sources));
        self.launch_decision(parent, decision, sources, targets, None, on_complete)
    }

    /// Copy sources into `directory`.
    pub fn copy_into(
        &mut self,
        parent: &DisplayContext,
        sources: Vec<Locator>,
        directory: &Locator,
        on_complete: Option<CompletionSink>,
    ) -> Result<Option<JobId>, ValidationError> {
        self.collect_and_launch(parent, Action::CopyInto, sources, directory, on_complete)
    }

    /// Create symbolic links to sources inside `directory`.
    pub fn link_into(
        &mut self,
        parent: &DisplayContext,
        sources: Vec<Locator>,
        directory: &Locator,
        on_complete: Option<CompletionSink>,
    ) -> Result<Option<JobId>, ValidationError> {
        self.collect_and_launch(parent, Action::LinkInto, sources, directory, on_complete)
    }

    /// Move sources into `directory`; moving into the trash trashes them.
    pub fn move_into(
        &mut self,
        parent: &DisplayContext,
        sources: Vec<Locator>,
        directory: &Locator,
        on_complete: Option<CompletionSink>,
    ) -> Result<Option<JobId>, ValidationError> {
        self.collect_and_launch(parent, Action::MoveInto, sources, directory, on_complete)
    }

    /// Delete files, permanently when requested or when any is not local.
    ///
    /// Returns `Ok(None)` when there is nothing to do or the user declined.
    pub fn unlink_files(
        &mut self,
        parent: &DisplayContext,
        files: Vec<Locator>,
        permanent: bool,
    ) -> Result<Option<JobId>, ValidationError> {
        if files.is_empty() {
            return Ok(None);
        }
        let ctx = PolicyContext::for_sources(&files).with_permanent(permanent);
        let decision = OperationCatalog::decide(Action::Unlink, &ctx);
        if !self.confirmed(parent, &decision, &files) {
            return Ok(None);
        }
        self.launch_decision(parent, decision, files, Vec::new(), None, None)
    }

    /// Move files into the trash.
    pub fn trash(
        &mut self,
        parent: &DisplayContext,
        files: Vec<Locator>,
    ) -> Result<Option<JobId>, ValidationError> {
        if files.is_empty() {
            return Ok(None);
        }
        let decision = OperationCatalog::decide(Action::Trash, &PolicyContext::for_sources(&files));
        self.launch_decision(parent, decision, files, Vec::new(), None, None)
    }

    /// Create empty files.
    pub fn creat(
        &mut self,
        parent: &DisplayContext,
        files: Vec<Locator>,
        on_complete: Option<CompletionSink>,
    ) -> Result<Option<JobId>, ValidationError> {
        self.create(parent, Action::Creat, files, on_complete)
    }

    /// Create directories.
    pub fn mkdir(
        &mut self,
        parent: &DisplayContext,
        files: Vec<Locator>,
        on_complete: Option<CompletionSink>,
    ) -> Result<Option<JobId>, ValidationError> {
        self.create(parent, Action::Mkdir, files, on_complete)
    }

    fn create(
        &mut self,
        parent: &DisplayContext,
        action: Action,
        files: Vec<Locator>,
        on_complete: Option<CompletionSink>,
    ) -> Result<Option<JobId>, ValidationError> {
        if files.is_empty() {
            return Ok(None);
        }
        let decision = OperationCatalog::decide(action, &PolicyContext::for_sources(&files));
        self.launch_decision(parent, decision, files, Vec::new(), None, on_complete)
    }

    /// Purge the contents of the trash after confirmation.
    pub fn empty_trash(
        &mut self,
        parent: &DisplayContext,
    ) -> Result<Option<JobId>, ValidationError> {
        let sources = vec![Locator::TrashRoot];
        let decision = OperationCatalog::decide(Action::EmptyTrash, &PolicyContext::default());
        if !self.confirmed(parent, &decision, &sources) {
            return Ok(None);
        }
        self.launch_decision(parent, decision, sources, Vec::new(), None, None)
    }

    /// Restore trashed items to their original locations.
    ///
    /// Every item must know where it came from; otherwise nothing happens.
    pub fn restore_files(
        &mut self,
        parent: &DisplayContext,
        trashed: Vec<Locator>,
        on_complete: Option<CompletionSink>,
    ) -> Result<Option<JobId>, ValidationError> {
        if trashed.is_empty() {
            return Ok(None);
        }
        let decision =
            OperationCatalog::decide(Action::Restore, &PolicyContext::for_sources(&trashed));

        let mut targets = Vec::with_capacity(trashed.len());
        for item in &trashed {
            match item.original_location() {
                Some(original) => targets.push(Locator::local(original)),
                None => {
                    let name = item.display_name();
                    let title = format!("Could not restore \"{name}\"");
                    return Err(
                        self.reject_as(&title, ValidationError::MissingOriginalLocation { name })
                    );
                }
            }
        }

        self.launch_decision(parent, decision, trashed, targets, None, on_complete)
    }

    /// Request cancellation of a running job.
    pub fn cancel_job(&mut self, id: JobId) -> bool {
        self.progress.cancel(id)
    }

    fn collect_and_launch(
        &mut self,
        parent: &DisplayContext,
        action: Action,
        sources: Vec<Locator>,
        directory: &Locator,
        on_complete: Option<CompletionSink>,
    ) -> Result<Option<JobId>, ValidationError> {
        if sources.is_empty() {
            return Ok(None);
        }
        let ctx = PolicyContext::for_sources(&sources).with_destination(directory);
        let decision = OperationCatalog::decide(action, &ctx);

        let targets = match decision.targets {
            TargetMode::IntoDirectory => {
                let mut targets = Vec::with_capacity(sources.len());
                for source in &sources {
                    match source.file_name() {
                        Some(name) if !source.is_root() => targets.push(directory.join(&name)),
                        _ => {
                            return Err(self.reject(ValidationError::RootLocation {
                                location: source.to_string(),
                            }));
                        }
                    }
                }
                targets
            }
            _ => Vec::new(),
        };

        self.launch_decision(parent, decision, sources, targets, Some(directory), on_complete)
    }

    fn launch_decision(
        &mut self,
        parent: &DisplayContext,
        decision: Decision,
        sources: Vec<Locator>,
        targets: Vec<Locator>,
        destination: Option<&Locator>,
        on_complete: Option<CompletionSink>,
    ) -> Result<Option<JobId>, ValidationError> {
        let request = JobRequest {
            kind: decision.kind,
            sources,
            targets,
            icon: decision.icon,
            title: decision.title(destination),
        };
        match self.launch(parent, request, on_complete) {
            Ok(id) => Ok(Some(id)),
            Err(e) => Err(self.reject(e)),
        }
    }

    fn confirmed(&self, parent: &DisplayContext, decision: &Decision, sources: &[Locator]) -> bool {
        let Some(kind) = decision.confirm else {
            return true;
        };
        let confirmation = Confirmation::new(kind, sources);
        let accepted = self.prompt.confirm(parent, &confirmation);
        if !accepted {
            tracing::debug!(target: "conveyor::launcher", ?kind, "confirmation declined");
        }
        accepted
    }

    fn reject(&self, error: ValidationError) -> ValidationError {
        self.reject_as("Failed to launch operation", error)
    }

    fn reject_as(&self, title: &str, error: ValidationError) -> ValidationError {
        tracing::warn!(target: "conveyor::launcher", "{title}: {error}");
        self.reporter.report(title, &error);
        error
    }
}
