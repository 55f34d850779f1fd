//! Terminal implementations of the progress surface and confirmation prompt.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::rc::Rc;

use conveyor_core::{DisplayContext, Locator};
use conveyor_ops::{Confirmation, ItemError, JobId, JobKind, JobOutcome, JobProgress, JobState};
use conveyor_orchestrator::{ConfirmPrompt, JobSummary, ProgressSurface};
use serde::Serialize;

/// A job as it ended, for the final report.
#[derive(Debug, Clone, Serialize)]
pub struct FinishedJob {
    pub kind: JobKind,
    pub title: String,
    pub state: JobState,
    pub summary: String,
    pub errors: Vec<ItemError>,
    pub new_files: Vec<Locator>,
}

impl FinishedJob {
    fn new(kind: JobKind, title: String, outcome: &JobOutcome) -> Self {
        let (summary, errors) = match outcome {
            JobOutcome::Completed(report) => (report.summary(), report.errors.clone()),
            JobOutcome::Failed(e) => (format!("failed: {e}"), Vec::new()),
            JobOutcome::Cancelled => ("cancelled".to_string(), Vec::new()),
        };
        Self {
            kind,
            title,
            state: outcome.state(),
            summary,
            errors,
            new_files: outcome.new_files().to_vec(),
        }
    }

    /// Whether every item of the job went through.
    pub fn is_success(&self) -> bool {
        self.state == JobState::Completed && self.errors.is_empty()
    }
}

/// Shared list of finished jobs.
pub type FinishedLog = Rc<RefCell<Vec<FinishedJob>>>;

/// Progress lines on stderr.
///
/// Nothing is printed until the orchestrator presents the surface, so short
/// jobs stay silent. Finished jobs are appended to a shared log either way.
#[derive(Debug, Default)]
pub struct ConsoleSurface {
    jobs: HashMap<JobId, (JobKind, String)>,
    visible: bool,
    finished: FinishedLog,
}

impl ConsoleSurface {
    pub fn new(finished: FinishedLog) -> Self {
        Self {
            jobs: HashMap::new(),
            visible: false,
            finished,
        }
    }

    fn title(&self, id: JobId) -> &str {
        self.jobs.get(&id).map(|(_, title)| title.as_str()).unwrap_or("Job")
    }
}

impl ProgressSurface for ConsoleSurface {
    fn add_job(&mut self, job: &JobSummary, _icon: &str, title: &str) {
        self.jobs.insert(job.id, (job.kind, title.to_string()));
        if self.visible {
            eprintln!("{title}");
        }
    }

    fn update_job(&mut self, id: JobId, progress: &JobProgress) {
        if !self.visible {
            return;
        }
        let current = progress
            .current
            .as_ref()
            .map(|c| c.display_name())
            .unwrap_or_default();
        eprint!(
            "\r{} {}/{} ({}) {:>5.1}% {}",
            self.title(id),
            progress.items_completed,
            progress.items_total,
            format_size(progress.bytes_processed),
            progress.percentage(),
            truncate(&current, 30),
        );
        let _ = io::stderr().flush();
    }

    fn finish_job(&mut self, id: JobId, outcome: &JobOutcome) {
        let Some((kind, title)) = self.jobs.remove(&id) else {
            return;
        };
        let finished = FinishedJob::new(kind, title, outcome);
        if self.visible {
            eprintln!("\r{} {}", finished.title, finished.summary);
        }
        self.finished.borrow_mut().push(finished);
    }

    fn present(&mut self) {
        if self.visible {
            return;
        }
        self.visible = true;
        for (_, title) in self.jobs.values() {
            eprintln!("{title}");
        }
    }

    fn hide(&mut self) {
        self.visible = false;
    }
}

/// Asks on stderr and reads the answer from stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt {
    /// Accept every question without asking.
    pub assume_yes: bool,
}

impl ConfirmPrompt for TerminalPrompt {
    fn confirm(&self, _parent: &DisplayContext, confirmation: &Confirmation) -> bool {
        if self.assume_yes {
            return true;
        }

        eprintln!("{}", confirmation.message);
        eprintln!("{}", confirmation.detail);
        eprint!("{}? [y/N] ", confirmation.accept_label);
        let _ = io::stderr().flush();

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => is_yes(&answer),
            Err(e) => {
                tracing::warn!(target: "conveyor", "failed to read answer: {e}");
                false
            }
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Format size in human-readable form.
pub fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Truncate a string to max characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 1).collect();
        format!("{head}…")
    }
}
