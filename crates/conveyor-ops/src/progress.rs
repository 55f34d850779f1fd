//! Progress reporting types for jobs.

use conveyor_core::Locator;
use serde::{Deserialize, Serialize};

use crate::job::JobKind;

/// A failure on a single item of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemError {
    /// The item that failed.
    pub location: Locator,
    /// A human-readable error message.
    pub message: String,
}

impl ItemError {
    pub fn new(location: Locator, message: impl Into<String>) -> Self {
        Self {
            location,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ItemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// Progress information for a running job.
#[derive(Debug, Clone)]
pub struct JobProgress {
    pub kind: JobKind,
    /// Number of items finished (successfully or not).
    pub items_completed: usize,
    /// Total number of items to process.
    pub items_total: usize,
    /// Number of bytes processed so far.
    pub bytes_processed: u64,
    /// Total bytes to process (may be 0 if unknown).
    pub bytes_total: u64,
    /// Number of items that failed so far.
    pub failed: usize,
    /// The item currently being processed.
    pub current: Option<Locator>,
}

impl JobProgress {
    pub fn new(kind: JobKind, items_total: usize, bytes_total: u64) -> Self {
        Self {
            kind,
            items_completed: 0,
            items_total,
            bytes_processed: 0,
            bytes_total,
            failed: 0,
            current: None,
        }
    }

    /// Get the progress as a percentage (0.0 to 100.0).
    pub fn percentage(&self) -> f64 {
        if self.bytes_total > 0 {
            (self.bytes_processed as f64 / self.bytes_total as f64 * 100.0).min(100.0)
        } else if self.items_total > 0 {
            self.items_completed as f64 / self.items_total as f64 * 100.0
        } else {
            0.0
        }
    }

    pub fn set_current(&mut self, location: Option<Locator>) {
        self.current = location;
    }

    pub fn complete_item(&mut self, bytes: u64) {
        self.items_completed += 1;
        self.bytes_processed += bytes;
    }

    pub fn fail_item(&mut self) {
        self.items_completed += 1;
        self.failed += 1;
    }
}

/// Summary of a job that ran to the end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub kind: JobKind,
    /// Number of items successfully processed.
    pub succeeded: usize,
    /// Number of items that failed or were skipped.
    pub failed: usize,
    /// Total bytes processed.
    pub bytes_processed: u64,
    /// Per-item errors.
    pub errors: Vec<ItemError>,
    /// Files created by the job.
    pub new_files: Vec<Locator>,
}

impl JobReport {
    pub fn new(kind: JobKind) -> Self {
        Self {
            kind,
            succeeded: 0,
            failed: 0,
            bytes_processed: 0,
            errors: Vec::new(),
            new_files: Vec::new(),
        }
    }

    /// Record a successful item, optionally creating a new file.
    pub fn record_success(&mut self, created: Option<Locator>, bytes: u64) {
        self.succeeded += 1;
        self.bytes_processed += bytes;
        if let Some(created) = created {
            self.new_files.push(created);
        }
    }

    pub fn record_failure(&mut self, error: ItemError) {
        tracing::debug!(target: "conveyor::jobs", kind = %self.kind, "{error}");
        self.failed += 1;
        self.errors.push(error);
    }

    /// Check if every item succeeded.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Get a human-readable summary of the job.
    pub fn summary(&self) -> String {
        let action = match self.kind {
            JobKind::Copy => "Copied",
            JobKind::Move => "Moved",
            JobKind::Link => "Linked",
            JobKind::Trash => "Trashed",
            JobKind::Unlink => "Deleted",
            JobKind::Creat | JobKind::Mkdir => "Created",
            JobKind::Restore => "Restored",
        };

        if self.failed == 0 {
            format!("{} {} items", action, self.succeeded)
        } else {
            format!("{} {} items, {} failed", action, self.succeeded, self.failed)
        }
    }
}
