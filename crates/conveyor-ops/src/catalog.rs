//! The operation catalog: which job a user request turns into.
//!
//! The catalog is a pure decision table. It never touches the filesystem
//! and holds no state; the launcher asks it what to do and acts on the
//! returned [`Decision`].

use conveyor_core::Locator;
use serde::{Deserialize, Serialize};

use crate::job::JobKind;

/// A user-level request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    /// Copy each source onto an explicit target.
    CopyTo,
    /// Copy sources into a directory.
    CopyInto,
    /// Symlink sources into a directory.
    LinkInto,
    /// Move sources into a directory (or the trash).
    MoveInto,
    /// Delete sources, permanently or into the trash.
    Unlink,
    /// Move sources into the trash.
    Trash,
    /// Create empty files.
    Creat,
    /// Create directories.
    Mkdir,
    /// Restore trashed items to where they came from.
    Restore,
    /// Purge everything in the trash.
    EmptyTrash,
}

/// Facts about a request that influence the decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolicyContext {
    /// The user held the "delete permanently" modifier.
    pub permanent_modifier: bool,
    /// The destination directory is the trash.
    pub destination_is_trash: bool,
    /// At least one source is not on a local filesystem.
    pub any_source_non_local: bool,
}

impl PolicyContext {
    /// Derive the context for a batch of sources.
    pub fn for_sources(sources: &[Locator]) -> Self {
        Self {
            any_source_non_local: sources.iter().any(|s| !s.is_local()),
            ..Self::default()
        }
    }

    /// Record the destination of an "into" request.
    pub fn with_destination(mut self, destination: &Locator) -> Self {
        self.destination_is_trash = destination.is_trashed();
        self
    }

    /// Record whether the permanent-delete modifier was held.
    pub fn with_permanent(mut self, permanent: bool) -> Self {
        self.permanent_modifier = permanent;
        self
    }
}

/// How the target list of a job is derived from the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetMode {
    /// Caller-supplied targets, one per source.
    Pairwise,
    /// `destination/basename(source)` for each source.
    IntoDirectory,
    /// The recorded original location of each trashed source.
    OriginalLocation,
    /// The job has no targets.
    None,
}

/// Which confirmation the user must give before the job is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmKind {
    PermanentDelete,
    EmptyTrash,
}

/// A confirmation question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub kind: ConfirmKind,
    pub message: String,
    pub detail: String,
    pub accept_label: &'static str,
}

impl Confirmation {
    /// Build the question for a batch of sources.
    pub fn new(kind: ConfirmKind, sources: &[Locator]) -> Self {
        match kind {
            ConfirmKind::PermanentDelete => {
                let message = match sources {
                    [single] => format!(
                        "Are you sure that you want to\npermanently delete \"{}\"?",
                        single.display_name()
                    ),
                    many => format!(
                        "Are you sure that you want to permanently\ndelete the {} selected files?",
                        many.len()
                    ),
                };
                Self {
                    kind,
                    message,
                    detail: "If you delete a file, it is permanently lost.".to_string(),
                    accept_label: "Delete",
                }
            }
            ConfirmKind::EmptyTrash => Self {
                kind,
                message: "Remove all files and folders from the Trash?".to_string(),
                detail: "If you choose to empty the Trash, all items in it will be permanently \
                         lost. Please note that you can also delete them separately."
                    .to_string(),
                accept_label: "Empty Trash",
            },
        }
    }
}

/// What the launcher should do for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub action: Action,
    /// The job kind to construct.
    pub kind: JobKind,
    pub targets: TargetMode,
    pub confirm: Option<ConfirmKind>,
    /// Icon name shown next to the job in the progress surface.
    pub icon: &'static str,
}

impl Decision {
    /// Title shown in the progress surface.
    pub fn title(&self, destination: Option<&Locator>) -> String {
        let dest = destination.map(Locator::display_name).unwrap_or_default();
        match (self.action, self.kind) {
            (_, JobKind::Trash) => "Moving files into the trash...".to_string(),
            (Action::CopyInto, _) => format!("Copying files to \"{dest}\"..."),
            (Action::LinkInto, _) => format!("Creating symbolic links in \"{dest}\"..."),
            (Action::MoveInto, _) => format!("Moving files into \"{dest}\"..."),
            (Action::EmptyTrash, _) => "Emptying the Trash...".to_string(),
            (_, JobKind::Copy) => "Copying files...".to_string(),
            (_, JobKind::Move) => "Moving files...".to_string(),
            (_, JobKind::Link) => "Creating symbolic links...".to_string(),
            (_, JobKind::Unlink) => "Deleting files...".to_string(),
            (_, JobKind::Creat) => "Creating files...".to_string(),
            (_, JobKind::Mkdir) => "Creating directories...".to_string(),
            (_, JobKind::Restore) => "Restoring files...".to_string(),
        }
    }
}

/// Maps requests to decisions.
#[derive(Debug, Clone, Copy, Default)]
pub struct OperationCatalog;

impl OperationCatalog {
    /// Decide which job a request becomes.
    pub fn decide(action: Action, ctx: &PolicyContext) -> Decision {
        let decision = |kind, targets, confirm, icon| Decision {
            action,
            kind,
            targets,
            confirm,
            icon,
        };
        let trash = || decision(JobKind::Trash, TargetMode::None, None, "user-trash-full");

        match action {
            Action::CopyTo => {
                decision(JobKind::Copy, TargetMode::Pairwise, None, "stock_folder-copy")
            }
            Action::CopyInto => {
                decision(JobKind::Copy, TargetMode::IntoDirectory, None, "stock_folder-copy")
            }
            Action::LinkInto => {
                decision(JobKind::Link, TargetMode::IntoDirectory, None, "insert-link")
            }
            Action::MoveInto if ctx.destination_is_trash => trash(),
            Action::MoveInto => {
                decision(JobKind::Move, TargetMode::IntoDirectory, None, "stock_folder-move")
            }
            Action::Unlink if ctx.permanent_modifier || ctx.any_source_non_local => decision(
                JobKind::Unlink,
                TargetMode::None,
                Some(ConfirmKind::PermanentDelete),
                "edit-delete",
            ),
            Action::Unlink | Action::Trash => trash(),
            Action::Creat => decision(JobKind::Creat, TargetMode::None, None, "document-new"),
            Action::Mkdir => decision(JobKind::Mkdir, TargetMode::None, None, "folder-new"),
            Action::Restore => decision(
                JobKind::Restore,
                TargetMode::OriginalLocation,
                None,
                "stock_folder-move",
            ),
            Action::EmptyTrash => decision(
                JobKind::Unlink,
                TargetMode::None,
                Some(ConfirmKind::EmptyTrash),
                "user-trash",
            ),
        }
    }
}
