//! Conflict handling for jobs that write to an existing target.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// The kind of conflict encountered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictKind {
    /// A file already exists at the target.
    FileExists,
    /// A directory already exists at the target.
    DirectoryExists,
    /// Cannot move/copy a directory into itself.
    SourceIsAncestor,
}

impl ConflictKind {
    /// Classify an existing target.
    pub fn of_existing(target: &Path) -> Self {
        if target.is_dir() {
            Self::DirectoryExists
        } else {
            Self::FileExists
        }
    }
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FileExists => write!(f, "File already exists"),
            Self::DirectoryExists => write!(f, "Directory already exists"),
            Self::SourceIsAncestor => write!(f, "Cannot copy/move a directory into itself"),
        }
    }
}

/// What to do when a target already exists.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Default,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Leave the existing item alone and count the source as failed.
    #[default]
    Skip,
    /// Replace the existing item.
    Overwrite,
    /// Write to "name (1).ext", "name (2).ext", ...
    AutoRename,
}

impl ConflictPolicy {
    /// Decide where to write when `target` exists.
    ///
    /// Returns `Ok(None)` when the item should be skipped.
    pub fn resolve(self, target: &Path) -> Result<Option<PathBuf>, String> {
        match self {
            Self::Skip => Ok(None),
            Self::AutoRename => Ok(Some(auto_rename_path(target))),
            Self::Overwrite => {
                let removed = if target.is_dir() && !target.is_symlink() {
                    fs::remove_dir_all(target)
                } else {
                    fs::remove_file(target)
                };
                removed.map_err(|e| format!("Failed to replace existing item: {}", e))?;
                Ok(Some(target.to_path_buf()))
            }
        }
    }
}

/// Generate an auto-renamed path to avoid conflicts.
///
/// For "file.txt", tries "file (1).txt", "file (2).txt", etc.
pub fn auto_rename_path(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or(Path::new(""));
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    let extension = path.extension().and_then(|e| e.to_str());

    let candidate = |suffix: String| match extension {
        Some(ext) => parent.join(format!("{stem} {suffix}.{ext}")),
        None => parent.join(format!("{stem} {suffix}")),
    };

    for i in 1..1000 {
        let new_path = candidate(format!("({i})"));
        if !new_path.exists() {
            return new_path;
        }
    }

    // Fallback: use timestamp
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    candidate(format!("({timestamp})"))
}
