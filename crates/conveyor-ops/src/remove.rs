//! Unlink, trash and restore jobs.

use std::fs;
use std::io;
use std::path::Path;

use conveyor_core::Locator;

use crate::job::{Job, JobError, JobKind, JobOptions};
use crate::progress::{ItemError, JobProgress, JobReport};
use crate::transfer::size_of;

/// Permanently delete every source.
///
/// Local items are removed recursively, trashed items are purged from the
/// trash and the trash root purges every entry while the root itself stays.
pub fn unlink_job(sources: Vec<Locator>, _targets: Vec<Locator>, _options: &JobOptions) -> Job {
    let items = sources.clone();

    Job::new(JobKind::Unlink, sources, Vec::new(), move |ctx| async move {
        let mut report = JobReport::new(JobKind::Unlink);
        let mut progress = JobProgress::new(JobKind::Unlink, items.len(), 0);

        for item in items {
            ctx.check_cancelled()?;
            progress.set_current(Some(item.clone()));
            ctx.report(progress.clone()).await;

            let target = item.clone();
            let result = tokio::task::spawn_blocking(move || unlink_item(&target))
                .await
                .map_err(|e| JobError::Task {
                    message: e.to_string(),
                })?;

            match result {
                Ok(bytes) => {
                    report.record_success(None, bytes);
                    progress.complete_item(bytes);
                }
                Err(message) => {
                    report.record_failure(ItemError::new(item, message));
                    progress.fail_item();
                }
            }
        }

        progress.set_current(None);
        ctx.report(progress).await;
        Ok(report)
    })
}

fn unlink_item(item: &Locator) -> Result<u64, String> {
    match item {
        Locator::Local { path } => {
            let bytes = size_of(path);
            remove_path(path).map_err(|e| format!("Failed to delete: {}", e))?;
            Ok(bytes)
        }
        Locator::Trashed { name, original } => {
            platform::purge(name, original.as_deref())?;
            Ok(0)
        }
        Locator::TrashRoot => {
            let purged = platform::purge_all()?;
            tracing::debug!(target: "conveyor::jobs", purged, "emptied trash");
            Ok(0)
        }
        Locator::Remote { uri } => Err(format!("Unsupported location: {uri}")),
    }
}

fn remove_path(path: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Move every local source into the system trash.
pub fn trash_job(sources: Vec<Locator>, _targets: Vec<Locator>, _options: &JobOptions) -> Job {
    let items = sources.clone();

    Job::new(JobKind::Trash, sources, Vec::new(), move |ctx| async move {
        let mut report = JobReport::new(JobKind::Trash);
        let mut progress = JobProgress::new(JobKind::Trash, items.len(), 0);

        for item in items {
            ctx.check_cancelled()?;
            progress.set_current(Some(item.clone()));
            ctx.report(progress.clone()).await;

            let Some(path) = item.as_path().map(Path::to_path_buf) else {
                let message = if item.is_trashed() {
                    "Item is already in the trash".to_string()
                } else {
                    format!("Unsupported location: {item}")
                };
                report.record_failure(ItemError::new(item, message));
                progress.fail_item();
                continue;
            };

            let result = tokio::task::spawn_blocking(move || {
                let bytes = size_of(&path);
                trash::delete(&path).map(|()| bytes)
            })
            .await
            .map_err(|e| JobError::Task {
                message: e.to_string(),
            })?;

            match result {
                Ok(bytes) => {
                    report.record_success(None, bytes);
                    progress.complete_item(bytes);
                }
                Err(e) => {
                    report.record_failure(ItemError::new(item, e.to_string()));
                    progress.fail_item();
                }
            }
        }

        progress.set_current(None);
        ctx.report(progress).await;
        Ok(report)
    })
}

/// Restore every trashed source to the target at the same position.
pub fn restore_job(sources: Vec<Locator>, targets: Vec<Locator>, _options: &JobOptions) -> Job {
    let pairs: Vec<(Locator, Locator)> = sources
        .iter()
        .cloned()
        .zip(targets.iter().cloned())
        .collect();

    Job::new(JobKind::Restore, sources, targets, move |ctx| async move {
        let mut report = JobReport::new(JobKind::Restore);
        let mut progress = JobProgress::new(JobKind::Restore, pairs.len(), 0);

        for (source, target) in pairs {
            ctx.check_cancelled()?;
            progress.set_current(Some(source.clone()));
            ctx.report(progress.clone()).await;

            let (Locator::Trashed { name, original }, Some(dest)) = (&source, target.as_path())
            else {
                report.record_failure(ItemError::new(
                    source.clone(),
                    format!("Cannot restore {source} to {target}"),
                ));
                progress.fail_item();
                continue;
            };

            let name = name.clone();
            let original = original.clone();
            let dest = dest.to_path_buf();
            let result = tokio::task::spawn_blocking(move || {
                platform::restore(&name, original.as_deref(), &dest).map(|()| dest)
            })
            .await
            .map_err(|e| JobError::Task {
                message: e.to_string(),
            })?;

            match result {
                Ok(dest) => {
                    report.record_success(Some(Locator::local(dest)), 0);
                    progress.complete_item(0);
                }
                Err(message) => {
                    report.record_failure(ItemError::new(source, message));
                    progress.fail_item();
                }
            }
        }

        progress.set_current(None);
        ctx.report(progress).await;
        Ok(report)
    })
}

/// List the items currently in the system trash.
pub fn trash_contents() -> Result<Vec<Locator>, JobError> {
    platform::list()
}

#[cfg(any(
    target_os = "windows",
    all(
        unix,
        not(target_os = "macos"),
        not(target_os = "ios"),
        not(target_os = "android")
    )
))]
mod platform {
    use std::fs;
    use std::path::{Path, PathBuf};

    use conveyor_core::Locator;
    use trash::TrashItem;
    use trash::os_limited;

    use crate::job::JobError;

    fn item_name(item: &TrashItem) -> String {
        Path::new(&item.name).to_string_lossy().into_owned()
    }

    fn find(name: &str, original: Option<&Path>) -> Result<TrashItem, String> {
        let items = os_limited::list().map_err(|e| e.to_string())?;
        items
            .into_iter()
            .find(|item| {
                item_name(item) == name && original.is_none_or(|o| item.original_path() == o)
            })
            .ok_or_else(|| format!("\"{name}\" is no longer in the trash"))
    }

    pub(super) fn list() -> Result<Vec<Locator>, JobError> {
        let items = os_limited::list().map_err(|e| JobError::Trash {
            message: e.to_string(),
        })?;
        Ok(items
            .iter()
            .map(|item| Locator::trashed(item_name(item), Some(item.original_path())))
            .collect())
    }

    pub(super) fn purge(name: &str, original: Option<&Path>) -> Result<(), String> {
        let item = find(name, original)?;
        os_limited::purge_all([item]).map_err(|e| e.to_string())
    }

    pub(super) fn purge_all() -> Result<usize, String> {
        let items = os_limited::list().map_err(|e| e.to_string())?;
        let count = items.len();
        if count > 0 {
            os_limited::purge_all(items).map_err(|e| e.to_string())?;
        }
        Ok(count)
    }

    pub(super) fn restore(name: &str, original: Option<&Path>, dest: &Path) -> Result<(), String> {
        let item = find(name, original)?;
        let restored_at: PathBuf = item.original_path();
        os_limited::restore_all([item]).map_err(|e| e.to_string())?;
        if restored_at != dest {
            fs::rename(&restored_at, dest)
                .map_err(|e| {
                    format!("Restored to {} but could not move it: {e}", restored_at.display())
                })?;
        }
        Ok(())
    }
}

#[cfg(not(any(
    target_os = "windows",
    all(
        unix,
        not(target_os = "macos"),
        not(target_os = "ios"),
        not(target_os = "android")
    )
)))]
mod platform {
    use std::path::Path;

    use conveyor_core::Locator;

    use crate::job::JobError;

    const UNSUPPORTED: &str = "Trash listing is not supported on this platform";

    pub(super) fn list() -> Result<Vec<Locator>, JobError> {
        Err(JobError::Trash {
            message: UNSUPPORTED.to_string(),
        })
    }

    pub(super) fn purge(_name: &str, _original: Option<&Path>) -> Result<(), String> {
        Err(UNSUPPORTED.to_string())
    }

    pub(super) fn purge_all() -> Result<usize, String> {
        Err(UNSUPPORTED.to_string())
    }

    pub(super) fn restore(
        _name: &str,
        _original: Option<&Path>,
        _dest: &Path,
    ) -> Result<(), String> {
        Err(UNSUPPORTED.to_string())
    }
}
