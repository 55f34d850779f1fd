//! Pairwise copy, move and link jobs.

use std::fs;
use std::io;
use std::path::Path;

use conveyor_core::Locator;

use crate::conflict::ConflictKind;
use crate::job::{Job, JobContext, JobError, JobKind, JobOptions};
use crate::progress::{ItemError, JobProgress, JobReport};

/// Copy every source onto the target at the same position.
pub fn copy_job(sources: Vec<Locator>, targets: Vec<Locator>, options: &JobOptions) -> Job {
    transfer_job(JobKind::Copy, sources, targets, *options)
}

/// Move every source onto the target at the same position.
pub fn move_job(sources: Vec<Locator>, targets: Vec<Locator>, options: &JobOptions) -> Job {
    transfer_job(JobKind::Move, sources, targets, *options)
}

/// Create a symbolic link at every target pointing to its source.
pub fn link_job(sources: Vec<Locator>, targets: Vec<Locator>, options: &JobOptions) -> Job {
    transfer_job(JobKind::Link, sources, targets, *options)
}

fn transfer_job(
    kind: JobKind,
    sources: Vec<Locator>,
    targets: Vec<Locator>,
    options: JobOptions,
) -> Job {
    let pairs: Vec<(Locator, Locator)> = sources
        .iter()
        .cloned()
        .zip(targets.iter().cloned())
        .collect();

    Job::new(kind, sources, targets, move |ctx| async move {
        run_transfer(kind, pairs, options, ctx).await
    })
}

async fn run_transfer(
    kind: JobKind,
    pairs: Vec<(Locator, Locator)>,
    options: JobOptions,
    ctx: JobContext,
) -> Result<JobReport, JobError> {
    let mut report = JobReport::new(kind);
    let mut progress = JobProgress::new(kind, pairs.len(), 0);

    for (source, target) in pairs {
        ctx.check_cancelled()?;

        let (Some(source_path), Some(target_path)) = (source.as_path(), target.as_path()) else {
            let location = if source.is_local() { &target } else { &source };
            report.record_failure(ItemError::new(
                source.clone(),
                format!("Unsupported location: {location}"),
            ));
            progress.fail_item();
            continue;
        };

        if kind != JobKind::Link && target_path.starts_with(source_path) {
            report.record_failure(ItemError::new(
                source.clone(),
                ConflictKind::SourceIsAncestor.to_string(),
            ));
            progress.fail_item();
            continue;
        }

        progress.set_current(Some(source.clone()));
        ctx.report(progress.clone()).await;

        let dest = if fs::symlink_metadata(target_path).is_ok() {
            match options.conflict.resolve(target_path) {
                Ok(Some(dest)) => dest,
                Ok(None) => {
                    let conflict = ConflictKind::of_existing(target_path);
                    report.record_failure(ItemError::new(source.clone(), conflict.to_string()));
                    progress.fail_item();
                    continue;
                }
                Err(message) => {
                    report.record_failure(ItemError::new(source.clone(), message));
                    progress.fail_item();
                    continue;
                }
            }
        } else {
            target_path.to_path_buf()
        };

        let from = source_path.to_path_buf();
        let to = dest.clone();
        let result = tokio::task::spawn_blocking(move || match kind {
            JobKind::Move => move_item(&from, &to),
            JobKind::Link => link_item(&from, &to),
            _ => copy_item(&from, &to),
        })
        .await
        .map_err(|e| JobError::Task {
            message: e.to_string(),
        })?;

        match result {
            Ok(bytes) => {
                report.record_success(Some(Locator::local(dest)), bytes);
                progress.complete_item(bytes);
            }
            Err(e) => {
                report.record_failure(ItemError::new(source, e.to_string()));
                progress.fail_item();
            }
        }
        progress.set_current(None);
        ctx.report(progress.clone()).await;
    }

    Ok(report)
}

fn ensure_parent(dest: &Path) -> io::Result<()> {
    match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Copy a file, directory or symlink; returns the bytes copied.
pub(crate) fn copy_item(source: &Path, dest: &Path) -> io::Result<u64> {
    ensure_parent(dest)?;
    copy_recursive(source, dest)
}

fn copy_recursive(source: &Path, dest: &Path) -> io::Result<u64> {
    let metadata = fs::symlink_metadata(source)?;

    if metadata.file_type().is_symlink() {
        let link_target = fs::read_link(source)?;
        make_symlink(&link_target, dest)?;
        return Ok(0);
    }

    if !metadata.is_dir() {
        return fs::copy(source, dest);
    }

    fs::create_dir_all(dest)?;
    let mut total_bytes = 0u64;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        total_bytes += copy_recursive(&entry.path(), &dest.join(entry.file_name()))?;
    }
    Ok(total_bytes)
}

fn move_item(source: &Path, dest: &Path) -> io::Result<u64> {
    let size = size_of(source);
    ensure_parent(dest)?;

    // Fast path on the same filesystem
    if fs::rename(source, dest).is_ok() {
        return Ok(size);
    }

    let copied = copy_recursive(source, dest)?;
    if fs::symlink_metadata(source)?.is_dir() {
        fs::remove_dir_all(source)?;
    } else {
        fs::remove_file(source)?;
    }
    Ok(copied)
}

fn link_item(source: &Path, dest: &Path) -> io::Result<u64> {
    ensure_parent(dest)?;
    make_symlink(source, dest)?;
    Ok(0)
}

#[cfg(unix)]
fn make_symlink(original: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}

#[cfg(windows)]
fn make_symlink(original: &Path, link: &Path) -> io::Result<()> {
    if original.is_dir() {
        std::os::windows::fs::symlink_dir(original, link)
    } else {
        std::os::windows::fs::symlink_file(original, link)
    }
}

/// Total size of a file or directory tree, best effort.
pub(crate) fn size_of(path: &Path) -> u64 {
    let Ok(metadata) = fs::symlink_metadata(path) else {
        return 0;
    };
    if !metadata.is_dir() {
        return metadata.len();
    }
    fs::read_dir(path)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|entry| size_of(&entry.path()))
                .sum()
        })
        .unwrap_or(0)
}
