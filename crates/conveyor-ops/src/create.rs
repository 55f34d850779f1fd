//! Empty file and directory creation jobs.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;

use conveyor_core::Locator;

use crate::job::{Job, JobError, JobKind, JobOptions};
use crate::progress::{ItemError, JobProgress, JobReport};

/// Validate a file name.
pub fn validate_filename(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Name cannot be empty".into());
    }

    if name.len() > 255 {
        return Err("Name is too long (max 255 characters)".into());
    }

    for c in ['/', '\0'] {
        if name.contains(c) {
            return Err(format!("Name cannot contain '{}'", c));
        }
    }

    #[cfg(target_os = "windows")]
    {
        for c in ['\\', ':', '*', '?', '"', '<', '>', '|'] {
            if name.contains(c) {
                return Err(format!("Name cannot contain '{}'", c));
            }
        }
    }

    if name == "." || name == ".." {
        return Err("Name cannot be '.' or '..'".into());
    }

    if name.starts_with(' ') || name.ends_with(' ') {
        return Err("Name cannot start or end with spaces".into());
    }

    Ok(())
}

/// Create an empty file at every source location. Targets are ignored.
pub fn creat_job(sources: Vec<Locator>, _targets: Vec<Locator>, _options: &JobOptions) -> Job {
    create_job(JobKind::Creat, sources)
}

/// Create a directory at every source location. Targets are ignored.
pub fn mkdir_job(sources: Vec<Locator>, _targets: Vec<Locator>, _options: &JobOptions) -> Job {
    create_job(JobKind::Mkdir, sources)
}

fn create_job(kind: JobKind, sources: Vec<Locator>) -> Job {
    let items = sources.clone();

    Job::new(kind, sources, Vec::new(), move |ctx| async move {
        let mut report = JobReport::new(kind);
        let mut progress = JobProgress::new(kind, items.len(), 0);

        for item in items {
            ctx.check_cancelled()?;
            progress.set_current(Some(item.clone()));
            ctx.report(progress.clone()).await;

            let Some(path) = item.as_path().map(Path::to_path_buf) else {
                report.record_failure(ItemError::new(
                    item.clone(),
                    format!("Unsupported location: {item}"),
                ));
                progress.fail_item();
                continue;
            };

            if let Some(name) = path.file_name().and_then(|n| n.to_str())
                && let Err(message) = validate_filename(name)
            {
                report.record_failure(ItemError::new(item, message));
                progress.fail_item();
                continue;
            }

            let result = tokio::task::spawn_blocking(move || create_item(kind, &path))
                .await
                .map_err(|e| JobError::Task {
                    message: e.to_string(),
                })?;

            match result {
                Ok(()) => {
                    report.record_success(Some(item), 0);
                    progress.complete_item(0);
                }
                Err(e) => {
                    let message = if e.kind() == io::ErrorKind::AlreadyExists {
                        "File already exists".to_string()
                    } else {
                        e.to_string()
                    };
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

fn create_item(kind: JobKind, path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    if kind == JobKind::Mkdir {
        fs::create_dir(path)
    } else {
        OpenOptions::new().write(true).create_new(true).open(path).map(|_| ())
    }
}
