//! Collaborators backed by the operating system.

use std::io;
use std::process::Stdio;

use conveyor_core::{DeviceEvent, DisplayContext, Locator, ResolutionError, SpawnError};
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::collaborators::{
    ErrorReporter, ExitOutcome, FileOpener, FileResolver, ProcessSpawner, SpawnedProcess,
};

/// Spawns handler processes with tokio.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandSpawner;

impl ProcessSpawner for CommandSpawner {
    fn spawn(
        &self,
        argv: &[String],
        display: &DisplayContext,
    ) -> Result<SpawnedProcess, SpawnError> {
        let (program, args) = argv.split_first().ok_or(SpawnError::EmptyCommand)?;

        let child = Command::new(program)
            .args(args)
            .envs(display.env_vars())
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| SpawnError::Io {
                program: program.clone(),
                source,
            })?;

        Ok(watch(child))
    }
}

/// Wait for `child` in the returned exit future.
///
/// The child is owned by tokio, so it is reaped even when the future is
/// dropped before the process ends.
fn watch(mut child: Child) -> SpawnedProcess {
    let pid = child.id();
    let exit = async move {
        match child.wait().await {
            Ok(status) => ExitOutcome {
                code: status.code(),
            },
            Err(e) => {
                tracing::warn!(target: "conveyor", ?pid, "failed to wait for child: {e}");
                ExitOutcome { code: None }
            }
        }
    }
    .boxed();

    SpawnedProcess { pid, exit }
}

/// Resolves local paths; there is nothing to mount for them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalResolver;

impl FileResolver for LocalResolver {
    fn resolve_and_mount(
        &self,
        locator: &Locator,
        _display: &DisplayContext,
    ) -> BoxFuture<'static, Result<Locator, ResolutionError>> {
        let locator = locator.clone();
        async move {
            match locator {
                Locator::Local { path } => tokio::fs::canonicalize(&path)
                    .await
                    .map(Locator::local)
                    .map_err(|e| ResolutionError::io(path, e)),
                other => Err(ResolutionError::Unsupported {
                    location: other.to_string(),
                }),
            }
        }
        .boxed()
    }
}

/// Opens files with the desktop's default application.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemOpener;

impl FileOpener for SystemOpener {
    fn open(
        &self,
        locator: &Locator,
        display: &DisplayContext,
        startup_id: Option<&str>,
    ) -> io::Result<SpawnedProcess> {
        let target = match locator {
            Locator::Local { path } => path.as_os_str().to_owned(),
            other => other.to_string().into(),
        };

        let mut last_error = io::Error::new(io::ErrorKind::NotFound, "no opener available");
        for command in open::commands(&target) {
            let mut command = Command::from(command);
            command
                .envs(display.env_vars())
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null());
            if let Some(id) = startup_id {
                command.env("DESKTOP_STARTUP_ID", id);
            }
            match command.spawn() {
                Ok(child) => {
                    tracing::debug!(target: "conveyor::launch_queue", %locator, "opener started");
                    return Ok(watch(child));
                }
                Err(e) => last_error = e,
            }
        }
        Err(last_error)
    }
}

/// Reports errors through the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, title: &str, error: &dyn std::error::Error) {
        tracing::error!(target: "conveyor", "{title}: {error}");
    }
}

/// Parse a `udevadm monitor --udev` event line.
///
/// Lines look like `UDEV  [1234.5678] add      /devices/pci0000:00/... (block)`;
/// everything else (headers, blank lines) yields `None`.
pub fn parse_udevadm_line(line: &str) -> Option<DeviceEvent> {
    let rest = line.trim_start().strip_prefix("UDEV")?;
    let rest = rest.trim_start();
    let rest = rest.strip_prefix('[')?;
    let (_, rest) = rest.split_once(']')?;

    let mut parts = rest.split_whitespace();
    let action = parts.next()?;
    let devpath = parts.next()?;
    if !devpath.starts_with('/') {
        return None;
    }
    DeviceEvent::parse_line(&format!("{action} /sys{devpath}"))
}

/// Device events read from `udevadm monitor`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UdevadmMonitor;

impl UdevadmMonitor {
    /// Spawn the monitor and forward its events into a channel.
    pub fn spawn(&self) -> Result<mpsc::Receiver<DeviceEvent>, SpawnError> {
        let program = "udevadm";
        let mut child = Command::new(program)
            .args([
                "monitor",
                "--udev",
                "--subsystem-match=block",
                "--subsystem-match=input",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SpawnError::Io {
                program: program.to_string(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or_else(|| SpawnError::Io {
            program: program.to_string(),
            source: io::Error::other("stdout not captured"),
        })?;

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if let Some(event) = parse_udevadm_line(&line)
                            && tx.send(event).await.is_err()
                        {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(target: "conveyor::devices", "udevadm monitor: {e}");
                        break;
                    }
                }
            }
            let _ = child.kill().await;
        });

        Ok(rx)
    }
}
