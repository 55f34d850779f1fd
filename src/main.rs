//! conveyor - file operation orchestrator.
//!
//! Usage:
//!   conveyor copy SOURCE... DEST          Copy files into a directory
//!   conveyor copy-to SOURCE... -t TARGET  Copy each source onto its target
//!   conveyor move SOURCE... DEST          Move files into a directory
//!   conveyor link SOURCE... DEST          Symlink files into a directory
//!   conveyor delete [-p] FILE...          Trash files, or delete them for good
//!   conveyor trash FILE...                Move files into the trash
//!   conveyor restore [NAME...]            Restore trashed items
//!   conveyor empty-trash                  Empty the trash
//!   conveyor mkdir PATH... / touch PATH... Create directories / files
//!   conveyor open FILE...                 Open files one after another
//!   conveyor devices [--udev]             Run the volume handler on hot-plug

mod console;

use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use conveyor_core::{DeviceEvent, DisplayContext, Locator, OrchestratorConfig};
use conveyor_ops::{ConflictPolicy, FsJobs, JobOptions, trash_contents};
use conveyor_orchestrator::system::{
    CommandSpawner, LocalResolver, LogReporter, SystemOpener, UdevadmMonitor,
};
use conveyor_orchestrator::{Collaborators, Lifecycle, Orchestrator, ProgressSurface};

use crate::console::{ConsoleSurface, FinishedJob, FinishedLog, TerminalPrompt};

#[derive(Parser)]
#[command(
    name = "conveyor",
    version,
    about = "Copy, move, trash and open files through one job orchestrator",
    long_about = "conveyor runs file operations as cancellable jobs that share a single \
                  progress display, opens files one after another, and runs the volume \
                  handler for hot-plugged devices."
)]
struct Cli {
    /// Configuration file (defaults to ~/.config/conveyor/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    format: OutputFormat,

    /// What to do when a target already exists (skip, overwrite, auto-rename)
    #[arg(long, global = true, default_value = "skip")]
    on_conflict: ConflictPolicy,

    /// Keep running after the last window closed
    #[arg(long, global = true)]
    daemon: bool,

    /// Answer yes to every confirmation
    #[arg(short = 'y', long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Copy files into a directory
    Copy {
        #[arg(required = true)]
        sources: Vec<String>,
        destination: String,
    },

    /// Copy each source onto the target at the same position
    CopyTo {
        #[arg(required = true)]
        sources: Vec<String>,

        /// Targets, one per source
        #[arg(short, long = "to", num_args = 1.., required = true)]
        targets: Vec<String>,
    },

    /// Move files into a directory (a trash:/// destination trashes them)
    Move {
        #[arg(required = true)]
        sources: Vec<String>,
        destination: String,
    },

    /// Create symbolic links to files inside a directory
    Link {
        #[arg(required = true)]
        sources: Vec<String>,
        destination: String,
    },

    /// Delete files: into the trash, or permanently after confirmation
    Delete {
        #[arg(required = true)]
        files: Vec<String>,

        /// Delete permanently instead of trashing
        #[arg(short, long)]
        permanent: bool,
    },

    /// Move files into the trash
    Trash {
        #[arg(required = true)]
        files: Vec<String>,
    },

    /// Restore trashed items to where they came from
    Restore {
        /// Item names, or original paths
        names: Vec<String>,

        /// Restore everything in the trash
        #[arg(short, long, conflicts_with = "names")]
        all: bool,

        /// List the trash instead of restoring
        #[arg(short, long)]
        list: bool,
    },

    /// Permanently delete everything in the trash
    EmptyTrash,

    /// Create directories
    Mkdir {
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Create empty files
    Touch {
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Open files with their default application, one after another
    Open {
        #[arg(required = true)]
        files: Vec<String>,

        /// Startup notification id to forward to the launched application
        #[arg(long)]
        startup_id: Option<String>,
    },

    /// Run the volume handler for hot-plugged devices
    ///
    /// Reads `add <id>` / `remove <id>` lines from stdin unless --udev is given.
    Devices {
        /// Watch `udevadm monitor` instead of stdin
        #[arg(long)]
        udev: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => OrchestratorConfig::load(path)
            .wrap_err_with(|| format!("Failed to load {}", path.display()))?,
        None => OrchestratorConfig::load_or_default().context("Failed to load configuration")?,
    };
    if cli.daemon {
        config.daemon = true;
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;
    runtime.block_on(run(cli, config))
}

fn init_logging(verbose: bool) {
    let default = if verbose { "conveyor=debug" } else { "conveyor=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli, config: OrchestratorConfig) -> Result<()> {
    let cwd = std::env::current_dir().context("Cannot determine the working directory")?;
    let display = DisplayContext::from_env();
    let finished = FinishedLog::default();

    let collaborators = collaborators(
        JobOptions {
            conflict: cli.on_conflict,
        },
        TerminalPrompt {
            assume_yes: cli.yes,
        },
        Rc::clone(&finished),
    );
    let mut orchestrator = Orchestrator::new(config, collaborators);

    match cli.command {
        Command::Copy {
            sources,
            destination,
        } => {
            let destination = parse(&cwd, &destination)?;
            orchestrator.copy_into(&display, parse_all(&cwd, &sources)?, &destination, None)?;
        }
        Command::CopyTo { sources, targets } => {
            orchestrator.copy_to(
                &display,
                parse_all(&cwd, &sources)?,
                parse_all(&cwd, &targets)?,
                None,
            )?;
        }
        Command::Move {
            sources,
            destination,
        } => {
            let destination = parse(&cwd, &destination)?;
            orchestrator.move_into(&display, parse_all(&cwd, &sources)?, &destination, None)?;
        }
        Command::Link {
            sources,
            destination,
        } => {
            let destination = parse(&cwd, &destination)?;
            orchestrator.link_into(&display, parse_all(&cwd, &sources)?, &destination, None)?;
        }
        Command::Delete { files, permanent } => {
            if orchestrator
                .unlink_files(&display, parse_all(&cwd, &files)?, permanent)?
                .is_none()
            {
                tracing::info!(target: "conveyor", "nothing deleted");
            }
        }
        Command::Trash { files } => {
            orchestrator.trash(&display, parse_all(&cwd, &files)?)?;
        }
        Command::Restore { names, all, list } => {
            let trashed = trash_contents().context("Failed to list the trash")?;
            if list {
                return print_trash(&trashed, cli.format);
            }
            let items = if all {
                trashed
            } else {
                select_trashed(&trashed, &names, &cwd)?
            };
            orchestrator.restore_files(&display, items, None)?;
        }
        Command::EmptyTrash => {
            if orchestrator.empty_trash(&display)?.is_none() {
                tracing::info!(target: "conveyor", "trash left alone");
            }
        }
        Command::Mkdir { paths } => {
            orchestrator.mkdir(&display, parse_all(&cwd, &paths)?, None)?;
        }
        Command::Touch { paths } => {
            orchestrator.creat(&display, parse_all(&cwd, &paths)?, None)?;
        }
        Command::Open { files, startup_id } => {
            orchestrator.process_filenames(&cwd, &files, &display, startup_id.as_deref())?;
            orchestrator.run_until_idle().await;
            return Ok(());
        }
        Command::Devices { udev } => {
            orchestrator.devices_mut().set_display(display);
            return watch_devices(&mut orchestrator, udev).await;
        }
    }

    orchestrator.run_until_idle().await;
    match orchestrator.dismiss_progress() {
        Lifecycle::Terminate => tracing::debug!(target: "conveyor", "last window closed"),
        Lifecycle::Continue => tracing::debug!(target: "conveyor", "staying alive"),
    }

    let finished = finished.borrow();
    print_results(&finished, cli.format)
}

fn collaborators(
    options: JobOptions,
    prompt: TerminalPrompt,
    finished: FinishedLog,
) -> Collaborators {
    Collaborators {
        surface_factory: Box::new(move || {
            Box::new(ConsoleSurface::new(Rc::clone(&finished))) as Box<dyn ProgressSurface>
        }),
        jobs: Box::new(FsJobs::new(options)),
        spawner: Box::new(CommandSpawner),
        resolver: Box::new(LocalResolver),
        opener: Box::new(SystemOpener),
        prompt: Box::new(prompt),
        reporter: Box::new(LogReporter),
    }
}

fn parse(cwd: &Path, name: &str) -> Result<Locator> {
    Locator::parse(cwd, name).wrap_err_with(|| format!("Invalid file name \"{name}\""))
}

fn parse_all(cwd: &Path, names: &[String]) -> Result<Vec<Locator>> {
    names.iter().map(|name| parse(cwd, name)).collect()
}

/// Pick trashed items by name or by original path.
fn select_trashed(trashed: &[Locator], names: &[String], cwd: &Path) -> Result<Vec<Locator>> {
    if names.is_empty() {
        bail!("Nothing to restore: name the items or pass --all");
    }

    let mut selected = Vec::with_capacity(names.len());
    for name in names {
        let original = cwd.join(name);
        let found = trashed.iter().find(|item| {
            item.file_name().as_deref() == Some(name.as_str())
                || item.original_location() == Some(original.as_path())
        });
        match found {
            Some(item) => selected.push(item.clone()),
            None => bail!("\"{name}\" is not in the trash"),
        }
    }
    Ok(selected)
}

fn print_trash(trashed: &[Locator], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            if trashed.is_empty() {
                println!(" The trash is empty.");
            }
            for item in trashed {
                let original = item
                    .original_location()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(unknown)".to_string());
                println!(" {:<40} {}", item.display_name(), original);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(trashed)?);
        }
    }
    Ok(())
}

fn print_results(finished: &[FinishedJob], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for job in finished {
                println!(" {} {}", job.title, job.summary);
                for error in &job.errors {
                    println!("   {error}");
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(finished)?);
        }
    }

    let failed = finished.iter().filter(|job| !job.is_success()).count();
    if failed > 0 {
        bail!("{failed} operation(s) did not complete");
    }
    Ok(())
}

/// Feed device events to the orchestrator until the source ends or Ctrl-C.
async fn watch_devices(orchestrator: &mut Orchestrator, udev: bool) -> Result<()> {
    let shutdown = CancellationToken::new();
    let interrupt = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    if udev {
        let events = UdevadmMonitor
            .spawn()
            .context("Failed to start udevadm monitor")?;
        orchestrator.run(events, shutdown).await;
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                orchestrator.shutdown();
                return Ok(());
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read device events")? else {
                    break;
                };
                match DeviceEvent::parse_line(&line) {
                    Some(event) => orchestrator.handle_device_event(&event),
                    None if line.trim().is_empty() => {}
                    None => tracing::warn!(
                        target: "conveyor::devices",
                        %line,
                        "unrecognized device event"
                    ),
                }
            }
            () = orchestrator.step() => {}
        }
    }

    // Let queued devices finish before leaving.
    orchestrator.run_until_idle().await;
    Ok(())
}
