//! Integration tests for the orchestrator, driven through fake collaborators.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::Path;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use conveyor_core::{
    DeviceEvent, DeviceId, DisplayContext, Locator, OrchestratorConfig, ResolutionError,
    SpawnError, ValidationError,
};
use conveyor_ops::{
    ConfirmKind, Confirmation, Job, JobError, JobFactory, JobId, JobKind, JobOutcome, JobProgress,
    JobReport, JobState,
};
use conveyor_orchestrator::{
    Collaborators, ConfirmPrompt, DispatchState, ErrorReporter, ExitOutcome, FileOpener,
    FileResolver, JobSummary, Lifecycle, Orchestrator, OrchestratorEvent, ProcessSpawner,
    ProgressSurface, ScheduledTask, SpawnedProcess,
};
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

type Shared<T> = Arc<Mutex<T>>;

#[derive(Default, Clone)]
struct SurfaceLog {
    created: Shared<usize>,
    calls: Shared<Vec<String>>,
}

impl SurfaceLog {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn presents(&self) -> usize {
        self.calls().iter().filter(|c| *c == "present").count()
    }
}

struct FakeSurface {
    log: SurfaceLog,
}

impl ProgressSurface for FakeSurface {
    fn add_job(&mut self, job: &JobSummary, _icon: &str, title: &str) {
        self.log.calls.lock().unwrap().push(format!("add {} {title}", job.kind));
    }

    fn update_job(&mut self, _id: JobId, _progress: &JobProgress) {}

    fn finish_job(&mut self, _id: JobId, outcome: &JobOutcome) {
        self.log
            .calls
            .lock()
            .unwrap()
            .push(format!("finish {:?}", outcome.state()));
    }

    fn present(&mut self) {
        self.log.calls.lock().unwrap().push("present".to_string());
    }

    fn hide(&mut self) {
        self.log.calls.lock().unwrap().push("hide".to_string());
    }
}

type CreatedJob = (JobKind, Vec<Locator>, Vec<Locator>);

/// Jobs that sleep for a fixed time and then succeed (or fail).
#[derive(Clone)]
struct FakeJobs {
    created: Shared<Vec<CreatedJob>>,
    duration: Duration,
    fail: bool,
}

impl FakeJobs {
    fn new(duration: Duration) -> Self {
        Self {
            created: Arc::default(),
            duration,
            fail: false,
        }
    }

    fn created(&self) -> Vec<CreatedJob> {
        self.created.lock().unwrap().clone()
    }
}

impl JobFactory for FakeJobs {
    fn create(&self, kind: JobKind, sources: Vec<Locator>, targets: Vec<Locator>) -> Job {
        self.created
            .lock()
            .unwrap()
            .push((kind, sources.clone(), targets.clone()));
        let duration = self.duration;
        let fail = self.fail;
        let new_files = sources.clone();
        Job::new(kind, sources, targets, move |ctx| async move {
            ctx.report(JobProgress::new(kind, new_files.len(), 0)).await;
            tokio::time::sleep(duration).await;
            if fail {
                return Err(JobError::Trash {
                    message: "trash unavailable".to_string(),
                });
            }
            let mut report = JobReport::new(kind);
            for file in new_files {
                report.record_success(Some(file), 0);
            }
            Ok(report)
        })
    }
}

/// Spawner whose processes exit when the test says so.
#[derive(Default, Clone)]
struct FakeSpawner {
    spawned: Shared<Vec<Vec<String>>>,
    exits: Shared<Vec<oneshot::Sender<ExitOutcome>>>,
    missing: Shared<HashSet<String>>,
}

impl FakeSpawner {
    fn spawned_ids(&self) -> Vec<String> {
        self.spawned
            .lock()
            .unwrap()
            .iter()
            .filter_map(|argv| argv.last().cloned())
            .collect()
    }

    fn exit_oldest(&self, code: i32) {
        let sender = self.exits.lock().unwrap().remove(0);
        sender.send(ExitOutcome { code: Some(code) }).unwrap();
    }
}

impl ProcessSpawner for FakeSpawner {
    fn spawn(
        &self,
        argv: &[String],
        _display: &DisplayContext,
    ) -> Result<SpawnedProcess, SpawnError> {
        self.spawned.lock().unwrap().push(argv.to_vec());
        let id = argv.last().cloned().unwrap_or_default();
        if self.missing.lock().unwrap().contains(&id) {
            return Err(SpawnError::Io {
                program: argv[0].clone(),
                source: io::Error::new(io::ErrorKind::NotFound, "not installed"),
            });
        }

        let (tx, rx) = oneshot::channel();
        self.exits.lock().unwrap().push(tx);
        Ok(SpawnedProcess {
            pid: Some(4242),
            exit: async move { rx.await.unwrap_or(ExitOutcome { code: None }) }.boxed(),
        })
    }
}

/// Resolver answering from a table keyed by file name.
#[derive(Default, Clone)]
struct FakeResolver {
    calls: Shared<Vec<String>>,
    failures: Shared<HashMap<String, bool>>,
}

impl FakeResolver {
    fn fail(&self, name: &str, cancelled: bool) {
        self.failures.lock().unwrap().insert(name.to_string(), cancelled);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl FileResolver for FakeResolver {
    fn resolve_and_mount(
        &self,
        locator: &Locator,
        _display: &DisplayContext,
    ) -> BoxFuture<'static, Result<Locator, ResolutionError>> {
        let name = locator.display_name();
        self.calls.lock().unwrap().push(name.clone());
        let result = match self.failures.lock().unwrap().get(&name) {
            Some(true) => Err(ResolutionError::Cancelled),
            Some(false) => Err(ResolutionError::NotFound {
                path: locator.to_string().into(),
            }),
            None => Ok(locator.clone()),
        };
        async move { result }.boxed()
    }
}

#[derive(Default, Clone)]
struct FakeOpener {
    opened: Shared<Vec<String>>,
    broken: Shared<HashSet<String>>,
    exit_codes: Shared<HashMap<String, i32>>,
}

impl FakeOpener {
    fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl FileOpener for FakeOpener {
    fn open(
        &self,
        locator: &Locator,
        _display: &DisplayContext,
        _startup_id: Option<&str>,
    ) -> io::Result<SpawnedProcess> {
        let name = locator.display_name();
        if self.broken.lock().unwrap().contains(&name) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "no handler"));
        }
        let code = self.exit_codes.lock().unwrap().get(&name).copied().unwrap_or(0);
        self.opened.lock().unwrap().push(name);
        Ok(SpawnedProcess {
            pid: None,
            exit: async move { ExitOutcome { code: Some(code) } }.boxed(),
        })
    }
}

#[derive(Clone)]
struct FakePrompt {
    answer: Shared<bool>,
    asked: Shared<Vec<Confirmation>>,
}

impl FakePrompt {
    fn asked(&self) -> Vec<ConfirmKind> {
        self.asked.lock().unwrap().iter().map(|c| c.kind).collect()
    }
}

impl ConfirmPrompt for FakePrompt {
    fn confirm(&self, _parent: &DisplayContext, confirmation: &Confirmation) -> bool {
        self.asked.lock().unwrap().push(confirmation.clone());
        *self.answer.lock().unwrap()
    }
}

#[derive(Default, Clone)]
struct FakeReporter {
    titles: Shared<Vec<String>>,
}

impl FakeReporter {
    fn titles(&self) -> Vec<String> {
        self.titles.lock().unwrap().clone()
    }
}

impl ErrorReporter for FakeReporter {
    fn report(&self, title: &str, _error: &dyn std::error::Error) {
        self.titles.lock().unwrap().push(title.to_string());
    }
}

struct Harness {
    orchestrator: Orchestrator,
    surface: SurfaceLog,
    jobs: FakeJobs,
    spawner: FakeSpawner,
    resolver: FakeResolver,
    opener: FakeOpener,
    prompt: FakePrompt,
    reporter: FakeReporter,
}

fn harness_with(config: OrchestratorConfig, jobs: FakeJobs) -> Harness {
    let surface = SurfaceLog::default();
    let spawner = FakeSpawner::default();
    let resolver = FakeResolver::default();
    let opener = FakeOpener::default();
    let prompt = FakePrompt {
        answer: Arc::new(Mutex::new(true)),
        asked: Arc::default(),
    };
    let reporter = FakeReporter::default();

    let factory_log = surface.clone();
    let collaborators = Collaborators {
        surface_factory: Box::new(move || {
            *factory_log.created.lock().unwrap() += 1;
            Box::new(FakeSurface {
                log: factory_log.clone(),
            }) as Box<dyn ProgressSurface>
        }),
        jobs: Box::new(jobs.clone()),
        spawner: Box::new(spawner.clone()),
        resolver: Box::new(resolver.clone()),
        opener: Box::new(opener.clone()),
        prompt: Box::new(prompt.clone()),
        reporter: Box::new(reporter.clone()),
    };

    Harness {
        orchestrator: Orchestrator::new(config, collaborators),
        surface,
        jobs,
        spawner,
        resolver,
        opener,
        prompt,
        reporter,
    }
}

fn harness() -> Harness {
    harness_with(
        OrchestratorConfig::default(),
        FakeJobs::new(Duration::from_millis(100)),
    )
}

fn display() -> DisplayContext {
    DisplayContext::new(":0")
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test(start_paused = true)]
async fn test_short_job_never_presents_surface() {
    let mut h = harness();
    h.orchestrator
        .mkdir(&display(), vec![Locator::local("/tmp/new")], None)
        .unwrap();
    assert!(h.orchestrator.progress().has_pending_show());

    h.orchestrator.run_until_idle().await;

    assert_eq!(h.surface.presents(), 0);
    assert!(!h.orchestrator.progress().has_pending_show());
    assert_eq!(h.surface.calls(), vec!["add mkdir Creating directories...", "finish Completed"]);
}

#[tokio::test(start_paused = true)]
async fn test_long_job_presents_once_after_delay() {
    let mut h = harness_with(
        OrchestratorConfig::default(),
        FakeJobs::new(Duration::from_secs(2)),
    );
    h.orchestrator
        .creat(&display(), vec![Locator::local("/tmp/a")], None)
        .unwrap();

    h.orchestrator.run_until_idle().await;

    assert_eq!(h.surface.presents(), 1);
    assert!(h.orchestrator.progress().is_visible());
    assert_eq!(*h.surface.created.lock().unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_second_job_presents_immediately() {
    let mut h = harness_with(
        OrchestratorConfig::default(),
        FakeJobs::new(Duration::from_secs(2)),
    );
    h.orchestrator
        .mkdir(&display(), vec![Locator::local("/tmp/a")], None)
        .unwrap();
    assert_eq!(h.surface.presents(), 0);

    h.orchestrator
        .mkdir(&display(), vec![Locator::local("/tmp/b")], None)
        .unwrap();
    assert_eq!(h.surface.presents(), 1);
    assert!(!h.orchestrator.progress().has_pending_show());
    assert_eq!(h.orchestrator.progress().active_count(), 2);

    h.orchestrator.run_until_idle().await;
    assert_eq!(h.surface.presents(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_completion_sink_runs_once_with_new_files() {
    let mut h = harness();
    let seen: Rc<RefCell<Vec<Vec<Locator>>>> = Rc::default();
    let sink_seen = Rc::clone(&seen);

    h.orchestrator
        .creat(
            &display(),
            vec![Locator::local("/tmp/one"), Locator::local("/tmp/two")],
            Some(Box::new(move |outcome: &JobOutcome| {
                sink_seen.borrow_mut().push(outcome.new_files().to_vec());
            })),
        )
        .unwrap();
    h.orchestrator.run_until_idle().await;

    assert_eq!(
        *seen.borrow(),
        vec![vec![Locator::local("/tmp/one"), Locator::local("/tmp/two")]]
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_job_is_not_reported() {
    let mut h = harness_with(
        OrchestratorConfig::default(),
        FakeJobs::new(Duration::from_secs(10)),
    );
    let states: Rc<RefCell<Vec<JobState>>> = Rc::default();
    let sink_states = Rc::clone(&states);

    let id = h
        .orchestrator
        .mkdir(
            &display(),
            vec![Locator::local("/tmp/slow")],
            Some(Box::new(move |outcome: &JobOutcome| {
                sink_states.borrow_mut().push(outcome.state());
            })),
        )
        .unwrap()
        .unwrap();

    assert!(h.orchestrator.cancel_job(id));
    h.orchestrator.run_until_idle().await;

    assert_eq!(*states.borrow(), vec![JobState::Cancelled]);
    assert!(h.reporter.titles().is_empty());
    assert!(!h.orchestrator.cancel_job(id));
}

#[tokio::test(start_paused = true)]
async fn test_failed_job_is_reported() {
    let mut jobs = FakeJobs::new(Duration::from_millis(10));
    jobs.fail = true;
    let mut h = harness_with(OrchestratorConfig::default(), jobs);

    h.orchestrator
        .trash(&display(), vec![Locator::local("/tmp/x")])
        .unwrap();
    h.orchestrator.run_until_idle().await;

    assert_eq!(h.reporter.titles(), vec!["Moving files into the trash..."]);
    assert!(h.surface.calls().contains(&"finish Failed".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_dismiss_disposes_surface_and_advises_termination() {
    let mut h = harness();
    h.orchestrator
        .mkdir(&display(), vec![Locator::local("/tmp/a")], None)
        .unwrap();
    h.orchestrator.run_until_idle().await;
    assert!(h.orchestrator.progress().has_surface());
    assert!(h.orchestrator.windows().has_windows());

    assert_eq!(h.orchestrator.dismiss_progress(), Lifecycle::Terminate);
    assert!(!h.orchestrator.progress().has_surface());
    assert!(!h.orchestrator.windows().has_windows());
}

#[tokio::test(start_paused = true)]
async fn test_dismiss_with_active_jobs_stays_hidden() {
    let mut h = harness_with(
        OrchestratorConfig::default(),
        FakeJobs::new(Duration::from_secs(2)),
    );
    h.orchestrator
        .mkdir(&display(), vec![Locator::local("/tmp/a")], None)
        .unwrap();
    assert!(h.orchestrator.progress().has_pending_show());

    assert_eq!(h.orchestrator.dismiss_progress(), Lifecycle::Continue);
    assert!(!h.orchestrator.progress().has_pending_show());

    h.orchestrator.run_until_idle().await;
    assert_eq!(h.surface.presents(), 0);
    assert!(h.surface.calls().contains(&"hide".to_string()));
    assert!(h.surface.calls().contains(&"finish Completed".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_dismiss_in_daemon_mode_continues() {
    let config = OrchestratorConfig::builder().daemon(true).build().unwrap();
    let mut h = harness_with(config, FakeJobs::new(Duration::from_millis(10)));
    h.orchestrator
        .mkdir(&display(), vec![Locator::local("/tmp/a")], None)
        .unwrap();
    h.orchestrator.run_until_idle().await;

    assert_eq!(h.orchestrator.dismiss_progress(), Lifecycle::Continue);
    assert!(!h.orchestrator.progress().has_surface());
}

#[tokio::test]
async fn test_mismatched_targets_rejected() {
    let mut h = harness();
    let err = h
        .orchestrator
        .copy_to(
            &display(),
            vec![Locator::local("/a"), Locator::local("/b")],
            vec![Locator::local("/c")],
            None,
        )
        .unwrap_err();

    assert!(matches!(
        err,
        ValidationError::MismatchedTargets {
            sources: 2,
            targets: 1
        }
    ));
    assert!(h.jobs.created().is_empty());
    assert_eq!(h.reporter.titles().len(), 1);
}

#[tokio::test]
async fn test_root_source_aborts_collection() {
    let mut h = harness();
    let err = h
        .orchestrator
        .copy_into(
            &display(),
            vec![Locator::local("/home/u/a"), Locator::local("/")],
            &Locator::local("/mnt/backup"),
            None,
        )
        .unwrap_err();

    assert!(matches!(err, ValidationError::RootLocation { .. }));
    assert!(h.jobs.created().is_empty());
}

#[tokio::test]
async fn test_copy_into_collects_targets() {
    let mut h = harness();
    h.orchestrator
        .copy_into(
            &display(),
            vec![Locator::local("/home/u/a.txt"), Locator::local("/srv/b")],
            &Locator::local("/mnt/backup"),
            None,
        )
        .unwrap();

    let created = h.jobs.created();
    assert_eq!(created.len(), 1);
    let (kind, _, targets) = &created[0];
    assert_eq!(*kind, JobKind::Copy);
    assert_eq!(
        targets,
        &vec![
            Locator::local("/mnt/backup/a.txt"),
            Locator::local("/mnt/backup/b")
        ]
    );
    assert_eq!(
        h.surface.calls(),
        vec!["add copy Copying files to \"backup\"..."]
    );
}

#[tokio::test]
async fn test_empty_sources_are_a_no_op() {
    let mut h = harness();
    let launched = h
        .orchestrator
        .move_into(&display(), Vec::new(), &Locator::local("/tmp"), None)
        .unwrap();
    assert!(launched.is_none());
    assert!(h.jobs.created().is_empty());
    assert!(!h.orchestrator.progress().has_surface());
}

#[tokio::test]
async fn test_move_into_trash_creates_trash_job() {
    let mut h = harness();
    h.orchestrator
        .move_into(
            &display(),
            vec![Locator::local("/home/u/a"), Locator::local("/home/u/b")],
            &Locator::TrashRoot,
            None,
        )
        .unwrap();

    let created = h.jobs.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].0, JobKind::Trash);
    assert!(created[0].2.is_empty());
}

#[tokio::test]
async fn test_non_local_source_forces_permanent_delete() {
    let mut h = harness();
    h.orchestrator
        .unlink_files(
            &display(),
            vec![
                Locator::local("/home/u/a"),
                Locator::Remote {
                    uri: "sftp://host/b".into(),
                },
            ],
            false,
        )
        .unwrap();

    assert_eq!(h.prompt.asked(), vec![ConfirmKind::PermanentDelete]);
    assert_eq!(h.jobs.created()[0].0, JobKind::Unlink);
}

#[tokio::test]
async fn test_local_delete_goes_to_trash_without_prompt() {
    let mut h = harness();
    h.orchestrator
        .unlink_files(&display(), vec![Locator::local("/home/u/a")], false)
        .unwrap();

    assert!(h.prompt.asked().is_empty());
    assert_eq!(h.jobs.created()[0].0, JobKind::Trash);
}

#[tokio::test]
async fn test_declined_confirmation_creates_no_job() {
    let mut h = harness();
    *h.prompt.answer.lock().unwrap() = false;

    let launched = h
        .orchestrator
        .unlink_files(&display(), vec![Locator::local("/home/u/a")], true)
        .unwrap();
    assert!(launched.is_none());
    assert!(h.jobs.created().is_empty());

    let launched = h.orchestrator.empty_trash(&display()).unwrap();
    assert!(launched.is_none());
    assert_eq!(
        h.prompt.asked(),
        vec![ConfirmKind::PermanentDelete, ConfirmKind::EmptyTrash]
    );
    assert!(h.jobs.created().is_empty());
}

#[tokio::test]
async fn test_empty_trash_unlinks_trash_root_only() {
    let mut h = harness();
    h.orchestrator.empty_trash(&display()).unwrap();

    let created = h.jobs.created();
    assert_eq!(created, vec![(JobKind::Unlink, vec![Locator::TrashRoot], vec![])]);
    assert_eq!(h.surface.calls(), vec!["add unlink Emptying the Trash..."]);
}

#[tokio::test]
async fn test_restore_requires_every_original_location() {
    let mut h = harness();
    let err = h
        .orchestrator
        .restore_files(
            &display(),
            vec![
                Locator::trashed("a", Some("/home/u/a".into())),
                Locator::trashed("b", None),
                Locator::trashed("c", Some("/home/u/c".into())),
            ],
            None,
        )
        .unwrap_err();

    assert!(matches!(
        err,
        ValidationError::MissingOriginalLocation { ref name } if name == "b"
    ));
    assert!(h.jobs.created().is_empty());
    assert_eq!(h.reporter.titles(), vec!["Could not restore \"b\""]);
}

#[tokio::test]
async fn test_restore_targets_original_locations() {
    let mut h = harness();
    h.orchestrator
        .restore_files(
            &display(),
            vec![
                Locator::trashed("a", Some("/home/u/a".into())),
                Locator::trashed("c", Some("/srv/c".into())),
            ],
            None,
        )
        .unwrap();

    let created = h.jobs.created();
    assert_eq!(created[0].0, JobKind::Restore);
    assert_eq!(
        created[0].2,
        vec![Locator::local("/home/u/a"), Locator::local("/srv/c")]
    );
}

fn id(s: &str) -> DeviceId {
    DeviceId::new(s)
}

#[tokio::test]
async fn test_duplicate_devices_are_coalesced() {
    let mut h = harness();
    h.orchestrator.handle_device_event(&DeviceEvent::added("/sys/a"));
    h.orchestrator.handle_device_event(&DeviceEvent::added("/sys/b"));
    h.orchestrator.handle_device_event(&DeviceEvent::added("/sys/a"));

    let devices = h.orchestrator.devices();
    assert_eq!(devices.pending_devices(), vec![&id("/sys/b"), &id("/sys/a")]);
    assert_eq!(devices.dispatch_state(), DispatchState::IdleScheduled);
}

#[tokio::test]
async fn test_removed_device_is_never_dispatched() {
    let mut h = harness();
    h.orchestrator.handle_device_event(&DeviceEvent::added("/sys/a"));
    h.orchestrator.handle_device_event(&DeviceEvent::removed("/sys/a"));
    h.orchestrator.handle_device_event(&DeviceEvent::removed("/sys/unknown"));

    h.orchestrator.run_until_idle().await;

    assert!(h.spawner.spawned_ids().is_empty());
    assert_eq!(h.orchestrator.devices().dispatch_state(), DispatchState::Idle);
}

#[tokio::test]
async fn test_change_events_are_ignored() {
    let mut h = harness();
    h.orchestrator
        .handle_device_event(&DeviceEvent::parse_line("change /sys/a").unwrap());
    h.orchestrator
        .handle_device_event(&DeviceEvent::parse_line("move /sys/b").unwrap());

    assert!(h.orchestrator.devices().pending_devices().is_empty());
    assert_eq!(h.orchestrator.devices().dispatch_state(), DispatchState::Idle);
}

#[tokio::test]
async fn test_devices_dispatch_lifo_one_at_a_time() {
    let mut h = harness();
    for dev in ["/sys/a", "/sys/b", "/sys/c"] {
        h.orchestrator.handle_device_event(&DeviceEvent::added(dev));
    }

    h.orchestrator.step().await;
    assert_eq!(h.spawner.spawned_ids(), vec!["/sys/c"]);
    assert_eq!(
        h.orchestrator.devices().dispatch_state(),
        DispatchState::HandlerRunning
    );

    // A new device while the handler runs does not schedule a second task.
    h.orchestrator.handle_device_event(&DeviceEvent::added("/sys/d"));
    assert_eq!(
        h.orchestrator.devices().dispatch_state(),
        DispatchState::HandlerRunning
    );

    for _ in 0..3 {
        h.spawner.exit_oldest(0);
        h.orchestrator.step().await; // exit
        assert_eq!(
            h.orchestrator.devices().dispatch_state(),
            DispatchState::IdleScheduled
        );
        h.orchestrator.step().await; // idle
    }
    h.spawner.exit_oldest(0);
    h.orchestrator.run_until_idle().await;

    assert_eq!(
        h.spawner.spawned_ids(),
        vec!["/sys/c", "/sys/d", "/sys/b", "/sys/a"]
    );
    assert_eq!(
        h.spawner.spawned.lock().unwrap()[0],
        names(&["volman", "--device-added", "/sys/c"])
    );
}

#[tokio::test]
async fn test_volume_management_disabled_drops_queue() {
    let config = OrchestratorConfig::builder()
        .volume_management(false)
        .build()
        .unwrap();
    let mut h = harness_with(config, FakeJobs::new(Duration::from_millis(10)));
    h.orchestrator.handle_device_event(&DeviceEvent::added("/sys/a"));
    h.orchestrator.handle_device_event(&DeviceEvent::added("/sys/b"));

    h.orchestrator.run_until_idle().await;

    assert!(h.spawner.spawned_ids().is_empty());
    assert!(h.orchestrator.devices().pending_devices().is_empty());
    assert_eq!(h.orchestrator.devices().dispatch_state(), DispatchState::Idle);
}

#[tokio::test]
async fn test_spawn_failure_moves_on_to_next_device() {
    let mut h = harness();
    h.spawner.missing.lock().unwrap().insert("/sys/b".to_string());
    h.orchestrator.handle_device_event(&DeviceEvent::added("/sys/a"));
    h.orchestrator.handle_device_event(&DeviceEvent::added("/sys/b"));

    h.orchestrator.step().await;
    assert_eq!(h.spawner.spawned_ids(), vec!["/sys/b"]);
    assert_eq!(
        h.orchestrator.devices().dispatch_state(),
        DispatchState::IdleScheduled
    );

    h.orchestrator.step().await;
    assert_eq!(h.spawner.spawned_ids(), vec!["/sys/b", "/sys/a"]);
    assert_eq!(
        h.orchestrator.devices().dispatch_state(),
        DispatchState::HandlerRunning
    );

    h.spawner.exit_oldest(1);
    h.orchestrator.run_until_idle().await;
    assert_eq!(h.spawner.spawned_ids(), vec!["/sys/b", "/sys/a"]);
}

#[tokio::test]
async fn test_stale_idle_event_is_ignored() {
    let mut h = harness();
    h.orchestrator.handle_device_event(&DeviceEvent::added("/sys/a"));

    let (tx, _rx) = mpsc::unbounded_channel();
    let foreign = ScheduledTask::idle(&tx, |task| OrchestratorEvent::DeviceIdle { task });
    h.orchestrator
        .handle_event(OrchestratorEvent::DeviceIdle { task: foreign.id() });

    assert!(h.spawner.spawned_ids().is_empty());
    assert_eq!(
        h.orchestrator.devices().dispatch_state(),
        DispatchState::IdleScheduled
    );
}

#[tokio::test]
async fn test_launch_failure_discards_rest_of_queue() {
    let mut h = harness();
    h.resolver.fail("b", false);

    h.orchestrator
        .process_filenames(Path::new("/work"), &names(&["a", "b", "c"]), &display(), None)
        .unwrap();
    assert!(h.orchestrator.launch_queue().is_processing());

    h.orchestrator.run_until_idle().await;

    assert_eq!(h.opener.opened(), vec!["a"]);
    assert_eq!(h.resolver.calls(), vec!["a", "b"]);
    assert_eq!(h.reporter.titles(), vec!["Failed to open \"b\""]);
    assert!(!h.orchestrator.launch_queue().is_processing());
}

#[tokio::test]
async fn test_cancelled_resolve_is_silent() {
    let mut h = harness();
    h.resolver.fail("a", true);

    h.orchestrator
        .process_filenames(Path::new("/work"), &names(&["a", "b"]), &display(), None)
        .unwrap();
    h.orchestrator.run_until_idle().await;

    assert!(h.opener.opened().is_empty());
    assert!(h.reporter.titles().is_empty());
    assert_eq!(h.resolver.calls(), vec!["a"]);
}

#[tokio::test]
async fn test_unparsable_name_rejects_whole_batch() {
    let mut h = harness();
    let err = h
        .orchestrator
        .process_filenames(Path::new("/work"), &names(&["a", ""]), &display(), None)
        .unwrap_err();

    assert!(matches!(err, ResolutionError::InvalidLocator { .. }));
    assert!(!h.orchestrator.launch_queue().is_processing());
    assert!(h.resolver.calls().is_empty());
    assert_eq!(h.reporter.titles(), vec!["Failed to open \"\""]);
}

#[tokio::test]
async fn test_batches_are_processed_fifo_one_at_a_time() {
    let mut h = harness();
    h.orchestrator
        .process_filenames(Path::new("/work"), &names(&["a"]), &display(), Some("startup-1"))
        .unwrap();
    h.orchestrator
        .process_filenames(Path::new("/work"), &names(&["/abs/b", "c"]), &display(), None)
        .unwrap();

    // Only the head is in flight.
    assert_eq!(h.resolver.calls(), vec!["a"]);
    let entries: Vec<_> = h.orchestrator.launch_queue().entries().cloned().collect();
    assert_eq!(entries[0].startup_id.as_deref(), Some("startup-1"));
    assert_eq!(entries[1].locator, Locator::local("/abs/b"));

    h.orchestrator.run_until_idle().await;
    assert_eq!(h.opener.opened(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_open_failure_does_not_stop_queue() {
    let mut h = harness();
    h.opener.broken.lock().unwrap().insert("a".to_string());

    h.orchestrator
        .process_filenames(Path::new("/work"), &names(&["a", "b"]), &display(), None)
        .unwrap();
    h.orchestrator.run_until_idle().await;

    assert_eq!(h.opener.opened(), vec!["b"]);
    assert_eq!(h.reporter.titles(), vec!["Failed to open \"a\""]);
}

#[tokio::test]
async fn test_unsuccessful_opener_exit_is_reported() {
    let mut h = harness();
    h.opener.exit_codes.lock().unwrap().insert("a".to_string(), 4);

    h.orchestrator
        .process_filenames(Path::new("/work"), &names(&["a", "b"]), &display(), None)
        .unwrap();
    h.orchestrator.run_until_idle().await;

    assert_eq!(h.opener.opened(), vec!["a", "b"]);
    assert_eq!(h.reporter.titles(), vec!["Failed to open \"a\""]);
    assert!(!h.orchestrator.launch_queue().is_processing());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_everything() {
    let mut h = harness_with(
        OrchestratorConfig::default(),
        FakeJobs::new(Duration::from_secs(60)),
    );
    let states: Rc<RefCell<Vec<JobState>>> = Rc::default();
    let sink_states = Rc::clone(&states);
    h.orchestrator
        .mkdir(
            &display(),
            vec![Locator::local("/tmp/a")],
            Some(Box::new(move |outcome: &JobOutcome| {
                sink_states.borrow_mut().push(outcome.state());
            })),
        )
        .unwrap();
    h.orchestrator.handle_device_event(&DeviceEvent::added("/sys/a"));
    h.orchestrator
        .process_filenames(Path::new("/work"), &names(&["a"]), &display(), None)
        .unwrap();

    h.orchestrator.shutdown();

    assert!(!h.orchestrator.progress().has_pending_show());
    assert!(!h.orchestrator.launch_queue().is_processing());
    assert!(h.orchestrator.devices().is_idle());

    h.orchestrator.run_until_idle().await;
    assert_eq!(*states.borrow(), vec![JobState::Cancelled]);
    assert!(h.spawner.spawned_ids().is_empty());
    assert!(h.opener.opened().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_handles_device_source() {
    let mut h = harness();
    let (tx, rx) = mpsc::channel(8);
    let shutdown = CancellationToken::new();

    tx.send(DeviceEvent::added("/sys/a")).await.unwrap();
    tx.send(DeviceEvent::added("/sys/b")).await.unwrap();
    tx.send(DeviceEvent::removed("/sys/b")).await.unwrap();
    drop(tx);

    let stop = shutdown.clone();
    tokio::join!(h.orchestrator.run(rx, shutdown), async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        stop.cancel();
    });

    assert_eq!(h.spawner.spawned_ids(), vec!["/sys/a"]);
    assert!(h.orchestrator.devices().is_idle());
}
