//! Task driver
//!
//! Ties the pieces together for one invocation:
//!
//! 1. If the task has no completed run, claim it. The owner resolves the
//!    lineage, runs the engine once, splits the report and marks the run
//!    complete. Invocations that lose the race wait on the lock and then
//!    read what the owner left behind.
//! 2. Read the lineage and report the requested inspection.
//!
//! An owner that fails leaves no sentinel, so the next invocation for the
//! task starts the run again.

use crate::buildsys::{BuildSystem, KojiClient, MbsClient, ModuleService};
use crate::cache::{RunClaim, TaskCache};
use crate::config::Config;
use crate::engine::{
    CommandEngine, CommandSplitter, Engine, EngineRequest, JsonReportSplitter, ReportSplitter,
};
use crate::error::{DriverError, DriverResult};
use crate::events::{EventLog, TaskEvent};
use crate::lineage::{resolve_before, resolve_before_module, BuildKind, BuildRecord, LineagePair};
use crate::report::{report, InspectionOutcome};
use crate::ui::{TaskSpinner, UiContext};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-task parameters shared by every invocation for the task
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// Build task id, or module build id when `is_module` is set
    pub task_id: String,
    /// Tag the before-build is looked up in
    pub previous_tag: String,
    pub is_module: bool,
    pub arches: Vec<String>,
    pub release: Option<String>,
    pub profile: Option<String>,
    pub tests: Option<String>,
    /// Base directory; the task lives in `<workdir>/<task_id>`
    pub workdir: PathBuf,
}

impl TaskContext {
    /// Reject ids that cannot be used as a directory name
    pub fn validate(&self) -> DriverResult<()> {
        let valid = !self.task_id.is_empty()
            && self
                .task_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(DriverError::invalid_task(
                "task id",
                &self.task_id,
                "only letters, digits, '-' and '_' are allowed",
            ));
        }
        if self.previous_tag.trim().is_empty() {
            return Err(DriverError::invalid_task(
                "previous tag",
                &self.previous_tag,
                "must not be empty",
            ));
        }
        Ok(())
    }

    pub fn task_dir(&self) -> PathBuf {
        self.workdir.join(&self.task_id)
    }

    pub fn build_kind(&self) -> BuildKind {
        if self.is_module {
            BuildKind::Module
        } else {
            BuildKind::Task
        }
    }
}

/// External collaborators used by the driver
#[derive(Clone)]
pub struct Backends {
    pub build_system: Arc<dyn BuildSystem>,
    pub modules: Arc<dyn ModuleService>,
    pub engine: Arc<dyn Engine>,
    pub splitter: Arc<dyn ReportSplitter>,
}

impl Backends {
    /// Create the real clients described by the configuration
    pub fn from_config(config: &Config) -> Self {
        let splitter: Arc<dyn ReportSplitter> = if config.engine.splitter.is_empty() {
            Arc::new(JsonReportSplitter)
        } else {
            Arc::new(CommandSplitter::new(config.engine.splitter.clone()))
        };

        Self {
            build_system: Arc::new(KojiClient::new(&config.build_system)),
            modules: Arc::new(MbsClient::new(&config.module_service)),
            engine: Arc::new(CommandEngine::new(&config.engine)),
            splitter,
        }
    }
}

/// What one invocation produced
#[derive(Debug, Clone)]
pub struct Execution {
    pub lineage: LineagePair,
    pub outcome: InspectionOutcome,
}

/// Drives one task's inspections
pub struct Driver {
    config: Config,
    context: TaskContext,
    backends: Backends,
    ui: UiContext,
}

impl Driver {
    pub fn new(config: Config, context: TaskContext, backends: Backends) -> Self {
        Self {
            config,
            context,
            backends,
            ui: UiContext::non_interactive(),
        }
    }

    pub fn with_ui(mut self, ui: UiContext) -> Self {
        self.ui = ui;
        self
    }

    pub fn cache(&self) -> TaskCache {
        TaskCache::new(self.context.task_dir())
    }

    /// Report `test_name` for the task, running the engine first if no
    /// earlier invocation has.
    pub async fn execute(&self, test_name: &str) -> DriverResult<Execution> {
        self.context.validate()?;
        let cache = self.cache();
        let events = EventLog::for_task(&self.config, &cache);

        if !cache.is_complete() {
            let timeout = Duration::from_secs(self.config.cache.lock_timeout_secs);
            if let Some(claim) = cache.try_begin_run(timeout).await? {
                self.run_once(&cache, claim, &events).await?;
            }
        } else {
            debug!("Using cached results in {}", cache.root().display());
        }

        let lineage = cache.read_lineage(self.context.build_kind())?;
        let outcome = report(test_name, &self.config, &cache)?;

        events
            .record(TaskEvent::InspectionReported {
                inspection: outcome.name().to_string(),
                status: outcome.ci_status().code(),
            })
            .await;

        Ok(Execution { lineage, outcome })
    }

    /// Determine the (before, after) pair for the task
    pub async fn resolve_lineage(&self) -> DriverResult<LineagePair> {
        let id = &self.context.task_id;
        let tag = &self.context.previous_tag;
        let builds = self.backends.build_system.as_ref();

        if self.context.is_module {
            let after = self.backends.modules.module_nvr(id).await?;
            let before = resolve_before_module(builds, &after, tag).await?;
            Ok(LineagePair::new(
                BuildRecord::module(after),
                before.map(BuildRecord::module),
            ))
        } else {
            let after = builds.task_nvr(id).await?;
            let before = resolve_before(builds, &after, tag).await?;
            Ok(LineagePair::new(
                BuildRecord::task(after),
                before.map(BuildRecord::task),
            ))
        }
    }

    async fn run_once(
        &self,
        cache: &TaskCache,
        claim: RunClaim,
        events: &EventLog,
    ) -> DriverResult<()> {
        let lineage = self.resolve_lineage().await?;
        if lineage.has_baseline() {
            info!("Comparing {}", lineage);
        } else {
            info!(
                "No earlier build of {} in {}, inspecting standalone",
                lineage.after, self.context.previous_tag
            );
        }
        cache.store_lineage(&claim, &lineage)?;
        events
            .record(TaskEvent::lineage_resolved(&lineage, &self.context.previous_tag))
            .await;

        let workdir = cache.root().join("work");
        std::fs::create_dir_all(&workdir)
            .map_err(|e| DriverError::io(format!("creating {}", workdir.display()), e))?;

        let request = EngineRequest {
            lineage: lineage.clone(),
            config: self.config.engine.config.clone(),
            profile: self.context.profile.clone(),
            arches: self.context.arches.clone(),
            release: self.context.release.clone(),
            tests: self.context.tests.clone(),
            workdir,
            report_path: cache.report_path(),
            log_path: cache.engine_log_path(),
        };

        let mut spinner = TaskSpinner::new(&self.ui);
        spinner.start(&format!("Inspecting {}", lineage));
        let run = self.backends.engine.run(&request).await?;
        events
            .record(TaskEvent::EngineFinished {
                exit_code: run.exit_code,
            })
            .await;

        spinner.message("Splitting engine report");
        let count = self
            .backends
            .splitter
            .split(&run.report_path, cache, &self.config.descriptions)
            .await?;
        spinner.clear();
        if count == 0 {
            warn!("Engine report for task {} has no inspections", self.context.task_id);
        }

        cache.mark_complete(claim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineRun;
    use crate::exit::CiStatus;
    use crate::nvr::Nvr;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    const REPORT: &str = r#"{
        "license": [{"result": "OK", "message": "License tags are valid"}],
        "changedfiles": [{"result": "BAD", "message": "/usr/lib64/libfoo.so.1 removed"}]
    }"#;

    /// Tag history, most recent first
    struct FakeBuilds {
        after: &'static str,
        history: Vec<&'static str>,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl BuildSystem for FakeBuilds {
        async fn task_nvr(&self, _task_id: &str) -> DriverResult<Nvr> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Nvr::parse(self.after)
        }

        async fn list_tagged(
            &self,
            _tag: &str,
            package: &str,
            latest: Option<u32>,
        ) -> DriverResult<Vec<Nvr>> {
            let mut rows: Vec<Nvr> = self
                .history
                .iter()
                .map(|s| Nvr::parse(s))
                .collect::<DriverResult<Vec<_>>>()?
                .into_iter()
                .filter(|n| n.name == package)
                .collect();
            match latest {
                Some(n) => rows.truncate(n as usize),
                None => rows.reverse(),
            }
            Ok(rows)
        }
    }

    struct FakeModules;

    #[async_trait]
    impl ModuleService for FakeModules {
        async fn module_nvr(&self, _build_id: &str) -> DriverResult<Nvr> {
            Ok(Nvr::module("nodejs", "18", "3720230601", "6c81f848"))
        }
    }

    /// Writes a fixed report; fails the first `failures` runs
    struct FakeEngine {
        runs: AtomicUsize,
        failures: usize,
        args: Mutex<Vec<Vec<String>>>,
    }

    impl FakeEngine {
        fn new(failures: usize) -> Self {
            Self {
                runs: AtomicUsize::new(0),
                failures,
                args: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl Engine for FakeEngine {
        async fn run(&self, request: &EngineRequest) -> DriverResult<EngineRun> {
            let run = self.runs.fetch_add(1, Ordering::SeqCst);
            self.args.lock().unwrap().push(request.args());
            tokio::time::sleep(Duration::from_millis(50)).await;
            if run < self.failures {
                return Err(DriverError::EngineFailure("engine crashed".to_string()));
            }
            std::fs::write(&request.report_path, REPORT)
                .map_err(|e| DriverError::io("writing report", e))?;
            Ok(EngineRun {
                exit_code: 1,
                report_path: request.report_path.clone(),
            })
        }
    }

    struct Fixture {
        _dir: TempDir,
        builds: Arc<FakeBuilds>,
        engine: Arc<FakeEngine>,
        driver: Arc<Driver>,
    }

    fn fixture(config: Config, is_module: bool, failures: usize) -> Fixture {
        let dir = TempDir::new().unwrap();
        let builds = Arc::new(FakeBuilds {
            after: "foo-1.2-3.fc37",
            history: vec![
                "foo-1.2-3.fc37",
                "foo-1.1-2.fc37",
                "foo-1.0-1.fc37",
                "nodejs-18-3720230601.6c81f848",
                "nodejs-18-3710230501.aaaa1111",
            ],
            lookups: AtomicUsize::new(0),
        });
        let engine = Arc::new(FakeEngine::new(failures));
        let backends = Backends {
            build_system: builds.clone(),
            modules: Arc::new(FakeModules),
            engine: engine.clone(),
            splitter: Arc::new(JsonReportSplitter),
        };
        let context = TaskContext {
            task_id: "12345".to_string(),
            previous_tag: "f37-updates-candidate".to_string(),
            is_module,
            arches: vec!["x86_64".to_string()],
            release: None,
            profile: None,
            tests: None,
            workdir: dir.path().to_path_buf(),
        };
        let driver = Arc::new(Driver::new(config, context, backends));
        Fixture {
            _dir: dir,
            builds,
            engine,
            driver,
        }
    }

    #[tokio::test]
    async fn steps_share_one_engine_run() {
        let fx = fixture(Config::default(), false, 0);

        let license = fx.driver.execute("license").await.unwrap();
        let changed = fx.driver.execute("changedfiles").await.unwrap();

        assert_eq!(fx.engine.runs.load(Ordering::SeqCst), 1);
        assert_eq!(fx.builds.lookups.load(Ordering::SeqCst), 1);

        assert_eq!(license.lineage, changed.lineage);
        assert_eq!(license.lineage.after.nvr.to_string(), "foo-1.2-3.fc37");
        assert_eq!(
            license.lineage.before.as_ref().map(|b| b.nvr.to_string()),
            Some("foo-1.1-2.fc37".to_string())
        );

        assert_eq!(license.outcome.ci_status(), CiStatus::Pass);
        assert_eq!(changed.outcome.ci_status(), CiStatus::Fail);

        let args = fx.engine.args.lock().unwrap();
        let n = args[0].len();
        assert_eq!(args[0][n - 2..], ["foo-1.1-2.fc37", "foo-1.2-3.fc37"]);
    }

    #[tokio::test]
    async fn concurrent_steps_run_engine_once() {
        let fx = fixture(Config::default(), false, 0);

        let handles: Vec<_> = ["license", "changedfiles", "emptyrpm", "license"]
            .into_iter()
            .map(|name| {
                let driver = fx.driver.clone();
                tokio::spawn(async move { driver.execute(name).await })
            })
            .collect();

        let mut lineages = vec![];
        for handle in handles {
            lineages.push(handle.await.unwrap().unwrap().lineage);
        }

        assert_eq!(fx.engine.runs.load(Ordering::SeqCst), 1);
        assert!(lineages.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn disabled_inspection_passes() {
        let mut config = Config::default();
        config.inspections.insert("changedfiles".to_string(), false);
        let fx = fixture(config, false, 0);

        let execution = fx.driver.execute("changedfiles").await.unwrap();
        assert!(matches!(
            execution.outcome,
            InspectionOutcome::Disabled { .. }
        ));
        assert_eq!(execution.outcome.ci_status(), CiStatus::Pass);
    }

    #[tokio::test]
    async fn failed_owner_is_retried() {
        let fx = fixture(Config::default(), false, 1);

        let err = fx.driver.execute("license").await.unwrap_err();
        assert!(matches!(err, DriverError::EngineFailure(_)));
        assert!(!fx.driver.cache().is_complete());

        let execution = fx.driver.execute("license").await.unwrap();
        assert_eq!(execution.outcome.ci_status(), CiStatus::Pass);
        assert_eq!(fx.engine.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn module_already_tagged_compares_with_previous() {
        let fx = fixture(Config::default(), true, 0);

        let execution = fx.driver.execute("license").await.unwrap();
        let lineage = execution.lineage;
        assert_eq!(lineage.after.kind, BuildKind::Module);
        assert_eq!(lineage.after.nvr.to_string(), "nodejs-18-3720230601.6c81f848");
        assert_eq!(
            lineage.before.as_ref().map(|b| b.nvr.to_string()),
            Some("nodejs-18-3710230501.aaaa1111".to_string())
        );
        assert_eq!(fx.builds.lookups.load(Ordering::SeqCst), 0);

        // The cached lineage matches what the engine was given
        let args = fx.engine.args.lock().unwrap();
        let n = args[0].len();
        assert_eq!(
            &args[0][n - 2..],
            ["nodejs-18-3710230501.aaaa1111", "nodejs-18-3720230601.6c81f848"]
        );
    }

    #[tokio::test]
    async fn events_trace_the_run() {
        let fx = fixture(Config::default(), false, 0);
        fx.driver.execute("license").await.unwrap();
        fx.driver.execute("changedfiles").await.unwrap();

        let log = std::fs::read_to_string(fx.driver.cache().events_path()).unwrap();
        let events: Vec<serde_json::Value> =
            log.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        let names: Vec<&str> = events.iter().filter_map(|e| e["event"].as_str()).collect();
        assert_eq!(
            names,
            [
                "lineage.resolved",
                "engine.finished",
                "inspection.reported",
                "inspection.reported"
            ]
        );
        assert_eq!(events[3]["status"], 1);
    }

    #[tokio::test]
    async fn rejects_path_like_task_id() {
        let mut fx = fixture(Config::default(), false, 0);
        let driver = Arc::get_mut(&mut fx.driver).unwrap();
        driver.context.task_id = "../12345".to_string();

        let err = driver.execute("license").await.unwrap_err();
        assert!(matches!(
            err,
            DriverError::InvalidTask {
                field: "task id",
                ..
            }
        ));
        assert!(!err.to_string().contains("build identifier"));

        driver.context.task_id = "12345".to_string();
        driver.context.previous_tag = " ".to_string();
        let err = driver.execute("license").await.unwrap_err();
        assert!(matches!(
            err,
            DriverError::InvalidTask {
                field: "previous tag",
                ..
            }
        ));
        assert_eq!(fx.engine.runs.load(Ordering::SeqCst), 0);
    }
}
