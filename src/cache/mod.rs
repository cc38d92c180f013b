//! Per-task result cache
//!
//! CI invokes the driver once per inspection name, but the engine must run
//! only once per task. The task directory is the shared memory between
//! those invocations:
//!
//! ```text
//! <taskdir>/
//!   .run.lock                      exclusive lock around resolve + run
//!   cached                         sentinel: run complete
//!   report.json                    full engine report
//!   engine.log                     engine stdout/stderr
//!   events.log                     task event log
//!   results_cache/after_build      lineage (NVR)
//!   results_cache/before_build     lineage (NVR or empty)
//!   results_cache/<name>_result
//!   results_cache/<name>_status
//!   results_cache/<name>_description
//! ```
//!
//! # Run States
//!
//! | State | Sentinel | Lineage files | Description |
//! |-------|----------|---------------|-------------|
//! | Unresolved | absent | absent | Nothing done yet |
//! | Resolving | absent | absent | Owner holds the lock |
//! | ResolvedNotRun | absent | present | Engine running |
//! | RunComplete | present | present | Read-only from here on |
//!
//! Writers put lineage and artifacts down first and the sentinel last;
//! readers check the sentinel before reading anything else.

mod lock;

pub use lock::RunLock;

use crate::error::{DriverError, DriverResult};
use crate::lineage::{BuildKind, BuildRecord, LineagePair};
use crate::nvr::Nvr;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const SENTINEL: &str = "cached";
const RESULTS_DIR: &str = "results_cache";
const AFTER_BUILD: &str = "after_build";
const BEFORE_BUILD: &str = "before_build";

/// Cached outcome of one inspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectionArtifact {
    pub description: String,
    pub result_text: String,
    pub status_code: i32,
}

/// Proof that this invocation owns the run for the task.
///
/// Holds the run lock until the run is marked complete or abandoned.
#[derive(Debug)]
pub struct RunClaim {
    _lock: RunLock,
}

/// Filesystem-backed cache for one CI task
#[derive(Debug, Clone)]
pub struct TaskCache {
    root: PathBuf,
}

impl TaskCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root.join(RESULTS_DIR)
    }

    pub fn report_path(&self) -> PathBuf {
        self.root.join("report.json")
    }

    pub fn engine_log_path(&self) -> PathBuf {
        self.root.join("engine.log")
    }

    pub fn events_path(&self) -> PathBuf {
        self.root.join("events.log")
    }

    fn sentinel_path(&self) -> PathBuf {
        self.root.join(SENTINEL)
    }

    /// Whether the run-once phase has finished for this task
    pub fn is_complete(&self) -> bool {
        self.sentinel_path().exists()
    }

    /// Claim the run for this invocation.
    ///
    /// Waits for any other invocation holding the lock. Returns `None` when
    /// the run completed in the meantime (or before), in which case the
    /// caller is a pure reader.
    pub async fn try_begin_run(&self, timeout: Duration) -> DriverResult<Option<RunClaim>> {
        if self.is_complete() {
            return Ok(None);
        }

        fs::create_dir_all(self.results_dir()).map_err(|e| {
            DriverError::io(format!("creating {}", self.results_dir().display()), e)
        })?;

        let lock = RunLock::acquire(&self.root, timeout).await?;

        if self.is_complete() {
            debug!("Run completed while waiting for the lock");
            return Ok(None);
        }

        info!("Claimed inspection run in {}", self.root.display());
        Ok(Some(RunClaim { _lock: lock }))
    }

    /// Persist the resolved lineage (owner only)
    pub fn store_lineage(&self, _claim: &RunClaim, pair: &LineagePair) -> DriverResult<()> {
        let before = pair
            .before
            .as_ref()
            .map(|b| b.nvr.to_string())
            .unwrap_or_default();

        write_file(&self.results_dir().join(AFTER_BUILD), &pair.after.nvr.to_string())?;
        write_file(&self.results_dir().join(BEFORE_BUILD), &before)?;
        Ok(())
    }

    /// Read the lineage persisted by the owning invocation
    pub fn read_lineage(&self, kind: BuildKind) -> DriverResult<LineagePair> {
        let parse = |s: &str| match kind {
            BuildKind::Task => Nvr::parse(s),
            BuildKind::Module => Nvr::parse_module(s),
        };
        let record = |nvr| BuildRecord { nvr, kind };

        let after_path = self.results_dir().join(AFTER_BUILD);
        let after = read_required(&after_path)?;
        let after = parse(after.trim())
            .map_err(|e| DriverError::corrupt(&after_path, e.to_string()))?;

        let before_path = self.results_dir().join(BEFORE_BUILD);
        let before = read_required(&before_path)?;
        let before = match before.trim() {
            "" => None,
            s => Some(parse(s).map_err(|e| DriverError::corrupt(&before_path, e.to_string()))?),
        };

        Ok(LineagePair::new(record(after), before.map(record)))
    }

    /// Store one inspection's artifact (used while splitting the report)
    pub fn write_artifact(&self, name: &str, artifact: &InspectionArtifact) -> DriverResult<()> {
        let [result, status, description] = self.artifact_paths(name)?;
        write_file(&description, &artifact.description)?;
        write_file(&result, &artifact.result_text)?;
        write_file(&status, &artifact.status_code.to_string())?;
        Ok(())
    }

    /// Read one inspection's artifact.
    ///
    /// `None` means the run produced nothing for this inspection. A result
    /// without a status (or the reverse) is corruption.
    pub fn read_artifact(&self, name: &str) -> DriverResult<Option<InspectionArtifact>> {
        let [result, status, description] = self.artifact_paths(name)?;

        match (result.exists(), status.exists()) {
            (false, false) => return Ok(None),
            (true, false) => return Err(DriverError::corrupt(&status, "missing status")),
            (false, true) => return Err(DriverError::corrupt(&result, "missing result")),
            (true, true) => {}
        }

        let status_code = read_required(&status)?
            .trim()
            .parse::<i32>()
            .map_err(|e| DriverError::corrupt(&status, format!("unreadable status: {}", e)))?;
        let result_text = read_required(&result)?;
        let description = if description.exists() {
            read_required(&description)?
        } else {
            String::new()
        };

        Ok(Some(InspectionArtifact {
            description,
            result_text,
            status_code,
        }))
    }

    /// Write the sentinel and release the run lock
    pub fn mark_complete(&self, claim: RunClaim) -> DriverResult<()> {
        let path = self.sentinel_path();
        let mut file =
            File::create(&path).map_err(|e| DriverError::io(format!("creating {}", path.display()), e))?;
        file.write_all(b"")
            .and_then(|_| file.sync_all())
            .map_err(|e| DriverError::io(format!("syncing {}", path.display()), e))?;

        drop(claim);
        info!("Inspection run complete for {}", self.root.display());
        Ok(())
    }

    fn artifact_paths(&self, name: &str) -> DriverResult<[PathBuf; 3]> {
        validate_inspection_name(name)?;
        let dir = self.results_dir();
        Ok([
            dir.join(format!("{}_result", name)),
            dir.join(format!("{}_status", name)),
            dir.join(format!("{}_description", name)),
        ])
    }
}

/// Inspection names are used as file name prefixes
fn validate_inspection_name(name: &str) -> DriverResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(DriverError::InvalidInspection(name.to_string()))
    }
}

fn write_file(path: &Path, content: &str) -> DriverResult<()> {
    fs::write(path, content).map_err(|e| DriverError::io(format!("writing {}", path.display()), e))
}

fn read_required(path: &Path) -> DriverResult<String> {
    fs::read_to_string(path).map_err(|e| DriverError::corrupt(path, e.to_string()))
}
