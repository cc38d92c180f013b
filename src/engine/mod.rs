//! Analysis engine invocation
//!
//! The engine runs once per task. Its exit status describes findings, not
//! driver health, so a non-zero exit is recorded and the report is split
//! regardless. Only a missing report, a spawn failure, a signal or a
//! timeout count as `EngineFailure`.

mod split;

pub use split::{CommandSplitter, JsonReportSplitter, ReportSplitter};

use crate::config::schema::EngineConfig;
use crate::error::{DriverError, DriverResult};
use crate::lineage::LineagePair;
use async_trait::async_trait;
use std::fs::File;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Everything the engine needs for one run
#[derive(Debug, Clone)]
pub struct EngineRequest {
    pub lineage: LineagePair,
    pub config: Option<PathBuf>,
    pub profile: Option<String>,
    pub arches: Vec<String>,
    pub release: Option<String>,
    pub tests: Option<String>,
    pub workdir: PathBuf,
    pub report_path: PathBuf,
    pub log_path: PathBuf,
}

impl EngineRequest {
    /// Command-line arguments for the engine
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(ref config) = self.config {
            args.push("-c".to_string());
            args.push(config.display().to_string());
        }
        if let Some(ref profile) = self.profile {
            args.push("-p".to_string());
            args.push(profile.clone());
        }
        if !self.arches.is_empty() {
            args.push("-a".to_string());
            args.push(self.arches.join(","));
        }
        if let Some(ref release) = self.release {
            args.push("-r".to_string());
            args.push(release.clone());
        }
        if let Some(ref tests) = self.tests {
            args.push("-T".to_string());
            args.push(tests.clone());
        }

        args.push("-w".to_string());
        args.push(self.workdir.display().to_string());
        args.push("-F".to_string());
        args.push("json".to_string());
        args.push("-o".to_string());
        args.push(self.report_path.display().to_string());

        if let Some(ref before) = self.lineage.before {
            args.push(before.nvr.to_string());
        }
        args.push(self.lineage.after.nvr.to_string());

        args
    }
}

/// Outcome of the one engine run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRun {
    /// Engine exit code; informational only
    pub exit_code: i32,
    pub report_path: PathBuf,
}

/// The analysis engine
#[async_trait]
pub trait Engine: Send + Sync {
    async fn run(&self, request: &EngineRequest) -> DriverResult<EngineRun>;
}

/// Engine executed as an external command
pub struct CommandEngine {
    command: String,
    timeout: Option<Duration>,
}

impl CommandEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            command: config.command.clone(),
            timeout: (config.timeout_secs > 0).then(|| Duration::from_secs(config.timeout_secs)),
        }
    }
}

#[async_trait]
impl Engine for CommandEngine {
    async fn run(&self, request: &EngineRequest) -> DriverResult<EngineRun> {
        let args = request.args();
        info!("Running {} {}", self.command, args.join(" "));

        let log = File::create(&request.log_path).map_err(|e| {
            DriverError::io(format!("creating {}", request.log_path.display()), e)
        })?;
        let log_err = log
            .try_clone()
            .map_err(|e| DriverError::io("duplicating engine log handle", e))?;

        let mut child = Command::new(&self.command)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DriverError::EngineFailure(format!("{}: {}", self.command, e)))?;

        let waited = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait()).await.map_err(|_| {
                DriverError::EngineFailure(format!("timed out after {}s", limit.as_secs()))
            })?,
            None => child.wait().await,
        };
        let status = waited
            .map_err(|e| DriverError::EngineFailure(format!("waiting for {}: {}", self.command, e)))?;

        let Some(exit_code) = status.code() else {
            return Err(DriverError::EngineFailure(format!(
                "{} terminated by signal",
                self.command
            )));
        };

        if !request.report_path.exists() {
            return Err(DriverError::EngineFailure(format!(
                "exited with {} without writing a report (see {})",
                exit_code,
                request.log_path.display()
            )));
        }

        if exit_code != 0 {
            warn!("{} exited with {}", self.command, exit_code);
        } else {
            debug!("{} exited cleanly", self.command);
        }

        Ok(EngineRun {
            exit_code,
            report_path: request.report_path.clone(),
        })
    }
}
