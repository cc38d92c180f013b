//! Build system client backed by the `koji` CLI

use super::{with_retries, BuildSystem, RetryPolicy};
use crate::config::schema::BuildSystemConfig;
use crate::error::{DriverError, DriverResult};
use crate::nvr::Nvr;
use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Build entry as returned by `listBuilds`
#[derive(Debug, Deserialize)]
struct BuildInfo {
    nvr: String,
}

/// Koji CLI client
pub struct KojiClient {
    command: String,
    profile: Option<String>,
    policy: RetryPolicy,
}

impl KojiClient {
    pub fn new(config: &BuildSystemConfig) -> Self {
        Self {
            command: config.command.clone(),
            profile: config.koji_profile.clone(),
            policy: RetryPolicy::new(
                config.timeout_secs,
                config.retries,
                config.retry_delay_secs,
            ),
        }
    }

    /// Execute a koji subcommand and return its stdout
    async fn exec(&self, operation: &str, args: &[String]) -> DriverResult<String> {
        let mut full_args = Vec::new();
        if let Some(ref profile) = self.profile {
            full_args.push("-p".to_string());
            full_args.push(profile.clone());
        }
        full_args.extend_from_slice(args);

        debug!("Executing: {} {:?}", self.command, full_args);

        let output = Command::new(&self.command)
            .args(&full_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| DriverError::lookup(operation, format!("{}: {}", self.command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DriverError::lookup(
                operation,
                format!(
                    "{} exited with {}: {}",
                    self.command,
                    output.status,
                    stderr.trim()
                ),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl BuildSystem for KojiClient {
    async fn task_nvr(&self, task_id: &str) -> DriverResult<Nvr> {
        let args = [
            "call".to_string(),
            "--json-output".to_string(),
            "listBuilds".to_string(),
            format!("taskID={}", task_id),
        ];
        let args = args.as_slice();

        let stdout = with_retries("listBuilds", self.policy, || self.exec("listBuilds", args)).await?;
        parse_task_builds(task_id, &stdout)
    }

    async fn list_tagged(
        &self,
        tag: &str,
        package: &str,
        latest: Option<u32>,
    ) -> DriverResult<Vec<Nvr>> {
        let mut args = vec![
            "list-tagged".to_string(),
            "--inherit".to_string(),
            "--quiet".to_string(),
        ];
        if let Some(n) = latest {
            args.push(format!("--latest-n={}", n));
        }
        args.push(tag.to_string());
        args.push(package.to_string());
        let args = args.as_slice();

        let stdout = with_retries("list-tagged", self.policy, || self.exec("list-tagged", args)).await?;
        parse_tagged_listing(&stdout)
    }
}

/// Pick the build out of a `listBuilds` JSON response
fn parse_task_builds(task_id: &str, stdout: &str) -> DriverResult<Nvr> {
    let builds: Vec<BuildInfo> = serde_json::from_str(stdout)
        .map_err(|e| DriverError::lookup("listBuilds", format!("malformed response: {}", e)))?;

    let build = builds.into_iter().next().ok_or_else(|| {
        DriverError::lookup("listBuilds", format!("task {} produced no build", task_id))
    })?;

    Nvr::parse(&build.nvr)
}

/// Parse `list-tagged --quiet` output: one build per line, NVR first
fn parse_tagged_listing(stdout: &str) -> DriverResult<Vec<Nvr>> {
    stdout
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(|nvr| {
            Nvr::parse(nvr).map_err(|e| {
                DriverError::lookup("list-tagged", format!("malformed listing row: {}", e))
            })
        })
        .collect()
}
