//! Fan-out of the engine report into per-inspection artifacts

use crate::cache::{InspectionArtifact, TaskCache};
use crate::error::{DriverError, DriverResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Splits a full engine report into one artifact per inspection
#[async_trait]
pub trait ReportSplitter: Send + Sync {
    /// Returns the number of inspections written
    async fn split(
        &self,
        report: &Path,
        cache: &TaskCache,
        descriptions: &BTreeMap<String, String>,
    ) -> DriverResult<usize>;
}

/// One finding within an inspection
#[derive(Debug, Deserialize)]
struct Finding {
    result: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    remedy: Option<String>,
    #[serde(default)]
    waiver_authorization: Option<String>,
}

impl Finding {
    fn fails(&self) -> bool {
        matches!(self.result.as_str(), "VERIFY" | "BAD")
    }
}

/// Built-in splitter for reports shaped `{ "<inspection>": [finding, ...] }`
#[derive(Debug, Default)]
pub struct JsonReportSplitter;

impl JsonReportSplitter {
    fn render(findings: &[Finding]) -> String {
        if findings.is_empty() {
            return "No findings.\n".to_string();
        }

        let mut text = String::new();
        for finding in findings {
            let _ = writeln!(
                text,
                "{}: {}",
                finding.result,
                finding.message.as_deref().unwrap_or("")
            );
            if let Some(ref details) = finding.details {
                for line in details.lines() {
                    let _ = writeln!(text, "    {}", line);
                }
            }
            if let Some(ref remedy) = finding.remedy {
                let _ = writeln!(text, "  Suggested remedy: {}", remedy);
            }
            if let Some(ref waiver) = finding.waiver_authorization {
                let _ = writeln!(text, "  Waiver authorization: {}", waiver);
            }
        }
        text
    }
}

#[async_trait]
impl ReportSplitter for JsonReportSplitter {
    async fn split(
        &self,
        report: &Path,
        cache: &TaskCache,
        descriptions: &BTreeMap<String, String>,
    ) -> DriverResult<usize> {
        let content = tokio::fs::read_to_string(report)
            .await
            .map_err(|e| DriverError::io(format!("reading report {}", report.display()), e))?;

        let inspections: BTreeMap<String, Vec<Finding>> = serde_json::from_str(&content)
            .map_err(|e| DriverError::SplitFailure(format!("{}: {}", report.display(), e)))?;

        for (name, findings) in &inspections {
            let status_code = i32::from(findings.iter().any(Finding::fails));
            let artifact = InspectionArtifact {
                description: descriptions.get(name).cloned().unwrap_or_default(),
                result_text: Self::render(findings),
                status_code,
            };
            debug!("{}: {} findings, status {}", name, findings.len(), status_code);
            cache.write_artifact(name, &artifact)?;
        }

        info!("Split report into {} inspection results", inspections.len());
        Ok(inspections.len())
    }
}

/// External splitter invoked as `<command...> <report> <results_dir>`
pub struct CommandSplitter {
    command: Vec<String>,
}

impl CommandSplitter {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

#[async_trait]
impl ReportSplitter for CommandSplitter {
    async fn split(
        &self,
        report: &Path,
        cache: &TaskCache,
        _descriptions: &BTreeMap<String, String>,
    ) -> DriverResult<usize> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| DriverError::SplitFailure("empty splitter command".to_string()))?;
        let results_dir = cache.results_dir();

        let output = Command::new(program)
            .args(args)
            .arg(report)
            .arg(&results_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| DriverError::command_failed(program.clone(), e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DriverError::SplitFailure(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                stderr.trim()
            )));
        }

        let count = std::fs::read_dir(&results_dir)
            .map_err(|e| DriverError::io(format!("reading {}", results_dir.display()), e))?
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with("_status"))
            .count();

        info!("External splitter produced {} inspection results", count);
        Ok(count)
    }
}
