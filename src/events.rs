//! Per-task event trail
//!
//! Every step appends one JSON line per event to `<taskdir>/events.log`, so
//! the lineage a task was inspected against and which steps reported what
//! can be reconstructed after the CI run is gone.

use crate::cache::TaskCache;
use crate::config::Config;
use crate::lineage::{BuildKind, LineagePair};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Something worth recording about a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event")]
pub enum TaskEvent {
    #[serde(rename = "lineage.resolved")]
    LineageResolved {
        after: String,
        before: Option<String>,
        kind: BuildKind,
        tag: String,
    },
    #[serde(rename = "engine.finished")]
    EngineFinished { exit_code: i32 },
    #[serde(rename = "inspection.reported")]
    InspectionReported { inspection: String, status: u8 },
}

impl TaskEvent {
    pub fn lineage_resolved(lineage: &LineagePair, tag: &str) -> Self {
        Self::LineageResolved {
            after: lineage.after.to_string(),
            before: lineage.before.as_ref().map(ToString::to_string),
            kind: lineage.after.kind,
            tag: tag.to_string(),
        }
    }
}

#[derive(Serialize)]
struct EventLine<'a> {
    timestamp: DateTime<Utc>,
    pid: u32,
    #[serde(flatten)]
    event: &'a TaskEvent,
}

/// Append-only JSON-lines event log for one task
pub struct EventLog {
    path: Option<PathBuf>,
}

impl EventLog {
    /// Log for `cache`'s task; inert when `general.audit_log` is off
    pub fn for_task(config: &Config, cache: &TaskCache) -> Self {
        Self {
            path: config.general.audit_log.then(|| cache.events_path()),
        }
    }

    /// Record an event. Failures are logged and never fail the step.
    pub async fn record(&self, event: TaskEvent) {
        let Some(ref path) = self.path else {
            return;
        };

        let line = EventLine {
            timestamp: Utc::now(),
            pid: std::process::id(),
            event: &event,
        };
        let mut json = match serde_json::to_string(&line) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize {:?}: {}", event, e);
                return;
            }
        };
        json.push('\n');

        let appended = async {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await?;
            file.write_all(json.as_bytes()).await?;
            file.flush().await
        };
        if let Err(e) = appended.await {
            warn!("Failed to append to {}: {}", path.display(), e);
        }
    }
}
