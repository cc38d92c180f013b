//! Per-inspection reporting
//!
//! Every invocation reports exactly one inspection from the task cache.
//! A disabled inspection always passes, whatever the engine said about it;
//! an inspection the run never produced is reported as skipped and passes.

use crate::cache::{InspectionArtifact, TaskCache};
use crate::config::Config;
use crate::error::DriverResult;
use crate::exit::{translate, CiStatus};

/// What one invocation reports for its inspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InspectionOutcome {
    /// Switched off in the configuration
    Disabled { name: String },
    /// The run produced no result for this inspection
    Skipped { name: String },
    /// Cached result of the run
    Completed {
        name: String,
        artifact: InspectionArtifact,
    },
}

impl InspectionOutcome {
    pub fn name(&self) -> &str {
        match self {
            Self::Disabled { name } | Self::Skipped { name } | Self::Completed { name, .. } => name,
        }
    }

    /// Status reported to CI
    pub fn ci_status(&self) -> CiStatus {
        match self {
            Self::Disabled { .. } | Self::Skipped { .. } => CiStatus::Pass,
            Self::Completed { artifact, .. } => translate(artifact.status_code),
        }
    }
}

/// Look up the outcome for `name`
pub fn report(name: &str, config: &Config, cache: &TaskCache) -> DriverResult<InspectionOutcome> {
    if !config.inspection_enabled(name) {
        return Ok(InspectionOutcome::Disabled {
            name: name.to_string(),
        });
    }

    Ok(match cache.read_artifact(name)? {
        Some(artifact) => InspectionOutcome::Completed {
            name: name.to_string(),
            artifact,
        },
        None => InspectionOutcome::Skipped {
            name: name.to_string(),
        },
    })
}
