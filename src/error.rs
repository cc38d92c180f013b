//! Error types for the inspection driver
//!
//! All modules use `DriverResult<T>` as their return type. Every error is
//! reported to CI as an infrastructure error; findings reported by the
//! engine are never errors.

use crate::exit::CiStatus;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// All errors that can occur while driving an inspection task
#[derive(Error, Debug)]
pub enum DriverError {
    // Identifier errors
    #[error("Invalid build identifier '{nvr}': {reason}")]
    InvalidIdentifier { nvr: String, reason: String },

    #[error("Invalid {field} '{value}': {reason}")]
    InvalidTask {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid inspection name '{0}'")]
    InvalidInspection(String),

    // Lineage errors
    #[error("Lineage lookup failed ({operation}): {reason}")]
    LineageLookup { operation: String, reason: String },

    // Engine errors
    #[error("Analysis engine failed: {0}")]
    EngineFailure(String),

    #[error("Report splitting failed: {0}")]
    SplitFailure(String),

    // Cache errors
    #[error("Task cache corrupted at {path}: {reason}")]
    CacheCorruption { path: PathBuf, reason: String },

    #[error("Timed out after {secs}s waiting for run lock {path}")]
    LockTimeout { path: PathBuf, secs: u64 },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Interrupted by {0}")]
    Interrupted(String),

    // General errors
    #[error("Infrastructure error: {0}")]
    Infrastructure(String),
}

impl DriverError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create an invalid identifier error
    pub fn invalid_nvr(nvr: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            nvr: nvr.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid task parameter error
    pub fn invalid_task(
        field: &'static str,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidTask {
            field,
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a lineage lookup error
    pub fn lookup(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LineageLookup {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a cache corruption error
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CacheCorruption {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Check if a later invocation could succeed by retrying
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::LineageLookup { .. } | Self::LockTimeout { .. } | Self::CommandFailed { .. }
        )
    }

    /// Status reported to CI for this error
    pub fn ci_status(&self) -> CiStatus {
        CiStatus::Error
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::LineageLookup { .. } => {
                Some("Check build system connectivity; the task can be retried safely")
            }
            Self::CacheCorruption { .. } => {
                Some("Remove the task working directory to force a fresh run")
            }
            Self::LockTimeout { .. } => Some("Raise cache.lock_timeout_secs"),
            Self::InvalidTask { .. } => {
                Some("Usage: inspect-runner <TASK_ID> <PREVIOUS_TAG> <TEST_NAME>")
            }
            _ => None,
        }
    }
}
