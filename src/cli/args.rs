//! CLI argument definitions using clap derive

use crate::config::ConfigManager;
use crate::driver::TaskContext;
use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

/// Run differential package inspections for a CI build task
///
/// Each CI step reports one inspection. The first step for a task resolves
/// the before-build, runs the analysis engine once and caches every
/// inspection's result; later steps report from the cache.
#[derive(Parser, Debug)]
#[command(name = "inspect-runner")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Build task id (module build id with --module)
    pub task_id: String,

    /// Tag the previous build is looked up in
    pub previous_tag: String,

    /// Inspection to report
    pub test_name: String,

    /// Configuration file path
    #[arg(short, long, env = "INSPECT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Engine profile (also selects a configuration overlay)
    #[arg(short, long, env = "INSPECT_PROFILE")]
    pub profile: Option<String>,

    /// Base working directory for task caches
    #[arg(short, long, env = "INSPECT_WORKDIR")]
    pub workdir: Option<PathBuf>,

    /// Architectures to inspect
    #[arg(short, long, env = "INSPECT_ARCHES", value_delimiter = ',')]
    pub arches: Vec<String>,

    /// Release string override passed to the engine
    #[arg(short, long, env = "INSPECT_RELEASE")]
    pub release: Option<String>,

    /// Treat TASK_ID as a module build id
    #[arg(
        short,
        long,
        env = "INSPECT_IS_MODULE",
        action = ArgAction::SetTrue,
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub module: bool,

    /// Inspections the engine runs (engine default when unset)
    #[arg(short = 'T', long, env = "INSPECT_TESTS")]
    pub tests: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, env = "INSPECT_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Task parameters shared by every step of the task
    pub fn task_context(&self) -> TaskContext {
        TaskContext {
            task_id: self.task_id.clone(),
            previous_tag: self.previous_tag.clone(),
            is_module: self.module,
            arches: self
                .arches
                .iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
            release: self.release.clone(),
            profile: self.profile.clone(),
            tests: self.tests.clone(),
            workdir: self
                .workdir
                .clone()
                .unwrap_or_else(ConfigManager::default_workdir),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}
