//! Configuration schema for inspect-runner
//!
//! Configuration is stored at `~/.config/inspect-runner/config.toml`,
//! with optional per-profile overlays in `profiles/<name>.toml`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Build system client settings
    pub build_system: BuildSystemConfig,

    /// Module build service settings
    pub module_service: ModuleServiceConfig,

    /// Analysis engine settings
    pub engine: EngineConfig,

    /// Task cache settings
    pub cache: CacheConfig,

    /// Per-inspection enable switches (absent = enabled)
    pub inspections: BTreeMap<String, bool>,

    /// Per-inspection descriptions shown above results
    pub descriptions: BTreeMap<String, String>,
}

impl Config {
    /// Whether an inspection is enabled (default true)
    pub fn inspection_enabled(&self, name: &str) -> bool {
        self.inspections.get(name).copied().unwrap_or(true)
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Write a per-task event log
    pub audit_log: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { audit_log: true }
    }
}

/// Build system (koji) client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSystemConfig {
    /// Client executable
    pub command: String,

    /// Client profile (`koji -p <profile>`)
    pub koji_profile: Option<String>,

    /// Per-call timeout in seconds
    pub timeout_secs: u64,

    /// Attempts after the first failure
    pub retries: u32,

    /// Base delay between attempts in seconds
    pub retry_delay_secs: u64,
}

impl Default for BuildSystemConfig {
    fn default() -> Self {
        Self {
            command: "koji".to_string(),
            koji_profile: None,
            timeout_secs: 120,
            retries: 3,
            retry_delay_secs: 5,
        }
    }
}

/// Module build service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleServiceConfig {
    /// Base URL of the module-builds endpoint
    pub url: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Attempts after the first failure
    pub retries: u32,

    /// Base delay between attempts in seconds
    pub retry_delay_secs: u64,
}

impl Default for ModuleServiceConfig {
    fn default() -> Self {
        Self {
            url: "https://mbs.fedoraproject.org/module-build-service/1/module-builds".to_string(),
            timeout_secs: 60,
            retries: 3,
            retry_delay_secs: 5,
        }
    }
}

/// Analysis engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine executable
    pub command: String,

    /// Engine's own configuration file, passed through with `-c`
    pub config: Option<PathBuf>,

    /// Wall-clock limit for one engine run in seconds (0 = unlimited)
    pub timeout_secs: u64,

    /// Directory holding `<profile>.toml` overlays
    pub profile_dir: Option<PathBuf>,

    /// External report splitter (command + args); built-in JSON splitter if empty
    pub splitter: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: "rpminspect".to_string(),
            config: None,
            timeout_secs: 0,
            profile_dir: None,
            splitter: vec![],
        }
    }
}

/// Task cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a step waits for another step's run to finish
    pub lock_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            lock_timeout_secs: 4 * 60 * 60,
        }
    }
}
