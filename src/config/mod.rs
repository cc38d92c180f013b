//! Configuration management for inspect-runner

pub mod schema;

pub use schema::Config;

use crate::error::{DriverError, DriverResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use toml::Value;
use tracing::debug;

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("inspect-runner")
            .join("config.toml")
    }

    /// Get the default base working directory (tasks live underneath)
    pub fn default_workdir() -> PathBuf {
        std::env::temp_dir().join("inspect-runner")
    }

    /// Load configuration (defaults when the file does not exist) with an
    /// optional profile overlay merged on top.
    ///
    /// A profile without an overlay file only selects the engine profile.
    pub async fn load_merged(&self, profile: Option<&str>) -> DriverResult<Config> {
        let mut document = if self.config_path.exists() {
            read_document(&self.config_path).await?
        } else {
            debug!("Config file not found, using defaults");
            Value::Table(Default::default())
        };

        if let Some(name) = profile {
            let base: Config = into_config(document.clone(), &self.config_path)?;
            let profile_path = self.profile_path(&base, name);
            if profile_path.exists() {
                debug!("Merging profile {} from {}", name, profile_path.display());
                let overlay = read_document(&profile_path).await?;
                document = deep_merge(document, overlay);
            } else {
                debug!("No overlay for profile {} at {}", name, profile_path.display());
            }
        }

        into_config(document, &self.config_path)
    }

    /// Path of a profile overlay file
    pub fn profile_path(&self, config: &Config, name: &str) -> PathBuf {
        let dir = config.engine.profile_dir.clone().unwrap_or_else(|| {
            self.config_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("profiles")
        });
        dir.join(format!("{}.toml", name))
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

async fn read_document(path: &Path) -> DriverResult<Value> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| DriverError::io(format!("reading config from {}", path.display()), e))?;

    toml::from_str::<toml::Table>(&content)
        .map(Value::Table)
        .map_err(|e| DriverError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

fn into_config(document: Value, path: &Path) -> DriverResult<Config> {
    Value::try_into::<Config>(document).map_err(|e| DriverError::ConfigInvalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Deep merge two TOML values.
///
/// Tables merge by key (recursively); arrays and scalars from the overlay
/// replace the base value.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Table(mut base_map), Value::Table(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Table(base_map)
        }
        (_, overlay) => overlay,
    }
}
