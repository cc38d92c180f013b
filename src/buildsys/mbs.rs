//! Module build service client (HTTP, via ureq)

use super::{with_retries, ModuleService, RetryPolicy};
use crate::config::schema::ModuleServiceConfig;
use crate::error::{DriverError, DriverResult};
use crate::nvr::Nvr;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// Subset of a module build record used to synthesize the NVR
#[derive(Debug, Deserialize)]
struct ModuleBuild {
    name: String,
    stream: String,
    /// Served as a string by current deployments, as a number by older ones
    version: Value,
    context: String,
}

impl ModuleBuild {
    fn nvr(&self) -> DriverResult<Nvr> {
        let version = match &self.version {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            other => {
                return Err(DriverError::lookup(
                    "module build",
                    format!("unexpected version field: {}", other),
                ))
            }
        };
        Ok(Nvr::module(&self.name, &self.stream, &version, &self.context))
    }
}

/// HTTP client for the module build service
pub struct MbsClient {
    url: String,
    policy: RetryPolicy,
}

impl MbsClient {
    pub fn new(config: &ModuleServiceConfig) -> Self {
        Self {
            url: config.url.trim_end_matches('/').to_string(),
            policy: RetryPolicy::new(
                config.timeout_secs,
                config.retries,
                config.retry_delay_secs,
            ),
        }
    }

    /// One GET of the module build record, run on the blocking pool
    async fn fetch(&self, build_id: &str) -> DriverResult<String> {
        let url = format!("{}/{}", self.url, build_id);
        let timeout = self.policy.timeout;
        debug!("GET {}", url);

        tokio::task::spawn_blocking(move || {
            let agent: ureq::Agent = ureq::Agent::config_builder()
                .timeout_global(Some(timeout))
                .build()
                .into();

            let mut response = agent
                .get(&url)
                .call()
                .map_err(|e| DriverError::lookup("module build", format!("{}: {}", url, e)))?;

            response
                .body_mut()
                .read_to_string()
                .map_err(|e| DriverError::lookup("module build", format!("{}: {}", url, e)))
        })
        .await
        .map_err(|e| DriverError::Infrastructure(format!("module lookup task failed: {}", e)))?
    }
}

#[async_trait]
impl ModuleService for MbsClient {
    async fn module_nvr(&self, build_id: &str) -> DriverResult<Nvr> {
        let body = with_retries("module build", self.policy, || self.fetch(build_id)).await?;
        parse_module_build(&body)
    }
}

fn parse_module_build(body: &str) -> DriverResult<Nvr> {
    let build: ModuleBuild = serde_json::from_str(body)
        .map_err(|e| DriverError::lookup("module build", format!("malformed response: {}", e)))?;
    build.nvr()
}
