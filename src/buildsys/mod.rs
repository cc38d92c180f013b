//! Build system and module build service clients
//!
//! The resolver only needs two questions answered by the build system
//! (which build did a task produce, and what is tagged) plus one by the
//! module build service (which module build is this). Both sit behind
//! traits so lineage resolution can run against fakes.
//!
//! Every remote call carries a timeout and a capped retry count; a call
//! that exhausts its retries surfaces as `DriverError::LineageLookup`.

mod koji;
mod mbs;

pub use koji::KojiClient;
pub use mbs::MbsClient;

use crate::error::{DriverError, DriverResult};
use crate::nvr::Nvr;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Build system queries used for lineage resolution
#[async_trait]
pub trait BuildSystem: Send + Sync {
    /// NVR of the build produced by a build task
    async fn task_nvr(&self, task_id: &str) -> DriverResult<Nvr>;

    /// Builds of `package` tagged into `tag` (with inheritance).
    ///
    /// `latest = Some(n)` restricts to the n most recent builds, most recent
    /// first. `None` lists every tagged build in the listing's natural order,
    /// which places the most recent last.
    async fn list_tagged(
        &self,
        tag: &str,
        package: &str,
        latest: Option<u32>,
    ) -> DriverResult<Vec<Nvr>>;
}

/// Module build service queries
#[async_trait]
pub trait ModuleService: Send + Sync {
    /// Synthesized `name-stream-version.context` NVR for a module build id
    async fn module_nvr(&self, build_id: &str) -> DriverResult<Nvr>;
}

/// Timeout and retry bounds for one remote call
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(timeout_secs: u64, retries: u32, delay_secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
            retries,
            delay: Duration::from_secs(delay_secs),
        }
    }
}

/// Run `call` until it succeeds, times out `policy.retries + 1` times, or
/// fails with a non-retryable error.
///
/// Delay grows linearly with the attempt number.
pub(crate) async fn with_retries<T, F, Fut>(
    operation: &str,
    policy: RetryPolicy,
    mut call: F,
) -> DriverResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DriverResult<T>>,
{
    let attempts = policy.retries + 1;
    let mut last_error = None;

    for attempt in 1..=attempts {
        let result = match tokio::time::timeout(policy.timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(DriverError::lookup(
                operation,
                format!("timed out after {}s", policy.timeout.as_secs()),
            )),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < attempts => {
                warn!("{} failed (attempt {}/{}): {}", operation, attempt, attempts, e);
                tokio::time::sleep(policy.delay * attempt).await;
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| DriverError::lookup(operation, "no attempts made")))
}
