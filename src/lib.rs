//! inspect-runner - CI driver for differential package inspections
//!
//! Resolves which earlier build a freshly built package is compared
//! against, runs the analysis engine once per build task, and reports one
//! inspection per CI step from the shared task cache.

pub mod buildsys;
pub mod cache;
pub mod cli;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod events;
pub mod exit;
pub mod lineage;
pub mod nvr;
pub mod report;
pub mod ui;

pub use error::{DriverError, DriverResult};
