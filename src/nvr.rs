//! Name-version-release identifiers
//!
//! An NVR is split on its two rightmost hyphens: everything before them is
//! the package name, which may itself contain hyphens. Module builds use the
//! same shape as `name-stream-version.context`, so the "version" slot holds
//! the stream and `name_stream()` recovers the module+stream prefix.
//!
//! Known edge case: a build whose version or release was dropped (for example
//! `python-3-foo`) still parses, and the name comes back as the wrong
//! substring. That input is indistinguishable from a valid NVR by shape alone.

use crate::error::{DriverError, DriverResult};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Parsed build identifier.
///
/// Two NVRs are equal when their name, version and release match. The
/// module context is derived from the release and does not take part, so a
/// module NVR built from service fields equals the same NVR parsed from a
/// tag listing.
#[derive(Debug, Clone)]
pub struct Nvr {
    pub name: String,
    pub version: String,
    pub release: String,
    /// Module context, only set for identifiers parsed as module NVRs
    pub context: Option<String>,
}

impl Nvr {
    /// Parse a regular `name-version-release` identifier
    pub fn parse(s: &str) -> DriverResult<Self> {
        let s = s.trim();
        let mut fields = s.rsplitn(3, '-');
        let release = fields.next().unwrap_or_default();
        let version = fields.next();
        let name = fields.next();

        let (Some(version), Some(name)) = (version, name) else {
            return Err(DriverError::invalid_nvr(
                s,
                "expected at least two hyphen-delimited suffix fields",
            ));
        };

        if name.is_empty() || version.is_empty() || release.is_empty() {
            return Err(DriverError::invalid_nvr(s, "empty name, version or release"));
        }

        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
            release: release.to_string(),
            context: None,
        })
    }

    /// Parse a module `name-stream-version.context` identifier
    pub fn parse_module(s: &str) -> DriverResult<Self> {
        let mut nvr = Self::parse(s)?;
        nvr.context = nvr
            .release
            .rsplit_once('.')
            .map(|(_, context)| context.to_string());
        Ok(nvr)
    }

    /// Build a module identifier from its components.
    ///
    /// Hyphens in the stream are replaced with underscores, matching how
    /// the build system names module builds.
    pub fn module(name: &str, stream: &str, version: &str, context: &str) -> Self {
        Self {
            name: name.to_string(),
            version: stream.replace('-', "_"),
            release: format!("{}.{}", version, context),
            context: Some(context.to_string()),
        }
    }

    /// Module name plus stream (everything but the rightmost field)
    pub fn name_stream(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

impl PartialEq for Nvr {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.version == other.version && self.release == other.release
    }
}

impl Eq for Nvr {}

impl Hash for Nvr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.version.hash(state);
        self.release.hash(state);
    }
}

impl fmt::Display for Nvr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.name, self.version, self.release)
    }
}

impl FromStr for Nvr {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Package name of an NVR (strips version and release)
pub fn package_name(nvr: &str) -> DriverResult<String> {
    Nvr::parse(nvr).map(|n| n.name)
}

/// Name-stream prefix of a module NVR (strips version.context)
pub fn name_stream(nvr: &str) -> DriverResult<String> {
    Nvr::parse(nvr).map(|n| n.name_stream())
}
