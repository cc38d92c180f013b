//! Build lineage: which prior build an after-build is compared against
//!
//! # Selection
//!
//! CI tags builds automatically, so by the time the driver runs the build
//! under test is often already the latest build in the comparison tag. The
//! resolver therefore never returns the after-build itself: when the latest
//! tagged build equals the after-build it looks exactly one step further
//! back. An absent before-build (first build of a package) is a normal
//! outcome, not an error.

mod resolve;

pub use resolve::{resolve_before, resolve_before_module};

use crate::nvr::Nvr;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a build record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildKind {
    /// Regular build task
    Task,
    /// Module build, NVR synthesized as `name-stream-version.context`
    Module,
}

/// A build taking part in a comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRecord {
    pub nvr: Nvr,
    pub kind: BuildKind,
}

impl BuildRecord {
    pub fn task(nvr: Nvr) -> Self {
        Self {
            nvr,
            kind: BuildKind::Task,
        }
    }

    pub fn module(nvr: Nvr) -> Self {
        Self {
            nvr,
            kind: BuildKind::Module,
        }
    }
}

impl fmt::Display for BuildRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.nvr)
    }
}

/// The (before, after) pair handed to the analysis engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineagePair {
    pub after: BuildRecord,
    pub before: Option<BuildRecord>,
}

impl LineagePair {
    /// Pair an after-build with its resolved predecessor.
    ///
    /// A predecessor equal to the after-build is dropped.
    pub fn new(after: BuildRecord, before: Option<BuildRecord>) -> Self {
        let before = before.filter(|b| b.nvr != after.nvr);
        Self { after, before }
    }

    /// Whether there is a regression baseline to compare against
    pub fn has_baseline(&self) -> bool {
        self.before.is_some()
    }
}

impl fmt::Display for LineagePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.before {
            Some(before) => write!(f, "{} -> {}", before, self.after),
            None => write!(f, "{} (no baseline)", self.after),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nvr(s: &str) -> Nvr {
        Nvr::parse(s).unwrap()
    }

    #[test]
    fn pair_never_compares_build_with_itself() {
        let after = BuildRecord::task(nvr("foo-1.2-3.fc37"));
        let pair = LineagePair::new(after.clone(), Some(after));
        assert!(!pair.has_baseline());
    }

    #[test]
    fn pair_drops_listing_copy_of_module_after() {
        let after = BuildRecord::module(Nvr::module("nodejs", "18", "3720230601", "6c81f848"));
        let listed = BuildRecord::module(Nvr::parse("nodejs-18-3720230601.6c81f848").unwrap());
        let pair = LineagePair::new(after, Some(listed));
        assert_eq!(pair.before, None);
    }

    #[test]
    fn pair_display() {
        let pair = LineagePair::new(
            BuildRecord::task(nvr("foo-1.2-3.fc37")),
            Some(BuildRecord::task(nvr("foo-1.1-2.fc37"))),
        );
        assert_eq!(pair.to_string(), "foo-1.1-2.fc37 -> foo-1.2-3.fc37");

        let standalone = LineagePair::new(BuildRecord::task(nvr("foo-1.2-3.fc37")), None);
        assert_eq!(standalone.to_string(), "foo-1.2-3.fc37 (no baseline)");
    }
}
