//! Exit-code translation for the CI layer
//!
//! The engine reports through a small set of status codes. Anything outside
//! that set (a crashed subprocess, a signal, an unexpected return) is folded
//! into the infrastructure error code so CI never sees an ambiguous status.
//!
//! | Code | Status |
//! |------|--------|
//! | 0 | Pass |
//! | 1 | Fail (inspection found problems) |
//! | 2 | Error (program or infrastructure error) |
//! | 3 | InsufficientSpace |

use std::fmt;
use std::process::ExitCode;

/// Status codes understood by the CI layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CiStatus {
    Pass,
    Fail,
    Error,
    InsufficientSpace,
}

impl CiStatus {
    /// Numeric process exit code
    pub fn code(self) -> u8 {
        match self {
            Self::Pass => 0,
            Self::Fail => 1,
            Self::Error => 2,
            Self::InsufficientSpace => 3,
        }
    }
}

impl fmt::Display for CiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pass => "PASSED",
            Self::Fail => "FAILED",
            Self::Error => "ERROR",
            Self::InsufficientSpace => "INSUFFICIENT SPACE",
        };
        write!(f, "{}", label)
    }
}

impl From<CiStatus> for ExitCode {
    fn from(status: CiStatus) -> Self {
        ExitCode::from(status.code())
    }
}

/// Translate a raw status code into a CI status.
///
/// Codes 0-3 pass through unchanged; everything else is an infra error.
pub fn translate(code: i32) -> CiStatus {
    match code {
        0 => CiStatus::Pass,
        1 => CiStatus::Fail,
        2 => CiStatus::Error,
        3 => CiStatus::InsufficientSpace,
        _ => CiStatus::Error,
    }
}
