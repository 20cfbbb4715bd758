//! MakeMKV preflight check.

use super::CheckResult;
use crate::utils::fs as fsutil;

/// Check that the remux tool is on PATH.
pub fn check(binary: &str) -> CheckResult {
    match fsutil::find_executable(binary) {
        Some(path) => CheckResult::ok(binary, &format!("found ({})", path.display())),
        None => CheckResult::fail(
            binary,
            "not found",
            "Install MakeMKV and make sure makemkvcon is in PATH",
        ),
    }
}
