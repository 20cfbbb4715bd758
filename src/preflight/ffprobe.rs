//! FFprobe preflight check.

use super::CheckResult;
use crate::services::ffprobe::FfprobeProbe;

/// Check if ffprobe is installed.
pub fn check(binary: &str) -> CheckResult {
    let probe = FfprobeProbe::new(binary);
    if probe.is_installed() {
        match probe.version() {
            Ok(version) => CheckResult::ok("ffprobe", &format!("installed ({})", version)),
            Err(_) => CheckResult::ok("ffprobe", "installed"),
        }
    } else {
        CheckResult::fail(
            "ffprobe",
            "not found",
            "Install FFmpeg: sudo apt install ffmpeg",
        )
    }
}
