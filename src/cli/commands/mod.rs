//! CLI command implementations.

pub mod clean;
pub mod report;
pub mod run;
pub mod scan;

use crate::core::locator::{DiscLocator, LocateResult};
use crate::models::config::Config;
use crate::Result;
use std::path::Path;

/// Locate discs under `root`, never descending into the organizer's own
/// directories.
pub fn locate(root: &Path, config: &Config) -> Result<LocateResult> {
    let locator = DiscLocator::new(root)?
        .exclude(&config.paths.work_dir)
        .exclude(&config.paths.state_dir)
        .exclude(&config.paths.library_root);
    Ok(locator.locate())
}

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}
