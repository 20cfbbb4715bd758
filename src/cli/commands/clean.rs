//! Clean command implementation.
//!
//! Removes temporary extraction directories that no pending disc needs.

use crate::core::store::RecordStore;
use crate::models::config::Config;
use crate::models::record::Stage;
use crate::utils::fs as fsutil;
use crate::Result;
use colored::Colorize;
use std::collections::HashSet;
use std::path::PathBuf;

/// What a clean pass removed (or would remove).
#[derive(Debug, Default)]
pub struct CleanReport {
    pub temp_dirs: Vec<PathBuf>,
    pub records: Vec<String>,
}

/// Compute and, unless `dry_run`, apply the clean actions.
pub fn clean_state(config: &Config, drop_records: bool, dry_run: bool) -> Result<CleanReport> {
    let store = if dry_run {
        RecordStore::open_existing(&config.paths.state_dir)
    } else {
        RecordStore::open(&config.paths.state_dir)?
    };
    let records = store.list()?;
    let mut report = CleanReport::default();

    let mut known: HashSet<PathBuf> = HashSet::new();
    for record in &records {
        known.insert(record.temp_dir.clone());
        let finished = matches!(record.stage, Stage::Done | Stage::Failed);
        if finished && record.temp_dir.exists() {
            report.temp_dirs.push(record.temp_dir.clone());
        }
        if drop_records && record.stage == Stage::Failed {
            report.records.push(record.signature.clone());
        }
    }

    // Temp dirs without any record are leftovers of deleted records
    let temp_root = config.temp_root();
    if temp_root.is_dir() {
        for entry in std::fs::read_dir(&temp_root)? {
            let path = entry?.path();
            if path.is_dir() && !known.contains(&path) {
                report.temp_dirs.push(path);
            }
        }
    }
    report.temp_dirs.sort();

    if dry_run {
        return Ok(report);
    }

    for dir in &report.temp_dirs {
        fsutil::remove_path(dir)?;
        tracing::debug!("Removed {}", dir.display());
    }
    for signature in &report.records {
        store.remove(signature)?;
    }
    Ok(report)
}

/// Run the clean command.
pub async fn clean(config: &Config, drop_records: bool, dry_run: bool) -> Result<()> {
    println!("{}", "[CLEAN] Removing leftovers...".bold().cyan());
    println!();

    let report = clean_state(config, drop_records, dry_run)?;
    let verb = if dry_run { "Would remove" } else { "Removed" };

    for dir in &report.temp_dirs {
        println!("  {} {}", verb, dir.display());
    }
    for signature in &report.records {
        println!("  {} record {}", verb, &signature[..signature.len().min(12)]);
    }

    println!();
    println!(
        "{} {} temp dirs, {} records",
        format!("[{}]", verb).bold().green(),
        report.temp_dirs.len(),
        report.records.len()
    );
    Ok(())
}
