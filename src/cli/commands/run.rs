//! Pipeline commands: `remux`, `rename` and `run`.

use super::locate;
use crate::core::orchestrator::{Orchestrator, RunControl, RunMode, RunOptions, RunSummary, Services};
use crate::core::store::RecordStore;
use crate::models::config::Config;
use crate::Result;
use colored::Colorize;
use std::path::Path;

/// Locate discs under `root` and drive them through the pipeline.
pub async fn run_pipeline(
    root: &Path,
    config: &Config,
    options: RunOptions,
    control: &RunControl,
) -> Result<RunSummary> {
    let header = match options.mode {
        RunMode::Remux => "[REMUX] Extracting tracks...",
        RunMode::Rename => "[RENAME] Classifying and placing tracks...",
        RunMode::Full => "[RUN] Processing discs...",
    };
    println!("{}", header.bold().cyan());
    if options.dry_run {
        println!("{}", "[DRY-RUN] Nothing will be launched or moved".yellow());
    }
    println!();

    let located = locate(root, config)?;
    let store = if options.dry_run {
        RecordStore::open_existing(&config.paths.state_dir)
    } else {
        RecordStore::open(&config.paths.state_dir)?
    };
    let orchestrator = Orchestrator::new(config.clone(), store, Services::from_config(config));

    let summary = orchestrator
        .run(&located.discs, located.review.len(), options, control)
        .await;

    print_summary(&summary);
    Ok(summary)
}

/// Print the run summary.
pub fn print_summary(summary: &RunSummary) {
    println!();
    println!("{}", "[Run Summary]".bold().green());
    println!("  Done: {}", summary.done);
    if summary.reached > 0 {
        println!("  Remuxed: {}", summary.reached);
    }
    if summary.planned > 0 {
        println!("  Planned: {}", summary.planned);
    }
    println!("  Skipped: {}", summary.skipped);
    println!("  Failed: {}", summary.failed);
    if summary.not_attempted > 0 {
        println!("  Not attempted: {}", summary.not_attempted);
    }
    if summary.review > 0 {
        println!("  Needs review: {}", summary.review);
    }

    if !summary.failures.is_empty() {
        println!();
        println!("{}", "[Failures]".bold().red());
        for failure in &summary.failures {
            println!(
                "  {} {} at {}: {}",
                failure.display,
                format!("[{}]", failure.kind).red(),
                failure.stage,
                failure.message
            );
        }
    }

    if summary.halted {
        println!();
        println!(
            "{}",
            "[HALTED] A fatal error stopped the run. Fix it and run again.".bold().red()
        );
    } else if summary.stopped {
        println!();
        println!("{}", "[STOPPED] Run interrupted by user".bold().yellow());
    }
}
