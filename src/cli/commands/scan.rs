//! Scan command implementation.
//!
//! Lists discovered discs by category and records first sightings.

use super::{format_size, locate};
use crate::core::orchestrator::{Orchestrator, Services};
use crate::core::store::RecordStore;
use crate::models::config::Config;
use crate::models::disc::DiscSource;
use crate::Result;
use colored::Colorize;
use std::path::Path;

/// Discover discs under `root`.
pub async fn scan(root: &Path, config: &Config, dry_run: bool) -> Result<()> {
    println!("{}", "[SCAN] Looking for discs...".bold().cyan());
    println!();

    let result = locate(root, config)?;

    let (movies, tv): (Vec<&DiscSource>, Vec<&DiscSource>) = result
        .discs
        .iter()
        .partition(|d| d.category == crate::models::disc::Category::Movies);

    print_group("Movies", &movies);
    print_group("TV", &tv);

    if !result.review.is_empty() {
        println!("{}", "[Needs Review]".bold().yellow());
        for disc in &result.review {
            println!("  {} {}", "?".yellow(), disc.entry_path.display());
        }
        println!();
    }

    if !result.invalid.is_empty() {
        println!("{}", "[Invalid]".bold().red());
        for invalid in &result.invalid {
            println!("  {} {} ({})", "x".red(), invalid.path.display(), invalid.reason);
        }
        println!();
    }

    println!("{}", "[Scan Summary]".bold().green());
    println!("  Movies: {}", movies.len());
    println!("  TV: {}", tv.len());
    println!("  Needs review: {}", result.review.len());
    println!("  Invalid: {}", result.invalid.len());
    if result.duplicates > 0 {
        println!("  Duplicates skipped: {}", result.duplicates);
    }

    if dry_run {
        println!();
        println!("{}", "[DRY-RUN] No records written".yellow());
        return Ok(());
    }

    let store = RecordStore::open(&config.paths.state_dir)?;
    let orchestrator = Orchestrator::new(config.clone(), store, Services::from_config(config));
    let created = orchestrator.record_scanned(&result.discs)?;
    println!("  New records: {}", created);

    Ok(())
}

fn print_group(name: &str, discs: &[&DiscSource]) {
    if discs.is_empty() {
        return;
    }
    println!("{}", format!("[{}]", name).bold());
    for disc in discs {
        let mut hints = Vec::new();
        if let Some(season) = disc.season {
            hints.push(format!("season {}", season));
        }
        if let Some(disc_no) = disc.disc_no {
            hints.push(format!("disc {}", disc_no));
        }
        let hints = if hints.is_empty() {
            String::new()
        } else {
            format!(" [{}]", hints.join(", "))
        };

        println!(
            "  {} {}{} {} {}",
            "+".green(),
            disc.display,
            hints.cyan(),
            format!("({}, {})", disc.kind, format_size(disc.size_bytes)).dimmed(),
            disc.short_signature().dimmed()
        );
    }
    println!();
}
