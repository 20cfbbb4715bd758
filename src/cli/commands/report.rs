//! Report command implementation.

use crate::cli::args::ReportFormat;
use crate::core::store::RecordStore;
use crate::models::config::Config;
use crate::models::record::{RunRecord, Stage};
use crate::Result;
use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;

/// One line of the report.
#[derive(Debug, Serialize)]
pub struct ReportRow {
    pub signature: String,
    pub category: String,
    pub stage: Stage,
    pub last_completed: Stage,
    pub entry_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub placed_files: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episodes: Option<String>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<&RunRecord> for ReportRow {
    fn from(record: &RunRecord) -> Self {
        Self {
            signature: record.signature.clone(),
            category: record.category.to_string(),
            stage: record.stage,
            last_completed: record.last_completed,
            entry_path: record.entry_path.display().to_string(),
            error_kind: record.error_kind.map(|k| k.to_string()),
            error_message: record.error_message.clone(),
            placed_files: record.placements.len(),
            episodes: match (record.first_episode, record.last_episode) {
                (Some(first), Some(last)) if first < last => {
                    Some(format!("E{:02}-E{:02}", first, last))
                }
                (_, Some(last)) => Some(format!("E{:02}", last)),
                _ => None,
            },
            updated_at: record.updated_at,
        }
    }
}

/// Records per stage.
pub fn stage_counts(records: &[RunRecord]) -> BTreeMap<Stage, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(record.stage).or_insert(0) += 1;
    }
    counts
}

/// Print the state of all recorded discs.
pub async fn report(config: &Config, failed_only: bool, format: ReportFormat) -> Result<()> {
    let store = RecordStore::open_existing(&config.paths.state_dir);
    let records = store.list()?;

    let rows: Vec<ReportRow> = records
        .iter()
        .filter(|r| !failed_only || r.stage == Stage::Failed)
        .map(ReportRow::from)
        .collect();

    if format == ReportFormat::Json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{}", "[REPORT] Recorded discs".bold().cyan());
    println!();

    if records.is_empty() {
        println!("No records found in {}", store.dir().display());
        return Ok(());
    }

    for (stage, count) in stage_counts(&records) {
        let label = format!("{:<12}", stage.to_string());
        let label = match stage {
            Stage::Done => label.green(),
            Stage::Failed => label.red(),
            _ => label.normal(),
        };
        println!("  {} {}", label, count);
    }
    println!();

    println!(
        "{:<14} {:<8} {:<12} {}",
        "Signature".bold(),
        "Type".bold(),
        "Stage".bold(),
        "Entry".bold()
    );
    println!("{}", "-".repeat(80));

    for row in &rows {
        let stage = if row.stage == Stage::Failed {
            format!("failed@{}", row.last_completed).red()
        } else {
            row.stage.to_string().normal()
        };
        println!(
            "{:<14} {:<8} {:<12} {}",
            &row.signature[..row.signature.len().min(12)],
            row.category,
            stage,
            row.entry_path
        );
        if let Some(episodes) = &row.episodes {
            println!("  {} episodes {}", "->".cyan(), episodes);
        }
        if let (Some(kind), Some(message)) = (&row.error_kind, &row.error_message) {
            println!("  {} {}: {}", "->".yellow(), kind, message);
        }
    }

    println!();
    println!("State directory: {}", store.dir().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::disc::{Category, DiscKind, DiscSource};
    use crate::models::record::ErrorKind;
    use std::path::PathBuf;

    fn record(name: &str) -> RunRecord {
        let root = PathBuf::from("/d/tv").join(name);
        let disc = DiscSource {
            root_path: root.join("BDMV"),
            kind: DiscKind::Bdmv,
            entry_path: root.join("BDMV/index.bdmv"),
            item_root: root.clone(),
            category: Category::Tv,
            display: name.to_string(),
            season: Some(1),
            disc_no: Some(2),
            size_bytes: 0,
            modified: chrono::Utc::now(),
            discovered_at: chrono::Utc::now(),
            signature: format!("sig-{}", name),
        };
        RunRecord::new(&disc, PathBuf::from("/w").join(name))
    }

    #[test]
    fn test_row_shows_episode_range() {
        let mut r = record("Lost S01 D2");
        r.first_episode = Some(5);
        r.last_episode = Some(8);
        assert_eq!(ReportRow::from(&r).episodes.as_deref(), Some("E05-E08"));

        r.first_episode = Some(5);
        r.last_episode = Some(5);
        assert_eq!(ReportRow::from(&r).episodes.as_deref(), Some("E05"));

        assert!(ReportRow::from(&record("Heat")).episodes.is_none());
    }

    #[test]
    fn test_stage_counts() {
        let mut failed = record("a");
        failed.fail(ErrorKind::RemuxTimeout, "timed out");
        let mut done = record("b");
        done.advance(Stage::Done);

        let counts = stage_counts(&[failed, done, record("c")]);
        assert_eq!(counts.get(&Stage::Failed), Some(&1));
        assert_eq!(counts.get(&Stage::Done), Some(&1));
        assert_eq!(counts.get(&Stage::Scanned), Some(&1));
    }
}
