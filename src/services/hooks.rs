//! Extension points called by the orchestrator.

use crate::core::orchestrator::RunSummary;
use crate::generators::filename;
use crate::models::config::MkvMatchConfig;
use crate::utils::fs as fsutil;
use crate::Result;
use colored::Colorize;
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// A TV season directory that just received placed episodes.
#[derive(Debug, Clone)]
pub struct SeasonPlaced {
    pub series: String,
    pub season: u16,
    pub season_dir: PathBuf,
    pub dry_run: bool,
}

/// Runs after a TV disc has been placed. Failures are reported as warnings.
pub trait EpisodeMatchHook: Send + Sync {
    fn season_placed<'a>(&'a self, event: &'a SeasonPlaced) -> BoxFuture<'a, Result<()>>;
}

/// Hook that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHook;

impl EpisodeMatchHook for NoHook {
    fn season_placed<'a>(&'a self, _event: &'a SeasonPlaced) -> BoxFuture<'a, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// Runs `mkv-match --show-dir DIR --season N`, then renames its output back
/// to the library schema.
#[derive(Debug, Clone)]
pub struct MkvMatchHook {
    config: MkvMatchConfig,
}

impl MkvMatchHook {
    pub fn new(config: MkvMatchConfig) -> Self {
        Self { config }
    }

    pub fn args(&self, event: &SeasonPlaced) -> Vec<String> {
        let mut args = vec![
            "--show-dir".to_string(),
            event.season_dir.display().to_string(),
            "--season".to_string(),
            event.season.to_string(),
        ];
        args.extend(self.config.extra_args.iter().cloned());
        args
    }

    async fn run(&self, event: &SeasonPlaced) -> Result<()> {
        if fsutil::find_executable(&self.config.binary).is_none() {
            tracing::info!("{} not found in PATH, hook skipped", self.config.binary);
            return Ok(());
        }

        let args = self.args(event);
        if event.dry_run {
            tracing::info!("[DRY-RUN] {} {}", self.config.binary, args.join(" "));
            return Ok(());
        }

        tracing::info!("[HOOK] {} {}", self.config.binary, args.join(" "));
        let output = Command::new(&self.config.binary).args(&args).output().await?;
        if !output.status.success() {
            return Err(crate::Error::other(format!(
                "{} exited with {}: {}",
                self.config.binary,
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        if self.config.rename_to_schema {
            normalize_season_dir(&event.season_dir, &event.series)?;
        }
        Ok(())
    }
}

impl EpisodeMatchHook for MkvMatchHook {
    fn season_placed<'a>(&'a self, event: &'a SeasonPlaced) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.run(event))
    }
}

/// Rename `SxxEyy` files in a season directory to the library schema.
///
/// Returns the number of renamed files.
pub fn normalize_season_dir(season_dir: &Path, series: &str) -> Result<usize> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(season_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && fsutil::is_video_file(p))
        .collect();
    files.sort();

    let mut renamed = 0;
    for file in files {
        let name = match file.file_name() {
            Some(name) => name.to_string_lossy().to_string(),
            None => continue,
        };
        let Some(new_name) = filename::normalize_episode_name(&name, series) else {
            continue;
        };
        if new_name == name {
            continue;
        }

        let target = fsutil::unique_path(&season_dir.join(&new_name));
        match std::fs::rename(&file, &target) {
            Ok(()) => {
                tracing::info!("Renamed {} -> {}", name, target.display());
                renamed += 1;
            }
            Err(e) => tracing::warn!("Rename failed for {}: {}", name, e),
        }
    }
    Ok(renamed)
}

/// Receives the run summary at the end of a run.
pub trait Notifier: Send + Sync {
    fn notify(&self, summary: &RunSummary);
}

/// Writes the summary to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, summary: &RunSummary) {
        let line = summary.one_line();
        if summary.failed > 0 || summary.halted {
            tracing::warn!("{}", line.yellow());
        } else {
            tracing::info!("{}", line.green());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mkv_match_args() {
        let hook = MkvMatchHook::new(MkvMatchConfig::default());
        let event = SeasonPlaced {
            series: "Lost".to_string(),
            season: 2,
            season_dir: PathBuf::from("/lib/tv/Lost (2004)/season 02"),
            dry_run: false,
        };
        assert_eq!(
            hook.args(&event),
            vec!["--show-dir", "/lib/tv/Lost (2004)/season 02", "--season", "2"]
        );
    }

    #[test]
    fn test_normalize_season_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Lost.S01E01.Pilot.mkv"), b"a").unwrap();
        std::fs::write(dir.path().join("Lost - S01E02.mkv"), b"b").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"c").unwrap();

        let renamed = normalize_season_dir(dir.path(), "Lost").unwrap();
        assert_eq!(renamed, 1);
        assert!(dir.path().join("Lost - S01E01 - Pilot.mkv").exists());
        assert!(dir.path().join("Lost - S01E02.mkv").exists());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn test_missing_binary_is_skipped() {
        let mut config = MkvMatchConfig::default();
        config.binary = "definitely-not-mkv-match".to_string();
        let hook = MkvMatchHook::new(config);
        let event = SeasonPlaced {
            series: "Lost".to_string(),
            season: 1,
            season_dir: PathBuf::from("/nonexistent"),
            dry_run: false,
        };
        assert!(hook.season_placed(&event).await.is_ok());
    }
}
