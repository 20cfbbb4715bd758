//! Library placer module.
//!
//! Computes library paths for classified tracks, moves them there, and only
//! removes source material after every placed file checks out.

use crate::core::parser;
use crate::generators::{filename, folder};
use crate::models::config::PlacementConfig;
use crate::models::disc::{Category, DiscSource, TitleInfo};
use crate::models::record::PlacedFile;
use crate::models::track::{ClassificationResult, Role};
use crate::services::ffprobe::MetadataProbe;
use crate::utils::fs as fsutil;
use crate::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One intended move.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedMove {
    pub from: PathBuf,
    /// Target before collision handling.
    pub to: PathBuf,
    pub role: Role,
    pub size_bytes: u64,
    pub duration_secs: Option<f64>,
}

/// Outcome of placing one disc.
#[derive(Debug, Clone, Default)]
pub struct PlacementReport {
    /// Intended moves, in track order.
    pub planned: Vec<PlannedMove>,
    /// Files now in the library (empty in dry-run mode).
    pub placed: Vec<PlacedFile>,
    /// Collisions, defaulted seasons and similar.
    pub warnings: Vec<String>,
    /// Moves that did not happen.
    pub failures: Vec<String>,
}

impl PlacementReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Season directories that received episodes.
    pub fn season_dirs(&self) -> Vec<PathBuf> {
        season_dirs(&self.placed)
    }
}

/// Season directories holding any of the placed files.
pub fn season_dirs(placed: &[PlacedFile]) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = placed
        .iter()
        .filter_map(|p| p.to.parent().map(Path::to_path_buf))
        .filter(|d| {
            d.file_name()
                .map(|n| n.to_string_lossy().starts_with("season "))
                .unwrap_or(false)
        })
        .collect();
    dirs.sort();
    dirs.dedup();
    dirs
}

/// Title metadata derived from the disc's folder names.
pub fn title_info(disc: &DiscSource) -> TitleInfo {
    match disc.category {
        Category::Tv => {
            let (series, season, _) = parser::series_info(&disc.item_root);
            let (title, year, version) = parser::parse_name_year(&series);
            TitleInfo {
                title: if title.is_empty() { disc.display.clone() } else { title },
                year,
                season: disc.season.or(season),
                version,
            }
        }
        Category::Movies | Category::Unknown => {
            let mut name = parser::item_name(&disc.item_root);
            if parser::recognizable_title(&name).is_none() {
                if let Some(parent) = disc.item_root.parent().and_then(|p| p.file_name()) {
                    let parent = parent.to_string_lossy().to_string();
                    if parser::recognizable_title(&parent).is_some() {
                        name = parent;
                    }
                }
            }
            let (title, year, version) = parser::parse_name_year(&name);
            TitleInfo {
                title: if title.is_empty() { disc.display.clone() } else { title },
                year,
                season: None,
                version,
            }
        }
    }
}

/// What gets deleted once placement is verified: the item folder, or just
/// the disc folder when it sits directly inside a category folder.
pub fn removal_target(root_path: &Path, item_root: &Path) -> PathBuf {
    let is_category_dir = item_root
        .file_name()
        .map(|n| {
            let n = n.to_string_lossy().to_lowercase();
            n == "movies" || n == "tv"
        })
        .unwrap_or(true);

    if is_category_dir && !root_path.as_os_str().is_empty() {
        root_path.to_path_buf()
    } else {
        item_root.to_path_buf()
    }
}

/// Moves classified tracks into the library.
pub struct LibraryPlacer {
    library_root: PathBuf,
    config: PlacementConfig,
    trailer_max_secs: f64,
    probe: Arc<dyn MetadataProbe>,
}

impl LibraryPlacer {
    pub fn new(
        library_root: &Path,
        config: PlacementConfig,
        trailer_max_secs: f64,
        probe: Arc<dyn MetadataProbe>,
    ) -> Self {
        Self {
            library_root: library_root.to_path_buf(),
            config,
            trailer_max_secs,
            probe,
        }
    }

    /// Compute target paths without touching the filesystem.
    pub fn plan(
        &self,
        disc: &DiscSource,
        results: &[ClassificationResult],
        title: &TitleInfo,
    ) -> (Vec<PlannedMove>, Vec<String>) {
        let mut warnings = Vec::new();
        let fallback_name = parser::recognizable_title(&parser::item_name(&disc.item_root));

        let base = match disc.category {
            Category::Movies => self.library_root.join("movies").join(folder::movie_folder(title)),
            Category::Tv => {
                let season = title.season.unwrap_or_else(|| {
                    warnings.push(format!("no season found for {}, using season 1", disc.display));
                    1
                });
                self.library_root
                    .join("tv")
                    .join(folder::series_folder(title))
                    .join(folder::season_folder(season))
            }
            Category::Unknown => self
                .library_root
                .join(&self.config.fallback_dir)
                .join(folder::movie_folder(title)),
        };
        let season = title.season.unwrap_or(1);

        let mut extras = 0;
        let mut trailers = 0;
        let mut planned = Vec::with_capacity(results.len());

        for result in results {
            let track = &result.track;
            let ext = track.extension();

            let to = match result.role {
                Role::MainFeature => base.join(filename::main_feature_filename(title, &ext)),
                Role::Bonus { .. } => {
                    let is_trailer = track
                        .duration_secs
                        .map(|d| d <= self.trailer_max_secs)
                        .unwrap_or(false);
                    if is_trailer {
                        trailers += 1;
                        base.join("trailers")
                            .join(filename::trailer_filename(title, trailers, &ext))
                    } else {
                        extras += 1;
                        base.join("extras")
                            .join(filename::bonus_filename(title, extras, &ext))
                    }
                }
                Role::EpisodeSingle { episode } => {
                    base.join(filename::episode_filename(&title.title, season, episode, None, &ext))
                }
                Role::EpisodeDouble { first } => base.join(filename::episode_filename(
                    &title.title,
                    season,
                    first,
                    Some(first + 1),
                    &ext,
                )),
                Role::PlayAll { ordinal } => base
                    .join("extras")
                    .join(filename::play_all_filename(&title.title, ordinal, &ext)),
                Role::Fallback { ordinal } => base
                    .join(&self.config.fallback_dir)
                    .join(filename::fallback_filename(fallback_name.as_deref(), ordinal, &ext)),
            };

            planned.push(PlannedMove {
                from: track.path.clone(),
                to,
                role: result.role,
                size_bytes: track.size_bytes,
                duration_secs: track.duration_secs,
            });
        }

        (planned, warnings)
    }

    /// Whether an interrupted placement can be picked up again: every track
    /// is either still extracted or already sits at its library destination.
    pub fn can_resume(
        &self,
        disc: &DiscSource,
        results: &[ClassificationResult],
        title: &TitleInfo,
        previous: &[PlacedFile],
    ) -> bool {
        let (planned, _) = self.plan(disc, results, title);
        !planned.is_empty()
            && planned
                .iter()
                .all(|mv| mv.from.exists() || already_placed(mv, previous).is_some())
    }

    /// Move every classified track into the library.
    ///
    /// `previous` holds placements recorded by an interrupted earlier run;
    /// tracks already moved there are kept instead of being reported missing.
    /// Move failures are collected in the report, not returned as errors.
    pub fn place(
        &self,
        disc: &DiscSource,
        results: &[ClassificationResult],
        title: &TitleInfo,
        previous: &[PlacedFile],
        dry_run: bool,
    ) -> Result<PlacementReport> {
        let (planned, warnings) = self.plan(disc, results, title);
        let mut report = PlacementReport {
            planned,
            warnings,
            ..Default::default()
        };

        if dry_run {
            for mv in &report.planned {
                tracing::info!("[DRY-RUN] Move: {} -> {}", mv.from.display(), mv.to.display());
            }
            return Ok(report);
        }

        for mv in &report.planned {
            if !mv.from.exists() {
                match already_placed(mv, previous) {
                    Some(placed) => {
                        tracing::debug!("Already placed: {}", placed.to.display());
                        report.placed.push(placed);
                    }
                    None => report
                        .failures
                        .push(format!("source missing: {}", mv.from.display())),
                }
                continue;
            }

            let target = fsutil::unique_path(&mv.to);
            if target != mv.to {
                let warning = format!(
                    "{} exists, placing as {}",
                    mv.to.display(),
                    target.display()
                );
                tracing::warn!("{}", warning);
                report.warnings.push(warning);
            }

            match fsutil::move_file(&mv.from, &target) {
                Ok(()) => {
                    tracing::info!("Moved: {} -> {}", mv.from.display(), target.display());
                    report.placed.push(PlacedFile {
                        from: mv.from.clone(),
                        to: target,
                        size_bytes: mv.size_bytes,
                        duration_secs: mv.duration_secs,
                    });
                }
                Err(e) => {
                    tracing::error!("Move failed: {} - {}", mv.from.display(), e);
                    report
                        .failures
                        .push(format!("{}: {}", mv.from.display(), e));
                }
            }
        }

        report.failures.extend(self.verify(&report.placed));
        Ok(report)
    }

    /// Check every placed file; returns one message per problem.
    pub fn verify(&self, placed: &[PlacedFile]) -> Vec<String> {
        let mut failures = Vec::new();

        for file in placed {
            let size = match std::fs::metadata(&file.to) {
                Ok(meta) => meta.len(),
                Err(_) => {
                    failures.push(format!("missing: {}", file.to.display()));
                    continue;
                }
            };
            if size == 0 {
                failures.push(format!("empty: {}", file.to.display()));
                continue;
            }
            if size != file.size_bytes {
                failures.push(format!(
                    "size mismatch: {} ({} bytes, expected {})",
                    file.to.display(),
                    size,
                    file.size_bytes
                ));
                continue;
            }

            if let Some(expected) = file.duration_secs {
                let actual = self.probe.probe(&file.to).and_then(|m| m.duration_secs);
                if let Some(actual) = actual {
                    if (actual - expected).abs() > self.config.duration_tolerance_secs {
                        failures.push(format!(
                            "duration mismatch: {} ({:.1}s, expected {:.1}s)",
                            file.to.display(),
                            actual,
                            expected
                        ));
                    }
                }
            }
        }

        failures
    }

    /// Verify placed files, then remove the temp directory and, when
    /// configured, the disc source.
    ///
    /// Nothing is deleted if any file fails verification.
    pub fn finalize(
        &self,
        placed: &[PlacedFile],
        temp_dir: &Path,
        source: &Path,
        dry_run: bool,
    ) -> Result<()> {
        let failures = self.verify(placed);
        if !failures.is_empty() {
            return Err(crate::Error::PlacementIncomplete { failures });
        }

        if dry_run {
            tracing::info!("[DRY-RUN] Remove: {}", temp_dir.display());
            if self.config.delete_originals {
                tracing::info!("[DRY-RUN] Remove: {}", source.display());
            }
            return Ok(());
        }

        fsutil::remove_path(temp_dir)?;
        if self.config.delete_originals {
            fsutil::remove_path(source)?;
            tracing::info!("Removed source: {}", source.display());
        }
        Ok(())
    }
}

/// A track moved by an earlier run: its previous placement, or the planned
/// target when it already holds a file of the recorded size.
fn already_placed(mv: &PlannedMove, previous: &[PlacedFile]) -> Option<PlacedFile> {
    let size_matches = |path: &Path| {
        std::fs::metadata(path)
            .map(|m| m.len() == mv.size_bytes)
            .unwrap_or(false)
    };

    if let Some(prev) = previous.iter().find(|p| p.from == mv.from) {
        if size_matches(&prev.to) {
            return Some(prev.clone());
        }
    }

    size_matches(&mv.to).then(|| PlacedFile {
        from: mv.from.clone(),
        to: mv.to.clone(),
        size_bytes: mv.size_bytes,
        duration_secs: mv.duration_secs,
    })
}
