//! Configuration model.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory layout.
    pub paths: PathsConfig,
    /// Remux tool settings.
    pub remux: RemuxConfig,
    /// Classification thresholds.
    pub classify: ClassifyConfig,
    /// Library placement settings.
    pub placement: PlacementConfig,
    /// Metadata probe settings.
    pub probe: ProbeConfig,
    /// TMDB configuration.
    pub tmdb: TmdbConfig,
    /// Optional hooks.
    pub hooks: HooksConfig,
    /// Number of discs (or TV season groups) processed at once.
    pub concurrency: Concurrency,
}

/// Worker count, at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Concurrency(pub usize);

impl Default for Concurrency {
    fn default() -> Self {
        Concurrency(1)
    }
}

/// Directory layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root of the organized library (`movies/`, `tv/` live below it).
    pub library_root: PathBuf,
    /// Working directory; extraction happens in `<work_dir>/_tmp/<signature>`.
    pub work_dir: PathBuf,
    /// Run record store.
    pub state_dir: PathBuf,
}

/// Remux tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemuxConfig {
    /// Remux binary name or path.
    pub binary: String,
    /// Extra arguments placed before the `mkv` command.
    pub extra_args: Vec<String>,
    /// Per-disc timeout in seconds.
    pub timeout_secs: u64,
    /// Required free space = disc size x multiplier.
    pub space_multiplier: f64,
    /// Retries for retryable source errors.
    pub max_retries: u32,
    /// Show a progress bar while remuxing.
    pub show_progress: bool,
}

/// Classification thresholds. All durations are seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyConfig {
    /// Shortest track eligible as a main feature.
    pub min_movie_secs: f64,
    /// Shortest track counted towards the episode median.
    pub min_episode_secs: f64,
    /// Longest track counted towards the episode median.
    pub max_episode_secs: f64,
    /// Half-width of the single-episode band around 1.0.
    pub single_tolerance: f64,
    /// Half-width of the double-episode band around 2.0.
    pub double_tolerance: f64,
    /// Ratio at or above which a track is a play-all.
    pub play_all_factor: f64,
    /// First episode number on a disc with no earlier disc.
    pub episode_offset: u32,
    /// Bonus tracks up to this length are filed as trailers.
    pub trailer_max_secs: f64,
}

/// Library placement settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Remove the disc source after verified placement.
    pub delete_originals: bool,
    /// Allowed duration drift between extracted and placed file.
    pub duration_tolerance_secs: f64,
    /// Subfolder for fallback-named tracks.
    pub fallback_dir: String,
}

/// Metadata probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// ffprobe binary name or path.
    pub ffprobe: String,
}

/// TMDB configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbConfig {
    /// API key.
    pub api_key: Option<String>,
    /// Language for responses.
    pub language: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

/// Optional hooks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksConfig {
    /// Episode matcher run on each placed TV season.
    pub mkv_match: MkvMatchConfig,
}

/// `mkv-match` hook settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MkvMatchConfig {
    pub enabled: bool,
    pub binary: String,
    pub extra_args: Vec<String>,
    /// Rename matcher output back to the library schema.
    pub rename_to_schema: bool,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let base = dirs_data_path();
        Self {
            library_root: base.join("library"),
            work_dir: base.join("work"),
            state_dir: base.join("state"),
        }
    }
}

impl Default for RemuxConfig {
    fn default() -> Self {
        Self {
            binary: "makemkvcon".to_string(),
            extra_args: Vec::new(),
            timeout_secs: 4 * 60 * 60,
            space_multiplier: 1.1,
            max_retries: 1,
            show_progress: true,
        }
    }
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            min_movie_secs: 40.0 * 60.0,
            min_episode_secs: 20.0 * 60.0,
            max_episode_secs: 65.0 * 60.0,
            single_tolerance: 0.15,
            double_tolerance: 0.15,
            play_all_factor: 2.85,
            episode_offset: 1,
            trailer_max_secs: 240.0,
        }
    }
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            delete_originals: true,
            duration_tolerance_secs: 5.0,
            fallback_dir: "unsorted".to_string(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            ffprobe: "ffprobe".to_string(),
        }
    }
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            language: "en-US".to_string(),
            timeout_secs: 8,
        }
    }
}

impl Default for MkvMatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            binary: "mkv-match".to_string(),
            extra_args: Vec::new(),
            rename_to_schema: true,
        }
    }
}

impl Config {
    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("TMDB_API_KEY") {
            if !key.trim().is_empty() {
                self.tmdb.api_key = Some(key.trim().to_string());
            }
        }
        if let Ok(library) = std::env::var("DISC_ORGANIZER_LIBRARY") {
            self.paths.library_root = PathBuf::from(library);
        }
        if let Ok(work) = std::env::var("DISC_ORGANIZER_WORK_DIR") {
            self.paths.work_dir = PathBuf::from(work);
        }
    }

    /// Check thresholds for consistency.
    pub fn validate(&self) -> crate::Result<()> {
        let c = &self.classify;
        if c.single_tolerance <= 0.0 || c.single_tolerance >= 0.5 {
            return Err(crate::Error::Config(format!(
                "classify.single_tolerance must be in (0, 0.5), got {}",
                c.single_tolerance
            )));
        }
        if c.double_tolerance <= 0.0 || c.double_tolerance >= 0.5 {
            return Err(crate::Error::Config(format!(
                "classify.double_tolerance must be in (0, 0.5), got {}",
                c.double_tolerance
            )));
        }
        if c.play_all_factor <= 2.0 + c.double_tolerance {
            return Err(crate::Error::Config(format!(
                "classify.play_all_factor ({}) overlaps the double-episode band",
                c.play_all_factor
            )));
        }
        if c.max_episode_secs < c.min_episode_secs {
            return Err(crate::Error::Config(
                "classify.max_episode_secs is below classify.min_episode_secs".to_string(),
            ));
        }
        if self.remux.space_multiplier < 1.0 {
            return Err(crate::Error::Config(format!(
                "remux.space_multiplier must be at least 1.0, got {}",
                self.remux.space_multiplier
            )));
        }
        if self.concurrency.0 == 0 {
            return Err(crate::Error::Config("concurrency must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Root of temporary extraction directories.
    pub fn temp_root(&self) -> PathBuf {
        self.paths.work_dir.join("_tmp")
    }
}

/// Get the configuration directory path.
fn dirs_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("disc_organizer")
}

/// Get the data directory path.
fn dirs_data_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("disc_organizer")
}

/// Default configuration file location.
pub fn default_config_path() -> PathBuf {
    dirs_config_path().join("config.toml")
}

/// Load configuration.
///
/// An explicit path must exist and parse. Without one, the default location
/// is used when present, otherwise defaults apply.
pub fn load_config(explicit: Option<&Path>) -> crate::Result<Config> {
    let mut config = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(crate::Error::PathNotFound(path.display().to_string()));
            }
            parse_config_file(path)?
        }
        None => {
            let path = default_config_path();
            if path.exists() {
                parse_config_file(&path)?
            } else {
                Config::default()
            }
        }
    };

    config.apply_env();
    config.validate()?;
    Ok(config)
}

fn parse_config_file(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| crate::Error::Config(format!("{}: {}", path.display(), e)))
}
