//! Track and classification models.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One output media stream produced by remux.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Extracted file in the temporary directory.
    pub path: PathBuf,
    /// Title index reported by the remux tool.
    pub index: u32,
    /// Container duration in seconds, if the probe could read it.
    pub duration_secs: Option<f64>,
    /// File size at extraction time.
    pub size_bytes: u64,
    /// Audio language tags.
    #[serde(default)]
    pub languages: Vec<String>,
    /// Any stream flagged default.
    #[serde(default)]
    pub default_flag: bool,
    /// Any stream flagged forced.
    #[serde(default)]
    pub forced_flag: bool,
}

impl Track {
    /// File extension, defaulting to mkv.
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_else(|| "mkv".to_string())
    }
}

/// What a track is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Role {
    /// The primary movie content.
    MainFeature,
    /// Extra content, numbered in track order.
    Bonus { ordinal: u32 },
    /// A single episode.
    EpisodeSingle { episode: u32 },
    /// Two episodes in one track, starting at `first`.
    EpisodeDouble { first: u32 },
    /// Several episodes back to back.
    PlayAll { ordinal: u32 },
    /// Could not be classified; named by the fallback policy.
    Fallback { ordinal: u32 },
}

impl Role {
    /// Episode number or ordinal within the disc.
    pub fn rank(&self) -> Option<u32> {
        match *self {
            Role::MainFeature => None,
            Role::Bonus { ordinal } | Role::PlayAll { ordinal } | Role::Fallback { ordinal } => {
                Some(ordinal)
            }
            Role::EpisodeSingle { episode } => Some(episode),
            Role::EpisodeDouble { first } => Some(first),
        }
    }

    /// Short lowercase label.
    pub fn label(&self) -> &'static str {
        match self {
            Role::MainFeature => "main_feature",
            Role::Bonus { .. } => "bonus",
            Role::EpisodeSingle { .. } => "episode_single",
            Role::EpisodeDouble { .. } => "episode_double",
            Role::PlayAll { .. } => "play_all",
            Role::Fallback { .. } => "fallback",
        }
    }

    /// First episode number this role covers.
    pub fn first_episode(&self) -> Option<u32> {
        match *self {
            Role::EpisodeSingle { episode } => Some(episode),
            Role::EpisodeDouble { first } => Some(first),
            _ => None,
        }
    }

    /// Last episode number this role consumes.
    pub fn last_episode(&self) -> Option<u32> {
        match *self {
            Role::EpisodeSingle { episode } => Some(episode),
            Role::EpisodeDouble { first } => Some(first + 1),
            _ => None,
        }
    }
}

/// How the role was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Heuristic,
    Fallback,
}

/// One outcome per track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub track: Track,
    pub role: Role,
    pub confidence: Confidence,
}

impl ClassificationResult {
    pub fn rank(&self) -> Option<u32> {
        self.role.rank()
    }
}
