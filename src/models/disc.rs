//! Disc-related data models.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Physical layout of a discovered disc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscKind {
    Iso,
    Bdmv,
    VideoTs,
}

impl std::fmt::Display for DiscKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscKind::Iso => write!(f, "iso"),
            DiscKind::Bdmv => write!(f, "bdmv"),
            DiscKind::VideoTs => write!(f, "video_ts"),
        }
    }
}

/// Library category, derived from the nearest `movies` / `tv` ancestor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Movies,
    Tv,
    Unknown,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Movies => write!(f, "movies"),
            Category::Tv => write!(f, "tv"),
            Category::Unknown => write!(f, "unknown"),
        }
    }
}

/// One discovered disc unit. Immutable after discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscSource {
    /// Path the locator found (ISO file, `BDMV` or `VIDEO_TS` folder).
    pub root_path: PathBuf,
    /// Disc layout.
    pub kind: DiscKind,
    /// Canonical entry point handed to the remux tool.
    pub entry_path: PathBuf,
    /// Folder holding the disc (or the ISO file itself).
    pub item_root: PathBuf,
    /// Category hint.
    pub category: Category,
    /// Sanitized display name of the item root.
    pub display: String,
    /// Season hint parsed from the item root or its parent.
    pub season: Option<u16>,
    /// Disc number hint parsed from the item root or its parent.
    pub disc_no: Option<u16>,
    /// Total size in bytes (ISO size, or recursive folder size).
    pub size_bytes: u64,
    /// Modification time of the entry path.
    pub modified: chrono::DateTime<chrono::Utc>,
    /// When the locator found this disc.
    pub discovered_at: chrono::DateTime<chrono::Utc>,
    /// Stable identity across runs.
    pub signature: String,
}

impl DiscSource {
    /// Short form of the signature for log lines.
    pub fn short_signature(&self) -> &str {
        let end = self.signature.len().min(12);
        &self.signature[..end]
    }
}

/// Title metadata used to build library paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleInfo {
    /// Movie title or series name.
    pub title: String,
    /// Release or first-air year.
    pub year: Option<u16>,
    /// Season number (TV only).
    pub season: Option<u16>,
    /// Edition / version tag, e.g. "Director's Cut".
    pub version: Option<String>,
}

impl TitleInfo {
    /// `Title (Year)` or just `Title`.
    pub fn folder_name(&self) -> String {
        match self.year {
            Some(year) => format!("{} ({})", self.title, year),
            None => self.title.clone(),
        }
    }
}
